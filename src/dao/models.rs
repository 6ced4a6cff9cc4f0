use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::state::{
    ban::Ban,
    invitation::Invitation,
    player::{Identity, Player, PlayerKey, UserId},
    roster::{RosterError, RosterSnapshot},
};

/// Persisted roster, split the way backends store it: one record set per concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RosterEntity {
    /// Ordered roster entries.
    pub playing: Vec<PlayingEntity>,
    /// Pending invitations.
    pub invited: Vec<InvitedEntity>,
    /// Members nominated for the liability.
    pub asked: Vec<AskedEntity>,
    /// Members barred from joining.
    #[serde(default)]
    pub banned: Vec<BannedEntity>,
}

/// One roster entry. `position` keeps the order across backends that do not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayingEntity {
    /// Zero-based index in the roster.
    pub position: u32,
    /// Platform id, absent for reserved slots.
    pub user_id: Option<i64>,
    /// First name, absent for reserved slots.
    pub first_name: Option<String>,
    /// Optional family name.
    pub last_name: Option<String>,
    /// Username of the member, or the invited username of a reserved slot.
    pub username: Option<String>,
    /// Holds the match liability.
    pub liable: bool,
    /// Confirmed attendance.
    pub approved: bool,
    /// Named markers.
    #[serde(default)]
    pub flags: Vec<String>,
}

/// A pending invitation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvitedEntity {
    /// Normalised username.
    pub username: String,
    /// Token of the expiry timer.
    pub token: Uuid,
    /// Expiry instant.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// A member nominated for the liability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AskedEntity {
    /// Platform id of the nominee.
    pub user_id: i64,
}

/// A ban.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BannedEntity {
    /// Platform id of the banned member.
    pub user_id: i64,
    /// End of the ban.
    #[serde(with = "time::serde::rfc3339")]
    pub until: OffsetDateTime,
}

impl From<&RosterSnapshot> for RosterEntity {
    fn from(snapshot: &RosterSnapshot) -> Self {
        let playing = snapshot
            .players
            .iter()
            .enumerate()
            .map(|(position, player)| PlayingEntity::from_player(position as u32, player))
            .collect();
        let invited = snapshot
            .invitations
            .iter()
            .map(|invitation| InvitedEntity {
                username: invitation.username.clone(),
                token: invitation.token,
                expires_at: invitation.expires_at,
            })
            .collect();
        let asked = snapshot
            .asked
            .iter()
            .map(|id| AskedEntity { user_id: id.0 })
            .collect();
        let banned = snapshot
            .bans
            .iter()
            .map(|ban| BannedEntity {
                user_id: ban.user_id.0,
                until: ban.until,
            })
            .collect();

        Self {
            playing,
            invited,
            asked,
            banned,
        }
    }
}

impl PlayingEntity {
    fn from_player(position: u32, player: &Player) -> Self {
        let (user_id, first_name, last_name, username) = match &player.key {
            PlayerKey::Member(identity) => (
                Some(identity.id.0),
                Some(identity.first_name.clone()),
                identity.last_name.clone(),
                identity.username.clone(),
            ),
            PlayerKey::Reserved { username } => (None, None, None, Some(username.clone())),
        };

        Self {
            position,
            user_id,
            first_name,
            last_name,
            username,
            liable: player.liable,
            approved: player.approved,
            flags: player.flags.iter().cloned().collect(),
        }
    }

    fn into_player(self) -> Result<Player, RosterError> {
        let key = match (self.user_id, self.first_name, self.username) {
            (Some(id), Some(first_name), username) => {
                PlayerKey::Member(Identity::new(id, first_name, self.last_name, username)?)
            }
            (None, None, Some(username)) => PlayerKey::Reserved { username },
            _ => {
                return Err(RosterError::InvalidSnapshot(format!(
                    "entry at position {} is neither a member nor a reserved slot",
                    self.position
                )));
            }
        };

        Ok(Player {
            key,
            liable: self.liable,
            approved: self.approved,
            flags: self.flags.into_iter().collect(),
        })
    }
}

impl TryFrom<RosterEntity> for RosterSnapshot {
    type Error = RosterError;

    fn try_from(mut entity: RosterEntity) -> Result<Self, Self::Error> {
        entity.playing.sort_by_key(|entry| entry.position);
        let players = entity
            .playing
            .into_iter()
            .map(PlayingEntity::into_player)
            .collect::<Result<Vec<_>, _>>()?;
        let invitations = entity
            .invited
            .into_iter()
            .map(|entry| Invitation {
                username: entry.username,
                token: entry.token,
                expires_at: entry.expires_at,
            })
            .collect();
        let asked = entity
            .asked
            .into_iter()
            .map(|entry| UserId(entry.user_id))
            .collect();
        let bans = entity
            .banned
            .into_iter()
            .map(|entry| Ban {
                user_id: UserId(entry.user_id),
                until: entry.until,
            })
            .collect();

        let mut snapshot = RosterSnapshot {
            players,
            invitations,
            asked,
            bans,
        };
        let repaired = reconcile(&mut snapshot);
        if repaired > 0 {
            warn!(repaired, "stored roster was inconsistent; dropped mismatched records");
        }
        Ok(snapshot)
    }
}

/// Make the record sets agree with each other again.
///
/// Backends write the record sets one after the other, so an interrupted save can leave them
/// from different generations. The list itself wins: duplicate entries, extra liability
/// holders, placeholders without an invitation (or shadowed by their member), invitations
/// without a placeholder and nominees no longer on the list are dropped. Returns how many
/// records were touched.
fn reconcile(snapshot: &mut RosterSnapshot) -> usize {
    let mut repaired = 0;

    let mut seen: Vec<PlayerKey> = Vec::with_capacity(snapshot.players.len());
    snapshot.players.retain(|player| {
        if seen.contains(&player.key) {
            repaired += 1;
            return false;
        }
        seen.push(player.key.clone());
        true
    });

    let member_usernames: HashSet<String> = snapshot
        .players
        .iter()
        .filter_map(|player| match &player.key {
            PlayerKey::Member(identity) => identity.username.clone(),
            PlayerKey::Reserved { .. } => None,
        })
        .collect();
    let invited: HashSet<String> = snapshot
        .invitations
        .iter()
        .map(|invitation| invitation.username.clone())
        .collect();
    snapshot.players.retain(|player| match &player.key {
        PlayerKey::Reserved { username }
            if member_usernames.contains(username) || !invited.contains(username) =>
        {
            repaired += 1;
            false
        }
        _ => true,
    });

    let mut holder_seen = false;
    for player in &mut snapshot.players {
        if player.liable {
            if holder_seen || player.key.is_reserved() {
                player.liable = false;
                repaired += 1;
            } else {
                holder_seen = true;
            }
        }
    }

    let mut reserved: HashSet<String> = snapshot
        .players
        .iter()
        .filter_map(|player| match &player.key {
            PlayerKey::Reserved { username } => Some(username.clone()),
            PlayerKey::Member(_) => None,
        })
        .collect();
    let before = snapshot.invitations.len();
    // `remove` also drops a second invitation for the same username.
    snapshot
        .invitations
        .retain(|invitation| reserved.remove(&invitation.username));
    repaired += before - snapshot.invitations.len();

    let mut members: HashSet<UserId> =
        snapshot.players.iter().filter_map(Player::user_id).collect();
    let before = snapshot.asked.len();
    snapshot.asked.retain(|id| members.remove(id));
    repaired += before - snapshot.asked.len();

    repaired
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn sample() -> RosterSnapshot {
        let mut creator = Player::member(
            Identity::new(7, "Noa", Some("Levi".into()), Some("noa_levi".into())).unwrap(),
        );
        creator.liable = true;
        creator.flags.insert("match-ball".into());
        let reserved = Player::reserved("guest_one".into());

        RosterSnapshot {
            players: vec![creator, reserved],
            invitations: vec![Invitation {
                username: "guest_one".into(),
                token: Uuid::nil(),
                expires_at: datetime!(2026-10-20 12:00 UTC),
            }],
            asked: vec![UserId(7)],
            bans: vec![Ban {
                user_id: UserId(11),
                until: datetime!(2026-10-25 12:00 UTC),
            }],
        }
    }

    #[test]
    fn entries_are_reordered_by_position_on_load() {
        let mut entity = RosterEntity::from(&sample());
        entity.playing.reverse();

        let snapshot = RosterSnapshot::try_from(entity).unwrap();
        assert_eq!(snapshot, sample());
        assert!(snapshot.players[0].flags.contains("match-ball"));
        assert!(snapshot.players[1].key.is_reserved());
    }

    #[test]
    fn reserved_slots_store_only_the_username() {
        let entity = RosterEntity::from(&sample());
        let reserved = &entity.playing[1];
        assert_eq!(reserved.user_id, None);
        assert_eq!(reserved.first_name, None);
        assert_eq!(reserved.username.as_deref(), Some("guest_one"));
    }

    #[test]
    fn bans_are_kept_across_a_save() {
        let entity = RosterEntity::from(&sample());
        assert_eq!(entity.banned.len(), 1);
        let snapshot = RosterSnapshot::try_from(entity).unwrap();
        assert_eq!(snapshot.bans, sample().bans);
    }

    #[test]
    fn records_without_bans_still_load() {
        let json = r#"{"playing": [], "invited": [], "asked": []}"#;
        let entity: RosterEntity = serde_json::from_str(json).unwrap();
        assert!(entity.banned.is_empty());
    }

    #[test]
    fn interrupted_save_is_reconciled_on_load() {
        // `asked` and `invited` from a newer save, `playing` from an older one.
        let mut entity = RosterEntity::from(&sample());
        entity.playing.truncate(1);
        entity.asked.push(AskedEntity { user_id: 42 });
        entity.invited.push(InvitedEntity {
            username: "late_comer".into(),
            token: Uuid::from_u128(1),
            expires_at: datetime!(2026-10-20 12:00 UTC),
        });

        let snapshot = RosterSnapshot::try_from(entity).unwrap();

        assert_eq!(snapshot.players.len(), 1);
        assert!(snapshot.invitations.is_empty());
        assert_eq!(snapshot.asked, vec![UserId(7)]);

        let mut roster = crate::state::roster::Roster::default();
        assert!(roster.restore(snapshot).is_ok());
    }

    #[test]
    fn shadowed_placeholder_and_extra_holder_are_dropped() {
        let mut snapshot = sample();
        let mut guest = Player::member(
            Identity::new(8, "Guest", None, Some("guest_one".into())).unwrap(),
        );
        guest.liable = true;
        snapshot.players.push(guest);
        snapshot.players.push(snapshot.players[0].clone());

        let loaded = RosterSnapshot::try_from(RosterEntity::from(&snapshot)).unwrap();

        let ids: Vec<Option<UserId>> = loaded.players.iter().map(Player::user_id).collect();
        assert_eq!(ids, vec![Some(UserId(7)), Some(UserId(8))]);
        assert_eq!(loaded.players.iter().filter(|p| p.liable).count(), 1);
        assert!(loaded.invitations.is_empty());
    }

    #[test]
    fn malformed_entries_are_rejected() {
        let mut entity = RosterEntity::from(&sample());
        entity.playing[0].first_name = None;
        assert!(matches!(
            RosterSnapshot::try_from(entity),
            Err(RosterError::InvalidSnapshot(_))
        ));
    }
}
