//! Reserved slots for invited users, with an acceptance window.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::state::{
    player::{Identity, Player, PlayerKey, PlayerRef, SlotKind, normalize_username},
    roster::{Admission, RemovalOutcome, Roster, RosterError},
};

/// A pending invitation. The token tells a live expiry timer apart from a stale one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    /// Normalised username the slot is held for.
    pub username: String,
    /// Identifies the expiry timer armed for this invitation.
    pub token: Uuid,
    /// Instant after which the reserved slot is released.
    pub expires_at: OffsetDateTime,
}

impl Roster {
    /// Pending invitations, oldest first.
    pub fn invitations(&self) -> impl Iterator<Item = &Invitation> {
        self.invitations.values()
    }

    /// Whether `username` has a pending invitation.
    pub fn is_invited(&self, username: &str) -> bool {
        normalize_username(username)
            .map(|username| self.invitations.contains_key(&username))
            .unwrap_or(false)
    }

    /// Reserve a slot for `username` at `at` (clamped to the tail).
    pub fn invite(
        &mut self,
        username: &str,
        at: Option<usize>,
        now: OffsetDateTime,
    ) -> Result<Invitation, RosterError> {
        let username = normalize_username(username)?;

        if self.invitations.contains_key(&username) {
            return Err(RosterError::AlreadyInvited(username));
        }
        if let Some(index) = self
            .players
            .iter()
            .position(|player| player.key.username() == Some(username.as_str()))
        {
            return Err(RosterError::AlreadyListed {
                name: self.players[index].display_name(),
                slot: SlotKind::at(index, self.capacity),
            });
        }

        let index = at
            .map(|at| at.min(self.players.len()))
            .unwrap_or(self.players.len());
        self.players
            .insert(index, Player::reserved(username.clone()));

        let invitation = Invitation {
            username: username.clone(),
            token: Uuid::new_v4(),
            expires_at: now + self.invitation_window,
        };
        self.invitations.insert(username, invitation.clone());
        self.touch();

        Ok(invitation)
    }

    /// Swap the reserved slot for the real member, keeping its position.
    pub fn accept(&mut self, identity: Identity) -> Result<Admission, RosterError> {
        let Some(username) = identity
            .username
            .clone()
            .filter(|username| self.invitations.contains_key(username))
        else {
            return Err(RosterError::NotInvited(identity.full_name()));
        };

        if let Some(index) = self.position(&PlayerRef::Id(identity.id)) {
            return Err(RosterError::AlreadyListed {
                name: identity.full_name(),
                slot: SlotKind::at(index, self.capacity),
            });
        }

        let index = self
            .position(&PlayerRef::Reserved(username.clone()))
            .ok_or_else(|| RosterError::NotInvited(identity.full_name()))?;

        let placeholder = &self.players[index];
        let player = Player {
            key: PlayerKey::Member(identity),
            liable: false,
            approved: placeholder.approved,
            flags: placeholder.flags.clone(),
        };
        self.players[index] = player.clone();
        self.invitations.shift_remove(&username);
        self.touch();

        Ok(Admission {
            player,
            index,
            slot: SlotKind::at(index, self.capacity),
            accepted_invitation: true,
        })
    }

    /// Release the reserved slot of an invitation that ran out.
    ///
    /// Returns `None` when the invitation was already accepted, withdrawn, or replaced by a newer
    /// one, so a late timer never touches the roster.
    pub fn expire_invitation(
        &mut self,
        username: &str,
        token: Uuid,
        now: OffsetDateTime,
    ) -> Option<RemovalOutcome> {
        match self.invitations.get(username) {
            Some(invitation) if invitation.token == token => {}
            _ => return None,
        }

        self.invitations.shift_remove(username);
        match self.position(&PlayerRef::Reserved(username.to_owned())) {
            Some(index) => Some(self.remove_at(index, now)),
            None => {
                self.touch();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::state::{
        player::UserId,
        roster::tests::{MONDAY_NOON, ids, member, roster_with},
    };

    fn bob(id: i64) -> Identity {
        Identity::new(id, "Bob", None, Some("bob_the_keeper".into())).unwrap()
    }

    #[test]
    fn invite_reserves_a_tail_slot_with_a_deadline() {
        let mut roster = roster_with(3);
        let invitation = roster.invite("@Bob_The_Keeper", None, MONDAY_NOON).unwrap();

        assert_eq!(invitation.username, "bob_the_keeper");
        assert_eq!(invitation.expires_at, MONDAY_NOON + Duration::hours(24));
        assert!(roster.players()[3].key.is_reserved());
        assert!(matches!(
            roster.invite("bob_the_keeper", None, MONDAY_NOON),
            Err(RosterError::AlreadyInvited(_))
        ));
    }

    #[test]
    fn invite_rejects_listed_usernames() {
        let mut roster = roster_with(3);
        assert!(matches!(
            roster.invite("player_2", None, MONDAY_NOON),
            Err(RosterError::AlreadyListed { .. })
        ));
    }

    #[test]
    fn accept_swaps_in_place_and_late_expiry_is_a_noop() {
        let mut roster = roster_with(3);
        let invitation = roster.invite("bob_the_keeper", Some(1), MONDAY_NOON).unwrap();

        let admission = roster.accept(bob(50)).unwrap();
        assert_eq!(admission.index, 1);
        assert!(admission.accepted_invitation);
        assert_eq!(ids(roster.players()), vec![1, 50, 2, 3]);
        assert_eq!(roster.invitations().count(), 0);

        let expired = roster.expire_invitation(
            "bob_the_keeper",
            invitation.token,
            MONDAY_NOON + Duration::hours(25),
        );
        assert!(expired.is_none());
        assert_eq!(ids(roster.players()), vec![1, 50, 2, 3]);
    }

    #[test]
    fn accept_without_invitation_fails() {
        let mut roster = roster_with(3);
        assert!(matches!(
            roster.accept(bob(50)),
            Err(RosterError::NotInvited(_))
        ));
        let anonymous = Identity::new(51, "Anon", None, None).unwrap();
        assert!(matches!(
            roster.accept(anonymous),
            Err(RosterError::NotInvited(_))
        ));
    }

    #[test]
    fn expiry_releases_the_slot_and_promotes() {
        let mut roster = roster_with(15);
        let invitation = roster.invite("bob_the_keeper", Some(5), MONDAY_NOON).unwrap();
        assert_eq!(ids(roster.waiting()), vec![15]);

        let outcome = roster
            .expire_invitation("bob_the_keeper", invitation.token, MONDAY_NOON)
            .unwrap();

        assert!(outcome.removed.key.is_reserved());
        assert_eq!(outcome.promoted.and_then(|p| p.user_id()), Some(UserId(15)));
        assert!(roster.waiting().is_empty());
        assert!(!roster.is_invited("bob_the_keeper"));
    }

    #[test]
    fn stale_token_does_not_expire_a_fresh_invitation() {
        let mut roster = roster_with(3);
        let first = roster.invite("bob_the_keeper", None, MONDAY_NOON).unwrap();
        roster
            .remove(&PlayerRef::Reserved("bob_the_keeper".into()), MONDAY_NOON)
            .unwrap();
        roster.invite("bob_the_keeper", None, MONDAY_NOON).unwrap();

        assert!(
            roster
                .expire_invitation("bob_the_keeper", first.token, MONDAY_NOON)
                .is_none()
        );
        assert!(roster.is_invited("bob_the_keeper"));
    }

    #[test]
    fn joining_directly_consumes_the_invitation() {
        let mut roster = roster_with(3);
        roster.invite("bob_the_keeper", Some(0), MONDAY_NOON).unwrap();

        let admission = roster.add_self(bob(60)).unwrap();

        assert!(admission.accepted_invitation);
        assert_eq!(ids(roster.players()), vec![60, 1, 2, 3]);
        assert!(roster.players().iter().all(|p| !p.key.is_reserved()));
    }

    #[test]
    fn admin_can_invite_into_an_empty_list() {
        let mut roster = crate::state::roster::Roster::default();
        roster.invite("bob_the_keeper", None, MONDAY_NOON).unwrap();
        roster.add_admin(member(2), None).unwrap();
        assert_eq!(roster.len(), 2);
    }
}
