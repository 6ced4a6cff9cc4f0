//! The shared playing list.
//!
//! A single ordered vector holds every entry; indices below the capacity are playing slots and
//! the rest form the waiting list. Liability requests and invitations live next to it so that
//! every mutation of the whole roster happens through one `&mut Roster`.

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::state::{
    ban::Ban,
    calendar::EventCalendar,
    invitation::Invitation,
    player::{Identity, Player, PlayerKey, PlayerRef, SlotKind, UserId},
};

/// Number of playing slots when nothing else is configured.
pub const DEFAULT_CAPACITY: usize = 15;
/// How long an invited user has to accept.
pub const DEFAULT_INVITATION_WINDOW: Duration = Duration::hours(24);

const FLAG_MAX_LEN: usize = 32;

/// Rule violations raised by roster operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// The roster is empty, so there is no match to join.
    #[error("no playing list is active")]
    NoActiveList,
    /// The designated entry is not on the roster.
    #[error("{0} is not on the playing list")]
    PlayerNotFound(PlayerRef),
    /// `create` was called on a non-empty roster.
    #[error("a playing list already exists")]
    AlreadyExists,
    /// The identity already holds an entry.
    #[error("{name} is already on the {slot} list")]
    AlreadyListed {
        /// Display name of the existing entry.
        name: String,
        /// Where the existing entry sits.
        slot: SlotKind,
    },
    /// The username already has a reserved slot.
    #[error("@{0} already has a pending invitation")]
    AlreadyInvited(String),
    /// The candidate was already nominated.
    #[error("{0} was already asked to take the liability")]
    AlreadyAsked(String),
    /// The liable player tried to leave.
    #[error("the liable player cannot leave before handing the liability over")]
    LiableCannotLeave,
    /// The caller does not hold the liability.
    #[error("{0} does not hold the liability")]
    NotLiable(String),
    /// Someone already holds the liability.
    #[error("{0} already holds the liability")]
    AlreadyLiable(String),
    /// The caller was never nominated.
    #[error("{0} was not asked to take the liability")]
    NotAsked(String),
    /// No pending invitation matches the caller.
    #[error("no pending invitation for {0}")]
    NotInvited(String),
    /// The nominee cannot hold the liability (reserved, waiting, or the holder itself).
    #[error("{0} cannot take the liability")]
    TargetNotEligible(String),
    /// Malformed identity or username.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),
    /// Malformed flag name.
    #[error("invalid flag `{0}`")]
    InvalidFlag(String),
    /// A snapshot breaks one of the roster invariants.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
    /// The member is barred from joining.
    #[error("{name} is banned until {until}")]
    Banned {
        /// Display name of the member.
        name: String,
        /// End of the ban.
        until: OffsetDateTime,
    },
    /// No ban is recorded for the user.
    #[error("user {0} is not banned")]
    NotBanned(String),
    /// Malformed ban request.
    #[error("invalid ban: {0}")]
    InvalidBan(String),
}

/// Coarse classification of [`RosterError`] used by outer layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Something required is missing.
    NotFound,
    /// The operation was already performed.
    Duplicate,
    /// Liability protocol violation.
    Liability,
    /// Malformed input.
    InvalidInput,
    /// The member is not allowed to do this right now.
    Forbidden,
}

impl RosterError {
    /// Class of the error.
    pub fn class(&self) -> ErrorClass {
        match self {
            RosterError::NoActiveList | RosterError::PlayerNotFound(_) => ErrorClass::NotFound,
            RosterError::NotInvited(_) | RosterError::NotBanned(_) => ErrorClass::NotFound,
            RosterError::AlreadyExists
            | RosterError::AlreadyListed { .. }
            | RosterError::AlreadyInvited(_)
            | RosterError::AlreadyAsked(_) => ErrorClass::Duplicate,
            RosterError::LiableCannotLeave
            | RosterError::NotLiable(_)
            | RosterError::AlreadyLiable(_)
            | RosterError::NotAsked(_)
            | RosterError::TargetNotEligible(_) => ErrorClass::Liability,
            RosterError::InvalidIdentity(_)
            | RosterError::InvalidFlag(_)
            | RosterError::InvalidSnapshot(_)
            | RosterError::InvalidBan(_) => ErrorClass::InvalidInput,
            RosterError::Banned { .. } => ErrorClass::Forbidden,
        }
    }
}

/// Result of putting a member on the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// The entry as stored.
    pub player: Player,
    /// Position of the entry.
    pub index: usize,
    /// Derived slot of the entry.
    pub slot: SlotKind,
    /// The member took over a reserved slot.
    pub accepted_invitation: bool,
}

/// Result of taking an entry off the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalOutcome {
    /// The entry that left.
    pub removed: Player,
    /// Slot the entry occupied before leaving.
    pub slot: SlotKind,
    /// Waiting entry moved into the last playing slot, if any.
    pub promoted: Option<Player>,
}

/// Copy of the whole roster state, as persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterSnapshot {
    /// Ordered entries.
    pub players: Vec<Player>,
    /// Pending invitations, oldest first.
    pub invitations: Vec<Invitation>,
    /// Members nominated for the liability.
    pub asked: Vec<UserId>,
    /// Recorded bans.
    pub bans: Vec<Ban>,
}

/// Shared playing list together with its liability requests and invitations.
#[derive(Debug, Clone)]
pub struct Roster {
    pub(super) capacity: usize,
    pub(super) calendar: EventCalendar,
    pub(super) invitation_window: Duration,
    pub(super) players: Vec<Player>,
    pub(super) invitations: IndexMap<String, Invitation>,
    pub(super) asked: IndexSet<UserId>,
    pub(super) bans: IndexMap<UserId, Ban>,
    pub(super) revision: u64,
}

impl Default for Roster {
    fn default() -> Self {
        Self::new(
            DEFAULT_CAPACITY,
            EventCalendar::default(),
            DEFAULT_INVITATION_WINDOW,
        )
    }
}

impl Roster {
    /// Create an empty roster.
    pub fn new(capacity: usize, calendar: EventCalendar, invitation_window: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            calendar,
            invitation_window,
            players: Vec::new(),
            invitations: IndexMap::new(),
            asked: IndexSet::new(),
            bans: IndexMap::new(),
            revision: 0,
        }
    }

    /// Number of playing slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Calendar used by time-dependent rules.
    pub fn calendar(&self) -> &EventCalendar {
        &self.calendar
    }

    /// Counter bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// All entries in order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Entries in playing slots.
    pub fn playing(&self) -> &[Player] {
        &self.players[..self.players.len().min(self.capacity)]
    }

    /// Entries in waiting slots.
    pub fn waiting(&self) -> &[Player] {
        &self.players[self.players.len().min(self.capacity)..]
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether no match is currently organised.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Whether `index` designates a waiting slot.
    pub fn is_waiting(&self, index: usize) -> bool {
        index >= self.capacity
    }

    /// Position of the designated entry.
    pub fn position(&self, target: &PlayerRef) -> Option<usize> {
        self.players
            .iter()
            .position(|player| target.matches(&player.key))
    }

    /// Look up the designated entry.
    pub fn find(&self, target: &PlayerRef) -> Option<&Player> {
        self.position(target).map(|index| &self.players[index])
    }

    /// The current liability holder.
    pub fn liable(&self) -> Option<&Player> {
        self.players.iter().find(|player| player.liable)
    }

    pub(super) fn touch(&mut self) {
        self.revision += 1;
    }

    pub(super) fn require(&self, target: &PlayerRef) -> Result<usize, RosterError> {
        self.position(target)
            .ok_or_else(|| RosterError::PlayerNotFound(target.clone()))
    }

    fn ensure_not_listed(&self, identity: &Identity) -> Result<(), RosterError> {
        match self.position(&PlayerRef::Id(identity.id)) {
            Some(index) => Err(RosterError::AlreadyListed {
                name: identity.full_name(),
                slot: SlotKind::at(index, self.capacity),
            }),
            None => Ok(()),
        }
    }

    fn has_pending_invitation(&self, identity: &Identity) -> bool {
        identity
            .username
            .as_ref()
            .is_some_and(|username| self.invitations.contains_key(username))
    }

    /// Open a new list with `initiator` as its sole, liable entry.
    pub fn create(&mut self, initiator: Identity) -> Result<Player, RosterError> {
        if !self.players.is_empty() {
            return Err(RosterError::AlreadyExists);
        }

        let mut player = Player::member(initiator);
        player.liable = true;
        self.asked.clear();
        self.players.push(player.clone());
        self.touch();
        Ok(player)
    }

    /// Append `identity` to an active list.
    ///
    /// A pending invitation for the identity's username is accepted in place instead.
    pub fn add_self(&mut self, identity: Identity) -> Result<Admission, RosterError> {
        if self.players.is_empty() {
            return Err(RosterError::NoActiveList);
        }
        self.admit(identity, None)
    }

    /// Insert `identity` at `at` (clamped to the tail), even when the list is empty.
    pub fn add_admin(
        &mut self,
        identity: Identity,
        at: Option<usize>,
    ) -> Result<Admission, RosterError> {
        self.admit(identity, at)
    }

    fn admit(&mut self, identity: Identity, at: Option<usize>) -> Result<Admission, RosterError> {
        self.ensure_not_listed(&identity)?;

        if self.has_pending_invitation(&identity) {
            return self.accept(identity);
        }

        let index = at
            .map(|at| at.min(self.players.len()))
            .unwrap_or(self.players.len());
        let player = Player::member(identity);
        self.players.insert(index, player.clone());
        self.touch();

        Ok(Admission {
            player,
            index,
            slot: SlotKind::at(index, self.capacity),
            accepted_invitation: false,
        })
    }

    /// Take the designated entry off the roster, promoting from the waiting list as needed.
    pub fn remove(
        &mut self,
        target: &PlayerRef,
        now: OffsetDateTime,
    ) -> Result<RemovalOutcome, RosterError> {
        let index = self.require(target)?;
        if self.players[index].liable {
            return Err(RosterError::LiableCannotLeave);
        }

        match &self.players[index].key {
            PlayerKey::Reserved { username } => {
                let username = username.clone();
                self.invitations.shift_remove(&username);
            }
            PlayerKey::Member(identity) => {
                let id = identity.id;
                self.asked.shift_remove(&id);
            }
        }

        Ok(self.remove_at(index, now))
    }

    /// Set the attendance confirmation of an entry.
    pub fn set_approval(&mut self, target: &PlayerRef, value: bool) -> Result<Player, RosterError> {
        let index = self.require(target)?;
        let player = &mut self.players[index];
        player.approved = value;
        let player = player.clone();
        self.touch();
        Ok(player)
    }

    /// Flip a named marker on an entry. Returns the entry and whether the flag is now set.
    pub fn toggle_flag(
        &mut self,
        target: &PlayerRef,
        flag: &str,
    ) -> Result<(Player, bool), RosterError> {
        let flag = normalize_flag(flag)?;
        let index = self.require(target)?;
        let player = &mut self.players[index];
        let enabled = if player.flags.remove(&flag) {
            false
        } else {
            player.flags.insert(flag);
            true
        };
        let player = player.clone();
        self.touch();
        Ok((player, enabled))
    }

    /// Move the liability from `from` to `to` without a handshake.
    pub fn transfer_liability(
        &mut self,
        from: UserId,
        to: UserId,
    ) -> Result<(Player, Player), RosterError> {
        let from_index = self.require(&PlayerRef::Id(from))?;
        let to_index = self.require(&PlayerRef::Id(to))?;

        if !self.players[from_index].liable {
            return Err(RosterError::NotLiable(
                self.players[from_index].display_name(),
            ));
        }

        if from_index != to_index {
            self.players[from_index].liable = false;
            self.players[to_index].liable = true;
            self.asked.clear();
            self.touch();
        }

        Ok((
            self.players[from_index].clone(),
            self.players[to_index].clone(),
        ))
    }

    /// Hand the liability to `to` when nobody holds it.
    pub fn grant_liability(&mut self, to: UserId) -> Result<Player, RosterError> {
        let index = self.require(&PlayerRef::Id(to))?;

        if let Some(holder) = self.liable() {
            if holder.user_id() == Some(to) {
                return Ok(holder.clone());
            }
            return Err(RosterError::AlreadyLiable(holder.display_name()));
        }

        self.players[index].liable = true;
        self.asked.clear();
        self.touch();
        Ok(self.players[index].clone())
    }

    /// Copy the whole state.
    pub fn snapshot(&self) -> RosterSnapshot {
        RosterSnapshot {
            players: self.players.clone(),
            invitations: self.invitations.values().cloned().collect(),
            asked: self.asked.iter().copied().collect(),
            bans: self.bans.values().copied().collect(),
        }
    }

    /// Replace the whole state with `snapshot` after checking the invariants.
    pub fn restore(&mut self, snapshot: RosterSnapshot) -> Result<(), RosterError> {
        validate_snapshot(&snapshot)?;

        self.players = snapshot.players;
        self.invitations = snapshot
            .invitations
            .into_iter()
            .map(|invitation| (invitation.username.clone(), invitation))
            .collect();
        self.asked = snapshot.asked.into_iter().collect();
        self.bans = snapshot
            .bans
            .into_iter()
            .map(|ban| (ban.user_id, ban))
            .collect();
        self.touch();
        Ok(())
    }

    /// Empty the list, invitations and liability requests. Bans are kept.
    ///
    /// Returns the withdrawn invitations.
    pub fn clear_all(&mut self) -> Vec<Invitation> {
        let withdrawn = self.invitations.drain(..).map(|(_, inv)| inv).collect();
        self.players.clear();
        self.asked.clear();
        self.touch();
        withdrawn
    }
}

/// Lowercase and check a flag name.
pub fn normalize_flag(flag: &str) -> Result<String, RosterError> {
    let normalized = flag.trim().to_ascii_lowercase();
    let valid = !normalized.is_empty()
        && normalized.len() <= FLAG_MAX_LEN
        && normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(normalized)
    } else {
        Err(RosterError::InvalidFlag(flag.to_owned()))
    }
}

fn validate_snapshot(snapshot: &RosterSnapshot) -> Result<(), RosterError> {
    let mut seen: Vec<&PlayerKey> = Vec::with_capacity(snapshot.players.len());
    for player in &snapshot.players {
        if seen.contains(&&player.key) {
            return Err(RosterError::InvalidSnapshot(format!(
                "{} appears twice",
                player.display_name()
            )));
        }
        seen.push(&player.key);
    }

    let liable = snapshot.players.iter().filter(|p| p.liable).count();
    if liable > 1 {
        return Err(RosterError::InvalidSnapshot(format!(
            "{liable} players hold the liability"
        )));
    }

    if snapshot
        .players
        .iter()
        .any(|p| p.liable && p.key.is_reserved())
    {
        return Err(RosterError::InvalidSnapshot(
            "a reserved slot holds the liability".into(),
        ));
    }

    let reserved: HashSet<&str> = snapshot
        .players
        .iter()
        .filter_map(|p| match &p.key {
            PlayerKey::Reserved { username } => Some(username.as_str()),
            PlayerKey::Member(_) => None,
        })
        .collect();
    let invited: HashSet<&str> = snapshot
        .invitations
        .iter()
        .map(|inv| inv.username.as_str())
        .collect();
    if reserved != invited || invited.len() != snapshot.invitations.len() {
        return Err(RosterError::InvalidSnapshot(
            "reserved slots and invitations do not match".into(),
        ));
    }

    let members: HashSet<UserId> = snapshot.players.iter().filter_map(Player::user_id).collect();
    if let Some(stray) = snapshot.asked.iter().find(|id| !members.contains(id)) {
        return Err(RosterError::InvalidSnapshot(format!(
            "asked user {stray} is not on the list"
        )));
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use time::{OffsetDateTime, macros::datetime};

    use super::*;

    pub(crate) const MONDAY_NOON: OffsetDateTime = datetime!(2026-10-19 12:00 +2);

    pub(crate) fn member(id: i64) -> Identity {
        Identity::new(id, format!("Player{id}"), None, Some(format!("player_{id}"))).unwrap()
    }

    pub(crate) fn id(raw: i64) -> PlayerRef {
        PlayerRef::Id(UserId(raw))
    }

    /// Roster created by player 1 with players 2..=n appended.
    pub(crate) fn roster_with(n: i64) -> Roster {
        let mut roster = Roster::default();
        roster.create(member(1)).unwrap();
        for raw in 2..=n {
            roster.add_self(member(raw)).unwrap();
        }
        roster
    }

    pub(crate) fn ids(players: &[Player]) -> Vec<i64> {
        players
            .iter()
            .map(|p| p.user_id().map(|id| id.0).unwrap_or(-1))
            .collect()
    }

    #[test]
    fn create_seeds_a_single_liable_player() {
        let mut roster = Roster::default();
        let player = roster.create(member(1)).unwrap();
        assert!(player.liable);
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.create(member(2)), Err(RosterError::AlreadyExists));
    }

    #[test]
    fn add_self_requires_an_active_list() {
        let mut roster = Roster::default();
        assert_eq!(roster.add_self(member(2)), Err(RosterError::NoActiveList));
    }

    #[test]
    fn add_self_reports_the_slot_kind() {
        let mut roster = roster_with(15);
        let admission = roster.add_self(member(16)).unwrap();
        assert_eq!(admission.slot, SlotKind::Waiting);
        assert_eq!(admission.index, 15);
        assert_eq!(ids(roster.waiting()), vec![16]);
    }

    #[test]
    fn duplicates_are_rejected_with_their_slot() {
        let mut roster = roster_with(16);
        assert!(matches!(
            roster.add_self(member(3)),
            Err(RosterError::AlreadyListed {
                slot: SlotKind::Playing,
                ..
            })
        ));
        assert!(matches!(
            roster.add_admin(member(16), Some(0)),
            Err(RosterError::AlreadyListed {
                slot: SlotKind::Waiting,
                ..
            })
        ));
    }

    #[test]
    fn admin_insert_honours_the_index_and_bypasses_empty_list() {
        let mut roster = Roster::default();
        roster.add_admin(member(5), None).unwrap();
        roster.add_admin(member(6), Some(0)).unwrap();
        roster.add_admin(member(7), Some(99)).unwrap();
        assert_eq!(ids(roster.players()), vec![6, 5, 7]);
    }

    #[test]
    fn liable_player_cannot_leave() {
        let mut roster = roster_with(3);
        assert_eq!(
            roster.remove(&id(1), MONDAY_NOON),
            Err(RosterError::LiableCannotLeave)
        );
        assert!(matches!(
            roster.remove(&id(9), MONDAY_NOON),
            Err(RosterError::PlayerNotFound(_))
        ));
    }

    #[test]
    fn approval_and_flags_mutate_a_single_entry() {
        let mut roster = roster_with(3);
        let player = roster.set_approval(&id(2), true).unwrap();
        assert!(player.approved);

        let (_, enabled) = roster.toggle_flag(&id(2), "Match-Ball").unwrap();
        assert!(enabled);
        let (player, enabled) = roster.toggle_flag(&id(2), "match-ball").unwrap();
        assert!(!enabled);
        assert!(player.flags.is_empty());

        assert!(matches!(
            roster.toggle_flag(&id(2), "  "),
            Err(RosterError::InvalidFlag(_))
        ));
        assert!(matches!(
            roster.set_approval(&id(8), true),
            Err(RosterError::PlayerNotFound(_))
        ));
    }

    #[test]
    fn transfer_requires_the_current_holder() {
        let mut roster = roster_with(3);
        assert!(matches!(
            roster.transfer_liability(UserId(2), UserId(3)),
            Err(RosterError::NotLiable(_))
        ));

        roster.transfer_liability(UserId(1), UserId(3)).unwrap();
        assert_eq!(roster.liable().and_then(Player::user_id), Some(UserId(3)));
        assert_eq!(roster.players().iter().filter(|p| p.liable).count(), 1);
    }

    #[test]
    fn grant_refuses_when_someone_else_is_liable() {
        let mut roster = Roster::default();
        roster.add_admin(member(1), None).unwrap();
        roster.add_admin(member(2), None).unwrap();

        roster.grant_liability(UserId(1)).unwrap();
        assert!(roster.grant_liability(UserId(1)).is_ok());
        assert!(matches!(
            roster.grant_liability(UserId(2)),
            Err(RosterError::AlreadyLiable(_))
        ));
    }

    #[test]
    fn clear_all_empties_everything() {
        let mut roster = roster_with(4);
        roster.invite("late_comer", None, MONDAY_NOON).unwrap();
        roster.ask(UserId(1), UserId(2)).unwrap();

        let withdrawn = roster.clear_all();
        assert_eq!(withdrawn.len(), 1);
        assert!(roster.is_empty());
        assert_eq!(roster.snapshot(), RosterSnapshot::default());
    }

    #[test]
    fn restore_round_trips_and_rejects_broken_snapshots() {
        let mut roster = roster_with(4);
        roster.invite("late_comer", Some(1), MONDAY_NOON).unwrap();
        roster.ask(UserId(1), UserId(3)).unwrap();
        roster.ban(UserId(9), Duration::days(3), MONDAY_NOON).unwrap();
        let snapshot = roster.snapshot();
        assert_eq!(snapshot.bans.len(), 1);

        let mut restored = Roster::default();
        restored.restore(snapshot.clone()).unwrap();
        assert_eq!(restored.snapshot(), snapshot);

        let mut broken = snapshot.clone();
        broken.players[1].liable = true;
        broken.players[2].liable = true;
        assert!(matches!(
            restored.restore(broken),
            Err(RosterError::InvalidSnapshot(_))
        ));

        let mut dangling = snapshot;
        dangling.invitations.clear();
        assert!(matches!(
            restored.restore(dangling),
            Err(RosterError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn revision_moves_only_on_mutation() {
        let mut roster = roster_with(2);
        let before = roster.revision();
        let _ = roster.add_self(member(2));
        assert_eq!(roster.revision(), before);
        roster.set_approval(&id(2), true).unwrap();
        assert_eq!(roster.revision(), before + 1);
    }
}
