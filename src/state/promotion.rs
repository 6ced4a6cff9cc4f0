//! Time-driven rules: promotion from the waiting list and pruning of unconfirmed players.

use time::OffsetDateTime;

use crate::state::{
    invitation::Invitation,
    player::{Player, PlayerKey, PlayerRef, SlotKind},
    roster::{RemovalOutcome, Roster},
};

impl Roster {
    /// Index of the waiting entry that moves up next.
    ///
    /// After the approval deadline on a match day confirmed players jump the queue; otherwise,
    /// or when nobody in the queue confirmed, the earliest waiting entry wins.
    pub fn first_in_line(&self, now: OffsetDateTime) -> Option<usize> {
        let start = self.capacity;
        if self.players.len() <= start {
            return None;
        }

        let approved_first = if self.calendar.is_post_deadline(now) {
            self.players[start..]
                .iter()
                .position(|player| player.approved)
                .map(|offset| start + offset)
        } else {
            None
        };

        approved_first.or(Some(start))
    }

    /// Remove the entry at `index` and fill the freed playing slot from the waiting list.
    ///
    /// The promoted entry lands in the last playing slot; everybody else keeps their relative
    /// order.
    pub(super) fn remove_at(&mut self, index: usize, now: OffsetDateTime) -> RemovalOutcome {
        let slot = SlotKind::at(index, self.capacity);
        let next = self.first_in_line(now);

        let removed = self.players.remove(index);
        self.touch();

        let promoted = match (slot, next) {
            (SlotKind::Playing, Some(waiting_index)) => {
                // Every waiting index is past `index`, so it shifted down by one.
                let player = self.players.remove(waiting_index - 1);
                self.players.insert(self.capacity - 1, player.clone());
                Some(player)
            }
            _ => None,
        };

        RemovalOutcome {
            removed,
            slot,
            promoted,
        }
    }

    fn next_unconfirmed(&self) -> Option<usize> {
        self.playing()
            .iter()
            .position(|player| !player.approved && !player.liable)
    }

    /// Drop every playing entry that neither confirmed nor holds the liability.
    ///
    /// Runs until no such entry remains in a playing slot, so a second run right after is a
    /// no-op.
    pub fn prune_unapproved(&mut self, now: OffsetDateTime) -> Vec<RemovalOutcome> {
        let mut outcomes = Vec::new();

        while let Some(index) = self.next_unconfirmed() {
            let reserved = match &self.players[index].key {
                PlayerKey::Reserved { username } => Some(username.clone()),
                PlayerKey::Member(_) => None,
            };
            if let Some(username) = reserved {
                self.invitations.shift_remove(&username);
            }
            if let Some(id) = self.players[index].user_id() {
                self.asked.shift_remove(&id);
            }
            outcomes.push(self.remove_at(index, now));
        }

        outcomes
    }

    /// Playing members who still have to confirm, excluding the liable one.
    pub fn pending_confirmations(&self) -> Vec<Player> {
        self.playing()
            .iter()
            .filter(|player| !player.approved && !player.liable && !player.key.is_reserved())
            .cloned()
            .collect()
    }

    /// End-of-day wipe. Returns the invitations that were withdrawn.
    pub fn daily_cleanup(&mut self) -> Vec<Invitation> {
        self.clear_all()
    }

    /// Members currently in playing slots, in order.
    pub fn playing_members(&self) -> Vec<Player> {
        self.playing()
            .iter()
            .filter(|player| !player.key.is_reserved())
            .cloned()
            .collect()
    }

    /// Slot of the designated entry.
    pub fn slot_of(&self, target: &PlayerRef) -> Option<SlotKind> {
        self.position(target)
            .map(|index| SlotKind::at(index, self.capacity))
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::state::{
        player::UserId,
        roster::tests::{MONDAY_NOON, id, ids, member, roster_with},
    };

    const SUNDAY_EVENING: OffsetDateTime = datetime!(2026-10-18 17:00 +2);

    #[test]
    fn leaving_playing_slot_promotes_first_waiting_entry() {
        let mut roster = roster_with(16);
        assert_eq!(ids(roster.waiting()), vec![16]);

        let outcome = roster.remove(&id(2), MONDAY_NOON).unwrap();

        assert_eq!(outcome.slot, SlotKind::Playing);
        assert_eq!(outcome.promoted.and_then(|p| p.user_id()), Some(UserId(16)));
        assert_eq!(roster.len(), 15);
        assert!(roster.waiting().is_empty());
        let expected: Vec<i64> = std::iter::once(1).chain(3..=16).collect();
        assert_eq!(ids(roster.players()), expected);
        assert_eq!(roster.slot_of(&id(16)), Some(SlotKind::Playing));
    }

    #[test]
    fn leaving_waiting_slot_promotes_nobody() {
        let mut roster = roster_with(17);
        let outcome = roster.remove(&id(16), MONDAY_NOON).unwrap();
        assert_eq!(outcome.slot, SlotKind::Waiting);
        assert!(outcome.promoted.is_none());
        assert_eq!(ids(roster.waiting()), vec![17]);
    }

    #[test]
    fn no_waiting_entries_means_no_promotion() {
        let mut roster = roster_with(5);
        let outcome = roster.remove(&id(3), MONDAY_NOON).unwrap();
        assert!(outcome.promoted.is_none());
        assert_eq!(ids(roster.players()), vec![1, 2, 4, 5]);
    }

    #[test]
    fn approved_waiting_entry_jumps_queue_after_deadline() {
        let mut roster = roster_with(18);
        roster.set_approval(&id(17), true).unwrap();

        let outcome = roster.remove(&id(4), SUNDAY_EVENING).unwrap();

        assert_eq!(outcome.promoted.and_then(|p| p.user_id()), Some(UserId(17)));
        assert_eq!(ids(&roster.players()[14..]), vec![17, 16, 18]);
    }

    #[test]
    fn approval_is_ignored_before_deadline() {
        let mut roster = roster_with(18);
        roster.set_approval(&id(17), true).unwrap();

        let outcome = roster.remove(&id(4), MONDAY_NOON).unwrap();

        assert_eq!(outcome.promoted.and_then(|p| p.user_id()), Some(UserId(16)));
        assert_eq!(ids(roster.waiting()), vec![17, 18]);
    }

    #[test]
    fn falls_back_to_earliest_when_nobody_confirmed() {
        let roster = roster_with(18);
        assert_eq!(roster.first_in_line(SUNDAY_EVENING), Some(15));
    }

    #[test]
    fn pruning_spares_liable_and_confirmed_players() {
        let mut roster = roster_with(15);
        for raw in 2..=13 {
            roster.set_approval(&id(raw), true).unwrap();
        }

        let outcomes = roster.prune_unapproved(SUNDAY_EVENING);

        assert_eq!(outcomes.len(), 2);
        assert_eq!(ids(roster.players()), (1..=13).collect::<Vec<_>>());
        assert!(roster.liable().is_some());
    }

    #[test]
    fn pruning_prefers_confirmed_waiting_players() {
        let mut roster = roster_with(17);
        for raw in 2..=14 {
            roster.set_approval(&id(raw), true).unwrap();
        }
        roster.set_approval(&id(17), true).unwrap();

        let outcomes = roster.prune_unapproved(SUNDAY_EVENING);

        // 15 leaves and the confirmed 17 overtakes 16.
        assert_eq!(outcomes.len(), 1);
        assert_eq!(
            outcomes[0].promoted.as_ref().and_then(Player::user_id),
            Some(UserId(17))
        );
        assert_eq!(ids(roster.waiting()), vec![16]);
    }

    #[test]
    fn pruning_twice_is_the_same_as_once() {
        let mut roster = roster_with(20);
        for raw in [3, 5, 8, 17, 19] {
            roster.set_approval(&id(raw), true).unwrap();
        }

        roster.prune_unapproved(SUNDAY_EVENING);
        let once = roster.snapshot();
        let second = roster.prune_unapproved(SUNDAY_EVENING);

        assert!(second.is_empty());
        assert_eq!(ids(&roster.snapshot().players), ids(&once.players));
        assert!(roster.playing().iter().all(|p| p.approved || p.liable));
    }

    #[test]
    fn pruning_withdraws_reserved_slots() {
        let mut roster = roster_with(3);
        for raw in 2..=3 {
            roster.set_approval(&id(raw), true).unwrap();
        }
        roster.invite("late_comer", None, MONDAY_NOON).unwrap();

        let outcomes = roster.prune_unapproved(SUNDAY_EVENING);

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].removed.key.is_reserved());
        assert_eq!(roster.invitations().count(), 0);
    }

    #[test]
    fn reminders_skip_liable_and_confirmed_players() {
        let mut roster = roster_with(17);
        roster.set_approval(&id(2), true).unwrap();
        let pending = roster.pending_confirmations();
        assert_eq!(ids(&pending), (3..=15).collect::<Vec<_>>());
    }

    #[test]
    fn daily_cleanup_wipes_the_roster() {
        let mut roster = roster_with(17);
        roster.add_admin(member(40), Some(2)).unwrap();
        roster.daily_cleanup();
        assert!(roster.is_empty());
        assert!(roster.liable().is_none());
    }
}
