//! Liability handshake: the holder nominates candidates, one of them assumes.

use crate::state::{
    player::{Player, PlayerRef, UserId},
    roster::{Roster, RosterError},
};

/// Who holds the liability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiabilityState {
    /// Nobody; only seen between a wipe and the next `create`.
    Unassigned,
    /// Held by this member.
    Held(UserId),
}

/// Liability moving from one player to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiabilityChange {
    /// Previous holder, if there was one.
    pub from: Option<Player>,
    /// New holder.
    pub to: Player,
}

impl Roster {
    /// Current state of the liability slot.
    pub fn liability_state(&self) -> LiabilityState {
        self.liable()
            .and_then(Player::user_id)
            .map(LiabilityState::Held)
            .unwrap_or(LiabilityState::Unassigned)
    }

    /// Members currently nominated, oldest first.
    pub fn pending_asks(&self) -> Vec<UserId> {
        self.asked.iter().copied().collect()
    }

    /// Whether `candidate` was nominated.
    pub fn was_asked(&self, candidate: UserId) -> bool {
        self.asked.contains(&candidate)
    }

    /// Nominate `to` as the next holder on behalf of the current holder `from`.
    ///
    /// The nominee must be a member sitting in a playing slot.
    pub fn ask(&mut self, from: UserId, to: UserId) -> Result<Player, RosterError> {
        let from_index = self.require(&PlayerRef::Id(from))?;
        if !self.players[from_index].liable {
            return Err(RosterError::NotLiable(
                self.players[from_index].display_name(),
            ));
        }

        let to_index = self.require(&PlayerRef::Id(to))?;
        let target = &self.players[to_index];
        if to_index == from_index || self.is_waiting(to_index) {
            return Err(RosterError::TargetNotEligible(target.display_name()));
        }
        if self.asked.contains(&to) {
            return Err(RosterError::AlreadyAsked(target.display_name()));
        }

        let target = target.clone();
        self.asked.insert(to);
        self.touch();
        Ok(target)
    }

    /// Take over the liability after being nominated. Every other nomination is dropped.
    pub fn assume(&mut self, candidate: UserId) -> Result<LiabilityChange, RosterError> {
        if !self.asked.contains(&candidate) {
            let name = self
                .find(&PlayerRef::Id(candidate))
                .map(Player::display_name)
                .unwrap_or_else(|| format!("user {candidate}"));
            return Err(RosterError::NotAsked(name));
        }

        let to_index = self.require(&PlayerRef::Id(candidate))?;
        let from = self.players.iter().position(|player| player.liable);

        let previous = from.map(|index| {
            self.players[index].liable = false;
            self.players[index].clone()
        });
        self.players[to_index].liable = true;
        self.asked.clear();
        self.touch();

        Ok(LiabilityChange {
            from: previous,
            to: self.players[to_index].clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::roster::tests::{MONDAY_NOON, id, roster_with};

    fn holder(roster: &Roster) -> Option<UserId> {
        match roster.liability_state() {
            LiabilityState::Held(id) => Some(id),
            LiabilityState::Unassigned => None,
        }
    }

    #[test]
    fn assume_clears_every_pending_ask() {
        let mut roster = roster_with(5);
        roster.ask(UserId(1), UserId(3)).unwrap();
        roster.ask(UserId(1), UserId(4)).unwrap();

        let change = roster.assume(UserId(4)).unwrap();

        assert_eq!(change.from.and_then(|p| p.user_id()), Some(UserId(1)));
        assert_eq!(holder(&roster), Some(UserId(4)));
        assert!(roster.pending_asks().is_empty());
        assert!(matches!(
            roster.assume(UserId(3)),
            Err(RosterError::NotAsked(_))
        ));
        assert_eq!(roster.players().iter().filter(|p| p.liable).count(), 1);
    }

    #[test]
    fn only_the_holder_can_ask() {
        let mut roster = roster_with(4);
        assert!(matches!(
            roster.ask(UserId(2), UserId(3)),
            Err(RosterError::NotLiable(_))
        ));
    }

    #[test]
    fn asking_twice_is_rejected() {
        let mut roster = roster_with(4);
        roster.ask(UserId(1), UserId(2)).unwrap();
        assert!(matches!(
            roster.ask(UserId(1), UserId(2)),
            Err(RosterError::AlreadyAsked(_))
        ));
    }

    #[test]
    fn waiting_players_and_self_are_not_eligible() {
        let mut roster = roster_with(16);
        assert!(matches!(
            roster.ask(UserId(1), UserId(16)),
            Err(RosterError::TargetNotEligible(_))
        ));
        assert!(matches!(
            roster.ask(UserId(1), UserId(1)),
            Err(RosterError::TargetNotEligible(_))
        ));
        assert!(matches!(
            roster.ask(UserId(1), UserId(40)),
            Err(RosterError::PlayerNotFound(_))
        ));
    }

    #[test]
    fn leaving_withdraws_a_nomination() {
        let mut roster = roster_with(4);
        roster.ask(UserId(1), UserId(3)).unwrap();
        roster.remove(&id(3), MONDAY_NOON).unwrap();
        assert!(!roster.was_asked(UserId(3)));
    }

    #[test]
    fn admin_transfer_drops_stale_asks() {
        let mut roster = roster_with(4);
        roster.ask(UserId(1), UserId(3)).unwrap();
        roster.transfer_liability(UserId(1), UserId(2)).unwrap();
        assert!(roster.pending_asks().is_empty());
        assert_eq!(holder(&roster), Some(UserId(2)));
    }

    #[test]
    fn wipe_leaves_liability_unassigned() {
        let mut roster = roster_with(2);
        roster.clear_all();
        assert_eq!(roster.liability_state(), LiabilityState::Unassigned);
    }
}
