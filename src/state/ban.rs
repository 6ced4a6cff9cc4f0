//! Temporary bans. A banned member cannot join the list or take an invited slot until the ban
//! runs out; entries already on the list stay where they are.

use time::{Duration, OffsetDateTime};

use crate::state::{
    player::{Identity, UserId},
    roster::{Roster, RosterError},
};

/// A member barred from joining until `until`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ban {
    /// The banned member.
    pub user_id: UserId,
    /// End of the ban.
    pub until: OffsetDateTime,
}

impl Ban {
    /// Whether the ban still applies at `now`.
    pub fn is_active(&self, now: OffsetDateTime) -> bool {
        now < self.until
    }
}

impl Roster {
    /// Recorded bans, oldest first. Expired ones linger until the next purge.
    pub fn bans(&self) -> impl Iterator<Item = &Ban> {
        self.bans.values()
    }

    /// The ban of `user` in force at `now`, if any.
    pub fn active_ban(&self, user: UserId, now: OffsetDateTime) -> Option<&Ban> {
        self.bans.get(&user).filter(|ban| ban.is_active(now))
    }

    /// Bar `user` from joining for `duration`, replacing any previous ban.
    pub fn ban(
        &mut self,
        user: UserId,
        duration: Duration,
        now: OffsetDateTime,
    ) -> Result<Ban, RosterError> {
        if !duration.is_positive() {
            return Err(RosterError::InvalidBan(format!(
                "duration must be positive (got {duration})"
            )));
        }

        let ban = Ban {
            user_id: user,
            until: now + duration,
        };
        self.bans.insert(user, ban);
        self.touch();
        Ok(ban)
    }

    /// Lift the ban of `user`.
    pub fn unban(&mut self, user: UserId) -> Result<Ban, RosterError> {
        let ban = self
            .bans
            .shift_remove(&user)
            .ok_or_else(|| RosterError::NotBanned(user.to_string()))?;
        self.touch();
        Ok(ban)
    }

    /// Forget bans that ran out. Returns how many were dropped.
    pub fn purge_expired_bans(&mut self, now: OffsetDateTime) -> usize {
        let before = self.bans.len();
        self.bans.retain(|_, ban| ban.is_active(now));
        let purged = before - self.bans.len();
        if purged > 0 {
            self.touch();
        }
        purged
    }

    /// Refuse `identity` while a ban is in force.
    pub fn ensure_not_banned(
        &self,
        identity: &Identity,
        now: OffsetDateTime,
    ) -> Result<(), RosterError> {
        match self.active_ban(identity.id, now) {
            Some(ban) => Err(RosterError::Banned {
                name: identity.full_name(),
                until: ban.until,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::roster::tests::{MONDAY_NOON, member, roster_with};

    #[test]
    fn banned_member_is_refused_until_the_ban_ends() {
        let mut roster = roster_with(2);
        let ban = roster
            .ban(UserId(5), Duration::days(7), MONDAY_NOON)
            .unwrap();
        assert_eq!(ban.until, MONDAY_NOON + Duration::days(7));

        assert!(matches!(
            roster.ensure_not_banned(&member(5), MONDAY_NOON),
            Err(RosterError::Banned { .. })
        ));
        assert!(roster.ensure_not_banned(&member(6), MONDAY_NOON).is_ok());
        assert!(
            roster
                .ensure_not_banned(&member(5), MONDAY_NOON + Duration::days(7))
                .is_ok()
        );
    }

    #[test]
    fn rebanning_replaces_the_previous_ban() {
        let mut roster = Roster::default();
        roster.ban(UserId(5), Duration::days(7), MONDAY_NOON).unwrap();
        roster.ban(UserId(5), Duration::days(1), MONDAY_NOON).unwrap();

        assert_eq!(roster.bans().count(), 1);
        assert_eq!(
            roster.active_ban(UserId(5), MONDAY_NOON).map(|ban| ban.until),
            Some(MONDAY_NOON + Duration::days(1))
        );
    }

    #[test]
    fn non_positive_durations_are_rejected() {
        let mut roster = Roster::default();
        assert!(matches!(
            roster.ban(UserId(5), Duration::ZERO, MONDAY_NOON),
            Err(RosterError::InvalidBan(_))
        ));
        assert_eq!(roster.revision(), 0);
    }

    #[test]
    fn unban_requires_a_recorded_ban() {
        let mut roster = Roster::default();
        assert!(matches!(
            roster.unban(UserId(5)),
            Err(RosterError::NotBanned(_))
        ));

        roster.ban(UserId(5), Duration::days(3), MONDAY_NOON).unwrap();
        roster.unban(UserId(5)).unwrap();
        assert!(roster.active_ban(UserId(5), MONDAY_NOON).is_none());
    }

    #[test]
    fn bans_outlive_the_list_but_not_their_end() {
        let mut roster = roster_with(3);
        roster.ban(UserId(8), Duration::days(1), MONDAY_NOON).unwrap();
        roster.ban(UserId(9), Duration::days(10), MONDAY_NOON).unwrap();

        roster.clear_all();
        assert_eq!(roster.bans().count(), 2);

        let purged = roster.purge_expired_bans(MONDAY_NOON + Duration::days(2));
        assert_eq!(purged, 1);
        let left: Vec<UserId> = roster.bans().map(|ban| ban.user_id).collect();
        assert_eq!(left, vec![UserId(9)]);
    }
}
