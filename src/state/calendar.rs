//! Match days and the local times that drive promotion and the scheduler.

use time::{
    OffsetDateTime, Time, UtcOffset, Weekday,
    macros::{offset, time},
};

/// Weekly calendar of match days, expressed in the club's local offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventCalendar {
    event_days: Vec<Weekday>,
    offset: UtcOffset,
    approval_deadline: Time,
    cleanup: Time,
}

impl Default for EventCalendar {
    fn default() -> Self {
        Self {
            event_days: vec![Weekday::Sunday, Weekday::Wednesday],
            offset: offset!(+2),
            approval_deadline: time!(16:00),
            cleanup: time!(23:00),
        }
    }
}

impl EventCalendar {
    /// Build a calendar from explicit settings.
    pub fn new(
        event_days: Vec<Weekday>,
        offset: UtcOffset,
        approval_deadline: Time,
        cleanup: Time,
    ) -> Self {
        Self {
            event_days,
            offset,
            approval_deadline,
            cleanup,
        }
    }

    /// Days of the week on which a match takes place.
    pub fn event_days(&self) -> &[Weekday] {
        &self.event_days
    }

    /// Offset all wall-clock checkpoints are expressed in.
    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    /// Time of day after which unconfirmed players lose priority.
    pub fn approval_deadline(&self) -> Time {
        self.approval_deadline
    }

    /// Time of day at which the list is wiped on match days.
    pub fn cleanup(&self) -> Time {
        self.cleanup
    }

    /// Convert an instant into the calendar's local offset.
    pub fn local(&self, now: OffsetDateTime) -> OffsetDateTime {
        now.to_offset(self.offset)
    }

    /// Whether `now` falls on a match day (local time).
    pub fn is_event_day(&self, now: OffsetDateTime) -> bool {
        self.event_days.contains(&self.local(now).weekday())
    }

    /// Whether `now` lies between the approval deadline and the cleanup on a match day.
    pub fn is_post_deadline(&self, now: OffsetDateTime) -> bool {
        let local = self.local(now);
        let at = local.time();
        self.event_days.contains(&local.weekday())
            && at >= self.approval_deadline
            && at < self.cleanup
    }
}

/// Parse an English weekday name (`"sunday"`, `"Sun"`).
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    let lowered = name.trim().to_ascii_lowercase();
    let day = match lowered.get(..3)? {
        "mon" => Weekday::Monday,
        "tue" => Weekday::Tuesday,
        "wed" => Weekday::Wednesday,
        "thu" => Weekday::Thursday,
        "fri" => Weekday::Friday,
        "sat" => Weekday::Saturday,
        "sun" => Weekday::Sunday,
        _ => return None,
    };
    Some(day)
}
