//! Notifications and the hub that fans them out.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::state::player::UserId;

/// Recipient of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "user_id", rename_all = "snake_case")]
pub enum NotificationTarget {
    /// A single user, usually in private chat.
    User(UserId),
    /// The whole group.
    Broadcast,
}

/// What happened, so the notifier can pick its wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A new list was opened.
    ListCreated,
    /// Someone joined or was placed on the list.
    PlayerAdded,
    /// Someone left or was taken off the list.
    PlayerRemoved,
    /// A waiting entry moved into a playing slot.
    Promoted,
    /// Unconfirmed players were dropped.
    Pruned,
    /// Confirmation reminder.
    Reminder,
    /// Last confirmation reminder before the deadline.
    FinalReminder,
    /// The holder nominated someone for the liability.
    LiabilityRequested,
    /// The liability changed hands.
    LiabilityTransferred,
    /// A slot was reserved for a username.
    Invited,
    /// An invited user took the reserved slot.
    InvitationAccepted,
    /// A reserved slot was released unanswered.
    InvitationExpired,
    /// The list was wiped.
    ListCleared,
    /// A member was barred from joining.
    Banned,
    /// A ban was lifted.
    Unbanned,
}

impl NotificationKind {
    /// Event name used on the notification stream.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ListCreated => "list.created",
            NotificationKind::PlayerAdded => "player.added",
            NotificationKind::PlayerRemoved => "player.removed",
            NotificationKind::Promoted => "player.promoted",
            NotificationKind::Pruned => "player.pruned",
            NotificationKind::Reminder => "reminder",
            NotificationKind::FinalReminder => "reminder.final",
            NotificationKind::LiabilityRequested => "liability.requested",
            NotificationKind::LiabilityTransferred => "liability.transferred",
            NotificationKind::Invited => "invitation.created",
            NotificationKind::InvitationAccepted => "invitation.accepted",
            NotificationKind::InvitationExpired => "invitation.expired",
            NotificationKind::ListCleared => "list.cleared",
            NotificationKind::Banned => "player.banned",
            NotificationKind::Unbanned => "player.unbanned",
        }
    }
}

/// Side-effect descriptor consumed by the external notifier.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    /// Who should get it.
    pub target: NotificationTarget,
    /// What happened.
    pub kind: NotificationKind,
    /// Event-specific details.
    pub payload: serde_json::Value,
}

/// Fan-out hub for notifications; delivery is best effort.
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
}

impl NotificationHub {
    /// Hub backed by a broadcast channel of `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Send to all current subscribers, ignoring the absence of any.
    pub fn send(&self, notification: Notification) {
        let _ = self.sender.send(notification);
    }
}
