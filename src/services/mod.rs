//! Application services between the routes and the roster worker.

/// Admin commands.
pub mod admin_service;
/// Member and admin capability lookups.
pub mod capability;
/// Health check service.
pub mod health_service;
/// Expiry timers of pending invitations.
pub mod invitation_timers;
/// Time-driven jobs and the startup restore.
pub mod maintenance_service;
/// Notification descriptors for the external notifier.
pub mod notification_events;
/// Snapshot writer.
pub mod persistence;
/// Member commands.
pub mod roster_service;
/// Match-day checkpoints.
pub mod scheduler;
/// Server-Sent Events stream of notifications.
pub mod sse_service;
/// Storage connection supervisor with backoff and degraded mode.
pub mod storage_supervisor;
