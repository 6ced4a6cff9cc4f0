//! Identity and capability lookups consulted before every command.

use std::collections::HashSet;

use futures::future::{self, BoxFuture};
use thiserror::Error;

use crate::{config::AppConfig, state::player::UserId};

/// The capability oracle could not answer.
#[derive(Debug, Error)]
#[error("capability lookup failed: {0}")]
pub struct CapabilityError(pub String);

/// Answers whether a caller may run member or admin commands.
///
/// A negative answer and an error are treated alike by the callers: the command is refused.
pub trait CapabilityProvider: Send + Sync {
    /// Whether `user` may run member commands.
    fn is_member(&self, user: UserId) -> BoxFuture<'static, Result<bool, CapabilityError>>;
    /// Whether `user` may run admin commands.
    fn is_admin(&self, user: UserId) -> BoxFuture<'static, Result<bool, CapabilityError>>;
}

/// Capabilities fixed at startup from the configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticCapabilities {
    admins: HashSet<UserId>,
    members: HashSet<UserId>,
}

impl StaticCapabilities {
    /// An empty `members` set lets everyone in; admins are always members.
    pub fn new(admins: HashSet<UserId>, members: HashSet<UserId>) -> Self {
        Self { admins, members }
    }

    /// Admins and members listed in `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.admins.clone(), config.members.clone())
    }
}

impl CapabilityProvider for StaticCapabilities {
    fn is_member(&self, user: UserId) -> BoxFuture<'static, Result<bool, CapabilityError>> {
        let allowed =
            self.members.is_empty() || self.members.contains(&user) || self.admins.contains(&user);
        Box::pin(future::ready(Ok(allowed)))
    }

    fn is_admin(&self, user: UserId) -> BoxFuture<'static, Result<bool, CapabilityError>> {
        Box::pin(future::ready(Ok(self.admins.contains(&user))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_member_list_admits_everyone() {
        let caps = StaticCapabilities::new(HashSet::from([UserId(1)]), HashSet::new());
        assert!(caps.is_member(UserId(99)).await.unwrap());
        assert!(caps.is_admin(UserId(1)).await.unwrap());
        assert!(!caps.is_admin(UserId(99)).await.unwrap());
    }

    #[tokio::test]
    async fn member_list_restricts_but_admins_pass() {
        let caps = StaticCapabilities::new(HashSet::from([UserId(1)]), HashSet::from([UserId(2)]));
        assert!(caps.is_member(UserId(1)).await.unwrap());
        assert!(caps.is_member(UserId(2)).await.unwrap());
        assert!(!caps.is_member(UserId(3)).await.unwrap());
    }
}
