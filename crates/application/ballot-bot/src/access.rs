//! Permission lookup
//!
//! The platform decides who counts as an administrator; the controller only
//! asks. Any `Fn(&UserId) -> bool` works as a policy.

use ballot_config::BotConfig;
use ballot_core::UserId;
use std::collections::HashSet;

/// Answers "is this user an administrator"
pub trait AccessPolicy: Send + Sync {
    fn is_admin(&self, user: &UserId) -> bool;
}

impl<F> AccessPolicy for F
where
    F: Fn(&UserId) -> bool + Send + Sync,
{
    fn is_admin(&self, user: &UserId) -> bool {
        self(user)
    }
}

/// Fixed set of administrator IDs
#[derive(Debug, Clone, Default)]
pub struct AdminList {
    admins: HashSet<UserId>,
}

impl AdminList {
    pub fn new<I, S>(admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            admins: admins.into_iter().map(UserId::new).collect(),
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(config.admins.iter().cloned())
    }

    pub fn len(&self) -> usize {
        self.admins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.admins.is_empty()
    }
}

impl AccessPolicy for AdminList {
    fn is_admin(&self, user: &UserId) -> bool {
        self.admins.contains(user)
    }
}

/// Nobody is an administrator
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl AccessPolicy for DenyAll {
    fn is_admin(&self, _user: &UserId) -> bool {
        false
    }
}
