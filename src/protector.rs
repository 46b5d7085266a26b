//! Brute-force login protection.
//!
//! Tracks consecutive failed logins per user within this service instance
//! and blocks further attempts once the configured limit is reached inside
//! the protection window. The window is evaluated lazily at query time; no
//! background sweep. Keys embed a per-process instance id, so protection
//! state is never shared across service instances; this is not a
//! cluster-wide rate limiter.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::warn;
use ulid::Ulid;

use crate::config::AuthConfig;
use crate::context::mask_username;

const KEY_SEPARATOR: &str = "@@";

/// Failure bookkeeping for one user. Replaced wholesale on every failure;
/// concurrent bursts may undercount, and a stale "protected" state never
/// outlives the window.
#[derive(Clone, Debug)]
pub struct ProtectedUser {
    user_id: String,
    num_failed_logins: u64,
    last_failure: Instant,
}

impl ProtectedUser {
    fn first_failure(user_id: String) -> Self {
        Self {
            user_id,
            num_failed_logins: 1,
            last_failure: Instant::now(),
        }
    }

    fn next_failure(&self) -> Self {
        Self {
            user_id: self.user_id.clone(),
            num_failed_logins: self.num_failed_logins + 1,
            last_failure: Instant::now(),
        }
    }

    #[must_use]
    pub fn num_failed_logins(&self) -> u64 {
        self.num_failed_logins
    }
}

pub struct BruteForceProtector {
    enabled: bool,
    limit: u64,
    period: Duration,
    users_case_sensitive: bool,
    instance_id: String,
    protected: DashMap<String, ProtectedUser>,
}

impl BruteForceProtector {
    #[must_use]
    pub fn new(enabled: bool, limit: u32, period: Duration, users_case_sensitive: bool) -> Self {
        Self {
            enabled,
            limit: u64::from(limit.max(1)),
            period,
            users_case_sensitive,
            instance_id: Ulid::new().to_string(),
            protected: DashMap::new(),
        }
    }

    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.protection_enabled(),
            config.protection_limit(),
            Duration::from_secs(config.protection_period_seconds()),
            config.users_case_sensitive(),
        )
    }

    /// True iff the user reached the failure limit within the protection
    /// window. Once the window elapses the user is implicitly un-protected;
    /// no reset call is needed.
    #[must_use]
    pub fn is_protected(&self, username: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(entry) = self.protected.get(&self.key(username)) else {
            return false;
        };
        entry.num_failed_logins >= self.limit && entry.last_failure.elapsed() < self.period
    }

    /// Count a failed attempt, refreshing the window.
    pub fn record_failure(&self, username: &str) {
        if !self.enabled {
            return;
        }
        let key = self.key(username);
        let next = match self.protected.get(&key) {
            Some(entry) => entry.next_failure(),
            None => ProtectedUser::first_failure(key.clone()),
        };
        if next.num_failed_logins == self.limit {
            warn!(
                "brute force attack detected for user {}: further logins blocked for {}s",
                mask_username(username),
                self.period.as_secs()
            );
        }
        self.protected.insert(key, next);
    }

    /// A successful authentication wipes the counter entirely.
    pub fn record_success(&self, username: &str) {
        self.protected.remove(&self.key(username));
    }

    #[must_use]
    pub fn failed_logins(&self, username: &str) -> u64 {
        self.protected
            .get(&self.key(username))
            .map(|entry| entry.num_failed_logins)
            .unwrap_or(0)
    }

    fn key(&self, username: &str) -> String {
        let normalized = if self.users_case_sensitive {
            username.to_string()
        } else {
            username.to_lowercase()
        };
        format!("{}{KEY_SEPARATOR}{normalized}", self.instance_id)
    }
}
