//! Authenticators.
//!
//! [`Authenticator`] is the seam between the orchestrating service and the
//! credential-checking implementations: [`RepositoryAuthenticator`] validates
//! against the credential store, [`ChainingAuthenticator`] composes an
//! ordered list of authenticators behind the same interface.

mod chaining;
mod repository;

pub use chaining::ChainingAuthenticator;
pub use repository::RepositoryAuthenticator;

use secrecy::SecretString;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::context::SecurityContext;
use crate::error::Result;

/// How `set_current_user` validates the username before establishing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationMode {
    /// Trust the caller; used for system and ticket-validated identities.
    None,
    /// Verify the user exists, without creating or repairing it.
    Check,
    /// Verify and, if absent, auto-provision via the directory-sync hook,
    /// resolving to the canonical stored username.
    CheckAndFix,
}

/// Process-wide success/failure totals. Diagnostic only; never consulted
/// for control flow.
#[derive(Debug, Default)]
pub struct AuthenticationCounters {
    successes: AtomicU64,
    failures: AtomicU64,
}

impl AuthenticationCounters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_authenticate(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_fail(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

pub trait Authenticator: Send + Sync {
    /// Validate the credentials and establish the user in `ctx`.
    fn authenticate(
        &self,
        ctx: &SecurityContext,
        username: &str,
        password: &SecretString,
    ) -> Result<()>;

    /// Establish `username` as the current user after validating it
    /// according to `mode`.
    fn set_current_user(
        &self,
        ctx: &SecurityContext,
        username: &str,
        mode: ValidationMode,
    ) -> Result<()>;

    fn guest_login_allowed(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::AuthenticationCounters;

    #[test]
    fn counters_accumulate_independently() {
        let counters = AuthenticationCounters::new();
        counters.on_authenticate();
        counters.on_authenticate();
        counters.on_fail();
        assert_eq!(counters.successes(), 2);
        assert_eq!(counters.failures(), 1);
    }
}
