//! Composition of authenticators in priority order.

use secrecy::SecretString;
use std::sync::Arc;
use tracing::debug;

use crate::authenticator::{AuthenticationCounters, Authenticator, ValidationMode};
use crate::context::SecurityContext;
use crate::error::{AuthError, Result};

/// Tries an ordered list of authenticators and succeeds on the first that
/// does. Per-step authentication failures are inspected, not propagated; the
/// last one is carried forward as the source of the single generic failure
/// surfaced when every step fails.
pub struct ChainingAuthenticator {
    authenticators: Vec<Arc<dyn Authenticator>>,
    counters: Arc<AuthenticationCounters>,
}

impl ChainingAuthenticator {
    #[must_use]
    pub fn new(
        authenticators: Vec<Arc<dyn Authenticator>>,
        counters: Arc<AuthenticationCounters>,
    ) -> Self {
        Self {
            authenticators,
            counters,
        }
    }

    fn try_each(
        &self,
        mut attempt: impl FnMut(&Arc<dyn Authenticator>) -> Result<()>,
    ) -> Result<()> {
        let mut last_failure = None;
        for (position, authenticator) in self.authenticators.iter().enumerate() {
            match attempt(authenticator) {
                Ok(()) => return Ok(()),
                // Only authentication failures mean "try the next one";
                // anything else (bad input, storage trouble) surfaces as-is.
                Err(err @ AuthError::Authentication { .. }) => {
                    debug!(position, "authenticator rejected the request");
                    last_failure = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(match last_failure {
            Some(cause) => AuthError::authentication_caused_by(cause),
            None => AuthError::authentication(),
        })
    }
}

impl Authenticator for ChainingAuthenticator {
    fn authenticate(
        &self,
        ctx: &SecurityContext,
        username: &str,
        password: &SecretString,
    ) -> Result<()> {
        match self.try_each(|authenticator| authenticator.authenticate(ctx, username, password)) {
            Ok(()) => {
                self.counters.on_authenticate();
                Ok(())
            }
            Err(err) => {
                self.counters.on_fail();
                Err(err)
            }
        }
    }

    fn set_current_user(
        &self,
        ctx: &SecurityContext,
        username: &str,
        mode: ValidationMode,
    ) -> Result<()> {
        self.try_each(|authenticator| authenticator.set_current_user(ctx, username, mode))
    }

    /// Guest login is allowed if any chained authenticator allows it.
    fn guest_login_allowed(&self) -> bool {
        self.authenticators
            .iter()
            .any(|authenticator| authenticator.guest_login_allowed())
    }
}
