//! Explicit security context for the current logical request.
//!
//! There is no ambient thread-local "current user": callers create a
//! [`SecurityContext`] per request and pass it by reference through every
//! entry point. The context carries the established authentication, the
//! published tenant domain, and the session ticket bound to this request.

use parking_lot::RwLock;

/// An established identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Authentication {
    user_name: String,
    tenant_domain: String,
    system: bool,
    guest: bool,
}

impl Authentication {
    #[must_use]
    pub fn user(user_name: impl Into<String>, tenant_domain: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            tenant_domain: tenant_domain.into(),
            system: false,
            guest: false,
        }
    }

    #[must_use]
    pub fn system(user_name: impl Into<String>, tenant_domain: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            tenant_domain: tenant_domain.into(),
            system: true,
            guest: false,
        }
    }

    #[must_use]
    pub fn guest(user_name: impl Into<String>, tenant_domain: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            tenant_domain: tenant_domain.into(),
            system: false,
            guest: true,
        }
    }

    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    #[must_use]
    pub fn tenant_domain(&self) -> &str {
        &self.tenant_domain
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        self.system
    }

    #[must_use]
    pub fn is_guest(&self) -> bool {
        self.guest
    }

    /// The same identity published under a different tenant domain.
    #[must_use]
    pub fn with_tenant_domain(mut self, tenant_domain: impl Into<String>) -> Self {
        self.tenant_domain = tenant_domain.into();
        self
    }
}

/// Request-scoped holder for the current authentication and ticket.
///
/// Safe to share across threads; the service clears it on every failed
/// attempt so a failure never leaves a stale identity behind.
#[derive(Debug, Default)]
pub struct SecurityContext {
    authentication: RwLock<Option<Authentication>>,
    ticket: RwLock<Option<String>>,
}

impl SecurityContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_authentication(&self, authentication: Authentication) {
        *self.authentication.write() = Some(authentication);
    }

    #[must_use]
    pub fn authentication(&self) -> Option<Authentication> {
        self.authentication.read().clone()
    }

    #[must_use]
    pub fn current_user_name(&self) -> Option<String> {
        self.authentication
            .read()
            .as_ref()
            .map(|auth| auth.user_name().to_string())
    }

    #[must_use]
    pub fn tenant_domain(&self) -> Option<String> {
        self.authentication
            .read()
            .as_ref()
            .map(|auth| auth.tenant_domain().to_string())
    }

    pub fn set_current_ticket(&self, ticket: impl Into<String>) {
        *self.ticket.write() = Some(ticket.into());
    }

    #[must_use]
    pub fn current_ticket(&self) -> Option<String> {
        self.ticket.read().clone()
    }

    pub fn clear_current_ticket(&self) {
        *self.ticket.write() = None;
    }

    /// Drop both the authentication and the bound ticket.
    pub fn clear(&self) {
        *self.authentication.write() = None;
        *self.ticket.write() = None;
    }
}

/// Run `work` with a scratch context holding the system identity of the given
/// tenant. Used for existence/fix checks that must not run as the caller.
pub fn run_as_system<R>(
    system_user_name: &str,
    tenant_domain: &str,
    work: impl FnOnce(&SecurityContext) -> R,
) -> R {
    let scratch = SecurityContext::new();
    scratch.set_authentication(Authentication::system(system_user_name, tenant_domain));
    work(&scratch)
}

/// Mask a username for log output. Only the first two characters survive.
#[must_use]
pub fn mask_username(user_name: &str) -> String {
    if user_name.chars().count() > 2 {
        let prefix: String = user_name.chars().take(2).collect();
        format!("{prefix}******")
    } else {
        "******".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{mask_username, run_as_system, Authentication, SecurityContext};

    #[test]
    fn context_starts_empty() {
        let ctx = SecurityContext::new();
        assert!(ctx.authentication().is_none());
        assert!(ctx.current_user_name().is_none());
        assert!(ctx.current_ticket().is_none());
    }

    #[test]
    fn set_and_clear_round_trip() {
        let ctx = SecurityContext::new();
        ctx.set_authentication(Authentication::user("alice", "acme"));
        ctx.set_current_ticket("TICKET_x");
        assert_eq!(ctx.current_user_name().as_deref(), Some("alice"));
        assert_eq!(ctx.tenant_domain().as_deref(), Some("acme"));
        assert_eq!(ctx.current_ticket().as_deref(), Some("TICKET_x"));

        ctx.clear();
        assert!(ctx.authentication().is_none());
        assert!(ctx.current_ticket().is_none());
    }

    #[test]
    fn system_and_guest_flags() {
        let system = Authentication::system("System", "");
        assert!(system.is_system());
        assert!(!system.is_guest());

        let guest = Authentication::guest("guest", "acme");
        assert!(guest.is_guest());
        assert!(!guest.is_system());
    }

    #[test]
    fn run_as_system_uses_a_scratch_context() {
        let seen = run_as_system("System", "acme", |scratch| {
            let auth = scratch.authentication().expect("system auth");
            assert!(auth.is_system());
            auth.tenant_domain().to_string()
        });
        assert_eq!(seen, "acme");
    }

    #[test]
    fn mask_username_keeps_two_chars_at_most() {
        assert_eq!(mask_username("andy"), "an******");
        assert_eq!(mask_username("al"), "******");
        assert_eq!(mask_username(""), "******");
    }
}
