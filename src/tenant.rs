//! Username ⇄ tenant-domain resolution.
//!
//! Qualified usernames carry their tenant domain after the last `@`
//! (`alice@acme.example`). With multi-tenancy disabled every username maps to
//! the default (empty) domain, so plain email-style usernames pass through
//! untouched.

/// Separator between the base username and the tenant domain.
pub const SEPARATOR: char = '@';

/// The reserved default tenant domain.
pub const DEFAULT_DOMAIN: &str = "";

#[derive(Clone, Debug)]
pub struct TenantResolver {
    enabled: bool,
}

impl TenantResolver {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Split a possibly-qualified username into `(base, domain)`.
    ///
    /// The domain is taken after the *last* separator so that email-style
    /// base names survive qualification. Domains are compared and stored
    /// lower-case.
    #[must_use]
    pub fn split_user_tenant(&self, qualified: &str) -> (String, String) {
        if !self.enabled {
            return (qualified.to_string(), DEFAULT_DOMAIN.to_string());
        }
        match qualified.rfind(SEPARATOR) {
            Some(idx) if idx > 0 && idx + 1 < qualified.len() => {
                let base = &qualified[..idx];
                let domain = qualified[idx + 1..].to_lowercase();
                (base.to_string(), domain)
            }
            _ => (qualified.to_string(), DEFAULT_DOMAIN.to_string()),
        }
    }

    /// Qualify a base username with a tenant domain.
    #[must_use]
    pub fn qualify(&self, base: &str, domain: &str) -> String {
        if !self.enabled || domain.is_empty() {
            return base.to_string();
        }
        format!("{base}{SEPARATOR}{}", domain.to_lowercase())
    }

    /// The tenant domain a username belongs to.
    #[must_use]
    pub fn user_domain(&self, username: &str) -> String {
        self.split_user_tenant(username).1
    }

    /// The tenant-stripped base name.
    #[must_use]
    pub fn base_name(&self, username: &str) -> String {
        self.split_user_tenant(username).0
    }

    #[must_use]
    pub fn is_default_domain(&self, domain: &str) -> bool {
        domain.is_empty()
    }
}
