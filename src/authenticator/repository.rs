//! Authenticator backed by the repository credential store.

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::debug;

use crate::authenticator::{AuthenticationCounters, Authenticator, ValidationMode};
use crate::context::{mask_username, run_as_system, Authentication, SecurityContext};
use crate::credentials::{CredentialRecord, CredentialStore};
use crate::encoding::CompositePasswordEncoder;
use crate::error::{AuthError, Result};
use crate::sync::DirectorySync;
use crate::tenant::TenantResolver;

pub struct RepositoryAuthenticator {
    credentials: Arc<CredentialStore>,
    encoders: Arc<CompositePasswordEncoder>,
    tenants: Arc<TenantResolver>,
    directory_sync: Arc<dyn DirectorySync>,
    counters: Arc<AuthenticationCounters>,
    guest_login_allowed: bool,
    guest_user_names: Vec<String>,
    system_user_name: String,
}

impl RepositoryAuthenticator {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        credentials: Arc<CredentialStore>,
        encoders: Arc<CompositePasswordEncoder>,
        tenants: Arc<TenantResolver>,
        directory_sync: Arc<dyn DirectorySync>,
        counters: Arc<AuthenticationCounters>,
        guest_login_allowed: bool,
        guest_user_names: Vec<String>,
        system_user_name: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            encoders,
            tenants,
            directory_sync,
            counters,
            guest_login_allowed,
            guest_user_names,
            system_user_name: system_user_name.into(),
        }
    }

    /// Whether the tenant-stripped base name is a guest pseudo-user.
    #[must_use]
    pub fn is_guest_user_name(&self, username: &str) -> bool {
        let base = self.tenants.base_name(username);
        self.guest_user_names
            .iter()
            .any(|guest| guest.eq_ignore_ascii_case(&base))
    }

    /// Whether the tenant-stripped base name is the system pseudo-user.
    #[must_use]
    pub fn is_system_user_name(&self, username: &str) -> bool {
        let base = self.tenants.base_name(username);
        self.system_user_name.eq_ignore_ascii_case(&base)
    }

    /// Establish the system identity without any credential checks.
    pub fn set_system_user_as_current(&self, ctx: &SecurityContext) {
        ctx.set_authentication(Authentication::system(
            self.system_user_name.clone(),
            crate::tenant::DEFAULT_DOMAIN,
        ));
    }

    /// Establish the guest identity for the tenant the guest name resolves
    /// to, bypassing credential checks.
    pub fn set_guest_user_as_current(&self, ctx: &SecurityContext, username: &str) -> Result<()> {
        if !self.guest_login_allowed {
            debug!(
                "guest login rejected for {}: guest authentication is disabled",
                mask_username(username)
            );
            return Err(AuthError::authentication());
        }
        let (_, domain) = self.tenants.split_user_tenant(username);
        ctx.set_authentication(Authentication::guest(username, domain));
        Ok(())
    }

    /// Re-validate account flags exactly as the credential provider would,
    /// then establish the identity. Guards back-door paths (e.g. SSO) from
    /// granting access to an account disabled since its last login.
    pub fn set_user_details(&self, ctx: &SecurityContext, record: &CredentialRecord) -> Result<()> {
        self.check_account_flags(record)?;
        let (_, domain) = self.tenants.split_user_tenant(&record.user_name);
        ctx.set_authentication(Authentication::user(record.user_name.clone(), domain));
        Ok(())
    }

    fn authenticate_impl(
        &self,
        ctx: &SecurityContext,
        username: &str,
        password: &SecretString,
    ) -> Result<()> {
        if password.expose_secret().is_empty() {
            return Err(AuthError::InvalidArgument("raw password is mandatory"));
        }

        let Some(record) = self.credentials.lookup(username)? else {
            debug!("authentication failed: {} not found", mask_username(username));
            return Err(AuthError::authentication());
        };
        self.check_account_flags(&record)?;

        let matches = self.encoders.matches(
            &record.hash_chain,
            password,
            &record.password_hash,
            record.salt.as_deref(),
        )?;
        if !matches {
            debug!(
                "authentication failed: wrong password for {}",
                mask_username(username)
            );
            return Err(AuthError::authentication());
        }

        // Transparent upgrade: anything but the plain preferred chain is
        // re-encoded now that the raw password is in hand.
        if record.hash_chain != self.encoders.preferred_chain() {
            self.credentials.upgrade_hash(&record.user_name, password)?;
        }

        // Establish the canonical stored casing, not the probe string.
        self.set_current_user(ctx, &record.user_name, ValidationMode::None)
    }

    fn check_account_flags(&self, record: &CredentialRecord) -> Result<()> {
        let masked = mask_username(&record.user_name);
        if !record.enabled {
            debug!("authentication failed: {masked} is disabled");
            return Err(AuthError::authentication());
        }
        if record.locked {
            debug!("authentication failed: {masked} is locked");
            return Err(AuthError::authentication());
        }
        if record.account_has_expired {
            debug!("authentication failed: account of {masked} has expired");
            return Err(AuthError::authentication());
        }
        if record.credentials_have_expired(Utc::now()) {
            debug!("authentication failed: credentials of {masked} have expired");
            return Err(AuthError::authentication());
        }
        Ok(())
    }
}

impl Authenticator for RepositoryAuthenticator {
    fn authenticate(
        &self,
        ctx: &SecurityContext,
        username: &str,
        password: &SecretString,
    ) -> Result<()> {
        if username.is_empty() {
            return Err(AuthError::InvalidArgument("username is mandatory"));
        }
        if self.is_guest_user_name(username) {
            // Guest bypasses credential checking entirely.
            return match self.set_guest_user_as_current(ctx, username) {
                Ok(()) => {
                    self.counters.on_authenticate();
                    Ok(())
                }
                Err(err) => {
                    self.counters.on_fail();
                    Err(err)
                }
            };
        }
        match self.authenticate_impl(ctx, username, password) {
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
        if username.is_empty() {
            return Err(AuthError::InvalidArgument("username is mandatory"));
        }
        if self.is_system_user_name(username) {
            // The system user always succeeds and is exempt from every
            // account check.
            self.set_system_user_as_current(ctx);
            return Ok(());
        }

        let (_, domain) = self.tenants.split_user_tenant(username);
        match mode {
            ValidationMode::None => {
                ctx.set_authentication(Authentication::user(username, domain));
                Ok(())
            }
            ValidationMode::Check => {
                let exists = run_as_system(&self.system_user_name, &domain, |_system_ctx| {
                    self.credentials.user_exists(username)
                })?;
                if !exists {
                    return Err(AuthError::authentication_caused_by(AuthError::NotFound(
                        mask_username(username),
                    )));
                }
                // Existence verified, but the caller's spelling is kept.
                ctx.set_authentication(Authentication::user(username, domain));
                Ok(())
            }
            ValidationMode::CheckAndFix => {
                let canonical = run_as_system(&self.system_user_name, &domain, |_system_ctx| {
                    if let Some(record) = self.credentials.lookup(username)? {
                        return Ok(Some(record.user_name));
                    }
                    if self.directory_sync.create_missing_person(username) {
                        debug!(
                            "provisioned missing person for {}",
                            mask_username(username)
                        );
                        return Ok(self
                            .credentials
                            .lookup(username)?
                            .map(|record| record.user_name));
                    }
                    Ok(None)
                })?;
                match canonical {
                    // Canonical stored casing wins over the caller's spelling.
                    Some(canonical) => {
                        ctx.set_authentication(Authentication::user(canonical, domain));
                        Ok(())
                    }
                    None => Err(AuthError::authentication_caused_by(AuthError::NotFound(
                        mask_username(username),
                    ))),
                }
            }
        }
    }

    fn guest_login_allowed(&self) -> bool {
        self.guest_login_allowed
    }
}
