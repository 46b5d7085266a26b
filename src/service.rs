//! Authentication service orchestration.
//!
//! The service runs the full login pipeline: admission checks, the
//! brute-force gate, delegation to the authenticator, then ticket issuance
//! and failure bookkeeping. Any failure clears the security context before it
//! is surfaced, so a failed attempt never leaves a stale identity behind, and
//! a brute-force block is indistinguishable from a bad password.

use secrecy::SecretString;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::admission::{AdmissionPolicy, StaticAdmissionPolicy};
use crate::authenticator::{
    AuthenticationCounters, Authenticator, RepositoryAuthenticator, ValidationMode,
};
use crate::config::AuthConfig;
use crate::context::{mask_username, SecurityContext};
use crate::credentials::CredentialStore;
use crate::encoding::CompositePasswordEncoder;
use crate::error::{AuthError, Result};
use crate::protector::BruteForceProtector;
use crate::store::NodeStore;
use crate::sync::DirectorySync;
use crate::tenant::TenantResolver;
use crate::ticket::{InMemoryTicketComponent, TicketComponent};

/// Pre-validation tenant-domain hint. The default (no hint) parses the
/// domain out of the username instead.
pub trait TenantDomainHint: Send + Sync {
    fn domain_for(&self, username: &str) -> Option<String>;
}

pub struct AuthenticationService {
    authenticator: Arc<dyn Authenticator>,
    tickets: Arc<dyn TicketComponent>,
    protector: Arc<BruteForceProtector>,
    admission: Arc<dyn AdmissionPolicy>,
    counters: Arc<AuthenticationCounters>,
    tenant_hint: Option<Arc<dyn TenantDomainHint>>,
    admin_user_names: Vec<String>,
    guest_user_names: Vec<String>,
    users_case_sensitive: bool,
}

impl AuthenticationService {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        tickets: Arc<dyn TicketComponent>,
        protector: Arc<BruteForceProtector>,
        admission: Arc<dyn AdmissionPolicy>,
        counters: Arc<AuthenticationCounters>,
        admin_user_names: Vec<String>,
        guest_user_names: Vec<String>,
        users_case_sensitive: bool,
    ) -> Self {
        Self {
            authenticator,
            tickets,
            protector,
            admission,
            counters,
            tenant_hint: None,
            admin_user_names,
            guest_user_names,
            users_case_sensitive,
        }
    }

    #[must_use]
    pub fn with_tenant_domain_hint(mut self, hint: Arc<dyn TenantDomainHint>) -> Self {
        self.tenant_hint = Some(hint);
        self
    }

    /// Full credential login: admission checks, the brute-force gate, the
    /// authenticator, then ticket issuance. The original error is surfaced
    /// verbatim on failure, after the context is cleared and the failure
    /// recorded.
    pub fn authenticate(
        &self,
        ctx: &SecurityContext,
        username: &str,
        password: &SecretString,
    ) -> Result<()> {
        let domain_hint = self
            .tenant_hint
            .as_ref()
            .and_then(|hint| hint.domain_for(username));
        // Pooled threads may carry a context from a previous tenant.
        ctx.clear();

        let attempt = (|| {
            self.pre_authentication_check(username)?;
            if self.protector.is_protected(username) {
                // Must be indistinguishable from a bad password; nothing may
                // leak the protection state to an attacker.
                debug!(
                    "rejecting login for brute-force protected user {}",
                    mask_username(username)
                );
                return Err(AuthError::authentication());
            }
            self.authenticator.authenticate(ctx, username, password)
        })();

        match attempt {
            Ok(()) => {
                if let (Some(domain), Some(auth)) = (domain_hint, ctx.authentication()) {
                    ctx.set_authentication(auth.with_tenant_domain(domain));
                }
                self.protector.record_success(username);
                let user = ctx
                    .current_user_name()
                    .unwrap_or_else(|| username.to_string());
                ctx.clear_current_ticket();
                let ticket = self.issue_ticket(&user)?;
                ctx.set_current_ticket(ticket);
                Ok(())
            }
            Err(err) => {
                ctx.clear();
                self.protector.record_failure(username);
                Err(err)
            }
        }
    }

    /// Establish the user a ticket resolves to. Possession of a live ticket
    /// is itself proof of prior validation, so no further checks run.
    pub fn validate(&self, ctx: &SecurityContext, ticket: &str) -> Result<()> {
        ctx.clear();
        let attempt = (|| {
            let username = self.tickets.validate(ticket)?;
            self.authenticator
                .set_current_user(ctx, &username, ValidationMode::None)?;
            ctx.set_current_ticket(ticket);
            Ok(())
        })();
        attempt.map_err(|err| {
            ctx.clear();
            match err {
                err @ AuthError::InvalidTicket => AuthError::authentication_caused_by(err),
                err => err,
            }
        })
    }

    /// The ticket bound to the current user, minting one only when none
    /// exists; the admission checks are skipped on the already-ticketed hot
    /// path.
    pub fn current_ticket(&self, ctx: &SecurityContext) -> Result<String> {
        let user = ctx
            .current_user_name()
            .ok_or_else(AuthError::authentication)?;
        if let Some(ticket) = ctx.current_ticket() {
            return Ok(ticket);
        }
        if let Some(ticket) = self.tickets.current_ticket(&user, false)? {
            ctx.set_current_ticket(ticket.clone());
            return Ok(ticket);
        }
        self.pre_authentication_check(&user)?;
        let ticket = self.issue_ticket(&user)?;
        ctx.set_current_ticket(ticket.clone());
        Ok(ticket)
    }

    /// Mint a ticket for the current user, re-running admission checks.
    pub fn new_ticket(&self, ctx: &SecurityContext) -> Result<String> {
        let user = ctx
            .current_user_name()
            .ok_or_else(AuthError::authentication)?;
        self.pre_authentication_check(&user)?;
        let ticket = self.issue_ticket(&user)?;
        ctx.set_current_ticket(ticket.clone());
        Ok(ticket)
    }

    pub fn invalidate_ticket(&self, ticket: &str) {
        self.tickets.invalidate_by_id(ticket);
    }

    /// Invalidate every session of `username`; returns how many tickets died.
    pub fn invalidate_user_session(&self, username: &str) -> usize {
        self.tickets.invalidate_by_user(username)
    }

    pub fn set_current_user(
        &self,
        ctx: &SecurityContext,
        username: &str,
        mode: ValidationMode,
    ) -> Result<()> {
        self.authenticator.set_current_user(ctx, username, mode)
    }

    #[must_use]
    pub fn current_user_name(&self, ctx: &SecurityContext) -> Option<String> {
        ctx.current_user_name()
    }

    pub fn clear_current_security_context(&self, ctx: &SecurityContext) {
        ctx.clear();
    }

    /// Guest login: admission-checked, credential-free, ticketed.
    pub fn authenticate_as_guest(&self, ctx: &SecurityContext) -> Result<()> {
        ctx.clear();
        let guest = self
            .guest_user_names
            .first()
            .cloned()
            .ok_or_else(|| AuthError::Config("no guest user name configured".to_string()))?;
        let attempt = (|| {
            self.pre_authentication_check(&guest)?;
            self.authenticator
                .authenticate(ctx, &guest, &SecretString::from(String::new()))?;
            ctx.clear_current_ticket();
            let ticket = self.issue_ticket(&guest)?;
            ctx.set_current_ticket(ticket);
            Ok(())
        })();
        if attempt.is_err() {
            ctx.clear();
        }
        attempt
    }

    #[must_use]
    pub fn guest_user_authentication_allowed(&self) -> bool {
        self.authenticator.guest_login_allowed()
    }

    #[must_use]
    pub fn get_users_with_tickets(&self, non_expired_only: bool) -> HashSet<String> {
        self.tickets.users_with_tickets(non_expired_only)
    }

    #[must_use]
    pub fn count_tickets(&self, non_expired_only: bool) -> usize {
        self.tickets.count_tickets(non_expired_only)
    }

    /// Administrative sweep; returns how many tickets were invalidated.
    #[must_use]
    pub fn invalidate_tickets(&self, expired_only: bool) -> usize {
        self.tickets.invalidate_all(expired_only)
    }

    #[must_use]
    pub fn get_default_administrator_user_names(&self) -> &[String] {
        &self.admin_user_names
    }

    #[must_use]
    pub fn get_default_guest_user_names(&self) -> &[String] {
        &self.guest_user_names
    }

    #[must_use]
    pub fn counters(&self) -> &AuthenticationCounters {
        &self.counters
    }

    fn issue_ticket(&self, username: &str) -> Result<String> {
        match self.tickets.current_ticket(username, true)? {
            Some(ticket) => Ok(ticket),
            None => self.tickets.issue(username),
        }
    }

    /// Allow-list membership and the licensed-user ceiling. The ceiling scan
    /// is potentially expensive and only runs when a ceiling is configured.
    fn pre_authentication_check(&self, username: &str) -> Result<()> {
        if let Some(allowed) = self.admission.allowed_user_list() {
            let permitted = allowed.iter().any(|name| self.names_equal(name, username));
            if !permitted {
                return Err(AuthError::Disallowed);
            }
        }
        if let Some(max_users) = self.admission.max_concurrent_users() {
            let holders = self.tickets.users_with_tickets(true);
            let already_holds = holders.iter().any(|name| self.names_equal(name, username));
            if !already_holds && holders.len() >= max_users {
                return Err(AuthError::MaxUsers);
            }
        }
        Ok(())
    }

    fn names_equal(&self, left: &str, right: &str) -> bool {
        if self.users_case_sensitive {
            left == right
        } else {
            left.eq_ignore_ascii_case(right)
        }
    }
}

/// Fully wired subsystem over a node store and a directory-sync hook.
///
/// Convenience for embedded deployments and tests; the parts stay
/// individually reachable for callers that need them.
pub struct AuthenticationSubsystem {
    pub service: Arc<AuthenticationService>,
    pub credentials: Arc<CredentialStore>,
    pub encoders: Arc<CompositePasswordEncoder>,
    pub repository_authenticator: Arc<RepositoryAuthenticator>,
    pub tickets: Arc<dyn TicketComponent>,
    pub protector: Arc<BruteForceProtector>,
    pub counters: Arc<AuthenticationCounters>,
}

impl AuthenticationSubsystem {
    /// Wire every component from one configuration.
    ///
    /// # Errors
    /// `Config` when the preferred encoding is not registered.
    pub fn bootstrap(
        config: &AuthConfig,
        store: Arc<dyn NodeStore>,
        directory_sync: Arc<dyn DirectorySync>,
    ) -> Result<Self> {
        let tenants = Arc::new(TenantResolver::new(config.tenant_separation_enabled()));
        let encoders = Arc::new(CompositePasswordEncoder::with_default_encoders(
            config.preferred_encoding(),
        )?);
        let credentials = Arc::new(CredentialStore::new(
            store,
            Arc::clone(&encoders),
            Arc::clone(&tenants),
            config.admin_user_names().to_vec(),
            config.users_case_sensitive(),
        ));
        let counters = Arc::new(AuthenticationCounters::new());
        let repository_authenticator = Arc::new(RepositoryAuthenticator::new(
            Arc::clone(&credentials),
            Arc::clone(&encoders),
            Arc::clone(&tenants),
            directory_sync,
            Arc::clone(&counters),
            config.guest_login_allowed(),
            config.guest_user_names().to_vec(),
            config.system_user_name(),
        ));
        let tickets: Arc<dyn TicketComponent> =
            Arc::new(InMemoryTicketComponent::from_config(config));
        let protector = Arc::new(BruteForceProtector::from_config(config));
        let admission = Arc::new(StaticAdmissionPolicy::new(
            config.allowed_users().map(<[String]>::to_vec),
            config.max_users(),
        ));
        let service = Arc::new(AuthenticationService::new(
            Arc::clone(&repository_authenticator) as Arc<dyn Authenticator>,
            Arc::clone(&tickets),
            Arc::clone(&protector),
            admission,
            Arc::clone(&counters),
            config.admin_user_names().to_vec(),
            config.guest_user_names().to_vec(),
            config.users_case_sensitive(),
        ));
        Ok(Self {
            service,
            credentials,
            encoders,
            repository_authenticator,
            tickets,
            protector,
            counters,
        })
    }
}
