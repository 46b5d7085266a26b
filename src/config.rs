//! Subsystem configuration.
//!
//! Builder-style with sensible defaults; `from_env` overlays `GARDISTO_*`
//! environment variables on top of the defaults for deployments that
//! configure through the environment.

use crate::ticket::ExpiryMode;

const DEFAULT_PREFERRED_ENCODING: &str = "bcrypt10";
const DEFAULT_PROTECTION_LIMIT: u32 = 10;
const DEFAULT_PROTECTION_PERIOD_SECONDS: u64 = 6;
const DEFAULT_TICKET_VALID_SECONDS: u64 = 60 * 60;
const DEFAULT_SYSTEM_USER_NAME: &str = "System";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    preferred_encoding: String,
    guest_login_allowed: bool,
    users_case_sensitive: bool,
    tenant_separation_enabled: bool,
    protection_enabled: bool,
    protection_limit: u32,
    protection_period_seconds: u64,
    tickets_expire: bool,
    ticket_valid_duration_seconds: u64,
    ticket_expiry_mode: ExpiryMode,
    one_off_tickets: bool,
    single_ticket_per_user: bool,
    max_users: Option<usize>,
    allowed_users: Option<Vec<String>>,
    admin_user_names: Vec<String>,
    guest_user_names: Vec<String>,
    system_user_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            preferred_encoding: DEFAULT_PREFERRED_ENCODING.to_string(),
            guest_login_allowed: true,
            users_case_sensitive: false,
            tenant_separation_enabled: false,
            protection_enabled: true,
            protection_limit: DEFAULT_PROTECTION_LIMIT,
            protection_period_seconds: DEFAULT_PROTECTION_PERIOD_SECONDS,
            tickets_expire: false,
            ticket_valid_duration_seconds: DEFAULT_TICKET_VALID_SECONDS,
            ticket_expiry_mode: ExpiryMode::AfterFixedTime,
            one_off_tickets: false,
            single_ticket_per_user: true,
            max_users: None,
            allowed_users: None,
            admin_user_names: vec!["admin".to_string()],
            guest_user_names: vec!["guest".to_string()],
            system_user_name: DEFAULT_SYSTEM_USER_NAME.to_string(),
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `GARDISTO_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(encoding) = env_string("GARDISTO_PREFERRED_ENCODING") {
            config.preferred_encoding = encoding;
        }
        if let Some(allowed) = env_parse::<bool>("GARDISTO_GUEST_LOGIN_ALLOWED") {
            config.guest_login_allowed = allowed;
        }
        if let Some(sensitive) = env_parse::<bool>("GARDISTO_USERS_CASE_SENSITIVE") {
            config.users_case_sensitive = sensitive;
        }
        if let Some(enabled) = env_parse::<bool>("GARDISTO_PROTECTION_ENABLED") {
            config.protection_enabled = enabled;
        }
        if let Some(limit) = env_parse::<u32>("GARDISTO_PROTECTION_LIMIT") {
            config.protection_limit = limit;
        }
        if let Some(period) = env_parse::<u64>("GARDISTO_PROTECTION_PERIOD_SECONDS") {
            config.protection_period_seconds = period;
        }
        if let Some(expire) = env_parse::<bool>("GARDISTO_TICKETS_EXPIRE") {
            config.tickets_expire = expire;
        }
        if let Some(seconds) = env_parse::<u64>("GARDISTO_TICKET_VALID_SECONDS") {
            config.ticket_valid_duration_seconds = seconds;
        }
        if let Some(mode) = env_string("GARDISTO_TICKET_EXPIRY_MODE") {
            if let Ok(mode) = mode.parse::<ExpiryMode>() {
                config.ticket_expiry_mode = mode;
            }
        }
        if let Some(single) = env_parse::<bool>("GARDISTO_SINGLE_TICKET_PER_USER") {
            config.single_ticket_per_user = single;
        }
        if let Some(max) = env_parse::<usize>("GARDISTO_MAX_USERS") {
            config.max_users = Some(max);
        }
        config
    }

    #[must_use]
    pub fn with_preferred_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.preferred_encoding = encoding.into();
        self
    }

    #[must_use]
    pub fn with_guest_login_allowed(mut self, allowed: bool) -> Self {
        self.guest_login_allowed = allowed;
        self
    }

    #[must_use]
    pub fn with_users_case_sensitive(mut self, sensitive: bool) -> Self {
        self.users_case_sensitive = sensitive;
        self
    }

    #[must_use]
    pub fn with_tenant_separation_enabled(mut self, enabled: bool) -> Self {
        self.tenant_separation_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_protection_enabled(mut self, enabled: bool) -> Self {
        self.protection_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_protection_limit(mut self, limit: u32) -> Self {
        self.protection_limit = limit;
        self
    }

    #[must_use]
    pub fn with_protection_period_seconds(mut self, seconds: u64) -> Self {
        self.protection_period_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_tickets_expire(mut self, expire: bool) -> Self {
        self.tickets_expire = expire;
        self
    }

    #[must_use]
    pub fn with_ticket_valid_duration_seconds(mut self, seconds: u64) -> Self {
        self.ticket_valid_duration_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_ticket_expiry_mode(mut self, mode: ExpiryMode) -> Self {
        self.ticket_expiry_mode = mode;
        self
    }

    #[must_use]
    pub fn with_one_off_tickets(mut self, one_off: bool) -> Self {
        self.one_off_tickets = one_off;
        self
    }

    #[must_use]
    pub fn with_single_ticket_per_user(mut self, single: bool) -> Self {
        self.single_ticket_per_user = single;
        self
    }

    #[must_use]
    pub fn with_max_users(mut self, max_users: Option<usize>) -> Self {
        self.max_users = max_users;
        self
    }

    #[must_use]
    pub fn with_allowed_users(mut self, allowed: Option<Vec<String>>) -> Self {
        self.allowed_users = allowed;
        self
    }

    #[must_use]
    pub fn with_admin_user_names(mut self, names: Vec<String>) -> Self {
        self.admin_user_names = names;
        self
    }

    #[must_use]
    pub fn with_guest_user_names(mut self, names: Vec<String>) -> Self {
        self.guest_user_names = names;
        self
    }

    #[must_use]
    pub fn with_system_user_name(mut self, name: impl Into<String>) -> Self {
        self.system_user_name = name.into();
        self
    }

    #[must_use]
    pub fn preferred_encoding(&self) -> &str {
        &self.preferred_encoding
    }

    #[must_use]
    pub fn guest_login_allowed(&self) -> bool {
        self.guest_login_allowed
    }

    #[must_use]
    pub fn users_case_sensitive(&self) -> bool {
        self.users_case_sensitive
    }

    #[must_use]
    pub fn tenant_separation_enabled(&self) -> bool {
        self.tenant_separation_enabled
    }

    #[must_use]
    pub fn protection_enabled(&self) -> bool {
        self.protection_enabled
    }

    #[must_use]
    pub fn protection_limit(&self) -> u32 {
        self.protection_limit
    }

    #[must_use]
    pub fn protection_period_seconds(&self) -> u64 {
        self.protection_period_seconds
    }

    #[must_use]
    pub fn tickets_expire(&self) -> bool {
        self.tickets_expire
    }

    #[must_use]
    pub fn ticket_valid_duration_seconds(&self) -> u64 {
        self.ticket_valid_duration_seconds
    }

    #[must_use]
    pub fn ticket_expiry_mode(&self) -> ExpiryMode {
        self.ticket_expiry_mode
    }

    #[must_use]
    pub fn one_off_tickets(&self) -> bool {
        self.one_off_tickets
    }

    #[must_use]
    pub fn single_ticket_per_user(&self) -> bool {
        self.single_ticket_per_user
    }

    #[must_use]
    pub fn max_users(&self) -> Option<usize> {
        self.max_users
    }

    #[must_use]
    pub fn allowed_users(&self) -> Option<&[String]> {
        self.allowed_users.as_deref()
    }

    #[must_use]
    pub fn admin_user_names(&self) -> &[String] {
        &self.admin_user_names
    }

    #[must_use]
    pub fn guest_user_names(&self) -> &[String] {
        &self.guest_user_names
    }

    #[must_use]
    pub fn system_user_name(&self) -> &str {
        &self.system_user_name
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|value| value.parse().ok())
}
