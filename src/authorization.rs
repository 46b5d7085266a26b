//! Parsing of combined `user:password` / ticket authorization strings.
//!
//! Transport fronts hand over a single opaque string: either
//! `username:password` or a bare ticket. A missing or empty username, or the
//! reserved [`TICKET_USER_ID`] marker (compared case-insensitively), means
//! the credential part carries a ticket rather than a password.

use crate::error::{AuthError, Result};

/// Reserved username marking the password field as a ticket.
pub const TICKET_USER_ID: &str = "ROLE_TICKET";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Authorization {
    username: Option<String>,
    password: String,
}

impl Authorization {
    /// Parse a combined authorization string at the first `:`.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty input.
    pub fn parse(authorization: &str) -> Result<Self> {
        if authorization.is_empty() {
            return Err(AuthError::InvalidArgument("authorization is mandatory"));
        }
        match authorization.split_once(':') {
            Some((username, password)) => Ok(Self::new(Some(username), password)),
            None => Ok(Self::new(None, authorization)),
        }
    }

    #[must_use]
    pub fn new(username: Option<&str>, password: &str) -> Self {
        Self {
            username: username.map(ToString::to_string),
            password: password.to_string(),
        }
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// True exactly when the username is absent, empty, or the reserved
    /// ticket marker.
    #[must_use]
    pub fn is_ticket(&self) -> bool {
        match self.username.as_deref() {
            None => true,
            Some(name) => name.is_empty() || name.eq_ignore_ascii_case(TICKET_USER_ID),
        }
    }

    /// The ticket, when this authorization carries one.
    #[must_use]
    pub fn ticket(&self) -> Option<&str> {
        self.is_ticket().then_some(self.password.as_str())
    }

    /// The password, when this authorization carries credentials.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        (!self.is_ticket()).then_some(self.password.as_str())
    }
}
