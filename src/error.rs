//! Error taxonomy for the authentication subsystem.
//!
//! Credential failures are deliberately collapsed into the generic
//! [`AuthError::Authentication`] variant: callers must not be able to tell an
//! unknown user from a wrong password, a locked account, or a brute-force
//! block. The underlying cause is kept as a `source` for diagnostics only and
//! never appears in the display message.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// Malformed input, e.g. an empty username or password.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Bad encoder configuration, e.g. an unregistered encoding name.
    #[error("encoder configuration error: {0}")]
    Config(String),

    /// No credential record exists for the (masked) username.
    #[error("user not found: {0}")]
    NotFound(String),

    /// A credential record already exists for the (masked) username.
    #[error("user already exists: {0}")]
    AlreadyExists(String),

    /// Generic authentication failure. The message never reveals whether the
    /// user exists, the password was wrong, or the account is disabled,
    /// locked, expired, or brute-force blocked.
    #[error("authentication failed")]
    Authentication {
        #[source]
        source: Option<Box<AuthError>>,
    },

    /// The caller is not on the configured allow-list.
    #[error("login not allowed for this user")]
    Disallowed,

    /// The configured concurrent-user ceiling has been reached.
    #[error("maximum number of concurrent users reached")]
    MaxUsers,

    /// The presented ticket is unknown, expired, or already consumed.
    #[error("invalid ticket")]
    InvalidTicket,

    /// Optimistic-concurrency conflict reported by the node store. The
    /// transaction retry helper treats this as retryable.
    #[error("transaction conflict: {0}")]
    Conflict(String),

    /// Any other failure reported by the node store.
    #[error("storage error: {0}")]
    Store(String),
}

impl AuthError {
    /// A bare generic authentication failure.
    #[must_use]
    pub fn authentication() -> Self {
        AuthError::Authentication { source: None }
    }

    /// A generic authentication failure carrying its cause for diagnostics.
    #[must_use]
    pub fn authentication_caused_by(cause: AuthError) -> Self {
        AuthError::Authentication {
            source: Some(Box::new(cause)),
        }
    }

    /// True when the retry helper should re-run the transaction.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::AuthError;
    use std::error::Error;

    #[test]
    fn authentication_message_is_generic() {
        let bare = AuthError::authentication();
        let caused =
            AuthError::authentication_caused_by(AuthError::NotFound("an******".to_string()));
        assert_eq!(bare.to_string(), "authentication failed");
        assert_eq!(caused.to_string(), "authentication failed");
    }

    #[test]
    fn authentication_cause_is_preserved_as_source() {
        let caused = AuthError::authentication_caused_by(AuthError::Disallowed);
        let source = caused.source().expect("source");
        assert_eq!(source.to_string(), "login not allowed for this user");
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(AuthError::Conflict("busy".to_string()).is_retryable());
        assert!(!AuthError::authentication().is_retryable());
        assert!(!AuthError::InvalidTicket.is_retryable());
    }
}
