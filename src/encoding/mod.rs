//! Password encoding chains.
//!
//! A stored hash is described by an ordered chain of encoder names. Each step
//! feeds its output into the next, so legacy hashes can be wrapped by a
//! stronger terminal step without knowing the raw password
//! (`["sha256", "bcrypt10"]` bcrypt-hashes the legacy sha256 text).
//!
//! A self-salting encoder (bcrypt) cannot be recomputed and compared by value
//! equality, so it may only appear as the final element of a chain; earlier
//! positions make the chain unrecomputable. See
//! [`CompositePasswordEncoder::is_safe_to_chain`].

mod bcrypt;
mod md4;
mod sha256;

pub use bcrypt::Bcrypt10PasswordEncoder;
pub use md4::Md4PasswordEncoder;
pub use sha256::Sha256PasswordEncoder;

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AuthError, Result};

/// Encoding name of the legacy MD4 encoder.
pub const MD4: &str = "md4";
/// Encoding name of the salted SHA-256 encoder.
pub const SHA256: &str = "sha256";
/// Encoding name of the bcrypt (cost 10) encoder.
pub const BCRYPT10: &str = "bcrypt10";

/// A single hash/encode step.
///
/// `raw` is the raw password for the first chain element and the previous
/// step's output for later elements.
pub trait PasswordEncoder: Send + Sync {
    fn encode(&self, raw: &str, salt: Option<&str>) -> Result<String>;

    fn matches(&self, raw: &str, encoded: &str, salt: Option<&str>) -> bool;

    /// Deterministic encoders can be recomputed and compared by value.
    /// Self-salting encoders (bcrypt) must return `false`.
    fn deterministic(&self) -> bool {
        true
    }
}

/// Registry of named encoders plus the preferred encoding for new passwords.
pub struct CompositePasswordEncoder {
    encoders: HashMap<String, Arc<dyn PasswordEncoder>>,
    preferred_encoding: String,
}

impl std::fmt::Debug for CompositePasswordEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositePasswordEncoder")
            .field("encoders", &self.encoders.keys().collect::<Vec<_>>())
            .field("preferred_encoding", &self.preferred_encoding)
            .finish()
    }
}

impl CompositePasswordEncoder {
    /// Registry with the stock `md4`, `sha256` and `bcrypt10` encoders.
    ///
    /// # Errors
    /// `Config` if `preferred_encoding` does not name a stock encoder.
    pub fn with_default_encoders(preferred_encoding: impl Into<String>) -> Result<Self> {
        let mut encoders: HashMap<String, Arc<dyn PasswordEncoder>> = HashMap::new();
        encoders.insert(MD4.to_string(), Arc::new(Md4PasswordEncoder));
        encoders.insert(SHA256.to_string(), Arc::new(Sha256PasswordEncoder));
        encoders.insert(BCRYPT10.to_string(), Arc::new(Bcrypt10PasswordEncoder));
        let preferred_encoding = preferred_encoding.into();
        if !encoders.contains_key(&preferred_encoding) {
            return Err(AuthError::Config(format!(
                "preferred encoding is not registered: {preferred_encoding}"
            )));
        }
        Ok(Self {
            encoders,
            preferred_encoding,
        })
    }

    /// Register (or replace) an encoder under `name`.
    pub fn register(&mut self, name: impl Into<String>, encoder: Arc<dyn PasswordEncoder>) {
        self.encoders.insert(name.into(), encoder);
    }

    #[must_use]
    pub fn preferred_encoding(&self) -> &str {
        &self.preferred_encoding
    }

    /// The chain used for newly set or rotated passwords.
    #[must_use]
    pub fn preferred_chain(&self) -> Vec<String> {
        vec![self.preferred_encoding.clone()]
    }

    /// Apply each encoder in `chain` in order.
    ///
    /// # Errors
    /// `Config` for an empty chain or an unregistered name; `InvalidArgument`
    /// for an empty raw password.
    pub fn encode(
        &self,
        chain: &[String],
        raw: &SecretString,
        salt: Option<&str>,
    ) -> Result<String> {
        if raw.expose_secret().is_empty() {
            return Err(AuthError::InvalidArgument("raw password is mandatory"));
        }
        if chain.is_empty() {
            return Err(AuthError::Config("encoding chain is empty".to_string()));
        }
        let mut current = raw.expose_secret().to_string();
        for name in chain {
            let encoder = self.encoder(name)?;
            current = encoder.encode(&current, salt_for(name, salt))?;
        }
        Ok(current)
    }

    /// Encode with the single preferred encoding.
    pub fn encode_preferred(&self, raw: &SecretString, salt: Option<&str>) -> Result<String> {
        self.encode(&self.preferred_chain(), raw, salt)
    }

    /// Verify a raw password against a value encoded with `chain`.
    ///
    /// A single-element chain delegates to that encoder's own verify. A
    /// longer chain recomputes every step but the last, then lets the final
    /// encoder verify against the stored value, so a self-salting terminal
    /// step stays checkable.
    pub fn matches(
        &self,
        chain: &[String],
        raw: &SecretString,
        encoded: &str,
        salt: Option<&str>,
    ) -> Result<bool> {
        if raw.expose_secret().is_empty() {
            return Err(AuthError::InvalidArgument("raw password is mandatory"));
        }
        if encoded.is_empty() {
            return Err(AuthError::InvalidArgument("encoded password is mandatory"));
        }
        if chain.is_empty() {
            return Err(AuthError::Config("encoding chain is empty".to_string()));
        }
        if chain.len() == 1 {
            let name = &chain[0];
            let encoder = self.encoder(name)?;
            return Ok(encoder.matches(raw.expose_secret(), encoded, salt_for(name, salt)));
        }
        let intermediate = self.encode(&chain[..chain.len() - 1], raw, salt)?;
        let last = &chain[chain.len() - 1];
        let encoder = self.encoder(last)?;
        Ok(encoder.matches(&intermediate, encoded, salt_for(last, salt)))
    }

    /// A chain is safe iff it contains no self-salting encoder, or exactly
    /// one and that encoder is the final element.
    pub fn is_safe_to_chain(&self, chain: &[String]) -> Result<bool> {
        if chain.is_empty() {
            return Err(AuthError::Config("encoding chain is empty".to_string()));
        }
        let mut unsafe_positions = Vec::new();
        for (position, name) in chain.iter().enumerate() {
            if !self.encoder(name)?.deterministic() {
                unsafe_positions.push(position);
            }
        }
        Ok(match unsafe_positions.as_slice() {
            [] => true,
            [position] => *position == chain.len() - 1,
            _ => false,
        })
    }

    /// True iff the chain's final element is the preferred encoding. A
    /// `false` on a successful login means the stored hash wants a
    /// transparent upgrade.
    #[must_use]
    pub fn last_is_preferred(&self, chain: &[String]) -> bool {
        chain.last().map(String::as_str) == Some(self.preferred_encoding.as_str())
    }

    fn encoder(&self, name: &str) -> Result<&Arc<dyn PasswordEncoder>> {
        self.encoders
            .get(name)
            .ok_or_else(|| AuthError::Config(format!("unknown encoding: {name}")))
    }
}

/// The legacy md4 encoder historically ignored any supplied salt; callers
/// must drop the salt for it regardless of chain position.
fn salt_for<'a>(name: &str, salt: Option<&'a str>) -> Option<&'a str> {
    if name == MD4 {
        None
    } else {
        salt
    }
}

#[cfg(test)]
mod tests {
    use super::{CompositePasswordEncoder, BCRYPT10, MD4, SHA256};
    use crate::error::AuthError;
    use secrecy::SecretString;

    fn raw(password: &str) -> SecretString {
        SecretString::from(password.to_string())
    }

    fn chain(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn deterministic_chains_round_trip() {
        let encoders = CompositePasswordEncoder::with_default_encoders(BCRYPT10).unwrap();
        for names in [chain(&[MD4]), chain(&[SHA256]), chain(&[MD4, SHA256])] {
            let encoded = encoders
                .encode(&names, &raw("roarPazzw0rd"), Some("salty"))
                .unwrap();
            assert!(encoders
                .matches(&names, &raw("roarPazzw0rd"), &encoded, Some("salty"))
                .unwrap());
            assert!(!encoders
                .matches(&names, &raw("other"), &encoded, Some("salty"))
                .unwrap());
        }
    }

    #[test]
    fn self_salting_terminal_step_verifies() {
        let encoders = CompositePasswordEncoder::with_default_encoders(BCRYPT10).unwrap();
        let names = chain(&[SHA256, BCRYPT10]);
        let encoded = encoders
            .encode(&names, &raw("secret"), Some("salty"))
            .unwrap();
        // bcrypt embeds its own salt, so re-encoding never reproduces the
        // stored text; matches must still verify it.
        let again = encoders
            .encode(&names, &raw("secret"), Some("salty"))
            .unwrap();
        assert_ne!(encoded, again);
        assert!(encoders
            .matches(&names, &raw("secret"), &encoded, Some("salty"))
            .unwrap());
        assert!(!encoders
            .matches(&names, &raw("wrong"), &encoded, Some("salty"))
            .unwrap());
    }

    #[test]
    fn safe_to_chain_rules() {
        let encoders = CompositePasswordEncoder::with_default_encoders(MD4).unwrap();
        assert!(encoders.is_safe_to_chain(&chain(&[MD4])).unwrap());
        assert!(encoders.is_safe_to_chain(&chain(&[MD4, SHA256])).unwrap());
        assert!(encoders.is_safe_to_chain(&chain(&[BCRYPT10])).unwrap());
        assert!(encoders
            .is_safe_to_chain(&chain(&[SHA256, BCRYPT10]))
            .unwrap());
        assert!(!encoders
            .is_safe_to_chain(&chain(&[BCRYPT10, MD4]))
            .unwrap());
        assert!(!encoders
            .is_safe_to_chain(&chain(&[BCRYPT10, BCRYPT10]))
            .unwrap());
    }

    #[test]
    fn last_is_preferred_detects_upgrade_candidates() {
        let encoders = CompositePasswordEncoder::with_default_encoders(BCRYPT10).unwrap();
        assert!(encoders.last_is_preferred(&chain(&[BCRYPT10])));
        assert!(encoders.last_is_preferred(&chain(&[MD4, BCRYPT10])));
        assert!(!encoders.last_is_preferred(&chain(&[MD4])));
        assert!(!encoders.last_is_preferred(&chain(&[SHA256])));
    }

    #[test]
    fn unknown_encoding_is_a_config_error() {
        let encoders = CompositePasswordEncoder::with_default_encoders(MD4).unwrap();
        let err = encoders
            .encode(&chain(&["rot13"]), &raw("pw"), None)
            .unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));

        let err = CompositePasswordEncoder::with_default_encoders("rot13").unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
    }

    #[test]
    fn empty_arguments_are_rejected() {
        let encoders = CompositePasswordEncoder::with_default_encoders(MD4).unwrap();
        assert!(matches!(
            encoders.encode(&chain(&[MD4]), &raw(""), None),
            Err(AuthError::InvalidArgument(_))
        ));
        assert!(matches!(
            encoders.matches(&chain(&[MD4]), &raw("pw"), "", None),
            Err(AuthError::InvalidArgument(_))
        ));
        assert!(matches!(
            encoders.encode(&[], &raw("pw"), None),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn md4_ignores_salt_anywhere_in_a_chain() {
        let encoders = CompositePasswordEncoder::with_default_encoders(MD4).unwrap();
        let salted = encoders
            .encode(&chain(&[MD4]), &raw("pw"), Some("salty"))
            .unwrap();
        let unsalted = encoders.encode(&chain(&[MD4]), &raw("pw"), None).unwrap();
        assert_eq!(salted, unsalted);
    }
}
