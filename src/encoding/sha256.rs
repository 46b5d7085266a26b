//! Salted SHA-256 password encoder.
//!
//! Digest of the salt bytes followed by the password bytes, emitted as
//! standard Base64 text. Deterministic, so chains can recompute it.

use base64ct::{Base64, Encoding};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::encoding::PasswordEncoder;

pub struct Sha256PasswordEncoder;

impl PasswordEncoder for Sha256PasswordEncoder {
    fn encode(&self, raw: &str, salt: Option<&str>) -> Result<String> {
        let mut hasher = Sha256::new();
        if let Some(salt) = salt {
            hasher.update(salt.as_bytes());
        }
        hasher.update(raw.as_bytes());
        Ok(Base64::encode_string(&hasher.finalize()))
    }

    fn matches(&self, raw: &str, encoded: &str, salt: Option<&str>) -> bool {
        self.encode(raw, salt)
            .map(|candidate| candidate == encoded)
            .unwrap_or(false)
    }
}
