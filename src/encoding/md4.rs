//! Legacy MD4 password encoder.
//!
//! Hex digest of the UTF-16LE password bytes, NTLM style, so hashes remain
//! interchangeable with the passthru transport fronts that still consume
//! them. Salt is ignored; the historical encoder never used one.

use md4::{Digest, Md4};

use crate::error::Result;
use crate::encoding::PasswordEncoder;

pub struct Md4PasswordEncoder;

impl PasswordEncoder for Md4PasswordEncoder {
    fn encode(&self, raw: &str, _salt: Option<&str>) -> Result<String> {
        let mut bytes = Vec::with_capacity(raw.len() * 2);
        for unit in raw.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        Ok(hex::encode(Md4::digest(&bytes)))
    }

    fn matches(&self, raw: &str, encoded: &str, salt: Option<&str>) -> bool {
        self.encode(raw, salt)
            .map(|candidate| candidate == encoded)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::Md4PasswordEncoder;
    use crate::encoding::PasswordEncoder;

    #[test]
    fn encodes_to_a_stable_hex_digest() {
        let encoder = Md4PasswordEncoder;
        let first = encoder.encode("auth1", None).unwrap();
        let second = encoder.encode("auth1", None).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 32);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn known_ntlm_vector() {
        // NT hash of "password".
        let encoder = Md4PasswordEncoder;
        assert_eq!(
            encoder.encode("password", None).unwrap(),
            "8846f7eaee8fb117ad06bdd830b7586c"
        );
    }

    #[test]
    fn salt_never_changes_the_digest() {
        let encoder = Md4PasswordEncoder;
        assert_eq!(
            encoder.encode("auth1", Some("salty")).unwrap(),
            encoder.encode("auth1", None).unwrap()
        );
    }

    #[test]
    fn matches_round_trip() {
        let encoder = Md4PasswordEncoder;
        let encoded = encoder.encode("auth1", None).unwrap();
        assert!(encoder.matches("auth1", &encoded, None));
        assert!(!encoder.matches("auth2", &encoded, None));
    }
}
