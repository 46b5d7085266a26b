//! Bcrypt password encoder, cost factor 10.
//!
//! Self-salting: every encode embeds a fresh random salt in the output, so
//! the same input never produces the same text twice and verification must go
//! through bcrypt's own check. This is the only stock encoder that reports
//! itself non-deterministic, which restricts it to the terminal chain
//! position.

use crate::error::{AuthError, Result};
use crate::encoding::PasswordEncoder;

const COST: u32 = 10;

pub struct Bcrypt10PasswordEncoder;

impl PasswordEncoder for Bcrypt10PasswordEncoder {
    fn encode(&self, raw: &str, _salt: Option<&str>) -> Result<String> {
        bcrypt::hash(raw, COST).map_err(|err| AuthError::Config(format!("bcrypt failure: {err}")))
    }

    fn matches(&self, raw: &str, encoded: &str, _salt: Option<&str>) -> bool {
        bcrypt::verify(raw, encoded).unwrap_or(false)
    }

    fn deterministic(&self) -> bool {
        false
    }
}
