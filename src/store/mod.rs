//! Node-property storage contract.
//!
//! The surrounding repository persists users as nodes carrying an opaque
//! property map. This subsystem only depends on the [`NodeStore`] contract;
//! the field semantics of the credential properties below are load-bearing
//! and must be preserved by any backend. [`MemoryNodeStore`] is the
//! in-process reference backend used by embedded deployments and the test
//! suite.

mod memory;

pub use memory::MemoryNodeStore;

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::error::Result;
use crate::txn::Txn;

/// Case-preserving identity key of the credential record.
pub const PROP_USER_NAME: &str = "usr:username";
/// Current password hash, text form depends on the hash chain.
pub const PROP_PASSWORD_HASH: &str = "usr:passwordHash";
/// Ordered encoder names that produced `usr:passwordHash`.
pub const PROP_HASH_INDICATOR: &str = "usr:hashIndicator";
/// Salt fed to deterministic encoders; opaque text.
pub const PROP_SALT: &str = "usr:salt";
pub const PROP_ENABLED: &str = "usr:enabled";
pub const PROP_ACCOUNT_LOCKED: &str = "usr:accountLocked";
pub const PROP_ACCOUNT_EXPIRES: &str = "usr:accountExpires";
pub const PROP_ACCOUNT_EXPIRY_DATE: &str = "usr:accountExpiryDate";
pub const PROP_CREDENTIALS_EXPIRE: &str = "usr:credentialsExpire";
pub const PROP_CREDENTIALS_EXPIRY_DATE: &str = "usr:credentialsExpiryDate";
/// Legacy plain MD4 hash field, superseded by the hash/indicator pair.
pub const PROP_PASSWORD: &str = "usr:password";
/// Legacy salted SHA-256 hash field, superseded by the hash/indicator pair.
pub const PROP_PASSWORD_SHA256: &str = "usr:passwordSha256";

/// Opaque reference to a stored user node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(Uuid);

impl NodeRef {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node://{}", self.0)
    }
}

/// The opaque per-user property record.
pub type PropertyMap = BTreeMap<String, Value>;

/// Storage contract consumed by the credential store.
///
/// Implementations must reject writes made through a read-only transaction
/// and may fail any call with [`crate::error::AuthError::Conflict`] to
/// request a retry.
pub trait NodeStore: Send + Sync {
    /// Persist a new user node. The property map must carry
    /// [`PROP_USER_NAME`].
    fn create_user_node(&self, txn: &Txn, properties: PropertyMap) -> Result<NodeRef>;

    /// Exact, case-sensitive lookup by stored username.
    fn find_user_node(&self, txn: &Txn, username: &str) -> Result<Option<NodeRef>>;

    fn exists(&self, txn: &Txn, node: NodeRef) -> Result<bool>;

    fn properties(&self, txn: &Txn, node: NodeRef) -> Result<PropertyMap>;

    fn set_properties(&self, txn: &Txn, node: NodeRef, properties: PropertyMap) -> Result<()>;

    fn set_property(&self, txn: &Txn, node: NodeRef, name: &str, value: Value) -> Result<()>;

    fn remove_property(&self, txn: &Txn, node: NodeRef, name: &str) -> Result<()>;

    fn delete_node(&self, txn: &Txn, node: NodeRef) -> Result<()>;
}

/// Read a string property.
#[must_use]
pub fn prop_string(properties: &PropertyMap, name: &str) -> Option<String> {
    properties
        .get(name)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

/// Read a boolean property. Accepts JSON booleans and their text forms,
/// which directory imports have been known to write.
#[must_use]
pub fn prop_bool(properties: &PropertyMap, name: &str) -> Option<bool> {
    match properties.get(name)? {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

/// Read a list-of-strings property.
#[must_use]
pub fn prop_string_list(properties: &PropertyMap, name: &str) -> Option<Vec<String>> {
    let items = properties.get(name)?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(ToString::to_string)
            .collect(),
    )
}

/// Read an RFC 3339 datetime property.
#[must_use]
pub fn prop_datetime(properties: &PropertyMap, name: &str) -> Option<DateTime<Utc>> {
    let text = properties.get(name)?.as_str()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Store an RFC 3339 datetime property value.
#[must_use]
pub fn datetime_value(date: DateTime<Utc>) -> Value {
    Value::String(date.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::{
        datetime_value, prop_bool, prop_datetime, prop_string, prop_string_list, PropertyMap,
    };
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn property_accessors_read_expected_shapes() {
        let mut properties = PropertyMap::new();
        properties.insert(super::PROP_USER_NAME.to_string(), json!("Andy"));
        properties.insert(super::PROP_ENABLED.to_string(), json!(true));
        properties.insert(super::PROP_ACCOUNT_LOCKED.to_string(), json!("false"));
        properties.insert(
            super::PROP_HASH_INDICATOR.to_string(),
            json!(["sha256", "bcrypt10"]),
        );

        assert_eq!(
            prop_string(&properties, super::PROP_USER_NAME).as_deref(),
            Some("Andy")
        );
        assert_eq!(prop_bool(&properties, super::PROP_ENABLED), Some(true));
        assert_eq!(
            prop_bool(&properties, super::PROP_ACCOUNT_LOCKED),
            Some(false)
        );
        assert_eq!(
            prop_string_list(&properties, super::PROP_HASH_INDICATOR),
            Some(vec!["sha256".to_string(), "bcrypt10".to_string()])
        );
        assert_eq!(prop_bool(&properties, super::PROP_ACCOUNT_EXPIRES), None);
    }

    #[test]
    fn datetime_round_trips_through_rfc3339() {
        let date = Utc.with_ymd_and_hms(2031, 5, 17, 12, 0, 0).unwrap();
        let mut properties = PropertyMap::new();
        properties.insert(
            super::PROP_ACCOUNT_EXPIRY_DATE.to_string(),
            datetime_value(date),
        );
        assert_eq!(
            prop_datetime(&properties, super::PROP_ACCOUNT_EXPIRY_DATE),
            Some(date)
        );
    }
}
