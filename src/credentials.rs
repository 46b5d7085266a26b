//! Credential records and their store.
//!
//! All reads go through a transactional, positive-result-only cache keyed by
//! the case-preserving username. Every credential-affecting write evicts the
//! key and locks it for the remainder of the transaction, so concurrent
//! readers cannot re-cache a value that is about to be superseded.
//!
//! The designated administrator identities get special treatment everywhere:
//! never disabled, never locked, never expiring, regardless of what the
//! stored flags say.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, trace, warn};
use uuid::Uuid;

use crate::cache::TransactionalCache;
use crate::context::mask_username;
use crate::encoding::{CompositePasswordEncoder, MD4, SHA256};
use crate::error::{AuthError, Result};
use crate::store::{
    datetime_value, prop_bool, prop_datetime, prop_string, prop_string_list, NodeRef, NodeStore,
    PropertyMap, PROP_ACCOUNT_EXPIRES, PROP_ACCOUNT_EXPIRY_DATE, PROP_ACCOUNT_LOCKED,
    PROP_CREDENTIALS_EXPIRE, PROP_CREDENTIALS_EXPIRY_DATE, PROP_ENABLED, PROP_HASH_INDICATOR,
    PROP_PASSWORD, PROP_PASSWORD_HASH, PROP_PASSWORD_SHA256, PROP_SALT, PROP_USER_NAME,
};
use crate::tenant::TenantResolver;
use crate::txn::{RetryingTransactionHelper, Txn};

/// A resolved credential, as cached and as handed to authenticators.
///
/// `enabled`, `locked` and `account_has_expired` are resolved at read time
/// (with the admin overrides applied); the credential expiry is kept as a
/// date so each consumer can evaluate it against its own "now".
/// Serializable for admin tooling; the hash fields travel with it, the raw
/// password never exists here.
#[derive(Clone, Debug, serde::Serialize)]
pub struct CredentialRecord {
    pub user_name: String,
    pub password_hash: String,
    pub hash_chain: Vec<String>,
    pub salt: Option<String>,
    pub enabled: bool,
    pub locked: bool,
    pub account_has_expired: bool,
    pub credentials_expiry_date: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    /// A `false` expiry flag was stored as an absent date; only a present
    /// date in the past means expired.
    #[must_use]
    pub fn credentials_have_expired(&self, now: DateTime<Utc>) -> bool {
        self.credentials_expiry_date
            .is_some_and(|expiry| expiry < now)
    }
}

#[derive(Clone)]
struct CacheEntry {
    node_ref: NodeRef,
    record: CredentialRecord,
}

pub struct CredentialStore {
    store: Arc<dyn NodeStore>,
    encoders: Arc<CompositePasswordEncoder>,
    cache: TransactionalCache<CacheEntry>,
    helper: RetryingTransactionHelper,
    tenants: Arc<TenantResolver>,
    admin_user_names: Vec<String>,
    users_case_sensitive: bool,
}

impl CredentialStore {
    #[must_use]
    pub fn new(
        store: Arc<dyn NodeStore>,
        encoders: Arc<CompositePasswordEncoder>,
        tenants: Arc<TenantResolver>,
        admin_user_names: Vec<String>,
        users_case_sensitive: bool,
    ) -> Self {
        Self {
            store,
            encoders,
            cache: TransactionalCache::new(),
            helper: RetryingTransactionHelper::default(),
            tenants,
            admin_user_names,
            users_case_sensitive,
        }
    }

    /// Whether the tenant-stripped base name is a designated administrator.
    #[must_use]
    pub fn is_admin_authority(&self, username: &str) -> bool {
        let base = self.tenants.base_name(username);
        self.admin_user_names.iter().any(|admin| {
            if self.users_case_sensitive {
                admin == &base
            } else {
                admin.eq_ignore_ascii_case(&base)
            }
        })
    }

    /// Resolve a credential record, via the cache.
    ///
    /// Absence means "no record", never an error; negative results are not
    /// cached. A cached entry whose node has vanished is treated as a miss
    /// and evicted.
    pub fn lookup(&self, username: &str) -> Result<Option<CredentialRecord>> {
        if username.is_empty() {
            return Ok(None);
        }
        self.helper.do_in_transaction(true, |txn| {
            Ok(self.entry_or_none(txn, username)?.map(|entry| entry.record))
        })
    }

    pub fn user_exists(&self, username: &str) -> Result<bool> {
        Ok(self.lookup(username)?.is_some())
    }

    /// Create a credential record.
    ///
    /// A supplied `hashed_password` is stored verbatim under the preferred
    /// encoding (the caller asserts it was produced by it). With neither a
    /// raw nor a hashed password the account gets a random placeholder
    /// password and starts disabled.
    pub fn create_user(
        &self,
        username: &str,
        raw_password: Option<&SecretString>,
        hashed_password: Option<&str>,
    ) -> Result<()> {
        if !valid_user_name(username) {
            return Err(AuthError::InvalidArgument("username is not acceptable"));
        }
        self.helper.do_in_transaction(false, |txn| {
            if self.entry_or_none(txn, username)?.is_some() {
                return Err(AuthError::AlreadyExists(mask_username(username)));
            }

            let salt = Uuid::new_v4().to_string();
            let empty_password =
                raw_password.is_none_or(|raw| raw.expose_secret().is_empty());
            let effective_raw;
            let raw = if empty_password {
                effective_raw = random_placeholder_password();
                &effective_raw
            } else {
                raw_password.expect("non-empty raw password")
            };

            let hash = match hashed_password {
                Some(hash) if !hash.is_empty() => hash.to_string(),
                _ => {
                    trace!(
                        "hashing raw password to {} for {}",
                        self.encoders.preferred_encoding(),
                        mask_username(username)
                    );
                    self.encoders.encode_preferred(raw, Some(&salt))?
                }
            };

            let mut properties = PropertyMap::new();
            properties.insert(PROP_USER_NAME.to_string(), json!(username));
            properties.insert(PROP_SALT.to_string(), json!(salt));
            properties.insert(PROP_PASSWORD_HASH.to_string(), json!(hash));
            properties.insert(
                PROP_HASH_INDICATOR.to_string(),
                json!(self.encoders.preferred_chain()),
            );
            properties.insert(PROP_ACCOUNT_EXPIRES.to_string(), json!(false));
            properties.insert(PROP_CREDENTIALS_EXPIRE.to_string(), json!(false));
            properties.insert(PROP_ENABLED.to_string(), json!(!empty_password));
            properties.insert(PROP_ACCOUNT_LOCKED.to_string(), json!(false));
            self.store.create_user_node(txn, properties)?;
            Ok(())
        })
    }

    /// Change a password. Always rotates the salt and clears any legacy hash
    /// fields.
    pub fn update_user(&self, username: &str, raw_password: &SecretString) -> Result<()> {
        self.helper.do_in_transaction(false, |txn| {
            let entry = self.required_entry(txn, username)?;
            let salt = Uuid::new_v4().to_string();
            let hash = self.encoders.encode_preferred(raw_password, Some(&salt))?;

            let mut properties = self.store.properties(txn, entry.node_ref)?;
            properties.insert(PROP_SALT.to_string(), json!(salt));
            properties.insert(PROP_PASSWORD_HASH.to_string(), json!(hash));
            properties.insert(
                PROP_HASH_INDICATOR.to_string(),
                json!(self.encoders.preferred_chain()),
            );
            properties.remove(PROP_PASSWORD);
            properties.remove(PROP_PASSWORD_SHA256);
            self.store.set_properties(txn, entry.node_ref, properties)?;
            self.invalidate(txn, username);
            Ok(())
        })
    }

    pub fn delete_user(&self, username: &str) -> Result<()> {
        self.helper.do_in_transaction(false, |txn| {
            let entry = self.required_entry(txn, username)?;
            self.store.delete_node(txn, entry.node_ref)?;
            self.invalidate(txn, username);
            Ok(())
        })
    }

    /// Re-key a credential record. The old cache key is evicted; the record
    /// is lazily re-cached under the new name on its next lookup.
    pub fn rename_user(&self, old_username: &str, new_username: &str) -> Result<()> {
        if !valid_user_name(new_username) {
            return Err(AuthError::InvalidArgument("username is not acceptable"));
        }
        self.helper.do_in_transaction(false, |txn| {
            let entry = self.required_entry(txn, old_username)?;
            if self.store.find_user_node(txn, new_username)?.is_some() {
                return Err(AuthError::AlreadyExists(mask_username(new_username)));
            }
            self.store
                .set_property(txn, entry.node_ref, PROP_USER_NAME, json!(new_username))?;
            self.invalidate(txn, old_username);
            Ok(())
        })
    }

    /// Re-encode the stored hash with the preferred chain, keeping the salt.
    /// Runs after a successful match against a non-preferred chain.
    pub fn upgrade_hash(&self, username: &str, raw_password: &SecretString) -> Result<()> {
        self.helper.do_in_transaction(false, |txn| {
            let entry = self.required_entry(txn, username)?;
            let mut properties = self.store.properties(txn, entry.node_ref)?;
            let salt = prop_string(&properties, PROP_SALT);
            let hash = self
                .encoders
                .encode_preferred(raw_password, salt.as_deref())?;
            trace!(
                "re-hashing stored password to {} for {}",
                self.encoders.preferred_encoding(),
                mask_username(username)
            );
            properties.insert(PROP_PASSWORD_HASH.to_string(), json!(hash));
            properties.insert(
                PROP_HASH_INDICATOR.to_string(),
                json!(self.encoders.preferred_chain()),
            );
            properties.remove(PROP_PASSWORD);
            properties.remove(PROP_PASSWORD_SHA256);
            self.store.set_properties(txn, entry.node_ref, properties)?;
            self.invalidate(txn, username);
            Ok(())
        })
    }

    /// Disabling an administrator is a silent no-op.
    pub fn set_enabled(&self, username: &str, enabled: bool) -> Result<()> {
        if !enabled && self.is_admin_authority(username) {
            return Ok(());
        }
        self.set_flag(username, PROP_ENABLED, enabled)
    }

    pub fn get_enabled(&self, username: &str) -> Result<bool> {
        if self.is_admin_authority(username) {
            return Ok(true);
        }
        self.read_properties(username, |properties| match properties {
            // An absent flag means the account predates the flag: enabled.
            Some(properties) => prop_bool(properties, PROP_ENABLED).unwrap_or(true),
            None => false,
        })
    }

    pub fn set_locked(&self, username: &str, locked: bool) -> Result<()> {
        self.set_flag(username, PROP_ACCOUNT_LOCKED, locked)
    }

    /// Administrators are never reported locked.
    pub fn get_locked(&self, username: &str) -> Result<bool> {
        if self.is_admin_authority(username) {
            return Ok(false);
        }
        self.read_properties(username, |properties| match properties {
            Some(properties) => prop_bool(properties, PROP_ACCOUNT_LOCKED).unwrap_or(false),
            None => false,
        })
    }

    pub fn set_account_expires(&self, username: &str, expires: bool) -> Result<()> {
        self.set_flag(username, PROP_ACCOUNT_EXPIRES, expires)
    }

    pub fn get_account_expires(&self, username: &str) -> Result<bool> {
        if self.is_admin_authority(username) {
            return Ok(false);
        }
        self.read_properties(username, |properties| match properties {
            Some(properties) => prop_bool(properties, PROP_ACCOUNT_EXPIRES).unwrap_or(false),
            None => false,
        })
    }

    pub fn set_account_expiry_date(&self, username: &str, date: DateTime<Utc>) -> Result<()> {
        self.set_date(username, PROP_ACCOUNT_EXPIRY_DATE, date)
    }

    /// The expiry date, only when the account actually expires.
    pub fn get_account_expiry_date(&self, username: &str) -> Result<Option<DateTime<Utc>>> {
        self.read_properties(username, |properties| {
            properties.and_then(|properties| {
                if prop_bool(properties, PROP_ACCOUNT_EXPIRES).unwrap_or(false) {
                    prop_datetime(properties, PROP_ACCOUNT_EXPIRY_DATE)
                } else {
                    None
                }
            })
        })
    }

    pub fn account_has_expired(&self, username: &str) -> Result<bool> {
        if self.is_admin_authority(username) {
            return Ok(false);
        }
        let now = Utc::now();
        self.read_properties(username, move |properties| {
            let Some(properties) = properties else {
                return false;
            };
            if !prop_bool(properties, PROP_ACCOUNT_EXPIRES).unwrap_or(false) {
                return false;
            }
            prop_datetime(properties, PROP_ACCOUNT_EXPIRY_DATE)
                .is_some_and(|expiry| expiry < now)
        })
    }

    pub fn set_credentials_expire(&self, username: &str, expire: bool) -> Result<()> {
        self.set_flag(username, PROP_CREDENTIALS_EXPIRE, expire)
    }

    pub fn get_credentials_expire(&self, username: &str) -> Result<bool> {
        if self.is_admin_authority(username) {
            return Ok(false);
        }
        self.read_properties(username, |properties| match properties {
            Some(properties) => prop_bool(properties, PROP_CREDENTIALS_EXPIRE).unwrap_or(false),
            None => false,
        })
    }

    pub fn set_credentials_expiry_date(&self, username: &str, date: DateTime<Utc>) -> Result<()> {
        self.set_date(username, PROP_CREDENTIALS_EXPIRY_DATE, date)
    }

    pub fn get_credentials_expiry_date(&self, username: &str) -> Result<Option<DateTime<Utc>>> {
        if self.is_admin_authority(username) {
            return Ok(None);
        }
        self.read_properties(username, |properties| {
            properties.and_then(|properties| {
                if prop_bool(properties, PROP_CREDENTIALS_EXPIRE).unwrap_or(false) {
                    prop_datetime(properties, PROP_CREDENTIALS_EXPIRY_DATE)
                } else {
                    None
                }
            })
        })
    }

    /// Single fresh read of the stored properties; no cached record is
    /// consulted, so a concurrent update inside the same transaction is
    /// always observed.
    pub fn credentials_have_expired(&self, username: &str) -> Result<bool> {
        if self.is_admin_authority(username) {
            return Ok(false);
        }
        let now = Utc::now();
        self.helper.do_in_transaction(true, |txn| {
            let entry = self.required_entry(txn, username)?;
            let properties = self.store.properties(txn, entry.node_ref)?;
            if !prop_bool(&properties, PROP_CREDENTIALS_EXPIRE).unwrap_or(false) {
                return Ok(false);
            }
            Ok(prop_datetime(&properties, PROP_CREDENTIALS_EXPIRY_DATE)
                .is_some_and(|expiry| expiry < now))
        })
    }

    /// The stored MD4 hash, for the passthru transport fronts. Present only
    /// when the chain is exactly `["md4"]` or the legacy plain field exists.
    pub fn md4_hashed_password(&self, username: &str) -> Result<Option<String>> {
        let hash = self.read_properties(username, |properties| {
            let properties = properties?;
            let indicator = prop_string_list(properties, PROP_HASH_INDICATOR);
            let is_md4 = indicator
                .as_ref()
                .is_some_and(|chain| chain.len() == 1 && chain[0] == MD4);
            if is_md4 {
                return prop_string(properties, PROP_PASSWORD_HASH);
            }
            prop_string(properties, PROP_PASSWORD)
        })?;
        if hash.is_none() {
            error!(
                "request made for the md4 hash of {} but none is stored",
                mask_username(username)
            );
        }
        Ok(hash)
    }

    /// Resolve the stored hash and its chain by field precedence: explicit
    /// indicator, then legacy sha256, then legacy md4.
    pub fn determine_password_hash(properties: &PropertyMap) -> Result<(Vec<String>, String)> {
        if let Some(indicator) = prop_string_list(properties, PROP_HASH_INDICATOR) {
            if !indicator.is_empty() {
                let hash = prop_string(properties, PROP_PASSWORD_HASH).ok_or_else(|| {
                    AuthError::Store("hash indicator present without a password hash".to_string())
                })?;
                return Ok((indicator, hash));
            }
        }
        if let Some(hash) = prop_string(properties, PROP_PASSWORD_SHA256) {
            return Ok((vec![SHA256.to_string()], hash));
        }
        if let Some(hash) = prop_string(properties, PROP_PASSWORD) {
            return Ok((vec![MD4.to_string()], hash));
        }
        let masked = prop_string(properties, PROP_USER_NAME)
            .map(|name| mask_username(&name))
            .unwrap_or_else(|| "******".to_string());
        Err(AuthError::Store(format!(
            "unable to find a password for user {masked}, check the repository authentication settings"
        )))
    }

    fn entry_or_none(&self, txn: &Txn, username: &str) -> Result<Option<CacheEntry>> {
        if let Some(entry) = self.cache.get(username) {
            if self.store.exists(txn, entry.node_ref)? {
                return Ok(Some(entry));
            }
            // The node behind the cached entry is gone; evict and fall
            // through to a fresh query.
            warn!(
                "stale credential cache entry for {}: {} no longer exists",
                mask_username(username),
                entry.node_ref
            );
            self.cache.remove_and_lock(username, txn);
        }

        let Some(node_ref) = self.store.find_user_node(txn, username)? else {
            return Ok(None);
        };
        let properties = self.store.properties(txn, node_ref)?;
        let record = self.build_record(&properties)?;
        let entry = CacheEntry { node_ref, record };
        // Positive results only.
        self.cache.put(username, entry.clone());
        Ok(Some(entry))
    }

    fn required_entry(&self, txn: &Txn, username: &str) -> Result<CacheEntry> {
        self.entry_or_none(txn, username)?
            .ok_or_else(|| AuthError::NotFound(mask_username(username)))
    }

    fn build_record(&self, properties: &PropertyMap) -> Result<CredentialRecord> {
        let user_name = prop_string(properties, PROP_USER_NAME)
            .ok_or_else(|| AuthError::Store("user node without a username".to_string()))?;
        let is_admin = self.is_admin_authority(&user_name);
        let (hash_chain, password_hash) = Self::determine_password_hash(properties)?;
        let now = Utc::now();

        let enabled = is_admin || prop_bool(properties, PROP_ENABLED).unwrap_or(true);
        let locked = !is_admin && prop_bool(properties, PROP_ACCOUNT_LOCKED).unwrap_or(false);
        let account_has_expired = !is_admin
            && prop_bool(properties, PROP_ACCOUNT_EXPIRES).unwrap_or(false)
            && prop_datetime(properties, PROP_ACCOUNT_EXPIRY_DATE)
                .is_some_and(|expiry| expiry < now);
        let credentials_expiry_date = if is_admin
            || !prop_bool(properties, PROP_CREDENTIALS_EXPIRE).unwrap_or(false)
        {
            None
        } else {
            prop_datetime(properties, PROP_CREDENTIALS_EXPIRY_DATE)
        };

        Ok(CredentialRecord {
            user_name,
            password_hash,
            hash_chain,
            salt: prop_string(properties, PROP_SALT),
            enabled,
            locked,
            account_has_expired,
            credentials_expiry_date,
        })
    }

    fn set_flag(&self, username: &str, name: &str, value: bool) -> Result<()> {
        self.helper.do_in_transaction(false, |txn| {
            let entry = self.required_entry(txn, username)?;
            self.store
                .set_property(txn, entry.node_ref, name, json!(value))?;
            self.invalidate(txn, username);
            Ok(())
        })
    }

    fn set_date(&self, username: &str, name: &str, date: DateTime<Utc>) -> Result<()> {
        self.helper.do_in_transaction(false, |txn| {
            let entry = self.required_entry(txn, username)?;
            self.store
                .set_property(txn, entry.node_ref, name, datetime_value(date))?;
            self.invalidate(txn, username);
            Ok(())
        })
    }

    fn read_properties<R>(
        &self,
        username: &str,
        read: impl Fn(Option<&PropertyMap>) -> R,
    ) -> Result<R> {
        self.helper.do_in_transaction(true, |txn| {
            match self.entry_or_none(txn, username)? {
                Some(entry) => {
                    let properties = self.store.properties(txn, entry.node_ref)?;
                    Ok(read(Some(&properties)))
                }
                None => Ok(read(None)),
            }
        })
    }

    fn invalidate(&self, txn: &Txn, username: &str) {
        self.cache.remove_and_lock(username, txn);
    }
}

/// An unguessable stand-in for accounts created without a password. The raw
/// value is never stored or returned; the account starts disabled.
fn random_placeholder_password() -> SecretString {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    SecretString::from(Base64UrlUnpadded::encode_string(&bytes))
}

/// No control characters, no filesystem-hostile characters, no surrounding
/// whitespace.
fn valid_user_name(username: &str) -> bool {
    !username.is_empty()
        && username == username.trim()
        && Regex::new(r#"^[^"*\\><?/:|]+$"#).is_ok_and(|re| re.is_match(username))
}

#[cfg(test)]
mod tests {
    use super::{valid_user_name, CredentialStore};
    use crate::encoding::{CompositePasswordEncoder, BCRYPT10, MD4, SHA256};
    use crate::error::AuthError;
    use crate::store::{
        MemoryNodeStore, NodeStore, PROP_ENABLED, PROP_HASH_INDICATOR, PROP_PASSWORD,
        PROP_PASSWORD_HASH, PROP_PASSWORD_SHA256,
    };
    use crate::tenant::TenantResolver;
    use crate::txn::RetryingTransactionHelper;
    use chrono::{Duration, Utc};
    use secrecy::SecretString;
    use serde_json::json;
    use std::sync::Arc;

    fn raw(password: &str) -> SecretString {
        SecretString::from(password.to_string())
    }

    fn store_with(preferred: &str) -> (CredentialStore, Arc<MemoryNodeStore>) {
        let nodes = Arc::new(MemoryNodeStore::new());
        let encoders = Arc::new(CompositePasswordEncoder::with_default_encoders(preferred).unwrap());
        let credentials = CredentialStore::new(
            Arc::clone(&nodes) as Arc<dyn NodeStore>,
            encoders,
            Arc::new(TenantResolver::new(false)),
            vec!["admin".to_string()],
            false,
        );
        (credentials, nodes)
    }

    #[test]
    fn create_and_lookup_round_trip() {
        let (credentials, _) = store_with(BCRYPT10);
        credentials
            .create_user("Andy", Some(&raw("auth1")), None)
            .unwrap();

        let record = credentials.lookup("Andy").unwrap().expect("record");
        assert_eq!(record.user_name, "Andy");
        assert_eq!(record.hash_chain, vec![BCRYPT10.to_string()]);
        assert!(record.enabled);
        assert!(!record.locked);
        assert!(!record.account_has_expired);
        assert!(record.salt.is_some());

        // The username key is case preserving.
        assert!(credentials.lookup("andy").unwrap().is_none());
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let (credentials, _) = store_with(BCRYPT10);
        credentials
            .create_user("Andy", Some(&raw("auth1")), None)
            .unwrap();
        let err = credentials
            .create_user("Andy", Some(&raw("other")), None)
            .unwrap_err();
        assert!(matches!(err, AuthError::AlreadyExists(_)));
    }

    #[test]
    fn empty_password_creates_a_disabled_account() {
        let (credentials, _) = store_with(BCRYPT10);
        credentials.create_user("empty", None, None).unwrap();
        let record = credentials.lookup("empty").unwrap().expect("record");
        assert!(!record.enabled);
        assert!(!credentials.get_enabled("empty").unwrap());
    }

    #[test]
    fn precomputed_hash_is_stored_verbatim() {
        let (credentials, _) = store_with(MD4);
        let encoders = CompositePasswordEncoder::with_default_encoders(MD4).unwrap();
        let hash = encoders.encode_preferred(&raw("1 passw0rd"), None).unwrap();
        credentials
            .create_user("uzer", None, Some(&hash))
            .unwrap();
        let record = credentials.lookup("uzer").unwrap().expect("record");
        assert_eq!(record.password_hash, hash);
        assert!(encoders
            .matches(&record.hash_chain, &raw("1 passw0rd"), &record.password_hash, None)
            .unwrap());
    }

    #[test]
    fn update_rotates_the_salt_and_clears_legacy_fields() {
        let (credentials, nodes) = store_with(BCRYPT10);
        let helper = RetryingTransactionHelper::default();
        credentials
            .create_user("Andy", Some(&raw("auth1")), None)
            .unwrap();
        let before = credentials.lookup("Andy").unwrap().expect("record");

        // Plant a legacy field to prove update cleans it up.
        helper
            .do_in_transaction(false, |txn| {
                let node = nodes.find_user_node(txn, "Andy")?.expect("node");
                nodes.set_property(txn, node, PROP_PASSWORD, json!("deadbeef"))
            })
            .unwrap();

        credentials.update_user("Andy", &raw("auth2")).unwrap();
        let after = credentials.lookup("Andy").unwrap().expect("record");
        assert_ne!(before.salt, after.salt);
        assert_ne!(before.password_hash, after.password_hash);

        helper
            .do_in_transaction(true, |txn| {
                let node = nodes.find_user_node(txn, "Andy")?.expect("node");
                let properties = nodes.properties(txn, node)?;
                assert!(!properties.contains_key(PROP_PASSWORD));
                assert!(!properties.contains_key(PROP_PASSWORD_SHA256));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn lookup_after_update_never_returns_the_old_record() {
        let (credentials, _) = store_with(BCRYPT10);
        credentials
            .create_user("Andy", Some(&raw("auth1")), None)
            .unwrap();
        let before = credentials.lookup("Andy").unwrap().expect("record");
        credentials.update_user("Andy", &raw("auth2")).unwrap();
        let after = credentials.lookup("Andy").unwrap().expect("record");
        assert_ne!(before.password_hash, after.password_hash);
    }

    #[test]
    fn delete_then_lookup_is_not_found() {
        let (credentials, _) = store_with(BCRYPT10);
        credentials
            .create_user("Andy", Some(&raw("auth1")), None)
            .unwrap();
        credentials.delete_user("Andy").unwrap();
        assert!(credentials.lookup("Andy").unwrap().is_none());
        assert!(matches!(
            credentials.delete_user("Andy").unwrap_err(),
            AuthError::NotFound(_)
        ));
    }

    #[test]
    fn mutations_on_missing_users_are_not_found() {
        let (credentials, _) = store_with(BCRYPT10);
        assert!(matches!(
            credentials.update_user("ghost", &raw("pw")).unwrap_err(),
            AuthError::NotFound(_)
        ));
        assert!(matches!(
            credentials.set_locked("ghost", true).unwrap_err(),
            AuthError::NotFound(_)
        ));
    }

    #[test]
    fn rename_rekeys_the_record() {
        let (credentials, _) = store_with(BCRYPT10);
        credentials
            .create_user("Andy", Some(&raw("auth1")), None)
            .unwrap();
        credentials.rename_user("Andy", "Andrew").unwrap();
        assert!(credentials.lookup("Andy").unwrap().is_none());
        let record = credentials.lookup("Andrew").unwrap().expect("record");
        assert_eq!(record.user_name, "Andrew");
    }

    #[test]
    fn stale_cache_entry_self_heals() {
        let (credentials, nodes) = store_with(BCRYPT10);
        let helper = RetryingTransactionHelper::default();
        credentials
            .create_user("Andy", Some(&raw("auth1")), None)
            .unwrap();
        // Prime the cache.
        assert!(credentials.lookup("Andy").unwrap().is_some());

        // Delete the node behind the store's back, leaving the entry stale.
        helper
            .do_in_transaction(false, |txn| {
                let node = nodes.find_user_node(txn, "Andy")?.expect("node");
                nodes.delete_node(txn, node)
            })
            .unwrap();

        assert!(credentials.lookup("Andy").unwrap().is_none());
    }

    #[test]
    fn admin_cannot_be_disabled_locked_or_expired() {
        let (credentials, _) = store_with(BCRYPT10);
        credentials
            .create_user("admin", Some(&raw("admin")), None)
            .unwrap();

        // Disable is a silent no-op.
        credentials.set_enabled("admin", false).unwrap();
        assert!(credentials.get_enabled("admin").unwrap());

        credentials.set_locked("admin", true).unwrap();
        assert!(!credentials.get_locked("admin").unwrap());

        credentials.set_account_expires("admin", true).unwrap();
        credentials
            .set_account_expiry_date("admin", Utc::now() - Duration::days(1))
            .unwrap();
        assert!(!credentials.account_has_expired("admin").unwrap());
        assert!(!credentials.credentials_have_expired("admin").unwrap());
    }

    #[test]
    fn expiry_flag_false_means_never_expires() {
        let (credentials, _) = store_with(BCRYPT10);
        credentials
            .create_user("Andy", Some(&raw("auth1")), None)
            .unwrap();
        credentials
            .set_account_expiry_date("Andy", Utc::now() - Duration::days(1))
            .unwrap();
        // Date in the past, but the flag is still false.
        assert!(!credentials.account_has_expired("Andy").unwrap());
        assert_eq!(credentials.get_account_expiry_date("Andy").unwrap(), None);

        credentials.set_account_expires("Andy", true).unwrap();
        assert!(credentials.account_has_expired("Andy").unwrap());
        assert!(credentials.get_account_expiry_date("Andy").unwrap().is_some());
    }

    #[test]
    fn credentials_expiry_uses_fresh_properties() {
        let (credentials, _) = store_with(BCRYPT10);
        credentials
            .create_user("Andy", Some(&raw("auth1")), None)
            .unwrap();
        credentials.set_credentials_expire("Andy", true).unwrap();
        credentials
            .set_credentials_expiry_date("Andy", Utc::now() + Duration::days(1))
            .unwrap();
        assert!(!credentials.credentials_have_expired("Andy").unwrap());

        credentials
            .set_credentials_expiry_date("Andy", Utc::now() - Duration::seconds(1))
            .unwrap();
        assert!(credentials.credentials_have_expired("Andy").unwrap());
    }

    #[test]
    fn legacy_hash_precedence_is_indicator_then_sha256_then_md4() {
        let (credentials, nodes) = store_with(BCRYPT10);
        let helper = RetryingTransactionHelper::default();
        credentials
            .create_user("Andy", Some(&raw("auth1")), None)
            .unwrap();

        // Rewrite the node to look like a record from a previous release:
        // both legacy fields present, no indicator.
        helper
            .do_in_transaction(false, |txn| {
                let node = nodes.find_user_node(txn, "Andy")?.expect("node");
                let mut properties = nodes.properties(txn, node)?;
                properties.remove(PROP_PASSWORD_HASH);
                properties.remove(PROP_HASH_INDICATOR);
                properties.insert(PROP_PASSWORD_SHA256.to_string(), json!("legacy-sha"));
                properties.insert(PROP_PASSWORD.to_string(), json!("legacy-md4"));
                nodes.set_properties(txn, node, properties)
            })
            .unwrap();
        credentials.update_cache_for_test("Andy");

        let record = credentials.lookup("Andy").unwrap().expect("record");
        assert_eq!(record.hash_chain, vec![SHA256.to_string()]);
        assert_eq!(record.password_hash, "legacy-sha");

        // Drop the sha256 field; md4 is the last resort.
        helper
            .do_in_transaction(false, |txn| {
                let node = nodes.find_user_node(txn, "Andy")?.expect("node");
                nodes.remove_property(txn, node, PROP_PASSWORD_SHA256)
            })
            .unwrap();
        credentials.update_cache_for_test("Andy");
        let record = credentials.lookup("Andy").unwrap().expect("record");
        assert_eq!(record.hash_chain, vec![MD4.to_string()]);
        assert_eq!(record.password_hash, "legacy-md4");
    }

    #[test]
    fn md4_hash_is_only_served_for_md4_records() {
        let (credentials, _) = store_with(MD4);
        credentials
            .create_user("mduzer", Some(&raw("roarPazzw0rd")), None)
            .unwrap();
        let hash = credentials.md4_hashed_password("mduzer").unwrap();
        assert!(hash.is_some());

        let (credentials, _) = store_with(BCRYPT10);
        credentials
            .create_user("buzer", Some(&raw("roarPazzw0rd")), None)
            .unwrap();
        assert!(credentials.md4_hashed_password("buzer").unwrap().is_none());
    }

    #[test]
    fn enabled_defaults_to_true_when_the_flag_is_absent() {
        let (credentials, nodes) = store_with(BCRYPT10);
        let helper = RetryingTransactionHelper::default();
        credentials
            .create_user("Andy", Some(&raw("auth1")), None)
            .unwrap();
        helper
            .do_in_transaction(false, |txn| {
                let node = nodes.find_user_node(txn, "Andy")?.expect("node");
                nodes.remove_property(txn, node, PROP_ENABLED)
            })
            .unwrap();
        credentials.update_cache_for_test("Andy");
        assert!(credentials.get_enabled("Andy").unwrap());
    }

    #[test]
    fn user_name_validation() {
        assert!(valid_user_name("Andy"));
        assert!(valid_user_name("andy@example.com"));
        assert!(!valid_user_name(""));
        assert!(!valid_user_name(" padded "));
        assert!(!valid_user_name("an*dy"));
        assert!(!valid_user_name("an\"dy"));
        assert!(!valid_user_name("an/dy"));
    }

    impl CredentialStore {
        /// Direct node edits in these tests bypass the store's own
        /// invalidation, so flush the key by hand.
        fn update_cache_for_test(&self, username: &str) {
            self.cache.remove(username);
        }
    }
}
