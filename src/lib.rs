//! # Gardisto
//!
//! Authentication and session tickets for a multi-tenant content repository.
//!
//! This crate provides:
//! - **Password encoding chains**: named, ordered hash steps with a safety
//!   rule for self-salting encoders and transparent upgrade-on-login
//! - **Credential store**: per-user credential records over a pluggable node
//!   store, with a transactional positive-result-only cache
//! - **Authenticators**: repository-backed credential checking plus chaining
//!   composition, guest/system pseudo-users, and validated
//!   current-user establishment
//! - **Brute-force protection**: per-instance failed-login tracking with a
//!   lazily evaluated protection window
//! - **Session tickets**: opaque ids with configurable expiry modes
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use gardisto::{
//!     AuthConfig, AuthenticationSubsystem, MemoryNodeStore, NoopDirectorySync, SecurityContext,
//! };
//! use secrecy::SecretString;
//!
//! # fn main() -> gardisto::Result<()> {
//! let subsystem = AuthenticationSubsystem::bootstrap(
//!     &AuthConfig::new(),
//!     Arc::new(MemoryNodeStore::new()),
//!     Arc::new(NoopDirectorySync),
//! )?;
//!
//! subsystem
//!     .credentials
//!     .create_user("andy", Some(&SecretString::from("auth1".to_string())), None)?;
//!
//! let ctx = SecurityContext::new();
//! subsystem
//!     .service
//!     .authenticate(&ctx, "andy", &SecretString::from("auth1".to_string()))?;
//!
//! let ticket = subsystem.service.current_ticket(&ctx)?;
//! subsystem.service.validate(&ctx, &ticket)?;
//! assert_eq!(ctx.current_user_name().as_deref(), Some("andy"));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod admission;
pub mod authenticator;
pub mod authorization;
pub mod cache;
pub mod config;
pub mod context;
pub mod credentials;
pub mod encoding;
pub mod error;
pub mod protector;
pub mod service;
pub mod store;
pub mod sync;
pub mod tenant;
pub mod ticket;
pub mod txn;

pub use admission::{AdmissionPolicy, StaticAdmissionPolicy};
pub use authenticator::{
    AuthenticationCounters, Authenticator, ChainingAuthenticator, RepositoryAuthenticator,
    ValidationMode,
};
pub use authorization::Authorization;
pub use config::AuthConfig;
pub use context::{mask_username, Authentication, SecurityContext};
pub use credentials::{CredentialRecord, CredentialStore};
pub use encoding::{CompositePasswordEncoder, PasswordEncoder};
pub use error::{AuthError, Result};
pub use protector::BruteForceProtector;
pub use service::{AuthenticationService, AuthenticationSubsystem, TenantDomainHint};
pub use store::{MemoryNodeStore, NodeRef, NodeStore, PropertyMap};
pub use sync::{DirectorySync, NoopDirectorySync};
pub use tenant::TenantResolver;
pub use ticket::{ExpiryMode, InMemoryTicketComponent, TicketComponent};
