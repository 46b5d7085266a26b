//! Opaque session tickets.
//!
//! [`TicketComponent`] is the contract the authentication service consumes;
//! [`InMemoryTicketComponent`] is the in-process implementation. Ticket ids
//! are `TICKET_` + random UUID and validation is case-sensitive on the full
//! id. Expired tickets are purged lazily on validation and by
//! [`TicketComponent::invalidate_all`]; there is no background sweeper.

use dashmap::DashMap;
use std::collections::HashSet;
use std::str::FromStr;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};

const TICKET_PREFIX: &str = "TICKET_";

/// How a ticket's lifetime is measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpiryMode {
    /// Expiry is fixed at issue time.
    AfterFixedTime,
    /// Each successful validation extends the ticket by the valid duration.
    AfterInactivity,
    /// Tickets live until explicitly invalidated.
    DoNotExpire,
}

impl FromStr for ExpiryMode {
    type Err = AuthError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "AFTER_FIXED_TIME" => Ok(ExpiryMode::AfterFixedTime),
            "AFTER_INACTIVITY" => Ok(ExpiryMode::AfterInactivity),
            "DO_NOT_EXPIRE" => Ok(ExpiryMode::DoNotExpire),
            _ => Err(AuthError::Config(format!("unknown expiry mode: {value}"))),
        }
    }
}

/// Session-ticket contract consumed by the authentication service.
///
/// Invalidations are idempotent: invalidating an unknown or already-expired
/// ticket is not an error.
pub trait TicketComponent: Send + Sync {
    /// Mint a ticket bound to `username` (or return the user's existing live
    /// ticket when the implementation keeps a single ticket per user).
    fn issue(&self, username: &str) -> Result<String>;

    /// The user's existing live ticket, minting one only if `auto_create`.
    fn current_ticket(&self, username: &str, auto_create: bool) -> Result<Option<String>>;

    /// Resolve a ticket to its username, enforcing expiry.
    fn validate(&self, ticket: &str) -> Result<String>;

    fn invalidate_by_id(&self, ticket: &str);

    /// Unbind the ticket carried by the request context. The ticket itself
    /// stays valid for other holders.
    fn clear_current_ticket(&self, ctx: &crate::context::SecurityContext) {
        ctx.clear_current_ticket();
    }

    /// Invalidate every ticket held by `username`; returns how many.
    fn invalidate_by_user(&self, username: &str) -> usize;

    fn users_with_tickets(&self, non_expired_only: bool) -> HashSet<String>;

    fn count_tickets(&self, non_expired_only: bool) -> usize;

    /// Drop expired tickets, or every ticket when `expired_only` is false;
    /// returns how many were dropped.
    fn invalidate_all(&self, expired_only: bool) -> usize;
}

#[derive(Clone, Debug)]
struct Ticket {
    user_name: String,
    expires_at: Option<Instant>,
}

pub struct InMemoryTicketComponent {
    tickets_expire: bool,
    valid_duration: Duration,
    expiry_mode: ExpiryMode,
    one_off: bool,
    single_ticket_per_user: bool,
    tickets: DashMap<String, Ticket>,
    // Latest ticket id per user, for current_ticket and single-per-user reuse.
    user_tickets: DashMap<String, String>,
}

impl InMemoryTicketComponent {
    #[must_use]
    pub fn new(
        tickets_expire: bool,
        valid_duration: Duration,
        expiry_mode: ExpiryMode,
        one_off: bool,
        single_ticket_per_user: bool,
    ) -> Self {
        Self {
            tickets_expire,
            valid_duration,
            expiry_mode,
            one_off,
            single_ticket_per_user,
            tickets: DashMap::new(),
            user_tickets: DashMap::new(),
        }
    }

    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.tickets_expire(),
            Duration::from_secs(config.ticket_valid_duration_seconds()),
            config.ticket_expiry_mode(),
            config.one_off_tickets(),
            config.single_ticket_per_user(),
        )
    }

    fn expired(&self, ticket: &Ticket) -> bool {
        if !self.tickets_expire || self.expiry_mode == ExpiryMode::DoNotExpire {
            return false;
        }
        ticket
            .expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }

    fn expires_at(&self) -> Option<Instant> {
        if self.tickets_expire && self.expiry_mode != ExpiryMode::DoNotExpire {
            Some(Instant::now() + self.valid_duration)
        } else {
            None
        }
    }

    fn live_ticket_for(&self, username: &str) -> Option<String> {
        let id = self.user_tickets.get(username)?.value().clone();
        // The read guard must be gone before any removal below.
        let live = match self.tickets.get(&id) {
            Some(ticket) => !self.expired(&ticket),
            None => false,
        };
        if live {
            Some(id)
        } else {
            self.tickets.remove(&id);
            self.user_tickets.remove(username);
            None
        }
    }

    fn mint(&self, username: &str) -> String {
        let id = format!("{TICKET_PREFIX}{}", Uuid::new_v4());
        self.tickets.insert(
            id.clone(),
            Ticket {
                user_name: username.to_string(),
                expires_at: self.expires_at(),
            },
        );
        self.user_tickets.insert(username.to_string(), id.clone());
        id
    }
}

impl TicketComponent for InMemoryTicketComponent {
    fn issue(&self, username: &str) -> Result<String> {
        if username.is_empty() {
            return Err(AuthError::InvalidArgument("username is mandatory"));
        }
        if self.single_ticket_per_user {
            if let Some(existing) = self.live_ticket_for(username) {
                return Ok(existing);
            }
        }
        Ok(self.mint(username))
    }

    fn current_ticket(&self, username: &str, auto_create: bool) -> Result<Option<String>> {
        // Only the single-ticket-per-user mode has a shared notion of "the
        // user's current ticket"; otherwise each request context tracks its
        // own and a fresh login mints a fresh ticket.
        if self.single_ticket_per_user {
            if let Some(existing) = self.live_ticket_for(username) {
                return Ok(Some(existing));
            }
        }
        if auto_create {
            return self.issue(username).map(Some);
        }
        Ok(None)
    }

    fn validate(&self, ticket: &str) -> Result<String> {
        let Some(entry) = self.tickets.get(ticket) else {
            return Err(AuthError::InvalidTicket);
        };
        let user_name = entry.user_name.clone();
        let expired = self.expired(&entry);
        drop(entry);

        if expired {
            self.tickets.remove(ticket);
            return Err(AuthError::InvalidTicket);
        }
        if self.one_off {
            // Consumed by its first successful validation.
            self.tickets.remove(ticket);
            return Ok(user_name);
        }
        if self.expiry_mode == ExpiryMode::AfterInactivity {
            if let Some(mut entry) = self.tickets.get_mut(ticket) {
                entry.expires_at = self.expires_at();
            }
        }
        Ok(user_name)
    }

    fn invalidate_by_id(&self, ticket: &str) {
        self.tickets.remove(ticket);
    }

    fn invalidate_by_user(&self, username: &str) -> usize {
        let before = self.tickets.len();
        self.tickets.retain(|_, ticket| ticket.user_name != username);
        self.user_tickets.remove(username);
        before - self.tickets.len()
    }

    fn users_with_tickets(&self, non_expired_only: bool) -> HashSet<String> {
        self.tickets
            .iter()
            .filter(|entry| !non_expired_only || !self.expired(entry.value()))
            .map(|entry| entry.value().user_name.clone())
            .collect()
    }

    fn count_tickets(&self, non_expired_only: bool) -> usize {
        self.tickets
            .iter()
            .filter(|entry| !non_expired_only || !self.expired(entry.value()))
            .count()
    }

    fn invalidate_all(&self, expired_only: bool) -> usize {
        let before = self.tickets.len();
        if expired_only {
            // Dangling username index entries are cleaned up lazily by
            // live_ticket_for.
            self.tickets.retain(|_, ticket| !self.expired(ticket));
        } else {
            self.tickets.clear();
            self.user_tickets.clear();
        }
        before - self.tickets.len()
    }
}
