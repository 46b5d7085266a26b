//! Explicit transactions with retry-on-conflict.
//!
//! Storage access runs inside a [`Txn`] handed out by
//! [`RetryingTransactionHelper::do_in_transaction`]. Reads default to
//! read-only transactions; a component that discovers it must write while the
//! ambient transaction is read-only escalates by running the write in a new
//! writable transaction. Completion hooks registered on the transaction fire
//! exactly once when it resolves, with the commit/rollback outcome.

use parking_lot::Mutex;
use tracing::debug;

use crate::error::Result;

const DEFAULT_MAX_ATTEMPTS: u32 = 20;

type CompletionHook = Box<dyn FnOnce(bool) + Send>;

/// A single transaction attempt.
pub struct Txn {
    read_only: bool,
    hooks: Mutex<Vec<CompletionHook>>,
}

impl Txn {
    fn new(read_only: bool) -> Self {
        Self {
            read_only,
            hooks: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Register a hook to run when the transaction resolves. The argument is
    /// `true` on commit, `false` on rollback.
    pub fn on_completion(&self, hook: impl FnOnce(bool) + Send + 'static) {
        self.hooks.lock().push(Box::new(hook));
    }

    fn complete(&self, committed: bool) {
        let hooks = std::mem::take(&mut *self.hooks.lock());
        for hook in hooks {
            hook(committed);
        }
    }
}

/// Runs work in a transaction, retrying on optimistic-concurrency conflicts.
#[derive(Clone, Debug)]
pub struct RetryingTransactionHelper {
    max_attempts: u32,
}

impl Default for RetryingTransactionHelper {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryingTransactionHelper {
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Run `work` in a fresh transaction, retrying while it fails with a
    /// retryable error. Completion hooks fire after every attempt, with
    /// `committed = true` only for a successful final attempt.
    pub fn do_in_transaction<R>(
        &self,
        read_only: bool,
        mut work: impl FnMut(&Txn) -> Result<R>,
    ) -> Result<R> {
        let mut attempt = 1;
        loop {
            let txn = Txn::new(read_only);
            match work(&txn) {
                Ok(value) => {
                    txn.complete(true);
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    txn.complete(false);
                    debug!(attempt, "retrying transaction after conflict: {err}");
                    attempt += 1;
                }
                Err(err) => {
                    txn.complete(false);
                    return Err(err);
                }
            }
        }
    }
}
