//! Directory-sync provisioning hook.

/// Just-in-time provisioning from an external directory, consulted by
/// `set_current_user` in check-and-fix mode when the user has no local
/// record. Returns `true` when a person was created.
pub trait DirectorySync: Send + Sync {
    fn create_missing_person(&self, username: &str) -> bool;
}

/// Default hook for deployments without directory synchronization.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopDirectorySync;

impl DirectorySync for NoopDirectorySync {
    fn create_missing_person(&self, _username: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::{DirectorySync, NoopDirectorySync};

    #[test]
    fn noop_sync_never_provisions() {
        assert!(!NoopDirectorySync.create_missing_person("andy"));
    }
}
