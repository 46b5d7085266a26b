//! Pre-authentication admission policy.

/// Admission checks run before any credential validation: an explicit
/// allow-list and a concurrent-user ceiling. `None` means unrestricted.
pub trait AdmissionPolicy: Send + Sync {
    fn allowed_user_list(&self) -> Option<Vec<String>>;

    fn max_concurrent_users(&self) -> Option<usize>;
}

/// Fixed policy captured at construction.
#[derive(Clone, Debug, Default)]
pub struct StaticAdmissionPolicy {
    allowed_users: Option<Vec<String>>,
    max_users: Option<usize>,
}

impl StaticAdmissionPolicy {
    #[must_use]
    pub fn new(allowed_users: Option<Vec<String>>, max_users: Option<usize>) -> Self {
        Self {
            allowed_users,
            max_users,
        }
    }

    /// No restrictions at all.
    #[must_use]
    pub fn open() -> Self {
        Self::default()
    }
}

impl AdmissionPolicy for StaticAdmissionPolicy {
    fn allowed_user_list(&self) -> Option<Vec<String>> {
        self.allowed_users.clone()
    }

    fn max_concurrent_users(&self) -> Option<usize> {
        self.max_users
    }
}

#[cfg(test)]
mod tests {
    use super::{AdmissionPolicy, StaticAdmissionPolicy};

    #[test]
    fn open_policy_has_no_limits() {
        let policy = StaticAdmissionPolicy::open();
        assert_eq!(policy.allowed_user_list(), None);
        assert_eq!(policy.max_concurrent_users(), None);
    }

    #[test]
    fn static_policy_reports_its_configuration() {
        let policy = StaticAdmissionPolicy::new(Some(vec!["alice".to_string()]), Some(3));
        assert_eq!(policy.allowed_user_list(), Some(vec!["alice".to_string()]));
        assert_eq!(policy.max_concurrent_users(), Some(3));
    }
}
