//! Resource-owner credential checking for the demo login form.

use crate::config::defaults;

/// Holds the single demo account the login form accepts.
#[derive(Clone)]
pub struct CredentialStore {
    username: String,
    password: String,
}

impl CredentialStore {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }

    /// Check a submitted username/password pair.
    #[must_use]
    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(defaults::DEMO_USERNAME, defaults::DEMO_PASSWORD)
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_accepts_demo_account() {
        let store = CredentialStore::default();
        assert!(store.verify(defaults::DEMO_USERNAME, defaults::DEMO_PASSWORD));
    }

    #[test]
    fn test_rejects_wrong_password() {
        let store = CredentialStore::new("alice", "secret");
        assert!(store.verify("alice", "secret"));
        assert!(!store.verify("alice", "wrong"));
        assert!(!store.verify("bob", "secret"));
        assert!(!store.verify("", ""));
    }

    #[test]
    fn test_debug_redacts_password() {
        let store = CredentialStore::new("alice", "secret");
        let rendered = format!("{store:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("secret"));
    }
}
