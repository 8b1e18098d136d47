//! Credential index: long-term credential keys for configured users.
//!
//! Built once at startup from the flat `user=pass,user=pass` list and
//! read-only afterwards, so the engine's per-packet authentication
//! callbacks can share it without locking.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use md5::{Digest, Md5};
use regex::Regex;

/// An opaque long-term-credential authentication key.
///
/// The engine feeds this into MESSAGE-INTEGRITY checks; nothing in this
/// crate ever inspects the bytes. `Debug` deliberately redacts them so
/// keys do not leak into logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthKey(Vec<u8>);

impl AsRef<[u8]> for AuthKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthKey({} bytes)", self.0.len())
    }
}

/// Derive the RFC 8489 long-term credential key:
/// `MD5(username ":" realm ":" password)`.
///
/// The derivation is pure: the same triple always yields the same key.
pub fn long_term_auth_key(username: &str, realm: &str, password: &str) -> AuthKey {
    let mut hasher = Md5::new();
    hasher.update(username.as_bytes());
    hasher.update(b":");
    hasher.update(realm.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    AuthKey(hasher.finalize().to_vec())
}

fn user_pair_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\w+)=(\w+)").expect("static pattern"))
}

/// Immutable mapping from username to derived [`AuthKey`].
#[derive(Debug, Clone)]
pub struct CredentialIndex {
    keys: HashMap<String, AuthKey>,
}

impl CredentialIndex {
    /// Build the index from a `user=pass,user=pass` list.
    ///
    /// Entries are extracted with the `(\w+)=(\w+)` pattern; anything
    /// that does not match (`foo=`, `=bar`, stray separators) is
    /// silently dropped rather than failing the build. A repeated
    /// username keeps the last password seen.
    pub fn from_user_list(users: &str, realm: &str) -> Self {
        let mut keys = HashMap::new();
        for caps in user_pair_pattern().captures_iter(users) {
            let username = &caps[1];
            let password = &caps[2];
            keys.insert(
                username.to_string(),
                long_term_auth_key(username, realm, password),
            );
        }
        Self { keys }
    }

    /// Look up the key for a username. `None` means unknown user, which
    /// the caller must treat as an authentication failure.
    pub fn lookup(&self, username: &str) -> Option<&AuthKey> {
        self.keys.get(username)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_derivation_matches_known_md5() {
        let key = long_term_auth_key("user", "realm", "pass");
        assert_eq!(hex::encode(key.as_ref()), "8493fbc53ba582fb4c044c456bdc40eb");

        let key = long_term_auth_key("alice", "turnstile.example", "wonderland");
        assert_eq!(hex::encode(key.as_ref()), "92752ad67b9f99fd49ca58b0d9646490");
    }

    #[test]
    fn key_derivation_is_deterministic() {
        assert_eq!(
            long_term_auth_key("bob", "r", "secret"),
            long_term_auth_key("bob", "r", "secret")
        );
        assert_ne!(
            long_term_auth_key("bob", "r", "secret"),
            long_term_auth_key("bob", "r", "other")
        );
    }

    #[test]
    fn builds_index_from_well_formed_list() {
        let index = CredentialIndex::from_user_list("alice=wonder,bob=builder", "realm");
        assert_eq!(index.len(), 2);
        assert_eq!(
            index.lookup("alice"),
            Some(&long_term_auth_key("alice", "realm", "wonder"))
        );
        assert!(index.lookup("carol").is_none());
    }

    #[test]
    fn malformed_entries_are_dropped_not_fatal() {
        let index = CredentialIndex::from_user_list("foo=,=bar,baz,alice=ok,,", "realm");
        assert_eq!(index.len(), 1);
        assert!(index.lookup("alice").is_some());
        assert!(index.lookup("foo").is_none());
        assert!(index.lookup("baz").is_none());
    }

    #[test]
    fn duplicate_username_keeps_last_password() {
        let index = CredentialIndex::from_user_list("alice=first,alice=second", "realm");
        assert_eq!(index.len(), 1);
        assert_eq!(
            index.lookup("alice"),
            Some(&long_term_auth_key("alice", "realm", "second"))
        );
    }

    #[test]
    fn empty_list_yields_empty_index() {
        let index = CredentialIndex::from_user_list("", "realm");
        assert!(index.is_empty());
        assert!(index.lookup("anyone").is_none());
    }
}
