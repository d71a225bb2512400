//! Credential vault: repository passwords are configured in encrypted form and decrypted only when
//!  an authenticated request is about to be sent.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::warn;

use crate::repo::descriptor::RepositoryDescriptor;

pub trait Vault: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> String;

    /// the decrypted value, or None if the key is unknown or cannot be decrypted
    fn get_property(&self, key: &str) -> Option<String>;
}

pub fn password_key(repository_id: &str) -> String {
    format!("repository.{}.password", repository_id)
}

/// In-process vault holding base64 encoded values. The actual cipher lives outside the launcher; this
///  only keeps cleartext out of configuration files and log output.
#[derive(Default)]
pub struct EncodedVault {
    properties: HashMap<String, String>,
}
impl EncodedVault {
    pub fn new() -> EncodedVault {
        Default::default()
    }

    /// registers the (encoded) password of every repository that has one
    pub fn for_repositories(repositories: &[RepositoryDescriptor]) -> EncodedVault {
        let mut result = EncodedVault::new();
        for repository in repositories {
            if let Some(password) = &repository.password {
                result.insert(password_key(&repository.id), password.clone());
            }
        }
        result
    }

    pub fn insert(&mut self, key: String, encoded: String) {
        self.properties.insert(key, encoded);
    }
}

impl Vault for EncodedVault {
    fn encrypt(&self, plaintext: &str) -> String {
        STANDARD.encode(plaintext)
    }

    fn get_property(&self, key: &str) -> Option<String> {
        let encoded = self.properties.get(key)?;
        match STANDARD.decode(encoded.trim()).map(String::from_utf8) {
            Ok(Ok(plaintext)) => Some(plaintext),
            _ => {
                // NB: the value itself must not appear in the log
                warn!("cannot decode vault property {}", key);
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_round_trip_through_encrypt() {
        let mut vault = EncodedVault::new();
        let encoded = vault.encrypt("s3cret");
        assert_ne!(encoded, "s3cret");

        vault.insert(password_key("internal"), encoded);
        assert_eq!(vault.get_property("repository.internal.password").as_deref(), Some("s3cret"));
        assert_eq!(vault.get_property("repository.other.password"), None);
    }

    #[test]
    fn test_for_repositories() {
        let mut with_password = RepositoryDescriptor::new("internal", "https://repo.example.com/maven");
        with_password.username = Some("deployer".to_string());
        with_password.password = Some("c2VjcmV0".to_string());
        let without_password = RepositoryDescriptor::new("central", "https://repo1.maven.org/maven2");

        let vault = EncodedVault::for_repositories(&[with_password, without_password]);
        assert_eq!(vault.get_property(&password_key("internal")).as_deref(), Some("secret"));
        assert_eq!(vault.get_property(&password_key("central")), None);
    }

    #[test]
    fn test_undecodable_value() {
        let mut vault = EncodedVault::new();
        vault.insert("k".to_string(), "not base64!".to_string());
        assert_eq!(vault.get_property("k"), None);
    }
}
