//! Auxiliary launcher commands: credential encryption and configuration snippets

use crate::config::LauncherConfig;
use crate::error::Result;
use crate::repo::descriptor::{RepositoryDescriptor, RepositoryRegistry};
use crate::vault::Vault;

const MASKED: &str = "****";

/// The encrypted value, followed by a `key=value` line ready for a properties style vault
pub fn encrypt(vault: &dyn Vault, key: &str, value: &str) -> String {
    let encrypted = vault.encrypt(value);
    format!("{}\n{}={}", encrypted, key, encrypted)
}

pub fn decrypt(vault: &dyn Vault, key: &str) -> Option<String> {
    vault.get_property(key)
}

/// A repository entry for the `repositories` list of a configuration file, with the password in
///  encrypted form
pub fn repository_entry(
    vault: &dyn Vault,
    id: &str,
    url: &str,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<String> {
    let mut descriptor = RepositoryDescriptor::new(id, url);
    descriptor.username = username.map(|s| s.to_string());
    descriptor.password = password.map(|p| vault.encrypt(p));

    // rejects malformed URLs
    RepositoryRegistry::new(std::slice::from_ref(&descriptor))?;
    Ok(serde_json::to_string_pretty(&descriptor)?)
}

/// The configuration as JSON, passwords masked
pub fn describe_config(config: &LauncherConfig) -> Result<String> {
    let mut config = config.clone();
    for repository in &mut config.repositories {
        if repository.password.is_some() {
            repository.password = Some(MASKED.to_string());
        }
    }
    Ok(serde_json::to_string_pretty(&config)?)
}
