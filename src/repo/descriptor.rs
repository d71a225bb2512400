use std::fmt::{Debug, Formatter};

use hyper::Uri;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A configured repository. The password is kept in its encrypted form, see [`crate::vault::Vault`].
#[derive(Clone, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}
impl RepositoryDescriptor {
    pub fn new(id: &str, url: &str) -> RepositoryDescriptor {
        RepositoryDescriptor {
            id: id.to_string(),
            url: url.to_string(),
            username: None,
            password: None,
        }
    }

    /// Parses "id=url" as given on the command line; a bare URL gets its host as id
    pub fn parse(text: &str) -> Result<RepositoryDescriptor> {
        let (id, url) = match text.split_once('=') {
            Some((id, url)) => (id.trim().to_string(), url.trim().to_string()),
            None => {
                let host = Uri::try_from(text.trim())?
                    .host()
                    .map(|h| h.to_string())
                    .ok_or_else(|| Error::config(format!("repository URL without host: {}", text), "repository"))?;
                (host, text.trim().to_string())
            }
        };
        if id.is_empty() || url.is_empty() {
            return Err(Error::config(format!("invalid repository: {:?}, expected id=url", text), "repository"));
        }
        Ok(RepositoryDescriptor::new(&id, &url))
    }

    pub fn is_local(&self) -> bool {
        self.url.starts_with("file:")
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some()
    }
}

impl Debug for RepositoryDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryDescriptor")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .finish()
    }
}

/// Ordered list of repositories, consulted in priority order
#[derive(Debug, Clone)]
pub struct RepositoryRegistry {
    repositories: Vec<RepositoryDescriptor>, // base URLs with trailing '/'
}
impl RepositoryRegistry {
    pub fn new(repositories: &[RepositoryDescriptor]) -> Result<RepositoryRegistry> {
        let mut result = Vec::with_capacity(repositories.len());
        for repository in repositories {
            if result.iter().any(|r: &RepositoryDescriptor| r.id == repository.id) {
                return Err(Error::config(format!("duplicate repository id {}", repository.id), "repositories"));
            }

            let mut repository = repository.clone();
            if !repository.url.ends_with('/') {
                repository.url.push('/');
            }

            // check that the base URI is valid
            if !repository.is_local() {
                Uri::try_from(repository.url.as_str())?;
            }
            result.push(repository);
        }

        Ok(RepositoryRegistry {
            repositories: result,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&RepositoryDescriptor> {
        self.repositories.iter()
            .find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RepositoryDescriptor> {
        self.repositories.iter()
    }

    /// All repositories in priority order, except that `preferred` (typically the repository an
    ///  artifact was resolved from) goes first.
    pub fn ordered(&self, preferred: Option<&str>) -> Vec<&RepositoryDescriptor> {
        let mut result: Vec<&RepositoryDescriptor> = self.repositories.iter().collect();
        if let Some(preferred) = preferred {
            if let Some(idx) = result.iter().position(|r| r.id == preferred) {
                let repository = result.remove(idx);
                result.insert(0, repository);
            }
        }
        result
    }
}

#[cfg(test)]
mod test {
    use rstest::*;
    use super::*;

    fn registry() -> RepositoryRegistry {
        RepositoryRegistry::new(&[
            RepositoryDescriptor::new("central", "https://repo1.maven.org/maven2"),
            RepositoryDescriptor::new("internal", "https://repo.example.com/maven/"),
            RepositoryDescriptor::new("local", "file:///var/cache/maven"),
        ]).unwrap()
    }

    #[test]
    fn test_trailing_slash() {
        let registry = registry();
        assert_eq!(registry.get("central").unwrap().url, "https://repo1.maven.org/maven2/");
        assert_eq!(registry.get("internal").unwrap().url, "https://repo.example.com/maven/");
        assert!(registry.get("local").unwrap().is_local());
    }

    #[rstest]
    #[case::no_preference(None, vec!["central", "internal", "local"])]
    #[case::preferred_second(Some("internal"), vec!["internal", "central", "local"])]
    #[case::preferred_first(Some("central"), vec!["central", "internal", "local"])]
    #[case::unknown(Some("other"), vec!["central", "internal", "local"])]
    fn test_ordered(#[case] preferred: Option<&str>, #[case] expected: Vec<&str>) {
        let registry = registry();
        let ids: Vec<&str> = registry.ordered(preferred)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_invalid() {
        assert!(RepositoryRegistry::new(&[RepositoryDescriptor::new("bad", "https://exa mple.com")]).is_err());
        assert!(RepositoryRegistry::new(&[
            RepositoryDescriptor::new("a", "https://example.com"),
            RepositoryDescriptor::new("a", "https://example.org"),
        ]).is_err());
    }

    #[rstest]
    #[case::with_id("internal=https://repo.example.com/maven", "internal", "https://repo.example.com/maven")]
    #[case::bare_url("https://repo.example.com/maven", "repo.example.com", "https://repo.example.com/maven")]
    fn test_parse(#[case] text: &str, #[case] id: &str, #[case] url: &str) {
        let repository = RepositoryDescriptor::parse(text).unwrap();
        assert_eq!(repository.id, id);
        assert_eq!(repository.url, url);
    }

    #[test]
    fn test_debug_masks_password() {
        let mut repository = RepositoryDescriptor::new("internal", "https://repo.example.com");
        repository.username = Some("deployer".to_string());
        repository.password = Some("c2VjcmV0".to_string());

        let debug = format!("{:?}", repository);
        assert!(debug.contains("deployer"));
        assert!(debug.contains("****"));
        assert!(!debug.contains("c2VjcmV0"));
    }
}
