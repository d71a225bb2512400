//! Launcher configuration
//!
//! A single value object, loaded once per invocation and passed explicitly to every component.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::repo::descriptor::RepositoryDescriptor;
use crate::util::retry::RetryPolicy;

pub const RESOLVERS_RANGE: (usize, usize) = (1, 10);
pub const DOWNLOADERS_RANGE: (usize, usize) = (1, 3);
/// 365 days
pub const MAX_UPDATE_INTERVAL_MINUTES: u64 = 365 * 24 * 60;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Local artifact cache (default: "$HOME/.m2-launcher/cache")
    #[serde(default = "default_cache")]
    pub cache: PathBuf,

    /// Repositories in priority order (default: Maven Central)
    #[serde(default = "default_repositories")]
    pub repositories: Vec<RepositoryDescriptor>,

    /// Never contact a repository; artifacts missing from the cache end up `NotFound`
    #[serde(default)]
    pub offline: bool,

    /// Verify downloads against the SHA1 advertised by the repository (default: true)
    #[serde(default = "default_true")]
    pub verify: bool,

    /// Ignore cached files and download everything again
    #[serde(default)]
    pub ignore_cache: bool,

    /// Refuse to execute an application with missing or invalid artifacts (default: true)
    #[serde(default = "default_true")]
    pub fail_on_error: bool,

    /// Check cached releases for remote changes (default: false, releases are immutable)
    #[serde(default)]
    pub update_releases: bool,

    /// Check for newer snapshot builds (default: true)
    #[serde(default = "default_true")]
    pub update_snapshots: bool,

    /// Execute the application after resolution (default: true)
    #[serde(default = "default_true")]
    pub execute: bool,

    /// Shortcut forcing a full update, see [`LauncherConfig::effective`]
    #[serde(default)]
    pub update: bool,

    /// A successful update check stays valid this long; within the interval the launcher behaves
    ///  as if offline for artifacts it has cached (default: 1440 = 1 day)
    #[serde(default = "default_update_interval_minutes")]
    pub update_interval_minutes: u64,

    /// Resolve, but do not download artifacts that are not cached yet
    #[serde(default)]
    pub skip_download: bool,

    /// Run the main artifact as a plain jar, ignoring the dependencies declared in its manifest
    #[serde(default)]
    pub delegate: bool,

    #[serde(default)]
    pub debug: bool,

    /// Suppress everything except errors
    #[serde(default)]
    pub quiet: bool,

    /// Size of the metadata resolution pool (default: 5, range 1-10)
    #[serde(default = "default_resolvers")]
    pub resolvers: usize,

    /// Size of the download pool (default: 3, range 1-3)
    #[serde(default = "default_downloaders")]
    pub downloaders: usize,

    /// Retries after a transient repository failure (default: 3)
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Timeout of a single repository request (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            cache: default_cache(),
            repositories: default_repositories(),
            offline: false,
            verify: true,
            ignore_cache: false,
            fail_on_error: true,
            update_releases: false,
            update_snapshots: true,
            execute: true,
            update: false,
            update_interval_minutes: default_update_interval_minutes(),
            skip_download: false,
            delegate: false,
            debug: false,
            quiet: false,
            resolvers: default_resolvers(),
            downloaders: default_downloaders(),
            retries: default_retries(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LauncherConfig {
    /// "$HOME/.m2-launcher/launcher.json", used when no configuration file is given explicitly
    pub fn default_path() -> PathBuf {
        home().join("launcher.json")
    }

    /// Loads a JSON configuration file; absent keys take their defaults
    pub fn from_file(path: &Path) -> Result<LauncherConfig> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e), "config"))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<LauncherConfig> {
        Ok(serde_json::from_str(text)?)
    }

    /// Clamps out-of-range values (with a warning) and applies the `update` shortcut. Values are
    ///  never rejected.
    pub fn effective(mut self) -> LauncherConfig {
        self.resolvers = clamp("resolvers", self.resolvers, RESOLVERS_RANGE.0, RESOLVERS_RANGE.1);
        self.downloaders = clamp("downloaders", self.downloaders, DOWNLOADERS_RANGE.0, DOWNLOADERS_RANGE.1);
        self.update_interval_minutes = clamp("update_interval_minutes", self.update_interval_minutes, 0, MAX_UPDATE_INTERVAL_MINUTES);

        if self.update {
            self.update_releases = true;
            self.update_snapshots = true;
            self.update_interval_minutes = 0;
            self.offline = false;
        }
        self
    }

    /// Rejects configurations that cannot work at all
    pub fn validate(&self) -> Result<()> {
        if self.repositories.is_empty() && !self.offline {
            return Err(Error::config("no repositories configured", "repositories"));
        }
        for repository in &self.repositories {
            if repository.id.trim().is_empty() {
                return Err(Error::config(format!("repository without id: {}", repository.url), "repositories"));
            }
        }
        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_minutes * 60)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms.max(self.retry_initial_delay_ms)),
        }
    }
}

fn clamp<T: Ord + Copy + std::fmt::Display>(name: &str, actual: T, min: T, max: T) -> T {
    let adjusted = actual.max(min).min(max);
    if adjusted != actual {
        warn!("Adjusting invalid or out of range configuration value: {}={} (was: {})", name, adjusted, actual);
    }
    adjusted
}

fn default_true() -> bool {
    true
}

/// "$HOME/.m2-launcher", the root of everything the launcher keeps per user
fn home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".m2-launcher")
}

fn default_cache() -> PathBuf {
    home().join("cache")
}

fn default_repositories() -> Vec<RepositoryDescriptor> {
    vec![RepositoryDescriptor::new("central", "https://repo1.maven.org/maven2")]
}

fn default_update_interval_minutes() -> u64 {
    24 * 60
}

fn default_resolvers() -> usize {
    5
}

fn default_downloaders() -> usize {
    3
}

fn default_retries() -> u32 {
    3
}

fn default_retry_initial_delay_ms() -> u64 {
    200
}

fn default_retry_max_delay_ms() -> u64 {
    5000
}

fn default_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod test {
    use rstest::*;
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LauncherConfig::default();
        assert!(config.verify);
        assert!(config.fail_on_error);
        assert!(config.execute);
        assert!(config.update_snapshots);
        assert!(!config.update_releases);
        assert!(!config.offline);
        assert_eq!(config.update_interval(), Duration::from_secs(86400));
        assert_eq!(config.repositories.len(), 1);
        assert_eq!(config.repositories[0].id, "central");
        assert!(config.cache.ends_with(".m2-launcher/cache"));
        assert!(LauncherConfig::default_path().ends_with(".m2-launcher/launcher.json"));
    }

    #[test]
    fn test_json_fills_in_defaults() {
        let config = LauncherConfig::from_json(r#"{
            "offline": true,
            "downloaders": 2,
            "repositories": [
                {"id": "internal", "url": "https://repo.example.com/maven", "username": "deployer", "password": "c2VjcmV0"}
            ]
        }"#).unwrap();

        assert!(config.offline);
        assert_eq!(config.downloaders, 2);
        assert_eq!(config.resolvers, 5);
        assert!(config.verify);
        assert_eq!(config.repositories[0].username.as_deref(), Some("deployer"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(LauncherConfig::from_json("{\"offline\": \"maybe\"}"), Err(Error::Serialization(_))));
    }

    #[rstest]
    #[case::in_range(4, 2, 60, 4, 2, 60)]
    #[case::too_small(0, 0, 0, 1, 1, 0)]
    #[case::too_large(50, 10, 10_000_000, 10, 3, MAX_UPDATE_INTERVAL_MINUTES)]
    fn test_clamping(
        #[case] resolvers: usize,
        #[case] downloaders: usize,
        #[case] interval: u64,
        #[case] expected_resolvers: usize,
        #[case] expected_downloaders: usize,
        #[case] expected_interval: u64,
    ) {
        let config = LauncherConfig {
            resolvers,
            downloaders,
            update_interval_minutes: interval,
            ..Default::default()
        }.effective();

        assert_eq!(config.resolvers, expected_resolvers);
        assert_eq!(config.downloaders, expected_downloaders);
        assert_eq!(config.update_interval_minutes, expected_interval);
    }

    #[test]
    fn test_update_shortcut() {
        let config = LauncherConfig {
            update: true,
            offline: true,
            update_snapshots: false,
            ..Default::default()
        }.effective();

        assert!(config.update_releases);
        assert!(config.update_snapshots);
        assert!(!config.offline);
        assert_eq!(config.update_interval(), Duration::ZERO);
    }

    #[test]
    fn test_validate() {
        assert!(LauncherConfig::default().validate().is_ok());

        let no_repositories = LauncherConfig {
            repositories: vec![],
            ..Default::default()
        };
        assert!(matches!(no_repositories.validate(), Err(Error::Config { .. })));

        let offline = LauncherConfig {
            repositories: vec![],
            offline: true,
            ..Default::default()
        };
        assert!(offline.validate().is_ok());
    }

    #[test]
    fn test_retry_policy() {
        let config = LauncherConfig {
            retries: 1,
            retry_initial_delay_ms: 500,
            retry_max_delay_ms: 100,
            ..Default::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.retries, 1);
        assert_eq!(policy.max_delay, Duration::from_millis(500));
    }
}
