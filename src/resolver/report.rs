//! Classification and reporting of resolution results

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::SharedError;
use crate::maven::coordinates::{Artifact, Status};

/// What the launcher needs from a resolved artifact
#[derive(Clone, Debug)]
pub struct ResolvedArtifact {
    pub coordinate: String,
    pub file: Option<PathBuf>,
    pub status: Status,
    pub error: Option<SharedError>,
    /// size of the local file
    pub size: u64,
    /// repository requests made for this artifact in this run
    pub requests: u32,
}
impl ResolvedArtifact {
    pub fn of(artifact: &Artifact) -> ResolvedArtifact {
        let state = artifact.state();
        ResolvedArtifact {
            coordinate: artifact.to_string(),
            file: state.file,
            status: state.status,
            error: state.error,
            size: state.size,
            requests: state.requests,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    Success,
    Warning,
    Error,
}

/// Classification of a completed artifact. A status that is not terminal at this point means the
///  artifact was never fully processed, which counts as an error.
pub fn classify(status: Status) -> Classification {
    match status {
        s if s.is_error() => Classification::Error,
        s if s.is_warning() => Classification::Warning,
        Status::Undefined | Status::Resolving | Status::Resolved | Status::Downloading => Classification::Error,
        _ => Classification::Success,
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Summary {
    pub artifacts: usize,
    pub errors: usize,
    pub warnings: usize,
    pub updated: usize,
    /// total size of the artifacts in the cache
    pub size: u64,
    /// bytes transferred in this run
    pub downloaded: u64,
    pub requests: u64,
    pub elapsed: Duration,
}
impl Summary {
    pub fn collect(artifacts: &[Arc<Artifact>], elapsed: Duration) -> Summary {
        let mut result = Summary {
            artifacts: artifacts.len(),
            elapsed,
            ..Default::default()
        };

        for artifact in artifacts {
            let state = artifact.state();
            match classify(state.status) {
                Classification::Error => result.errors += 1,
                Classification::Warning => result.warnings += 1,
                Classification::Success => {}
            }
            if state.status.is_updated() {
                result.updated += 1;
            }
            result.size += state.size;
            result.downloaded += state.downloaded;
            result.requests += state.requests as u64;
        }
        result
    }

    /// Warnings (artifacts that are known but not available locally) make the result unusable
    ///  just like errors do
    pub fn is_failure(&self) -> bool {
        self.errors + self.warnings > 0
    }

    /// downloaded bytes per second
    pub fn throughput(&self) -> u64 {
        let millis = self.elapsed.as_millis().max(1) as u64;
        self.downloaded.saturating_mul(1000) / millis
    }

    pub fn log(&self) {
        let line = format!(
            "{} artifacts, {} ({} downloaded in {} requests, {}/s), {:.1}s, {} warnings, {} errors",
            self.artifacts,
            format_size(self.size),
            format_size(self.downloaded),
            self.requests,
            format_size(self.throughput()),
            self.elapsed.as_secs_f64(),
            self.warnings,
            self.errors,
        );
        if self.is_failure() {
            warn!("{}", line);
        }
        else {
            info!("{}", line);
        }
    }
}

/// One line per artifact; failing artifacts at warning level
pub fn log_artifact(artifact: &Artifact, debug_mode: bool) {
    let state = artifact.state();
    let origin = state.repository_id.as_deref().unwrap_or("-");

    match classify(state.status) {
        Classification::Error | Classification::Warning => {
            match (&state.error, debug_mode) {
                (Some(e), true) => warn!("{:<12} {} ({}): {:?}", format!("{:?}", state.status), artifact, origin, e),
                (Some(e), false) => warn!("{:<12} {} ({}): {}", format!("{:?}", state.status), artifact, origin, e),
                (None, _) => warn!("{:<12} {} ({})", format!("{:?}", state.status), artifact, origin),
            }
        }
        Classification::Success if state.status.is_updated() && !debug_mode => {
            info!("{:<12} {} ({}, {})", format!("{:?}", state.status), artifact, origin, format_size(state.size));
        }
        Classification::Success => {
            debug!("{:<12} {} ({}, {}, {} requests)", format!("{:?}", state.status), artifact, origin, format_size(state.size), state.requests);
        }
    }
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
