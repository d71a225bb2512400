use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result, SharedError};
use crate::maven::paths::{as_maven_path, split_timestamped_version};

pub const DEFAULT_PACKAGING: &str = "jar";

/// Resolution lifecycle of an artifact. Variant names are used verbatim in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Status {
    #[default]
    Undefined,
    Resolving,
    Resolved,
    NotModified,
    Downloadable,
    Downloading,
    Downloaded,
    Updated,
    Cached,
    Offline,
    NotFound,
    Invalid,
}
impl Status {
    pub fn is_error(&self) -> bool {
        matches!(self, Status::NotFound | Status::Invalid)
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Status::Downloadable)
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, Status::Downloaded | Status::Updated)
    }
}

/// logical version, i.e. a snapshot version always ends in '-SNAPSHOT' and never contains a
///  timestamp
#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct MavenVersion(pub String);
impl MavenVersion {
    pub fn is_snapshot(&self) -> bool {
        self.0.ends_with("-SNAPSHOT")
    }

    /// Splits an explicitly timestamped snapshot version ("1.0-20140131.123456-7") into the
    ///  logical version ("1.0-SNAPSHOT") and the timestamped one. Other versions are passed through.
    pub fn normalize(version: &str) -> (MavenVersion, Option<String>) {
        match split_timestamped_version(version) {
            Some(base) => (MavenVersion(format!("{}-SNAPSHOT", base)), Some(version.to_string())),
            None => (MavenVersion(version.to_string()), None),
        }
    }
}

#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct MavenArtifactId(pub String);

#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct MavenGroupId(pub String);

#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct MavenCoordinates {
    pub group_id: MavenGroupId,
    pub artifact_id: MavenArtifactId,
    pub version: MavenVersion,
}

#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub enum MavenClassifier {
    Unclassified,
    Classified(String),
}

#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct MavenArtifactRef {
    pub coordinates: MavenCoordinates,
    pub classifier: MavenClassifier,
    pub packaging: String, // without leading '.', e.g. "jar"
}
impl MavenArtifactRef {
    /// group:artifact:version:packaging[:classifier] with the logical version
    pub fn as_string(&self) -> String {
        self.as_string_with_version(&self.coordinates.version.0)
    }

    fn as_string_with_version(&self, version: &str) -> String {
        let mut result = format!(
            "{}:{}:{}:{}",
            self.coordinates.group_id.0,
            self.coordinates.artifact_id.0,
            version,
            self.packaging,
        );
        if let MavenClassifier::Classified(c) = &self.classifier {
            result.push(':');
            result.push_str(c);
        }
        result
    }
}

/// What an artifact *is*. Equality of artifacts is defined by this alone.
#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub enum ArtifactIdentity {
    Maven(MavenArtifactRef),
    /// a plain local archive given instead of a coordinate; it is never resolved remotely
    LocalFile(PathBuf),
}

/// Mutable resolution-time state. It is written only by the resolver / connector pair that drives
///  the artifact, and read by reporting once the artifact is terminal.
#[derive(Clone, Debug, Default)]
pub struct ResolutionState {
    pub status: Status,
    /// e.g. "1.0-20140131.123456-7" for the logical "1.0-SNAPSHOT"
    pub resolved_snapshot_version: Option<String>,
    pub source: Option<String>,
    pub repository_id: Option<String>,
    pub file: Option<PathBuf>,
    pub error: Option<SharedError>,
    /// size of the cached file
    pub size: u64,
    /// bytes actually transferred from a repository in this run
    pub downloaded: u64,
    pub requests: u32,
    pub attempts: u32,
}

#[derive(Debug)]
pub struct Artifact {
    identity: ArtifactIdentity,
    main_class: Option<String>,
    state: Mutex<ResolutionState>,
}
impl Artifact {
    pub fn new(artifact_ref: MavenArtifactRef, main_class: Option<String>) -> Artifact {
        Artifact {
            identity: ArtifactIdentity::Maven(artifact_ref),
            main_class,
            state: Mutex::new(ResolutionState::default()),
        }
    }

    /// group:artifact:version[:packaging[:classifier[:mainclass]]], falling back to an existing
    ///  local file
    pub fn parse(text: &str) -> Result<Artifact> {
        Self::try_parse(text).ok_or_else(|| Error::MalformedCoordinate(text.to_string()))
    }

    pub fn try_parse(text: &str) -> Option<Artifact> {
        let fields: Vec<&str> = text.split(':').collect();
        let field = |idx: usize| fields.get(idx)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty());

        let (group_id, artifact_id, version) = match (field(0), field(1), field(2)) {
            (Some(g), Some(a), Some(v)) => (g, a, v),
            _ => return Self::local_file(Path::new(text)),
        };

        let (version, resolved_snapshot_version) = MavenVersion::normalize(version);
        let artifact = Artifact::new(
            MavenArtifactRef {
                coordinates: MavenCoordinates {
                    group_id: MavenGroupId(group_id.to_string()),
                    artifact_id: MavenArtifactId(artifact_id.to_string()),
                    version,
                },
                classifier: match field(4) {
                    None => MavenClassifier::Unclassified,
                    Some(c) => MavenClassifier::Classified(c.to_string()),
                },
                packaging: field(3).unwrap_or(DEFAULT_PACKAGING).to_string(),
            },
            field(5).map(|s| s.to_string()),
        );
        artifact.update(|s| s.resolved_snapshot_version = resolved_snapshot_version);
        Some(artifact)
    }

    /// An existing local file, terminal from the start
    pub fn local_file(path: &Path) -> Option<Artifact> {
        if !path.is_file() {
            return None;
        }
        let size = path.metadata().map(|m| m.len()).unwrap_or(0);
        Some(Artifact {
            identity: ArtifactIdentity::LocalFile(path.to_path_buf()),
            main_class: None,
            state: Mutex::new(ResolutionState {
                status: Status::Offline,
                file: Some(path.to_path_buf()),
                size,
                ..Default::default()
            }),
        })
    }

    pub fn identity(&self) -> &ArtifactIdentity {
        &self.identity
    }

    pub fn maven_ref(&self) -> Option<&MavenArtifactRef> {
        match &self.identity {
            ArtifactIdentity::Maven(r) => Some(r),
            ArtifactIdentity::LocalFile(_) => None,
        }
    }

    /// explicitly requested entry point, overrides the manifest
    pub fn main_class(&self) -> Option<&str> {
        self.main_class.as_deref()
    }

    pub fn is_snapshot(&self) -> bool {
        self.maven_ref()
            .map(|r| r.coordinates.version.is_snapshot())
            .unwrap_or(false)
    }

    /// Stable key for ordering and de-duplication; uses the logical version
    pub fn as_string(&self) -> String {
        match &self.identity {
            ArtifactIdentity::Maven(r) => r.as_string(),
            ArtifactIdentity::LocalFile(p) => p.display().to_string(),
        }
    }

    /// Concrete version: the timestamped one for a resolved snapshot, the plain one otherwise
    pub fn resolved_version(&self) -> Option<String> {
        let artifact_ref = self.maven_ref()?;
        Some(self.lock().resolved_snapshot_version.clone()
            .filter(|_| artifact_ref.coordinates.version.is_snapshot())
            .unwrap_or_else(|| artifact_ref.coordinates.version.0.clone()))
    }

    /// Repository-relative path, shared by the local cache and remote requests. For a snapshot
    ///  this is only meaningful after the timestamped version was resolved.
    pub fn canonical_path(&self) -> Option<String> {
        let artifact_ref = self.maven_ref()?;
        let resolved = self.lock().resolved_snapshot_version.clone();
        Some(as_maven_path(artifact_ref, resolved.as_deref()))
    }

    pub fn status(&self) -> Status {
        self.lock().status
    }

    pub fn set_status(&self, status: Status) {
        self.lock().status = status;
    }

    pub fn error(&self) -> Option<SharedError> {
        self.lock().error.clone()
    }

    /// a consistent copy of the current resolution state
    pub fn state(&self) -> ResolutionState {
        self.lock().clone()
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut ResolutionState) -> R) -> R {
        f(&mut self.lock())
    }

    /// records a terminal failure, returning the shared error for propagation
    pub fn fail(&self, status: Status, error: Error) -> SharedError {
        let error: SharedError = match error {
            Error::Shared(e) => e,
            e => e.into(),
        };
        self.update(|s| {
            s.status = status;
            s.error = Some(error.clone());
        });
        error
    }

    pub fn count_request(&self) {
        self.lock().requests += 1;
    }

    fn lock(&self) -> MutexGuard<'_, ResolutionState> {
        // state updates are single assignments, so a poisoned lock still holds consistent data
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for Artifact {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}
impl Eq for Artifact {}

impl Hash for Artifact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state)
    }
}

impl Display for Artifact {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.identity {
            ArtifactIdentity::Maven(r) => {
                let version = self.resolved_version().unwrap_or_else(|| r.coordinates.version.0.clone());
                write!(f, "{}", r.as_string_with_version(&version))
            }
            ArtifactIdentity::LocalFile(p) => write!(f, "{}", p.display()),
        }
    }
}
