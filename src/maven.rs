//! Maven artifact model: coordinates, repository paths, snapshot metadata and archive manifests

pub mod coordinates;
pub mod manifest;
pub mod metadata_xml;
pub mod paths;

pub use coordinates::{Artifact, ArtifactIdentity, MavenArtifactRef, MavenClassifier, MavenVersion, ResolutionState, Status};
pub use manifest::{JarManifestReader, Manifest, ManifestReader};
