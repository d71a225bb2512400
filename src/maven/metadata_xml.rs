#![allow(non_snake_case)]

//! serde model for the parts of maven-metadata.xml needed to resolve snapshot builds, see
//!  https://maven.apache.org/ref/3.9.5/maven-repository-metadata/repository-metadata.html

use serde::Deserialize;

use crate::error::Result;
use crate::maven::coordinates::{MavenArtifactRef, MavenClassifier};

#[derive(Deserialize, Debug, Default)]
pub struct Metadata {
    #[serde(default)]
    pub groupId: Option<String>,
    #[serde(default)]
    pub artifactId: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub versioning: Option<Versioning>,
}

#[derive(Deserialize, Debug, Default)]
pub struct Versioning {
    #[serde(default)]
    pub lastUpdated: Option<String>,
    #[serde(default)]
    pub snapshot: Option<Snapshot>,
    #[serde(default)]
    pub snapshotVersions: Option<SnapshotVersions>,
}

#[derive(Deserialize, Debug, Default)]
pub struct Snapshot {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub buildNumber: Option<u32>,
    #[serde(default)]
    pub localCopy: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
pub struct SnapshotVersions {
    #[serde(default)]
    pub snapshotVersion: Vec<SnapshotVersion>,
}

#[derive(Deserialize, Debug, Default)]
pub struct SnapshotVersion {
    #[serde(default)]
    pub classifier: Option<String>,
    #[serde(default)]
    pub extension: Option<String>,
    pub value: String,
    #[serde(default)]
    pub updated: Option<String>,
}

impl Metadata {
    pub fn parse(xml: &str) -> Result<Metadata> {
        Ok(serde_xml_rs::from_str(xml)?)
    }

    /// The timestamped version of the latest build of the referenced snapshot, or None if the
    ///  metadata does not describe a remotely deployed build (e.g. a locally installed snapshot)
    pub fn resolve_snapshot_version(&self, artifact_ref: &MavenArtifactRef) -> Option<String> {
        let versioning = self.versioning.as_ref()?;

        let wanted_classifier = match &artifact_ref.classifier {
            MavenClassifier::Unclassified => None,
            MavenClassifier::Classified(c) => Some(c.as_str()),
        };

        // per-file entries are authoritative since classifiers may be deployed in separate builds
        let per_file = versioning.snapshotVersions.iter()
            .flat_map(|v| v.snapshotVersion.iter())
            .find(|v| {
                v.extension.as_deref() == Some(artifact_ref.packaging.as_str())
                    && v.classifier.as_deref().filter(|c| !c.is_empty()) == wanted_classifier
            })
            .map(|v| v.value.clone());
        if per_file.is_some() {
            return per_file;
        }

        let snapshot = versioning.snapshot.as_ref()?;
        if snapshot.localCopy == Some(true) {
            return None;
        }
        let timestamp = snapshot.timestamp.as_deref()?;
        let base = artifact_ref.coordinates.version.0.strip_suffix("-SNAPSHOT")?;
        Some(match snapshot.buildNumber {
            Some(n) => format!("{}-{}-{}", base, timestamp, n),
            None => format!("{}-{}", base, timestamp),
        })
    }
}
