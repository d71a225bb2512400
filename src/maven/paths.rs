use lazy_static::lazy_static;
use regex::Regex;

use crate::maven::coordinates::*;

lazy_static! {
    // <base>-<yyyyMMdd>.<HHmmss>-<buildNumber>
    static ref TIMESTAMPED_VERSION_REGEX: Regex = Regex::new(r"^(.+)-\d{8}\.\d{6}-\d+$").unwrap();
}

pub const METADATA_FILE_NAME: &str = "maven-metadata.xml";

/// Returns the base version ("1.0") if the version string is an explicitly timestamped snapshot
///  ("1.0-20140131.123456-7")
pub fn split_timestamped_version(version: &str) -> Option<&str> {
    TIMESTAMPED_VERSION_REGEX.captures(version)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// path is relative to the repository root: the directory uses the logical version, the file name
///  uses the resolved (timestamped) version if there is one
pub fn as_maven_path(artifact_ref: &MavenArtifactRef, resolved_snapshot_version: Option<&str>) -> String {
    format!(
        "{}/{}",
        version_directory(artifact_ref),
        maven_file_name(artifact_ref, resolved_snapshot_version),
    )
}

/// path of the snapshot metadata describing the builds of a logical version
pub fn as_metadata_path(artifact_ref: &MavenArtifactRef) -> String {
    format!("{}/{}", version_directory(artifact_ref), METADATA_FILE_NAME)
}

fn version_directory(artifact_ref: &MavenArtifactRef) -> String {
    format!(
        "{}/{}/{}",
        artifact_ref.coordinates.group_id.0.replace('.', "/"),
        artifact_ref.coordinates.artifact_id.0,
        artifact_ref.coordinates.version.0,
    )
}

fn maven_file_name(artifact_ref: &MavenArtifactRef, resolved_snapshot_version: Option<&str>) -> String {
    let classifier_string = match &artifact_ref.classifier {
        MavenClassifier::Unclassified => "".to_string(),
        MavenClassifier::Classified(c) => format!("-{}", c),
    };

    // NB: a resolved version is only meaningful for snapshots, releases always use the plain version
    let version = match resolved_snapshot_version {
        Some(v) if artifact_ref.coordinates.version.is_snapshot() && !v.is_empty() => v,
        _ => artifact_ref.coordinates.version.0.as_str(),
    };

    format!("{}-{}{}.{}",
            artifact_ref.coordinates.artifact_id.0,
            version,
            classifier_string,
            artifact_ref.packaging,
    )
}

#[cfg(test)]
mod test {
    use rstest::*;
    use super::*;

    fn artifact_ref(group_id: &str, artifact_id: &str, version: &str, classifier: Option<&str>, packaging: &str) -> MavenArtifactRef {
        MavenArtifactRef {
            coordinates: MavenCoordinates {
                group_id: MavenGroupId(group_id.to_string()),
                artifact_id: MavenArtifactId(artifact_id.to_string()),
                version: MavenVersion(version.to_string()),
            },
            classifier: match classifier {
                None => MavenClassifier::Unclassified,
                Some(c) => MavenClassifier::Classified(c.to_string()),
            },
            packaging: packaging.to_string(),
        }
    }

    #[rstest]
    #[case::release("g", "a", "1.0.0", None, "jar", None, "g/a/1.0.0/a-1.0.0.jar")]
    #[case::nested_group("org.example.x", "a", "1.0.0", None, "jar", None, "org/example/x/a/1.0.0/a-1.0.0.jar")]
    #[case::classifier("g", "a", "1.0.0", Some("sources"), "jar", None, "g/a/1.0.0/a-1.0.0-sources.jar")]
    #[case::packaging("g", "a", "1.0.0", None, "war", None, "g/a/1.0.0/a-1.0.0.war")]
    #[case::release_ignores_resolved("g", "a", "1.0.0", None, "jar", Some("1.0.0-20240101.101010-1"), "g/a/1.0.0/a-1.0.0.jar")]
    #[case::unresolved_snapshot("g", "a", "1.0-SNAPSHOT", None, "jar", None, "g/a/1.0-SNAPSHOT/a-1.0-SNAPSHOT.jar")]
    #[case::resolved_snapshot("g", "a", "1.0-SNAPSHOT", None, "jar", Some("1.0-20140131.123456-7"), "g/a/1.0-SNAPSHOT/a-1.0-20140131.123456-7.jar")]
    #[case::resolved_snapshot_classifier("g", "a", "1.0-SNAPSHOT", Some("x-y"), "jar", Some("1.0-20140131.123456-7"), "g/a/1.0-SNAPSHOT/a-1.0-20140131.123456-7-x-y.jar")]
    fn test_as_maven_path(
        #[case] group_id: &str,
        #[case] artifact_id: &str,
        #[case] version: &str,
        #[case] classifier: Option<&str>,
        #[case] packaging: &str,
        #[case] resolved: Option<&str>,
        #[case] expected: &str,
    ) {
        let r = artifact_ref(group_id, artifact_id, version, classifier, packaging);
        assert_eq!(as_maven_path(&r, resolved), expected);
    }

    #[test]
    fn test_as_metadata_path() {
        let r = artifact_ref("org.example", "a", "1.0-SNAPSHOT", Some("c"), "jar");
        assert_eq!(as_metadata_path(&r), "org/example/a/1.0-SNAPSHOT/maven-metadata.xml");
    }

    #[rstest]
    #[case::timestamped("1.0-20140131.123456-7", Some("1.0"))]
    #[case::dashed_base("1.0-rc-1-20140131.123456-17", Some("1.0-rc-1"))]
    #[case::logical_snapshot("1.0-SNAPSHOT", None)]
    #[case::release("1.0", None)]
    #[case::missing_build_number("1.0-20140131.123456", None)]
    #[case::short_date("1.0-2014013.123456-7", None)]
    #[case::no_base("-20140131.123456-7", None)]
    fn test_split_timestamped_version(#[case] version: &str, #[case] expected: Option<&str>) {
        assert_eq!(split_timestamped_version(version), expected);
    }
}
