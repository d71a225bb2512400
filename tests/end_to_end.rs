//! Resolution of a root artifact with its declared dependencies against mock and file
//!  repositories, through the public driver API

mod common;

use std::sync::Arc;

use common::*;
use maven_launcher::{Error, LauncherConfig, ResolutionDriver, ResolutionOutcome};
use maven_launcher::maven::coordinates::Status;
use maven_launcher::vault::EncodedVault;
use wiremock::{Mock, MockServer, ResponseTemplate};
use wiremock::matchers::{method, path};

async fn resolve(config: LauncherConfig, coordinate: &str) -> maven_launcher::Result<ResolutionOutcome> {
    let driver = ResolutionDriver::new(Arc::new(config), Arc::new(EncodedVault::new()))?;
    driver.resolve(coordinate).await
}

fn statuses(outcome: &ResolutionOutcome) -> Vec<(String, Status)> {
    outcome.artifacts.iter()
        .map(|a| (a.coordinate.clone(), a.status))
        .collect()
}

async fn application(server: &MockServer) {
    publish(server, "g/a/1.0/a-1.0.jar", &jar(Some(MAIN_CLASS), &["g:b:2.0"])).await;
    publish(server, "g/b/2.0/b-2.0.jar", &jar(None, &[])).await;
}

#[tokio::test]
async fn test_root_with_dependency() {
    let server = MockServer::start().await;
    application(&server).await;
    let cache = tempfile::tempdir().unwrap();

    let outcome = resolve(config(cache.path(), &repo_url(&server)), "g:a:1.0").await.unwrap();

    assert_eq!(statuses(&outcome), vec![
        ("g:a:1.0:jar".to_string(), Status::Downloaded),
        ("g:b:2.0:jar".to_string(), Status::Downloaded),
    ]);
    assert_eq!(outcome.main_class.as_deref(), Some(MAIN_CLASS));
    assert_eq!(outcome.classpath(), vec![
        cache.path().join("g/a/1.0/a-1.0.jar"),
        cache.path().join("g/b/2.0/b-2.0.jar"),
    ]);

    let summary = &outcome.summary;
    assert_eq!(summary.artifacts, 2);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.updated, 2);
    assert!(summary.requests >= 2);
    assert!(summary.size > 0);
    assert_eq!(summary.size, summary.downloaded);

    for artifact in &outcome.artifacts {
        assert!(artifact.requests >= 2, "{} made {} requests", artifact.coordinate, artifact.requests);
        assert!(artifact.size > 0, "{} has no cached bytes", artifact.coordinate);
        let file = artifact.file.as_ref().unwrap();
        assert_eq!(std::fs::metadata(file).unwrap().len(), artifact.size);
    }
}

#[tokio::test]
async fn test_second_run_uses_cache() {
    let server = MockServer::start().await;
    application(&server).await;
    let cache = tempfile::tempdir().unwrap();

    resolve(config(cache.path(), &repo_url(&server)), "g:a:1.0").await.unwrap();
    let outcome = resolve(config(cache.path(), &repo_url(&server)), "g:a:1.0").await.unwrap();

    assert_eq!(statuses(&outcome), vec![
        ("g:a:1.0:jar".to_string(), Status::Cached),
        ("g:b:2.0:jar".to_string(), Status::Cached),
    ]);
    assert_eq!(outcome.summary.requests, 0);
    assert_eq!(outcome.summary.downloaded, 0);
}

#[tokio::test]
async fn test_missing_dependency_fails_execution() {
    let server = MockServer::start().await;
    publish(&server, "g/a/1.0/a-1.0.jar", &jar(Some(MAIN_CLASS), &["g:missing:1.0"])).await;
    let cache = tempfile::tempdir().unwrap();

    let config = LauncherConfig {
        execute: true,
        ..config(cache.path(), &repo_url(&server))
    };
    match resolve(config, "g:a:1.0").await {
        Err(Error::ResolutionFailed { errors, warnings }) => {
            assert_eq!(errors, 1);
            assert_eq!(warnings, 0);
        }
        other => panic!("expected ResolutionFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_dependency_without_execution() {
    let server = MockServer::start().await;
    publish(&server, "g/a/1.0/a-1.0.jar", &jar(Some(MAIN_CLASS), &["g:missing:1.0"])).await;
    let cache = tempfile::tempdir().unwrap();

    let outcome = resolve(config(cache.path(), &repo_url(&server)), "g:a:1.0").await.unwrap();

    assert_eq!(statuses(&outcome), vec![
        ("g:a:1.0:jar".to_string(), Status::Downloaded),
        ("g:missing:1.0:jar".to_string(), Status::NotFound),
    ]);
    assert!(outcome.artifacts[1].error.is_some());
    assert_eq!(outcome.classpath().len(), 1);
    assert_eq!(outcome.summary.errors, 1);
    assert!(outcome.summary.is_failure());
}

#[tokio::test]
async fn test_missing_dependency_without_fail_on_error() {
    let server = MockServer::start().await;
    publish(&server, "g/a/1.0/a-1.0.jar", &jar(Some(MAIN_CLASS), &["g:missing:1.0"])).await;
    let cache = tempfile::tempdir().unwrap();

    let config = LauncherConfig {
        execute: true,
        fail_on_error: false,
        ..config(cache.path(), &repo_url(&server))
    };
    let outcome = resolve(config, "g:a:1.0").await.unwrap();
    assert_eq!(outcome.summary.errors, 1);
}

#[tokio::test]
async fn test_offline_with_cache() {
    let server = MockServer::start().await;
    application(&server).await;
    let cache = tempfile::tempdir().unwrap();
    resolve(config(cache.path(), &repo_url(&server)), "g:a:1.0").await.unwrap();
    let requests_before = server.received_requests().await.unwrap().len();

    let config = LauncherConfig {
        offline: true,
        ..config(cache.path(), &repo_url(&server))
    };
    let outcome = resolve(config, "g:a:1.0").await.unwrap();

    assert_eq!(statuses(&outcome), vec![
        ("g:a:1.0:jar".to_string(), Status::Offline),
        ("g:b:2.0:jar".to_string(), Status::Offline),
    ]);
    assert_eq!(outcome.summary.requests, 0);
    assert_eq!(server.received_requests().await.unwrap().len(), requests_before);
}

#[tokio::test]
async fn test_offline_without_cache() {
    let server = MockServer::start().await;
    application(&server).await;
    let cache = tempfile::tempdir().unwrap();

    let config = LauncherConfig {
        offline: true,
        ..config(cache.path(), &repo_url(&server))
    };
    let outcome = resolve(config, "g:a:1.0").await.unwrap();

    assert_eq!(statuses(&outcome), vec![("g:a:1.0:jar".to_string(), Status::NotFound)]);
    assert_eq!(outcome.main_class, None);
    assert_eq!(outcome.summary.requests, 0);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_checksum_mismatch() {
    let server = MockServer::start().await;
    let content = jar(Some(MAIN_CLASS), &[]);
    publish_with_sha1(&server, "g/a/1.0/a-1.0.jar", &content, &sha1_hex(b"something else")).await;
    let cache = tempfile::tempdir().unwrap();

    let outcome = resolve(config(cache.path(), &repo_url(&server)), "g:a:1.0").await.unwrap();
    assert_eq!(statuses(&outcome), vec![("g:a:1.0:jar".to_string(), Status::Invalid)]);
    assert!(outcome.classpath().is_empty());
    assert!(!cache.path().join("g/a/1.0/a-1.0.jar").exists());

    let config = LauncherConfig {
        execute: true,
        ..config(cache.path(), &repo_url(&server))
    };
    assert!(matches!(resolve(config, "g:a:1.0").await, Err(Error::ResolutionFailed { errors: 1, .. })));
}

#[tokio::test]
async fn test_file_repository() {
    let repo = tempfile::tempdir().unwrap();
    publish_to_dir(repo.path(), "g/a/1.0/a-1.0.jar", &jar(Some(MAIN_CLASS), &["g:b:2.0"]));
    publish_to_dir(repo.path(), "g/b/2.0/b-2.0.jar", &jar(None, &[]));
    let cache = tempfile::tempdir().unwrap();

    let config = config(cache.path(), &format!("file://{}", repo.path().display()));
    let outcome = resolve(config, "g:a:1.0").await.unwrap();

    assert_eq!(statuses(&outcome), vec![
        ("g:a:1.0:jar".to_string(), Status::Downloaded),
        ("g:b:2.0:jar".to_string(), Status::Downloaded),
    ]);
    assert_eq!(outcome.main_class.as_deref(), Some(MAIN_CLASS));
}

#[tokio::test]
async fn test_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repo/g/s/1.0-SNAPSHOT/maven-metadata.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>g</groupId>
  <artifactId>s</artifactId>
  <version>1.0-SNAPSHOT</version>
  <versioning>
    <snapshot>
      <timestamp>20240131.123456</timestamp>
      <buildNumber>7</buildNumber>
    </snapshot>
    <lastUpdated>20240131123456</lastUpdated>
  </versioning>
</metadata>"#))
        .mount(&server)
        .await;
    publish(&server, "g/s/1.0-SNAPSHOT/s-1.0-20240131.123456-7.jar", &jar(Some(MAIN_CLASS), &[])).await;
    let cache = tempfile::tempdir().unwrap();

    let outcome = resolve(config(cache.path(), &repo_url(&server)), "g:s:1.0-SNAPSHOT").await.unwrap();

    assert_eq!(outcome.artifacts.len(), 1);
    assert_eq!(outcome.artifacts[0].status, Status::Downloaded);
    assert_eq!(outcome.classpath(), vec![cache.path().join("g/s/1.0-SNAPSHOT/s-1.0-20240131.123456-7.jar")]);
}

#[tokio::test]
async fn test_delegate() {
    let server = MockServer::start().await;
    application(&server).await;
    let cache = tempfile::tempdir().unwrap();

    let config = LauncherConfig {
        delegate: true,
        ..config(cache.path(), &repo_url(&server))
    };
    let outcome = resolve(config, "g:a:1.0").await.unwrap();

    assert_eq!(statuses(&outcome), vec![("g:a:1.0:jar".to_string(), Status::Downloaded)]);
    assert_eq!(outcome.main_class.as_deref(), Some(MAIN_CLASS));
    assert!(!cache.path().join("g/b/2.0/b-2.0.jar").exists());
}

#[tokio::test]
async fn test_explicit_main_class() {
    let server = MockServer::start().await;
    application(&server).await;
    let cache = tempfile::tempdir().unwrap();

    let outcome = resolve(config(cache.path(), &repo_url(&server)), "g:a:1.0:jar::com.example.Other").await.unwrap();
    assert_eq!(outcome.main_class.as_deref(), Some("com.example.Other"));
    assert_eq!(outcome.artifacts.len(), 2);
}

#[tokio::test]
async fn test_local_file_as_root() {
    let server = MockServer::start().await;
    publish(&server, "g/b/2.0/b-2.0.jar", &jar(None, &[])).await;
    let work = tempfile::tempdir().unwrap();
    let local = work.path().join("app.jar");
    std::fs::write(&local, jar(Some(MAIN_CLASS), &["g:b:2.0"])).unwrap();

    let outcome = resolve(config(&work.path().join("cache"), &repo_url(&server)), local.to_str().unwrap()).await.unwrap();

    assert_eq!(outcome.artifacts[0].status, Status::Offline);
    assert_eq!(outcome.artifacts[0].file.as_ref(), Some(&local));
    assert_eq!(outcome.artifacts[1].status, Status::Downloaded);
    assert_eq!(outcome.main_class.as_deref(), Some(MAIN_CLASS));
}

#[tokio::test]
async fn test_malformed_coordinate() {
    let cache = tempfile::tempdir().unwrap();
    let result = resolve(config(cache.path(), "https://repo.example.com/maven2"), "not:a").await;
    assert!(matches!(result, Err(Error::MalformedCoordinate(_))));
}
