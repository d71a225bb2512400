//! Shared fixtures for the end-to-end resolution tests: jar archives with a manifest, a mock
//!  repository serving them, and a configuration pointing at both

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;

use maven_launcher::LauncherConfig;
use maven_launcher::repo::RepositoryDescriptor;
use sha1::{Digest, Sha1};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wiremock::matchers::{method, path};

pub const MAIN_CLASS: &str = "com.example.Main";

pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

/// A jar with a manifest declaring `main_class` and `dependencies`
pub fn jar(main_class: Option<&str>, dependencies: &[&str]) -> Vec<u8> {
    let mut manifest = String::from("Manifest-Version: 1.0\r\n");
    if let Some(main_class) = main_class {
        manifest.push_str(&format!("Main-Class: {}\r\n", main_class));
    }
    if !dependencies.is_empty() {
        manifest.push_str(&format!("Maven-Dependencies: {}\r\n", dependencies.join(",")));
    }
    manifest.push_str("\r\n");

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    writer.start_file("META-INF/MANIFEST.MF", options).unwrap();
    writer.write_all(manifest.as_bytes()).unwrap();
    writer.start_file("com/example/Main.class", options).unwrap();
    writer.write_all(&[0xca, 0xfe, 0xba, 0xbe]).unwrap();
    writer.finish().unwrap().into_inner()
}

pub fn repo_url(server: &MockServer) -> String {
    format!("{}/repo", server.uri())
}

/// Serves `content` under the repository path `file_path` (e.g. "g/a/1.0/a-1.0.jar"), together
///  with its SHA1 checksum file
pub async fn publish(server: &MockServer, file_path: &str, content: &[u8]) {
    publish_with_sha1(server, file_path, content, &sha1_hex(content)).await;
}

pub async fn publish_with_sha1(server: &MockServer, file_path: &str, content: &[u8], sha1: &str) {
    let full_path = format!("/repo/{}", file_path);
    Mock::given(method("HEAD"))
        .and(path(full_path.as_str()))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(full_path.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}.sha1", full_path)))
        .respond_with(ResponseTemplate::new(200).set_body_string(sha1))
        .mount(server)
        .await;
}

/// Writes `content` and its checksum file into a directory with repository layout
pub fn publish_to_dir(repo: &Path, file_path: &str, content: &[u8]) {
    let file = repo.join(file_path);
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(&file, content).unwrap();
    std::fs::write(repo.join(format!("{}.sha1", file_path)), sha1_hex(content)).unwrap();
}

/// Resolution only, fast retries, no progress output
pub fn config(cache: &Path, repository_url: &str) -> LauncherConfig {
    LauncherConfig {
        cache: cache.to_path_buf(),
        repositories: vec![RepositoryDescriptor::new("mock", repository_url)],
        execute: false,
        quiet: true,
        retries: 1,
        retry_initial_delay_ms: 1,
        retry_max_delay_ms: 2,
        timeout_secs: 5,
        ..Default::default()
    }
}
