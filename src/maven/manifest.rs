use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};

pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";
pub const MAIN_CLASS: &str = "Main-Class";
/// comma / whitespace delimited list of coordinates the application needs at runtime
pub const MAVEN_DEPENDENCIES: &str = "Maven-Dependencies";

/// main attributes of an archive's manifest
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Manifest {
    attributes: HashMap<String, String>,
}
impl Manifest {
    /// Parses the main section of a manifest: "Name: value" lines, a line starting with a single
    ///  space continues the previous value, the first empty line ends the section
    pub fn parse(text: &str) -> Manifest {
        let mut attributes = HashMap::new();
        let mut current: Option<(String, String)> = None;

        for line in text.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }
            if let Some(continuation) = line.strip_prefix(' ') {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(continuation);
                }
                continue;
            }
            if let Some((name, value)) = current.take() {
                attributes.insert(name, value);
            }
            if let Some((name, value)) = line.split_once(':') {
                current = Some((name.trim().to_string(), value.trim_start().to_string()));
            }
        }
        if let Some((name, value)) = current {
            attributes.insert(name, value);
        }

        Manifest { attributes }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name)
            .map(|s| s.as_str())
    }

    pub fn main_class(&self) -> Option<&str> {
        self.get(MAIN_CLASS)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// raw entries of the dependency attribute, empty entries skipped
    pub fn dependencies(&self) -> Vec<&str> {
        self.get(MAVEN_DEPENDENCIES)
            .map(|s| s.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .collect())
            .unwrap_or_default()
    }
}

/// reads the manifest of a cached archive
pub trait ManifestReader: Send + Sync {
    /// Ok(None) if the archive has no manifest
    fn read(&self, archive: &Path) -> Result<Option<Manifest>>;
}

pub struct JarManifestReader;

impl ManifestReader for JarManifestReader {
    fn read(&self, archive: &Path) -> Result<Option<Manifest>> {
        let failure = |reason: String| Error::ManifestReadFailure {
            path: archive.to_path_buf(),
            reason,
        };

        let file = File::open(archive)
            .map_err(|e| failure(e.to_string()))?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|e| failure(e.to_string()))?;

        let mut entry = match zip.by_name(MANIFEST_PATH) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(failure(e.to_string())),
        };

        let mut text = String::new();
        entry.read_to_string(&mut text)
            .map_err(|e| failure(e.to_string()))?;
        Ok(Some(Manifest::parse(&text)))
    }
}
