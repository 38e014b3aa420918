//! The bundle manifest: files by checksum, packages by name.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::BundleError;

/// Name of the manifest entry appended to every bundle archive.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Manifest schema version.
pub const MANIFEST_VERSION: u32 = 1;

/// Platform tag recorded in new manifests.
pub const PLATFORM_TAG: &str = "podium";

/// Describes the contents of a bundle independently of the archive bytes.
///
/// Maps are ordered so serialized manifests are byte-stable across runs
/// over an unchanged tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub platform: String,
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub packages: BTreeMap<String, Package>,
    #[serde(default)]
    pub files: BTreeMap<String, FileEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub app_mode: String,
}

/// A dependency recorded by runtime inspection, not by the archive walk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repository: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub description: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub checksum: String,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION,
            platform: PLATFORM_TAG.into(),
            metadata: Metadata::default(),
            packages: BTreeMap::new(),
            files: BTreeMap::new(),
        }
    }

    /// Records a file under its POSIX-style relative path.
    pub fn add_file(&mut self, path: impl Into<String>, checksum: impl Into<String>) {
        self.files.insert(
            path.into(),
            FileEntry {
                checksum: checksum.into(),
            },
        );
    }

    /// Records a package resolved by dependency inspection.
    pub fn add_package(&mut self, name: impl Into<String>, package: Package) {
        self.packages.insert(name.into(), package);
    }

    /// The relative paths of all recorded files.
    pub fn filenames(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    pub fn to_json(&self) -> Result<Vec<u8>, BundleError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(data: &[u8]) -> Result<Self, BundleError> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, BundleError> {
        let data = std::fs::read(path).map_err(|e| BundleError::file(path, e))?;
        Self::from_json(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_manifest_has_schema_fields() {
        let m = Manifest::new();
        assert_eq!(m.version, MANIFEST_VERSION);
        assert_eq!(m.platform, PLATFORM_TAG);
        assert!(m.files.is_empty());
    }

    #[test]
    fn json_shape() {
        let mut m = Manifest::new();
        m.metadata.app_mode = "python-streamlit".into();
        m.add_file("app.py", "d41d8cd98f00b204e9800998ecf8427e");
        m.add_package(
            "streamlit",
            Package {
                source: "pip".into(),
                repository: "PyPI".into(),
                description: BTreeMap::new(),
            },
        );

        let json: serde_json::Value = serde_json::from_slice(&m.to_json().unwrap()).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["metadata"]["app_mode"], "python-streamlit");
        assert_eq!(
            json["files"]["app.py"]["checksum"],
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(json["packages"]["streamlit"]["source"], "pip");
    }

    #[test]
    fn roundtrip_preserves_file_order() {
        let mut m = Manifest::new();
        m.add_file("z.txt", "cc");
        m.add_file("a.txt", "aa");
        let parsed = Manifest::from_json(&m.to_json().unwrap()).unwrap();
        assert_eq!(parsed.filenames(), vec!["a.txt", "z.txt"]);
    }
}
