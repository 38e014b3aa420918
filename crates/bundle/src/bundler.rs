//! Bundle creation: one walk producing a manifest and, optionally, a
//! gzip-compressed tar stream.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use md5::{Digest, Md5};
use tracing::{debug, info};

use crate::manifest::{Manifest, MANIFEST_FILENAME};
use crate::matcher::{MatchSource, PatternSet};
use crate::walker::walk_tree;
use crate::BundleError;

const COPY_BUF_SIZE: usize = 32 * 1024;

/// Builds bundles from a project directory, or re-builds them from a
/// previously saved manifest.
pub struct Bundler {
    base: PathBuf,
    manifest: Manifest,
    patterns: PatternSet,
    from_manifest: bool,
}

impl Bundler {
    /// A bundler that walks the live directory tree. `ignores` are
    /// caller-supplied patterns layered over the built-in defaults;
    /// ignore files discovered during the walk add more.
    pub fn from_directory(dir: &Path, ignores: &[&str]) -> Result<Self, BundleError> {
        let base = fs::canonicalize(dir).map_err(|e| BundleError::file(dir, e))?;
        let mut patterns = PatternSet::with_defaults()?;
        for glob in ignores {
            patterns.add(glob, MatchSource::Caller)?;
        }
        Ok(Self {
            base,
            manifest: Manifest::new(),
            patterns,
            from_manifest: false,
        })
    }

    /// A bundler that walks only the files listed in a saved manifest,
    /// restoring a bundle from prior state instead of the live tree.
    pub fn from_manifest(manifest_path: &Path) -> Result<Self, BundleError> {
        let manifest = Manifest::from_file(manifest_path)?;
        let dir = manifest_path.parent().unwrap_or(Path::new("."));
        let base = fs::canonicalize(dir).map_err(|e| BundleError::file(dir, e))?;
        Ok(Self {
            base,
            manifest,
            patterns: PatternSet::new(),
            from_manifest: true,
        })
    }

    /// Sets the app mode recorded in the manifest metadata.
    pub fn with_app_mode(mut self, app_mode: impl Into<String>) -> Self {
        self.manifest.metadata.app_mode = app_mode.into();
        self
    }

    /// Records packages resolved by dependency inspection. The archive
    /// walk never touches these; they ride along in the manifest.
    pub fn with_packages(
        mut self,
        packages: impl IntoIterator<Item = (String, crate::Package)>,
    ) -> Self {
        self.manifest.packages.extend(packages);
        self
    }

    /// Dry run: walk and hash without producing archive bytes.
    pub fn create_manifest(&self) -> Result<Manifest, BundleError> {
        info!(dir = %self.base.display(), "creating manifest from directory");
        self.make_bundle(None::<&mut Vec<u8>>)
    }

    /// Walks, hashes, and streams a tar+gzip bundle into `dest`. The
    /// returned manifest is also appended to the archive as its final
    /// entry.
    pub fn create_bundle<W: Write>(&self, dest: W) -> Result<Manifest, BundleError> {
        info!(dir = %self.base.display(), "creating bundle from directory");
        self.make_bundle(Some(dest))
    }

    fn make_bundle<W: Write>(&self, dest: Option<W>) -> Result<Manifest, BundleError> {
        let mut manifest = self.manifest.clone();
        let listed = manifest.filenames();
        manifest.files.clear();

        let mut archive = match dest {
            Some(w) => Some(tar::Builder::new(GzEncoder::new(w, Compression::default()))),
            None => None,
        };

        let mut num_files: u64 = 0;
        let mut total_size: u64 = 0;
        {
            let mut visit = |rel: &str, path: &Path, meta: &fs::Metadata| {
                if meta.is_dir() {
                    if let Some(archive) = archive.as_mut() {
                        append_dir(archive, rel)?;
                    }
                } else {
                    debug!(path = rel, size = meta.len(), "adding file");
                    let checksum = append_file(archive.as_mut(), rel, path, meta)?;
                    manifest.add_file(rel, checksum);
                    num_files += 1;
                    total_size += meta.len();
                }
                Ok(())
            };

            if self.from_manifest {
                self.walk_listed(&listed, &mut visit)?;
            } else {
                let mut patterns = self.patterns.clone();
                walk_tree(&self.base, &mut patterns, &mut visit)?;
            }
        }

        if let Some(mut archive) = archive {
            append_manifest(&mut archive, &manifest)?;
            let gz = archive.into_inner()?;
            gz.finish()?;
        }
        info!(files = num_files, total_bytes = total_size, "bundle created");
        Ok(manifest)
    }

    /// Visits exactly the files a prior manifest recorded.
    fn walk_listed(
        &self,
        listed: &[String],
        visit: &mut dyn FnMut(&str, &Path, &fs::Metadata) -> Result<(), BundleError>,
    ) -> Result<(), BundleError> {
        for rel in listed {
            let path = self.base.join(rel);
            let meta = fs::metadata(&path).map_err(|e| BundleError::file(&path, e))?;
            visit(rel, &path, &meta)?;
        }
        Ok(())
    }
}

/// `io::Read` adapter that feeds every byte it yields into an MD5 hasher,
/// so archive bytes and the checksum come from a single read of the file.
struct HashingReader<R> {
    inner: R,
    hasher: Md5,
}

impl<R: Read> HashingReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Md5::new(),
        }
    }

    fn finalize(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

fn append_dir<W: Write>(
    archive: &mut tar::Builder<W>,
    rel: &str,
) -> Result<(), BundleError> {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Directory);
    header.set_size(0);
    header.set_mode(0o755);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    // Directories carry a trailing slash in the archive.
    archive.append_data(&mut header, format!("{rel}/"), std::io::empty())?;
    Ok(())
}

fn append_file<W: Write>(
    archive: Option<&mut tar::Builder<W>>,
    rel: &str,
    path: &Path,
    meta: &fs::Metadata,
) -> Result<String, BundleError> {
    let file = File::open(path).map_err(|e| BundleError::file(path, e))?;
    let mut reader = HashingReader::new(file);

    match archive {
        Some(archive) => {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(meta.len());
            header.set_mode(file_mode(meta));
            header.set_mtime(0);
            header.set_uid(0);
            header.set_gid(0);
            archive
                .append_data(&mut header, rel, &mut reader)
                .map_err(|e| BundleError::file(path, e))?;
        }
        None => {
            // Manifest-only: hash without writing anywhere.
            let mut buf = [0u8; COPY_BUF_SIZE];
            loop {
                let n = reader.read(&mut buf).map_err(|e| BundleError::file(path, e))?;
                if n == 0 {
                    break;
                }
            }
        }
    }
    Ok(reader.finalize())
}

fn append_manifest<W: Write>(
    archive: &mut tar::Builder<W>,
    manifest: &Manifest,
) -> Result<(), BundleError> {
    let json = manifest.to_json()?;
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(json.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    archive.append_data(&mut header, MANIFEST_FILENAME, json.as_slice())?;
    Ok(())
}

#[cfg(unix)]
fn file_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    if meta.permissions().mode() & 0o111 != 0 {
        0o755
    } else {
        0o644
    }
}

#[cfg(not(unix))]
fn file_mode(_meta: &fs::Metadata) -> u32 {
    0o644
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn fixture_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.py"), b"import streamlit as st\n").unwrap();
        fs::write(dir.path().join("requirements.txt"), b"streamlit==1.30.0\n").unwrap();
        fs::create_dir(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data").join("cities.csv"), b"name\nOslo\n").unwrap();
        dir
    }

    #[test]
    fn manifest_lists_each_file_exactly_once() {
        let dir = fixture_tree();
        let bundler = Bundler::from_directory(dir.path(), &[]).unwrap();
        let manifest = bundler.create_manifest().unwrap();

        assert_eq!(
            manifest.filenames(),
            vec!["app.py", "data/cities.csv", "requirements.txt"]
        );
    }

    #[test]
    fn caller_ignores_are_applied() {
        let dir = fixture_tree();
        let bundler = Bundler::from_directory(dir.path(), &["data/"]).unwrap();
        let manifest = bundler.create_manifest().unwrap();
        assert_eq!(manifest.filenames(), vec!["app.py", "requirements.txt"]);
    }

    #[test]
    fn checksums_are_md5_hex() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("greeting.txt"), b"hello").unwrap();
        let bundler = Bundler::from_directory(dir.path(), &[]).unwrap();
        let manifest = bundler.create_manifest().unwrap();
        assert_eq!(
            manifest.files["greeting.txt"].checksum,
            "5d41402abc4b2a76b9719d911017c592"
        );
    }

    #[test]
    fn inspected_packages_ride_along_in_the_manifest() {
        let dir = fixture_tree();
        let bundler = Bundler::from_directory(dir.path(), &[]).unwrap().with_packages([(
            "streamlit".to_string(),
            crate::Package {
                source: "pip".into(),
                repository: "PyPI".into(),
                description: BTreeMap::new(),
            },
        )]);
        let manifest = bundler.create_manifest().unwrap();
        assert_eq!(manifest.packages["streamlit"].source, "pip");
    }

    #[test]
    fn manifest_creation_is_idempotent() {
        let dir = fixture_tree();
        let bundler = Bundler::from_directory(dir.path(), &[]).unwrap();
        let first = bundler.create_manifest().unwrap();
        let second = bundler.create_manifest().unwrap();
        assert_eq!(first.files, second.files);
    }

    #[test]
    fn bundle_stream_matches_manifest() {
        let dir = fixture_tree();
        let bundler = Bundler::from_directory(dir.path(), &[])
            .unwrap()
            .with_app_mode("python-streamlit");

        let mut bytes = Vec::new();
        let manifest = bundler.create_bundle(&mut bytes).unwrap();

        let mut entries = BTreeMap::new();
        let mut order = Vec::new();
        let mut archive = tar::Archive::new(GzDecoder::new(bytes.as_slice()));
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().into_owned();
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            order.push(name.clone());
            entries.insert(name, content);
        }

        // Directories carry a trailing slash; the root is not an entry.
        assert!(order.contains(&"data/".to_string()));
        assert!(!order.contains(&"./".to_string()));
        assert!(!order.contains(&"".to_string()));

        // The manifest is the final entry and round-trips.
        assert_eq!(order.last().map(String::as_str), Some(MANIFEST_FILENAME));
        let embedded = Manifest::from_json(&entries[MANIFEST_FILENAME]).unwrap();
        assert_eq!(embedded, manifest);
        assert_eq!(embedded.metadata.app_mode, "python-streamlit");

        // Archive bytes match the source files.
        assert_eq!(entries["app.py"], b"import streamlit as st\n");
        assert_eq!(entries["data/cities.csv"], b"name\nOslo\n");
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_dir_contributes_same_files_as_real_subtree() {
        let content = TempDir::new().unwrap();
        fs::write(content.path().join("a.txt"), b"a").unwrap();
        fs::create_dir(content.path().join("nested")).unwrap();
        fs::write(content.path().join("nested").join("b.txt"), b"b").unwrap();

        let with_link = TempDir::new().unwrap();
        std::os::unix::fs::symlink(content.path(), with_link.path().join("sub")).unwrap();

        let with_real = TempDir::new().unwrap();
        fs::create_dir(with_real.path().join("sub")).unwrap();
        fs::write(with_real.path().join("sub").join("a.txt"), b"a").unwrap();
        fs::create_dir(with_real.path().join("sub").join("nested")).unwrap();
        fs::write(
            with_real.path().join("sub").join("nested").join("b.txt"),
            b"b",
        )
        .unwrap();

        let linked = Bundler::from_directory(with_link.path(), &[])
            .unwrap()
            .create_manifest()
            .unwrap();
        let real = Bundler::from_directory(with_real.path(), &[])
            .unwrap()
            .create_manifest()
            .unwrap();
        assert_eq!(linked.files, real.files);
    }

    #[test]
    fn from_manifest_walks_only_listed_files() {
        let dir = fixture_tree();
        let bundler = Bundler::from_directory(dir.path(), &[]).unwrap();
        let manifest = bundler.create_manifest().unwrap();

        let manifest_path = dir.path().join(MANIFEST_FILENAME);
        fs::write(&manifest_path, manifest.to_json().unwrap()).unwrap();

        // A file added after the manifest was saved is not picked up.
        fs::write(dir.path().join("later.txt"), b"x").unwrap();

        let restored = Bundler::from_manifest(&manifest_path)
            .unwrap()
            .create_manifest()
            .unwrap();
        assert_eq!(restored.files, manifest.files);
    }

    #[test]
    fn from_manifest_missing_file_aborts_with_path() {
        let dir = fixture_tree();
        let bundler = Bundler::from_directory(dir.path(), &[]).unwrap();
        let manifest = bundler.create_manifest().unwrap();
        let manifest_path = dir.path().join(MANIFEST_FILENAME);
        fs::write(&manifest_path, manifest.to_json().unwrap()).unwrap();

        fs::remove_file(dir.path().join("app.py")).unwrap();

        let err = Bundler::from_manifest(&manifest_path)
            .unwrap()
            .create_manifest()
            .unwrap_err();
        match err {
            BundleError::File { path, .. } => {
                assert!(path.ends_with("app.py"), "unexpected path {path:?}")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
