//! Content-addressed artifact cache
//!
//! Entries live under `<cache_dir>/<weaver version>/<key>.<ext>`. An entry is
//! written once and never modified. Writers publish through a temporary file
//! in the entry's directory and an atomic no-clobber rename, so concurrent
//! weaves of the same input never observe a partial artifact; the loser of a
//! race finds the winner's entry and treats it as a hit.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use entweave_core::{ArtifactFormat, WEAVER_VERSION, WeaverSetup};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Content-derived identity of a weave
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    hash: String,
    format: ArtifactFormat,
}

impl CacheKey {
    /// Hex digest
    pub fn as_str(&self) -> &str {
        &self.hash
    }

    /// Artifact format of the entry
    pub fn format(&self) -> ArtifactFormat {
        self.format
    }

    /// File name of the entry
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.hash, self.format.extension())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash)
    }
}

/// A stored artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Key the artifact is stored under
    pub key: CacheKey,
    /// Location of the artifact
    pub path: PathBuf,
}

/// Owner of one cache directory
#[derive(Debug, Clone)]
pub struct CacheController {
    root: PathBuf,
    version: String,
}

impl CacheController {
    /// Controller for entries of this weaver version under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_version(root, WEAVER_VERSION)
    }

    /// Controller for entries of an explicit weaver version
    pub fn with_version(root: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            version: version.into(),
        }
    }

    /// Cache root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding this version's entries
    pub fn version_dir(&self) -> PathBuf {
        self.root.join(&self.version)
    }

    /// Content fingerprint of input bytes alone
    pub fn fingerprint(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    /// Key for weaving `bytes`, which references nothing, under `setup`
    pub fn key(&self, bytes: &[u8], setup: &WeaverSetup) -> Result<CacheKey> {
        self.key_with_references(bytes, &[], setup)
    }

    /// Key for weaving `bytes` against the given referenced modules
    ///
    /// Covers the input bytes, the referenced modules' bytes, the weaver
    /// version and the effective configuration. Input location, cache and
    /// output directories and the install mode do not change the artifact and
    /// are left out.
    pub fn key_with_references(
        &self,
        bytes: &[u8],
        references: &[Vec<u8>],
        setup: &WeaverSetup,
    ) -> Result<CacheKey> {
        let config = serde_json::to_vec(&setup.effective_config())?;

        let mut hasher = Sha256::new();
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
        hasher.update((self.version.len() as u64).to_le_bytes());
        hasher.update(self.version.as_bytes());
        hasher.update(&config);
        hasher.update((references.len() as u64).to_le_bytes());
        for reference in references {
            hasher.update((reference.len() as u64).to_le_bytes());
            hasher.update(reference);
        }

        Ok(CacheKey {
            hash: hex::encode(hasher.finalize()),
            format: setup.format,
        })
    }

    /// Location of the entry for `key`
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.version_dir().join(key.file_name())
    }

    /// Look up a stored artifact
    pub fn try_get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(key);
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(Some(CacheEntry {
                key: key.clone(),
                path,
            })),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(Error::CacheRead { path, source }),
        }
    }

    /// Read a stored artifact
    pub fn read(&self, entry: &CacheEntry) -> Result<Vec<u8>> {
        std::fs::read(&entry.path).map_err(|source| Error::CacheRead {
            path: entry.path.clone(),
            source,
        })
    }

    /// Store an artifact under `key`
    ///
    /// If another writer published the same key first, its entry is kept.
    pub fn store(&self, key: &CacheKey, artifact: &[u8]) -> Result<CacheEntry> {
        let dir = self.version_dir();
        let path = self.entry_path(key);
        let write_err = |source| Error::CacheWrite {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&dir).map_err(write_err)?;
        let mut temp = NamedTempFile::new_in(&dir).map_err(write_err)?;
        temp.write_all(artifact).map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;

        match temp.persist_noclobber(&path) {
            Ok(_) => tracing::debug!("stored cache entry {}", path.display()),
            Err(err) if err.error.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::debug!("cache entry {} already published", key);
            }
            Err(err) => return Err(write_err(err.error)),
        }

        Ok(CacheEntry {
            key: key.clone(),
            path,
        })
    }

    /// Copy a stored artifact to `dest`, replacing any previous file
    pub fn install(&self, entry: &CacheEntry, dest: &Path) -> Result<PathBuf> {
        let artifact = self.read(entry)?;
        let write_err = |source| Error::OutputWrite {
            path: dest.to_path_buf(),
            source,
        };

        let dir = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir).map_err(write_err)?;
        let mut temp = NamedTempFile::new_in(dir).map_err(write_err)?;
        temp.write_all(&artifact).map_err(write_err)?;
        temp.persist(dest).map_err(|err| write_err(err.error))?;

        tracing::debug!("installed {}", dest.display());
        Ok(dest.to_path_buf())
    }

    /// Remove the entries of every other weaver version; returns how many
    /// version directories were removed
    pub fn clean(&self) -> Result<usize> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(Error::CacheRead {
                    path: self.root.clone(),
                    source,
                });
            }
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|source| Error::CacheRead {
                path: self.root.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_dir() || entry.file_name() == self.version.as_str() {
                continue;
            }
            std::fs::remove_dir_all(&path).map_err(|source| Error::CacheWrite {
                path: path.clone(),
                source,
            })?;
            tracing::info!("removed stale cache {}", path.display());
            removed += 1;
        }
        Ok(removed)
    }
}
