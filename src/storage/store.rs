//! File-backed artifact store
//!
//! Each trading system owns a directory under `{root}/{owner}/{id}/`. Writes
//! go through a sibling `.temp` file followed by a rename, so readers see
//! either the previous complete content or the new one.
//!
//! The store never logs. It returns typed errors and leaves the decision of
//! what to do with them to the lifecycle listener and the service layer.

use super::layout::{self, ArtifactKind};
use super::types::TradingSystem;
use crate::error::{Error, Result};
use bytes::Bytes;
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};

const DIR_MODE: u32 = 0o700;
const FILE_MODE: u32 = 0o600;

/// Distinguishes the temp files of writes issued by this process
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Load the fallback equity chart served when an entity has none.
pub fn load_default_chart(path: &Path) -> Result<Bytes> {
    fs::read(path).map(Bytes::from).map_err(|source| Error::StorageUnavailable {
        path: path.to_path_buf(),
        source,
    })
}

/// Artifact store rooted at a single directory
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    default_chart: Bytes,
}

impl ArtifactStore {
    /// Open the store, creating the root directory if needed.
    pub fn open(root: impl Into<PathBuf>, default_chart: Bytes) -> Result<Self> {
        let root = root.into();
        create_dirs(&root)?;
        Ok(Self {
            root,
            default_chart,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The fallback chart image loaded at startup
    pub fn default_chart_image(&self) -> Bytes {
        self.default_chart.clone()
    }

    // =========================================================================
    // Entity lifecycle
    // =========================================================================

    /// Create the entity directory and its fixed subdirectories.
    ///
    /// Directories that already exist are left as they are, so calling this
    /// again for the same entity is harmless.
    pub fn provision(&self, owner: &str, id: u64) -> Result<()> {
        let dir = layout::entity_dir(&self.root, owner, id)?;
        for sub in layout::ENTITY_DIRS {
            create_dirs(&dir.join(sub))?;
        }
        Ok(())
    }

    /// Recursively remove the entity directory. Missing trees are a no-op.
    pub fn teardown(&self, owner: &str, id: u64) -> Result<()> {
        let dir = layout::entity_dir(&self.root, owner, id)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(Error::StorageUnavailable { path: dir, source }),
        }
    }

    pub fn entity_exists(&self, owner: &str, id: u64) -> Result<bool> {
        let dir = layout::entity_dir(&self.root, owner, id)?;
        Ok(dir.is_dir())
    }

    // =========================================================================
    // Raw artifacts
    // =========================================================================

    pub fn read_artifact(&self, owner: &str, id: u64, kind: ArtifactKind<'_>) -> Result<Vec<u8>> {
        let path = layout::artifact_path(&self.root, owner, id, kind)?;
        fs::read(&path).map_err(|e| Error::from_io(&path, e))
    }

    /// Atomically replace (or create) an artifact.
    ///
    /// The payload is written and synced to a sibling `.temp` file private to
    /// this call, any existing target is removed, then the temp file is
    /// renamed onto the target. Concurrent writers of the same artifact both
    /// succeed and the last rename wins. A crash between the remove and the
    /// rename leaves the artifact missing until the next successful write.
    pub fn write_artifact(
        &self,
        owner: &str,
        id: u64,
        kind: ArtifactKind<'_>,
        data: &[u8],
    ) -> Result<()> {
        let target = layout::artifact_path(&self.root, owner, id, kind)?;
        let temp = layout::temp_path(&target, TEMP_COUNTER.fetch_add(1, Ordering::Relaxed));
        replace_atomically(&temp, &target, data)
    }

    pub fn delete_artifact(&self, owner: &str, id: u64, kind: ArtifactKind<'_>) -> Result<()> {
        let path = layout::artifact_path(&self.root, owner, id, kind)?;
        fs::remove_file(&path).map_err(|e| Error::from_io(&path, e))
    }

    /// Chart types stored for an entity, sorted.
    ///
    /// An absent entity directory yields an empty list.
    pub fn list_chart_types(&self, owner: &str, id: u64) -> Result<Vec<String>> {
        let dir = layout::entity_dir(&self.root, owner, id)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(Error::StorageUnavailable { path: dir, source }),
        };

        let mut types = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::StorageUnavailable {
                path: dir.clone(),
                source,
            })?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name();
            if let Some(chart_type) = name.to_str().and_then(layout::chart_type_of) {
                types.push(chart_type.to_string());
            }
        }

        types.sort();
        Ok(types)
    }

    // =========================================================================
    // Typed artifacts
    // =========================================================================

    pub fn read_info(&self, owner: &str, id: u64) -> Result<TradingSystem> {
        let data = self.read_artifact(owner, id, ArtifactKind::Info)?;
        serde_json::from_slice(&data).map_err(|e| {
            Error::MalformedInput(format!("info record of {}/{} is corrupt: {}", owner, id, e))
        })
    }

    /// Store the metadata record under its own `(username, id)`.
    pub fn write_info(&self, ts: &TradingSystem) -> Result<()> {
        let data = serde_json::to_vec(ts)?;
        self.write_artifact(&ts.username, ts.id, ArtifactKind::Info, &data)
    }

    pub fn read_documentation(&self, owner: &str, id: u64) -> Result<String> {
        let data = self.read_artifact(owner, id, ArtifactKind::Documentation)?;
        String::from_utf8(data).map_err(|_| {
            Error::MalformedInput(format!("documentation of {}/{} is not UTF-8", owner, id))
        })
    }

    pub fn write_documentation(&self, owner: &str, id: u64, doc: &str) -> Result<()> {
        self.write_artifact(owner, id, ArtifactKind::Documentation, doc.as_bytes())
    }
}

fn replace_atomically(temp: &Path, target: &Path, data: &[u8]) -> Result<()> {
    if let Err(e) = write_synced(temp, data) {
        // The target has not been touched; only the partial temp file may remain.
        let _ = fs::remove_file(temp);
        return Err(Error::from_io(temp, e));
    }

    match fs::remove_file(target) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(source) => {
            let _ = fs::remove_file(temp);
            return Err(Error::StorageUnavailable {
                path: target.to_path_buf(),
                source,
            });
        }
    }

    fs::rename(temp, target).map_err(|source| {
        let _ = fs::remove_file(temp);
        Error::StorageUnavailable {
            path: target.to_path_buf(),
            source,
        }
    })
}

fn create_dirs(path: &Path) -> Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(DIR_MODE);
    builder
        .create(path)
        .map_err(|source| Error::StorageUnavailable {
            path: path.to_path_buf(),
            source,
        })
}

fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(FILE_MODE);
    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()
}
