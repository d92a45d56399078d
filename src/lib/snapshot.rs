// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use walkdir::WalkDir;

use crate::{ErrorKind, NetplanError};

const DECLARED_CONFIG_DIR: &str = "etc/netplan";
const RUNTIME_STATE_DIRS: [&str; 2] =
    ["run/NetworkManager/system-connections", "run/systemd/network"];

/// Backup of the declared configuration and backend runtime state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Snapshot {
    root: PathBuf,
    created: DateTime<Local>,
    include_declared: bool,
    present: BTreeSet<&'static str>,
}

impl Snapshot {
    /// Directory mirroring the live layout (`etc/netplan`, ...).
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn created(&self) -> DateTime<Local> {
        self.created
    }

    pub fn includes_declared_config(&self) -> bool {
        self.include_declared
    }

    // Directories this snapshot is authoritative for.
    fn covered_dirs(&self) -> Vec<&'static str> {
        let mut ret = Vec::new();
        if self.include_declared {
            ret.push(DECLARED_CONFIG_DIR);
        }
        ret.extend(RUNTIME_STATE_DIRS);
        ret
    }
}

/// Private temporary area holding the snapshots of one session. The area
/// is created on first use and removed on cleanup or drop.
#[derive(Debug)]
pub struct SnapshotStore {
    root_dir: PathBuf,
    temp_dir: Option<PathBuf>,
    added: Vec<PathBuf>,
    next_id: u32,
}

impl SnapshotStore {
    pub fn new(root_dir: &Path) -> Self {
        Self {
            root_dir: root_dir.to_path_buf(),
            temp_dir: None,
            added: Vec::new(),
            next_id: 0,
        }
    }

    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }

    fn ensure_temp_dir(&mut self) -> Result<PathBuf, NetplanError> {
        if let Some(dir) = self.temp_dir.as_ref() {
            return Ok(dir.clone());
        }
        let dir = self
            .root_dir
            .join("tmp")
            .join(format!("netplan_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir)?;
        log::debug!("Created snapshot area {}", dir.display());
        self.temp_dir = Some(dir.clone());
        Ok(dir)
    }

    /// Copy the runtime state directories, and the declared configuration
    /// when `include_declared` is set, into a new snapshot. Missing
    /// directories are recorded as absent.
    pub fn backup(
        &mut self,
        include_declared: bool,
    ) -> Result<Snapshot, NetplanError> {
        let root = self.ensure_temp_dir()?.join(self.next_id.to_string());
        self.next_id += 1;
        std::fs::create_dir_all(&root)?;

        let mut snapshot = Snapshot {
            root,
            created: Local::now(),
            include_declared,
            present: BTreeSet::new(),
        };
        for dir in snapshot.covered_dirs() {
            let src = self.root_dir.join(dir);
            if !src.is_dir() {
                log::debug!("{} does not exist, not backed up", src.display());
                continue;
            }
            copy_tree(&src, &snapshot.root.join(dir))?;
            snapshot.present.insert(dir);
        }
        log::info!(
            "Backed up {:?} to {}",
            snapshot.present,
            snapshot.root.display()
        );
        Ok(snapshot)
    }

    /// Copy `src` to `dst` and remember `dst` for removal on revert.
    /// Fails when both paths name the same file.
    pub fn add(&mut self, src: &Path, dst: &Path) -> Result<(), NetplanError> {
        if is_same_file(src, dst) {
            return Err(NetplanError::new(
                ErrorKind::InvalidConfig,
                format!(
                    "{} and {} are the same file",
                    src.display(),
                    dst.display()
                ),
            ));
        }
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(src, dst)?;
        log::debug!("Staged {} as {}", src.display(), dst.display());
        self.added.push(dst.to_path_buf());
        Ok(())
    }

    /// Remove staged files and replace every backed up directory with its
    /// copy. Directories absent at backup time are removed. Any failure is
    /// a `RevertError`.
    pub fn revert(&mut self, snapshot: Snapshot) -> Result<(), NetplanError> {
        log::info!(
            "Restoring snapshot {} taken at {}",
            snapshot.root.display(),
            snapshot.created().to_rfc3339()
        );
        self.revert_dirs(&snapshot).map_err(|e| {
            let e = NetplanError::new(
                ErrorKind::RevertError,
                format!(
                    "Failed to restore snapshot {}: {}",
                    snapshot.root.display(),
                    e.msg()
                ),
            );
            log::error!("{e}");
            e
        })
    }

    fn revert_dirs(&mut self, snapshot: &Snapshot) -> Result<(), NetplanError> {
        for file in self.added.drain(..) {
            match std::fs::remove_file(&file) {
                Ok(()) => log::debug!("Removed staged {}", file.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => (),
                Err(e) => return Err(e.into()),
            }
        }
        for dir in snapshot.covered_dirs() {
            let live = self.root_dir.join(dir);
            match std::fs::remove_dir_all(&live) {
                Ok(()) => (),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => (),
                Err(e) => return Err(e.into()),
            }
            if snapshot.present.contains(dir) {
                copy_tree(&snapshot.root.join(dir), &live)?;
            }
            log::debug!("Restored {}", live.display());
        }
        Ok(())
    }

    pub fn cleanup(&mut self) {
        if let Some(dir) = self.temp_dir.take() {
            match std::fs::remove_dir_all(&dir) {
                Ok(()) => log::debug!("Removed {}", dir.display()),
                Err(e) => {
                    log::warn!("Failed to remove {}: {e}", dir.display())
                }
            }
        }
        self.added.clear();
    }
}

impl Drop for SnapshotStore {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Both paths exist and resolve to the same file.
pub(crate) fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Copy a directory tree, keeping symlinks as symlinks.
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> Result<(), NetplanError> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry =
            entry.map_err(|e| NetplanError::from(std::io::Error::from(e)))?;
        let path = entry.path();
        let rel_path = path.strip_prefix(src).unwrap_or(path);
        let target = dst.join(rel_path);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            std::os::unix::fs::symlink(std::fs::read_link(path)?, &target)?;
        } else {
            std::fs::copy(path, &target)?;
        }
    }
    Ok(())
}
