//! Placing downloads on disk without ever losing a retained version.
//!
//! A file's canonical path `P` holds either a single bare file (only one
//! version has ever been seen) or a directory of numbered entries named
//! `{version:05}-{name}`, so that sorting entry names sorts versions. The
//! switch from one layout to the other happens once, the first time a second
//! distinct content shows up, and is built in a hidden sibling directory that
//! is swapped into place last:
//!
//! 1. create `.{name}.migrating` next to `P`;
//! 2. hard-link (or copy) the bare file into it as the previous version's entry;
//! 3. rename the new download into it as the new version's entry;
//! 4. remove the bare file and rename the staging directory to `P`.
//!
//! A crash at any point leaves either the bare file or the complete
//! directory at `P`; [`Mirror::recover`] tidies up whatever was left behind.

use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use crate::staging::{Staged, Staging, hash_file};
use std::path::{Path, PathBuf};
use tokio::fs;

/// What [`Mirror::place`] did with a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Nothing existed at the path; the download is now a bare file there.
    Created,
    /// The content is identical to the latest version on disk; the download was discarded.
    Unchanged,
    /// Added as a new numbered entry to an existing version directory.
    Added,
    /// The bare file became a version directory holding it and the download.
    Migrated,
}

/// What currently exists at a canonical path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    Missing,
    Bare(PathBuf),
    /// Numbered entries, in version order.
    Numbered(Vec<(u32, PathBuf)>),
}

/// Local mirror rooted at the output directory.
///
/// All paths taken by its methods are relative to the root, and are
/// validated so they cannot escape it.
#[derive(Debug, Clone)]
pub struct Mirror {
    root: PathBuf,
}

fn entry_name(version: u32, name: &str) -> String {
    format!("{version:05}-{name}")
}

fn parse_entry_name(entry: &str) -> Option<u32> {
    let (prefix, _) = entry.split_once('-')?;
    if prefix.len() < 5 || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    prefix.parse().ok()
}

fn file_name(path: &Path) -> Result<String> {
    match path.file_name() {
        Some(name) => Ok(name.to_string_lossy().into_owned()),
        None => exn::bail!(ErrorKind::InvalidPath(path.to_path_buf())),
    }
}

fn staging_dir(target: &Path, name: &str) -> PathBuf {
    target.with_file_name(format!(".{name}.migrating"))
}

async fn exists(path: &Path) -> Result<bool> {
    Ok(fs::try_exists(path).await.map_err(|e| ErrorKind::from_io(e, path))?)
}

impl Mirror {
    /// Create a mirror rooted at `root`, creating the directory if needed.
    ///
    /// Returns [`InvalidPath`](ErrorKind::InvalidPath) if `root` is relative
    /// or exists but isn't a directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Only happens once per run; not worth an async constructor.
            std::fs::create_dir_all(&root).map_err(|e| ErrorKind::from_io(e, &root))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn absolute_path(&self, path: &Path) -> Result<PathBuf> {
        Ok(self.root.join(validate_path(path)?))
    }

    /// Start a download destined for `path`.
    pub async fn stage(&self, path: &Path) -> Result<Staging> {
        Staging::new(&self.absolute_path(path)?).await
    }

    /// Finish (or abandon) a layout migration interrupted by a crash.
    ///
    /// If a staging directory exists and `path` doesn't, the crash happened
    /// after the bare file was removed: the staging directory is complete and
    /// is moved into place. If `path` still exists, the migration never got
    /// that far and the staging directory is discarded. Returns whether
    /// anything was left over.
    pub async fn recover(&self, path: &Path) -> Result<bool> {
        let target = self.absolute_path(path)?;
        self.recover_absolute(&target).await
    }

    async fn recover_absolute(&self, target: &Path) -> Result<bool> {
        let staging = staging_dir(target, &file_name(target)?);
        if !exists(&staging).await? {
            return Ok(false);
        }
        if exists(target).await? {
            tracing::warn!(path = %target.display(), "Discarding incomplete version migration");
            fs::remove_dir_all(&staging).await.map_err(|e| ErrorKind::from_io(e, &staging))?;
        } else {
            tracing::warn!(path = %target.display(), "Completing interrupted version migration");
            fs::rename(&staging, target).await.map_err(|e| ErrorKind::from_io(e, target))?;
        }
        Ok(true)
    }

    /// What is currently on disk for `path`.
    pub async fn layout(&self, path: &Path) -> Result<Layout> {
        let target = self.absolute_path(path)?;
        let metadata = match fs::symlink_metadata(&target).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Layout::Missing),
            Err(e) => exn::bail!(ErrorKind::from_io(e, &target)),
        };
        if !metadata.is_dir() {
            return Ok(Layout::Bare(target));
        }
        Ok(Layout::Numbered(Self::entries(&target).await?))
    }

    async fn entries(dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(dir).await.map_err(|e| ErrorKind::from_io(e, dir))?;
        while let Some(entry) = read_dir.next_entry().await.map_err(|e| ErrorKind::from_io(e, dir))? {
            let name = entry.file_name();
            if let Some(version) = name.to_str().and_then(parse_entry_name) {
                entries.push((version, entry.path()));
            }
        }
        entries.sort_by_key(|(version, _)| *version);
        Ok(entries)
    }

    /// Put a completed download for `path` on disk as `version`.
    ///
    /// `previous` is the version number the metadata history records for
    /// what is currently on disk, or `None` if the resource has no history.
    /// A retained version is never replaced:
    ///
    /// - a bare file with different content and no `previous` belongs to
    ///   another resource: [`Occupied`](ErrorKind::Occupied);
    /// - a bare file whose `previous` is not lower than `version`:
    ///   [`UnknownHistory`](ErrorKind::UnknownHistory);
    /// - a version directory whose latest entry is newer than `version`, or
    ///   numbered `version` without being a leftover of this resource's
    ///   own unrecorded placement: [`Occupied`](ErrorKind::Occupied).
    ///
    /// On error the disk is left as it was.
    pub async fn place(&self, path: &Path, staged: Staged, version: u32, previous: Option<u32>) -> Result<Placement> {
        let target = self.absolute_path(path)?;
        self.recover_absolute(&target).await?;
        let name = file_name(&target)?;
        let metadata = match fs::symlink_metadata(&target).await {
            Ok(metadata) => Some(metadata),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => exn::bail!(ErrorKind::from_io(e, &target)),
        };

        let placement = match metadata {
            None => {
                staged.persist(&target)?;
                Placement::Created
            },
            Some(metadata) if metadata.is_dir() => {
                let latest = Self::entries(&target).await?.pop();
                let unchanged = match &latest {
                    Some((_, entry)) => hash_file(entry).await? == staged.hash(),
                    None => false,
                };
                if unchanged {
                    Placement::Unchanged
                } else {
                    if let Some((latest, _)) = latest {
                        // Placed but never recorded before a crash: the one
                        // entry that may be replaced.
                        let leftover = latest == version && previous.is_some_and(|p| p < version);
                        if latest > version || (latest == version && !leftover) {
                            exn::bail!(ErrorKind::Occupied { path: target, version });
                        }
                    }
                    staged.persist(&target.join(entry_name(version, &name)))?;
                    Placement::Added
                }
            },
            Some(_) => {
                if hash_file(&target).await? == staged.hash() {
                    Placement::Unchanged
                } else {
                    let previous = match previous {
                        Some(previous) if previous < version => previous,
                        Some(_) => exn::bail!(ErrorKind::UnknownHistory { path: target, version }),
                        None => exn::bail!(ErrorKind::Occupied { path: target, version }),
                    };
                    self.migrate(&target, &name, staged, previous, version).await?;
                    Placement::Migrated
                }
            },
        };
        tracing::debug!(path = %target.display(), version, ?placement, "Placed download");
        Ok(placement)
    }

    async fn migrate(&self, target: &Path, name: &str, staged: Staged, previous: u32, version: u32) -> Result<()> {
        let staging = staging_dir(target, name);
        fs::create_dir(&staging).await.map_err(|e| ErrorKind::from_io(e, &staging))?;

        let old_entry = staging.join(entry_name(previous, name));
        if let Err(e) = fs::hard_link(target, &old_entry).await {
            tracing::debug!(path = %target.display(), error = %e, "Hard link failed, copying instead");
            fs::copy(target, &old_entry).await.map_err(|e| ErrorKind::from_io(e, &old_entry))?;
        }
        staged.persist(&staging.join(entry_name(version, name)))?;

        fs::remove_file(target).await.map_err(|e| ErrorKind::from_io(e, target))?;
        fs::rename(&staging, target).await.map_err(|e| ErrorKind::from_io(e, target))?;
        tracing::info!(path = %target.display(), previous, version, "Migrated file to versioned directory");
        Ok(())
    }
}
