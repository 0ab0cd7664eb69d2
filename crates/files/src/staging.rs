//! Downloads land in a hidden temporary file next to their destination while
//! being hashed, and only become visible through a rename.

use crate::error::{ErrorKind, Result};
use std::path::Path;
use tempfile::TempPath;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const READ_BUFFER: usize = 64 * 1024;

/// A download in progress.
///
/// Dropping it (including on an error path) deletes the temporary file.
#[derive(Debug)]
pub struct Staging {
    file: File,
    temp: TempPath,
    hasher: blake3::Hasher,
    size: u64,
}

impl Staging {
    /// Create a hidden temporary file in the same directory as `destination`
    /// (so the final move is a same-filesystem rename).
    pub(crate) async fn new(destination: &Path) -> Result<Self> {
        let parent = destination.parent().ok_or_else(|| ErrorKind::InvalidPath(destination.to_path_buf()))?;
        fs::create_dir_all(parent).await.map_err(|e| ErrorKind::from_io(e, parent))?;
        let name = destination.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let (file, temp) = tempfile::Builder::new()
            .prefix(&format!(".{name}."))
            .suffix(".part")
            .tempfile_in(parent)
            .map_err(|e| ErrorKind::from_io(e, parent))?
            .into_parts();
        Ok(Self {
            file: File::from_std(file),
            temp,
            hasher: blake3::Hasher::new(),
            size: 0,
        })
    }

    /// Append a chunk, hashing it on the way through.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.file.write_all(chunk).await.map_err(|e| ErrorKind::from_io(e, &*self.temp))?;
        self.hasher.update(chunk);
        self.size += chunk.len() as u64;
        Ok(())
    }

    /// Flush everything to disk and seal the download.
    pub async fn finish(mut self) -> Result<Staged> {
        self.file.flush().await.map_err(|e| ErrorKind::from_io(e, &*self.temp))?;
        self.file.sync_all().await.map_err(|e| ErrorKind::from_io(e, &*self.temp))?;
        Ok(Staged {
            temp: self.temp,
            hash: self.hasher.finalize().to_hex().to_string(),
            size: self.size,
        })
    }
}

/// A completed download that has not been placed yet.
///
/// Dropping it deletes the temporary file, which is how a download identical
/// to what's already on disk gets discarded.
#[derive(Debug)]
pub struct Staged {
    temp: TempPath,
    hash: String,
    size: u64,
}

impl Staged {
    /// Lowercase hex BLAKE3 digest of the content.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Atomically move the content to `destination`, replacing any file there.
    pub(crate) fn persist(self, destination: &Path) -> Result<()> {
        self.temp.persist(destination).map_err(|e| ErrorKind::from_io(e.error, destination))?;
        Ok(())
    }
}

/// BLAKE3 digest of a file already on disk, read in fixed-size chunks.
pub(crate) async fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).await.map_err(|e| ErrorKind::from_io(e, path))?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0; READ_BUFFER];
    loop {
        let read = file.read(&mut buffer).await.map_err(|e| ErrorKind::from_io(e, path))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}
