use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error};

/// Result type for file operations
pub type FileOpResult<T> = Result<T, FileOpError>;

/// Error types for file operations
#[derive(Debug, Error)]
pub enum FileOpError {
    #[error("copy failed from {from:?} to {to:?}: {source}")]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("remove failed for {path:?}: {source}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("destination {0:?} already exists")]
    DestinationExists(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Move a file, creating the destination's parent directory.
///
/// Tries a rename first and falls back to copy + remove when the rename fails
/// (for example across drives). Never overwrites an existing destination.
pub fn move_file(src: &Path, dest: &Path) -> FileOpResult<()> {
    debug!("Moving file from {:?} to {:?}", src, dest);

    if dest.exists() {
        return Err(FileOpError::DestinationExists(dest.to_path_buf()));
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    if fs::rename(src, dest).is_ok() {
        return Ok(());
    }

    if let Err(e) = fs::copy(src, dest) {
        error!("Failed to copy file from {:?} to {:?}: {}", src, dest, e);
        return Err(FileOpError::CopyFailed {
            from: src.to_path_buf(),
            to: dest.to_path_buf(),
            source: e,
        });
    }

    if let Err(e) = fs::remove_file(src) {
        error!("Failed to remove original file {:?} after copy: {}", src, e);
        // Leave exactly one copy behind
        let _ = fs::remove_file(dest);
        return Err(FileOpError::RemoveFailed {
            path: src.to_path_buf(),
            source: e,
        });
    }

    Ok(())
}

/// Copy a file into `dest_dir`, creating it, and return the new path
pub fn copy_into(src: &Path, dest_dir: &Path) -> FileOpResult<PathBuf> {
    fs::create_dir_all(dest_dir)?;
    let file_name = src
        .file_name()
        .ok_or_else(|| FileOpError::Io(io::Error::new(io::ErrorKind::InvalidInput, "no file name")))?;
    let dest = dest_dir.join(file_name);
    fs::copy(src, &dest).map_err(|source| FileOpError::CopyFailed {
        from: src.to_path_buf(),
        to: dest.clone(),
        source,
    })?;
    Ok(dest)
}
