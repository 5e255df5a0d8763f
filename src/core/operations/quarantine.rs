use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::file_ops::{move_file, FileOpError};

/// What happened when an image was sent to quarantine
#[derive(Debug)]
pub enum QuarantineOutcome {
    Moved(PathBuf),
    /// The source is gone and the quarantine copy exists: an earlier run
    /// already moved it
    AlreadyQuarantined(PathBuf),
    /// Neither the source nor a quarantine copy exists
    Missing,
    /// The move failed; the image is still in place
    Failed(FileOpError),
}

impl QuarantineOutcome {
    /// Whether the image has left the active dataset
    pub fn is_removed(&self) -> bool {
        matches!(
            self,
            QuarantineOutcome::Moved(_) | QuarantineOutcome::AlreadyQuarantined(_)
        )
    }
}

/// Parallel directory tree that removed images are moved into, mirroring the
/// per-class layout, so nothing is destroyed and every removal can be reviewed.
#[derive(Debug, Clone)]
pub struct Quarantine {
    root: PathBuf,
}

impl Quarantine {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Quarantine location for `file_name` under the relative class path
    pub fn destination(&self, class_path: &Path, file_name: &str) -> PathBuf {
        self.root.join(class_path).join(file_name)
    }

    /// Move `src` into `<root>/<class_path>/`. Safe to repeat.
    pub fn relocate(&self, class_path: &Path, src: &Path) -> QuarantineOutcome {
        let file_name = match src.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return QuarantineOutcome::Missing,
        };
        let dest = self.destination(class_path, &file_name);

        if !src.exists() {
            if dest.exists() {
                info!("{:?} already quarantined at {:?}", src, dest);
                return QuarantineOutcome::AlreadyQuarantined(dest);
            }
            warn!("{:?} vanished before it could be quarantined", src);
            return QuarantineOutcome::Missing;
        }

        match move_file(src, &dest) {
            Ok(()) => QuarantineOutcome::Moved(dest),
            Err(e) => {
                warn!("Could not quarantine {:?}: {}", src, e);
                QuarantineOutcome::Failed(e)
            }
        }
    }
}
