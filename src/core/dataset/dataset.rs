use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File extensions treated as images (compared case-insensitively)
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetSplit {
    Train,
    Val,
    Test,
}

impl DatasetSplit {
    pub const ALL: [DatasetSplit; 3] = [DatasetSplit::Train, DatasetSplit::Val, DatasetSplit::Test];

    pub fn as_str(&self) -> &str {
        match self {
            DatasetSplit::Train => "train",
            DatasetSplit::Val => "val",
            DatasetSplit::Test => "test",
        }
    }

    /// Recognize a split folder name, ignoring case
    pub fn from_dir_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "train" => Some(DatasetSplit::Train),
            "val" => Some(DatasetSplit::Val),
            "test" => Some(DatasetSplit::Test),
            _ => None,
        }
    }
}

/// Whether `path` has one of the [`IMAGE_EXTENSIONS`]
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// List the immediate subdirectories of `root` as `(name, path)` pairs,
/// sorted by name.
pub fn list_class_dirs(root: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push((entry.file_name().to_string_lossy().into_owned(), path));
        }
    }
    dirs.sort();
    debug!("Found {} class folders in {:?}", dirs.len(), root);
    Ok(dirs)
}

/// List every regular file in `dir`, sorted by path
pub fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// List the image files in `dir`, sorted by path
pub fn list_image_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = list_files(dir)?;
    files.retain(|path| is_image_file(path));
    Ok(files)
}

/// One breed folder and the images it currently holds.
///
/// Images are kept in lexicographic filename order; every stage that needs a
/// deterministic order relies on this.
#[derive(Debug, Clone)]
pub struct ClassBucket {
    pub name: String,
    pub dir: PathBuf,
    pub images: Vec<PathBuf>,
}

impl ClassBucket {
    pub fn load(name: impl Into<String>, dir: PathBuf) -> io::Result<Self> {
        let images = list_image_files(&dir)?;
        Ok(Self {
            name: name.into(),
            dir,
            images,
        })
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }
}

/// Load every breed folder under `root` as a bucket
pub fn load_buckets(root: &Path) -> io::Result<Vec<ClassBucket>> {
    let mut buckets = Vec::new();
    for (name, dir) in list_class_dirs(root)? {
        buckets.push(ClassBucket::load(name, dir)?);
    }
    info!(
        "Loaded {} buckets with {} images from {:?}",
        buckets.len(),
        buckets.iter().map(ClassBucket::len).sum::<usize>(),
        root
    );
    Ok(buckets)
}
