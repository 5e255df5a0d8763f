use image::DynamicImage;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// SHA-256 of the decoded RGB pixels and the dimensions, hex encoded.
///
/// Hashing pixels rather than file bytes catches the same picture saved
/// twice with different metadata or names.
pub fn content_hash(img: &DynamicImage) -> String {
    let rgb = img.to_rgb8();
    let mut hasher = Sha256::new();
    hasher.update(rgb.width().to_le_bytes());
    hasher.update(rgb.height().to_le_bytes());
    hasher.update(rgb.as_raw());
    hex::encode(hasher.finalize())
}

/// Remembers every hash seen during one run
#[derive(Debug, Default)]
pub struct DuplicateTracker {
    seen: HashMap<String, PathBuf>,
}

impl DuplicateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` under `hash`. Returns the first path seen with the same
    /// hash when this one is a duplicate.
    pub fn check(&mut self, hash: String, path: &Path) -> Option<PathBuf> {
        match self.seen.get(&hash) {
            Some(original) => Some(original.clone()),
            None => {
                self.seen.insert(hash, path.to_path_buf());
                None
            }
        }
    }

    /// Number of distinct images seen so far
    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([value, 0, 0])))
    }

    #[test]
    fn test_identical_pixels_hash_equal() {
        assert_eq!(content_hash(&solid(7)), content_hash(&solid(7)));
        assert_ne!(content_hash(&solid(7)), content_hash(&solid(8)));
    }

    #[test]
    fn test_same_pixels_different_shape() {
        let wide = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 8, Rgb([1, 1, 1])));
        let tall = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 32, Rgb([1, 1, 1])));
        assert_ne!(content_hash(&wide), content_hash(&tall));
    }

    #[test]
    fn test_tracker_reports_first_path() {
        let mut tracker = DuplicateTracker::new();
        assert!(tracker.check("abc".to_string(), Path::new("a.jpg")).is_none());
        assert_eq!(
            tracker.check("abc".to_string(), Path::new("b.jpg")),
            Some(PathBuf::from("a.jpg"))
        );
        assert_eq!(tracker.len(), 1);
    }
}
