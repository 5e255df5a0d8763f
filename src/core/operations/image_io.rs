use image::imageops::FilterType;
use image::{DynamicImage, ImageResult};
use std::fs;
use std::path::Path;

/// Exact resize (aspect ratio not preserved) with bilinear filtering
pub fn resize_exact(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    img.resize_exact(width, height, FilterType::Triangle)
}

/// Save as 8-bit RGB; the output format follows the path's extension.
///
/// Alpha and 16-bit channels are dropped so JPEG output always encodes.
pub fn save_rgb(img: &DynamicImage, path: &Path) -> ImageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    DynamicImage::ImageRgb8(img.to_rgb8()).save(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    #[test]
    fn test_save_rgba_as_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 6, Rgba([200, 10, 10, 128])));
        let path = dir.path().join("out/a.jpg");
        save_rgb(&img, &path).unwrap();

        let reopened = image::open(&path).unwrap();
        assert_eq!(reopened.dimensions(), (10, 6));
    }

    #[test]
    fn test_resize_exact_ignores_aspect() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(300, 120));
        assert_eq!(resize_exact(&img, 224, 224).dimensions(), (224, 224));
    }
}
