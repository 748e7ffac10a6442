//! Optional logo image shared by both layouts.

use crate::docx::drawing::extent_for_height;
use crate::error::RenderError;
use docx_rs::Pic;
use image::{ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A decoded-enough logo: raw bytes plus what the package needs to embed it.
#[derive(Debug, Clone)]
pub struct LogoImage {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub extension: &'static str,
    pub content_type: &'static str,
    pub width_px: u32,
    pub height_px: u32,
}

impl LogoImage {
    /// Detect format and size from image bytes. Only PNG and JPEG are embedded.
    pub fn from_bytes(bytes: Vec<u8>, path: &Path) -> Result<Self, RenderError> {
        let logo_err = |detail: String| RenderError::Logo {
            path: path.to_path_buf(),
            detail,
        };
        let format = image::guess_format(&bytes).map_err(|e| logo_err(e.to_string()))?;
        let (extension, content_type) = match format {
            ImageFormat::Png => ("png", "image/png"),
            ImageFormat::Jpeg => ("jpeg", "image/jpeg"),
            other => return Err(logo_err(format!("unsupported image format {other:?}"))),
        };
        let (width_px, height_px) = ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|e| logo_err(e.to_string()))?
            .into_dimensions()
            .map_err(|e| logo_err(e.to_string()))?;
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            extension,
            content_type,
            width_px,
            height_px,
        })
    }

    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let bytes = std::fs::read(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(bytes, path)
    }

    /// Load the configured logo. No path, or a path that does not exist,
    /// yields `None`; an existing file that is not an image is an error.
    pub fn load_optional(path: Option<&Path>) -> Result<Option<Self>, RenderError> {
        let Some(path) = path else {
            return Ok(None);
        };
        if !path.is_file() {
            debug!("Logo '{}' not found, skipping", path.display());
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// The logo as PNG bytes; JPEGs are re-encoded.
    pub fn png_bytes(&self) -> Result<Vec<u8>, RenderError> {
        if self.extension == "png" {
            return Ok(self.bytes.clone());
        }
        let logo_err = |e: image::ImageError| RenderError::Logo {
            path: self.path.clone(),
            detail: e.to_string(),
        };
        let decoded = image::load_from_memory(&self.bytes).map_err(logo_err)?;
        let mut out = Cursor::new(Vec::new());
        decoded.write_to(&mut out, ImageFormat::Png).map_err(logo_err)?;
        Ok(out.into_inner())
    }

    /// A docx-rs picture scaled to `height_cm`, aspect ratio kept.
    pub fn picture(&self, height_cm: f64) -> Result<Pic, RenderError> {
        let (cx, cy) = extent_for_height(self.width_px, self.height_px, height_cm);
        Ok(Pic::new_with_dimensions(self.png_bytes()?, self.width_px, self.height_px)
            .size(cx as u32, cy as u32))
    }

    /// Media part name, e.g. `profile_logo.png`.
    pub fn media_name(&self) -> String {
        format!("profile_logo.{}", self.extension)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A 4×2 RGB PNG.
    pub(crate) fn sample_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 2, image::Rgb([31, 78, 121]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn reads_png_dimensions() {
        let logo = LogoImage::from_bytes(sample_png(), Path::new("logo.png")).unwrap();
        assert_eq!((logo.width_px, logo.height_px), (4, 2));
        assert_eq!(logo.extension, "png");
        assert_eq!(logo.media_name(), "profile_logo.png");
    }

    #[test]
    fn jpeg_is_reencoded_as_png() {
        let img = image::RgbImage::from_pixel(3, 3, image::Rgb([200, 10, 10]));
        let mut jpeg = Cursor::new(Vec::new());
        img.write_to(&mut jpeg, ImageFormat::Jpeg).unwrap();

        let logo = LogoImage::from_bytes(jpeg.into_inner(), Path::new("logo.jpg")).unwrap();
        assert_eq!(logo.extension, "jpeg");
        let png = logo.png_bytes().unwrap();
        assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn missing_logo_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.png");
        assert!(LogoImage::load_optional(Some(&path)).unwrap().is_none());
        assert!(LogoImage::load_optional(None).unwrap().is_none());
    }

    #[test]
    fn non_image_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::write(&path, b"definitely not an image").unwrap();
        assert!(matches!(
            LogoImage::load_optional(Some(&path)),
            Err(RenderError::Logo { .. })
        ));
    }
}
