//! On-disk store for captured images.
//!
//! Every captured bitmap is written once as a PNG named
//! `{unix seconds}_{first 10 hash chars}.png`. The database only keeps
//! the path.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use image::{ImageFormat, RgbaImage};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Number of hash characters used in image file names.
const HASH_PREFIX_LEN: usize = 10;

/// Directory of PNG files referenced by image entries.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    /// Open the store, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| Error::DirectoryCreate {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// The directory holding the images.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file name used for an image captured at `timestamp`.
    #[must_use]
    pub fn file_name(hash: &str, timestamp: &DateTime<Utc>) -> String {
        let prefix: String = hash.chars().take(HASH_PREFIX_LEN).collect();
        format!("{}_{prefix}.png", timestamp.timestamp())
    }

    /// Write PNG bytes and return the file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, png: &[u8], hash: &str, timestamp: &DateTime<Utc>) -> Result<PathBuf> {
        let path = self.dir.join(Self::file_name(hash, timestamp));
        std::fs::write(&path, png)?;
        debug!(path = %path.display(), bytes = png.len(), "Saved image");
        Ok(path)
    }

    /// Read the PNG bytes of a stored image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageMissing`] if the file is gone.
    pub fn load(path: &Path) -> Result<Vec<u8>> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::ImageMissing {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an image file.
    ///
    /// Failures (a missing file, a file locked by another program) are
    /// logged and reported as `false`; they never abort the caller.
    pub fn remove(path: &Path) -> bool {
        match std::fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "Removed image");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not remove image file");
                false
            }
        }
    }
}

/// Encode an RGBA bitmap as PNG.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, ImageFormat::Png)?;
    Ok(cursor.into_inner())
}

/// Decode PNG (or any supported format) bytes into an RGBA bitmap.
///
/// # Errors
///
/// Returns an error if the bytes are not a supported image.
pub fn decode_png(bytes: &[u8]) -> Result<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::Rgba;

    fn sample_png() -> Vec<u8> {
        encode_png(&RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 255]))).unwrap()
    }

    #[test]
    fn test_file_name() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            ImageStore::file_name("0123456789abcdef", &ts),
            "1704067200_0123456789.png"
        );
        assert_eq!(ImageStore::file_name("abc", &ts), "1704067200_abc.png");
    }

    #[test]
    fn test_new_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("a").join("images")).unwrap();
        assert!(store.dir().is_dir());
    }

    #[test]
    fn test_save_load_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path()).unwrap();
        let png = sample_png();

        let path = store.save(&png, "deadbeefcafe", &Utc::now()).unwrap();
        assert!(path.starts_with(dir.path()));
        assert_eq!(ImageStore::load(&path).unwrap(), png);

        assert!(ImageStore::remove(&path));
        assert!(!path.exists());
        assert!(!ImageStore::remove(&path));
    }

    #[test]
    fn test_load_missing() {
        let err = ImageStore::load(Path::new("/nonexistent/1_abc.png")).unwrap_err();
        assert!(matches!(err, Error::ImageMissing { .. }));
    }

    #[test]
    fn test_png_codec() {
        let decoded = decode_png(&sample_png()).unwrap();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(*decoded.get_pixel(0, 0), Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(decode_png(b"not an image"), Err(Error::Image(_))));
    }
}
