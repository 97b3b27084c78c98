//! In-memory image blob handed from the picker to the classifier.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageFormat;

const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, thiserror::Error)]
pub enum ImageFileError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Dropped file {0} carried neither bytes nor a path")]
    Empty(String),
}

/// A user-chosen file. Contents are not validated; the service decides
/// whether it is an acceptable image.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
    name: String,
    declared_mime: Option<String>,
    bytes: Arc<[u8]>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            declared_mime: None,
            bytes: bytes.into(),
        }
    }

    /// Attach the MIME type reported by whatever produced the file.
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        let mime = mime.into();
        self.declared_mime = (!mime.trim().is_empty()).then_some(mime);
        self
    }

    /// Read a file from disk, naming it after the path's final component.
    pub fn read(path: &Path) -> Result<Self, ImageFileError> {
        let bytes = std::fs::read(path).map_err(|source| ImageFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self::new(name, bytes))
    }

    /// Build a file from a window drop, which carries in-memory bytes, a
    /// path, or (on some platforms) neither.
    pub fn from_drop(
        name: &str,
        mime: &str,
        bytes: Option<Arc<[u8]>>,
        path: Option<&Path>,
    ) -> Result<Self, ImageFileError> {
        match (bytes, path) {
            (Some(bytes), _) => Ok(Self::new(name, bytes).with_mime(mime)),
            (None, Some(path)) => Self::read(path),
            (None, None) => Err(ImageFileError::Empty(name.to_string())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Best known MIME type: declared, then sniffed from content, then from
    /// the file extension.
    pub fn mime(&self) -> &str {
        if let Some(mime) = self.declared_mime.as_deref() {
            return mime;
        }
        self.sniffed_format()
            .map(|format| format.to_mime_type())
            .unwrap_or(FALLBACK_MIME)
    }

    pub(crate) fn sniffed_format(&self) -> Option<ImageFormat> {
        image::guess_format(&self.bytes)
            .ok()
            .or_else(|| ImageFormat::from_path(&self.name).ok())
    }
}

impl fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFile")
            .field("name", &self.name)
            .field("mime", &self.mime())
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Encode a solid PNG for tests that need real image bytes.
#[cfg(test)]
pub(crate) fn test_png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 80, 40, 255]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}
