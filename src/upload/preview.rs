//! Preview generation for a selected file.

use base64::Engine;

use crate::image_file::ImageFile;

/// Decoded RGBA pixels ready to upload as a texture.
#[derive(Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl std::fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Thumbnail({}x{})", self.width, self.height)
    }
}

/// Renderable forms of the selected file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Preview {
    data_uri: String,
    thumbnail: Option<Thumbnail>,
}

impl Preview {
    /// `data:<mime>;base64,...` for the full file.
    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }

    /// Present only when the bytes decode as an image.
    pub fn thumbnail(&self) -> Option<&Thumbnail> {
        self.thumbnail.as_ref()
    }
}

/// Build the preview. Runs off the UI thread; never fails, since a file the
/// local decoder rejects may still be accepted by the service.
pub(crate) fn decode_preview(file: &ImageFile, max_dimension: u32) -> Preview {
    let data_uri = format!(
        "data:{};base64,{}",
        file.mime(),
        base64::engine::general_purpose::STANDARD.encode(file.bytes())
    );
    let thumbnail = match image::load_from_memory(file.bytes()) {
        Ok(decoded) => {
            let max = max_dimension.max(1);
            let fitted = if decoded.width() > max || decoded.height() > max {
                decoded.thumbnail(max, max)
            } else {
                decoded
            };
            let rgba = fitted.to_rgba8();
            Some(Thumbnail {
                width: rgba.width(),
                height: rgba.height(),
                rgba: rgba.into_raw(),
            })
        }
        Err(err) => {
            tracing::debug!(file = file.name(), "No thumbnail for selection: {err}");
            None
        }
    };
    Preview {
        data_uri,
        thumbnail,
    }
}
