//! Minimal `multipart/form-data` encoder for a single file part.

use uuid::Uuid;

use crate::image_file::ImageFile;

pub(crate) struct MultipartBody {
    boundary: String,
    bytes: Vec<u8>,
}

impl MultipartBody {
    /// Encode `file` as the only part of a form, under `field`.
    pub(crate) fn single_file(field: &str, file: &ImageFile) -> Self {
        let boundary = format!("platescan-{}", Uuid::new_v4().simple());
        let header = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            quote_param(field),
            quote_param(file.name()),
            header_value(file.mime()),
        );
        let trailer = format!("\r\n--{boundary}--\r\n");
        let mut bytes = Vec::with_capacity(header.len() + file.len() + trailer.len());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(file.bytes());
        bytes.extend_from_slice(trailer.as_bytes());
        Self { boundary, bytes }
    }

    pub(crate) fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

// Header parameters cannot carry raw quotes or line breaks.
fn quote_param(value: &str) -> String {
    value
        .chars()
        .filter(|ch| *ch != '\r' && *ch != '\n')
        .map(|ch| match ch {
            '"' => "%22".to_string(),
            other => other.to_string(),
        })
        .collect()
}

fn header_value(value: &str) -> String {
    value.chars().filter(|ch| *ch != '\r' && *ch != '\n').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_single_part_with_field_and_filename() {
        let file = ImageFile::new("plate.jpg", b"JPEGDATA".to_vec()).with_mime("image/jpeg");
        let body = MultipartBody::single_file("file", &file);
        let text = String::from_utf8(body.as_bytes().to_vec()).unwrap();
        let boundary = body
            .content_type()
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap()
            .to_string();

        assert!(text.starts_with(&format!("--{boundary}\r\n")));
        assert!(text.contains("Content-Disposition: form-data; name=\"file\"; filename=\"plate.jpg\"\r\n"));
        assert!(text.contains("Content-Type: image/jpeg\r\n\r\nJPEGDATA\r\n"));
        assert!(text.ends_with(&format!("\r\n--{boundary}--\r\n")));
    }

    #[test]
    fn boundaries_differ_per_body() {
        let file = ImageFile::new("a.png", vec![1, 2, 3]);
        let first = MultipartBody::single_file("file", &file);
        let second = MultipartBody::single_file("file", &file);
        assert_ne!(first.content_type(), second.content_type());
    }

    #[test]
    fn filename_quotes_and_newlines_are_neutralized() {
        assert_eq!(quote_param("a\"b\r\nc.png"), "a%22bc.png");
    }

    #[test]
    fn declared_mime_cannot_inject_headers() {
        let file = ImageFile::new("plate.png", b"PNG".to_vec())
            .with_mime("image/png\r\nX-Injected: yes");
        let body = MultipartBody::single_file("file", &file);
        let text = String::from_utf8(body.as_bytes().to_vec()).unwrap();
        assert!(text.contains("Content-Type: image/pngX-Injected: yes\r\n\r\nPNG"));
        assert!(!text.contains("\r\nX-Injected"));
    }
}
