use super::preview::Preview;
use crate::image_file::ImageFile;

/// Identity of one pick. A newer pick always has a larger id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SelectionId(u64);

/// The chosen file plus its preview once decoding finished.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    id: SelectionId,
    file: ImageFile,
    preview: Option<Preview>,
}

impl Selection {
    pub fn id(&self) -> SelectionId {
        self.id
    }

    pub fn file(&self) -> &ImageFile {
        &self.file
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    /// Data URI of the preview, once decoded.
    pub fn preview_data(&self) -> Option<&str> {
        self.preview.as_ref().map(Preview::data_uri)
    }
}

/// Holds at most one selection.
#[derive(Debug, Default)]
pub struct SelectionStore {
    current: Option<Selection>,
    last_id: u64,
}

impl SelectionStore {
    /// Replace any existing selection wholesale.
    pub fn select(&mut self, file: ImageFile) -> SelectionId {
        self.last_id += 1;
        let id = SelectionId(self.last_id);
        self.current = Some(Selection {
            id,
            file,
            preview: None,
        });
        id
    }

    /// Drop the selection. Returns whether there was one.
    pub fn clear(&mut self) -> bool {
        self.current.take().is_some()
    }

    pub fn current(&self) -> Option<&Selection> {
        self.current.as_ref()
    }

    /// Attach a decoded preview if `id` still names the current selection.
    pub(crate) fn apply_preview(&mut self, id: SelectionId, preview: Preview) -> bool {
        match self.current.as_mut() {
            Some(selection) if selection.id == id => {
                selection.preview = Some(preview);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn preview_pending(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|selection| selection.preview.is_none())
    }
}
