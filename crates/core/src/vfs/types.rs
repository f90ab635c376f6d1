use mime::Mime;

use super::node::{BlobRef, NodeKind};

/// Which file variant a mimetype maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileVariant {
    File,
    Image,
}

/// Static mimetype -> node-kind table, built once at construction.
///
/// Unlisted mimetypes fall back to the generic file variant.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    entries: Vec<(Mime, FileVariant)>,
}

impl TypeRegistry {
    /// The built-in table: the common raster image types are images,
    /// everything else is a plain file.
    pub fn builtin() -> Self {
        let entries = ["image/png", "image/jpeg", "image/jpg", "image/gif"]
            .iter()
            .filter_map(|m| m.parse::<Mime>().ok())
            .map(|m| (m, FileVariant::Image))
            .collect();
        Self { entries }
    }

    /// Build a registry from explicit entries.
    pub fn from_entries(entries: Vec<(Mime, FileVariant)>) -> Self {
        Self { entries }
    }

    pub fn classify(&self, mime: &Mime) -> FileVariant {
        self.entries
            .iter()
            .find(|(m, _)| m.essence_str() == mime.essence_str())
            .map(|(_, v)| *v)
            .unwrap_or(FileVariant::File)
    }

    /// Guess a mimetype from a file name; unknowable extensions get
    /// `application/octet-stream`.
    pub fn mime_for_name(&self, name: &str) -> Mime {
        mime_guess::from_path(name).first_or_octet_stream()
    }

    /// Build the kind payload for a new file node.
    ///
    /// Dimensions are only honored when the mimetype classifies as an
    /// image; a plain file silently drops them.
    pub fn make_kind(
        &self,
        mime: Mime,
        blob: BlobRef,
        dimensions: Option<(u32, u32)>,
    ) -> NodeKind {
        match self.classify(&mime) {
            FileVariant::Image => {
                let (width, height) = dimensions.unwrap_or((0, 0));
                NodeKind::Image {
                    mime,
                    blob,
                    width,
                    height,
                    thumb: None,
                }
            }
            FileVariant::File => NodeKind::File { mime, blob },
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
