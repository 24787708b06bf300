//! Physical pages as read from page documents

use super::params::Format;
use crate::errors::{AppError, Result};
use crate::search::{fields, SolrDocument};
use serde::{Deserialize, Serialize};

/// Kind of media a page (or record) carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    Object3d,
    Pdf,
    Unknown,
}

impl MediaKind {
    /// Classify a mime type (`image/tiff`) or a bare base type (`image`)
    pub fn from_mime_type(mime: &str) -> MediaKind {
        let mime = mime.trim().to_ascii_lowercase();
        if mime == "application/pdf" {
            return MediaKind::Pdf;
        }
        match mime.split('/').next().unwrap_or_default() {
            "image" => MediaKind::Image,
            "audio" => MediaKind::Audio,
            "video" => MediaKind::Video,
            "object" | "model" => MediaKind::Object3d,
            _ => MediaKind::Unknown,
        }
    }
}

/// A page of a record with the data needed to deliver its image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalPage {
    pub pi: String,
    pub order: u32,
    pub file_name: String,
    pub mime_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub urn: Option<String>,
    /// False when any access condition other than open access applies
    pub access_permitted: bool,
}

impl PhysicalPage {
    pub fn from_doc(doc: &SolrDocument) -> Result<Self> {
        let missing = |field: &str| AppError::Presentation {
            message: format!("Page document lacks field {}", field),
        };

        let pi = doc
            .first_str(fields::PI_TOPSTRUCT)
            .ok_or_else(|| missing(fields::PI_TOPSTRUCT))?
            .to_string();
        let order = doc
            .first_i64(fields::ORDER)
            .and_then(|o| u32::try_from(o).ok())
            .ok_or_else(|| missing(fields::ORDER))?;
        let file_name = doc
            .first_str(fields::FILENAME)
            .ok_or_else(|| missing(fields::FILENAME))?
            .to_string();

        let mime_type = doc
            .first_str(fields::MIMETYPE)
            .map(str::to_string)
            .or_else(|| Format::from_filename(&file_name).map(|f| f.mime_type().to_string()))
            .unwrap_or_else(|| "image/jpeg".to_string());

        let access_permitted = doc
            .values(fields::ACCESSCONDITION)
            .iter()
            .all(|c| c == fields::OPEN_ACCESS);

        Ok(Self {
            pi,
            order,
            file_name,
            mime_type,
            width: doc.first_i64(fields::WIDTH).and_then(|w| u32::try_from(w).ok()),
            height: doc.first_i64(fields::HEIGHT).and_then(|h| u32::try_from(h).ok()),
            urn: doc.first_str(fields::IMAGEURN).map(str::to_string),
            access_permitted,
        })
    }

    pub fn media_kind(&self) -> MediaKind {
        MediaKind::from_mime_type(&self.mime_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page_doc() -> SolrDocument {
        SolrDocument::new()
            .with("PI_TOPSTRUCT", "PPN123")
            .with("ORDER", 2)
            .with("FILENAME", "00000002.tif")
            .with("WIDTH", 2000)
            .with("HEIGHT", 3000)
    }

    #[test]
    fn test_from_doc() {
        let page = PhysicalPage::from_doc(&page_doc()).unwrap();
        assert_eq!(page.pi, "PPN123");
        assert_eq!(page.order, 2);
        assert_eq!(page.mime_type, "image/tiff");
        assert_eq!(page.width, Some(2000));
        assert!(page.access_permitted);
        assert_eq!(page.media_kind(), MediaKind::Image);
    }

    #[test]
    fn test_restricted_access() {
        let doc = page_doc().with("ACCESSCONDITION", json!(["OPENACCESS", "restricted"]));
        assert!(!PhysicalPage::from_doc(&doc).unwrap().access_permitted);
    }

    #[test]
    fn test_missing_filename_is_presentation_error() {
        let doc = SolrDocument::new().with("PI_TOPSTRUCT", "PPN1").with("ORDER", 1);
        assert!(matches!(
            PhysicalPage::from_doc(&doc),
            Err(AppError::Presentation { .. })
        ));
    }

    #[test]
    fn test_media_kind() {
        assert_eq!(MediaKind::from_mime_type("video/mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_mime_type("audio"), MediaKind::Audio);
        assert_eq!(MediaKind::from_mime_type("application/pdf"), MediaKind::Pdf);
        assert_eq!(MediaKind::from_mime_type("object/gltf"), MediaKind::Object3d);
        assert_eq!(MediaKind::from_mime_type("text/plain"), MediaKind::Unknown);
    }
}
