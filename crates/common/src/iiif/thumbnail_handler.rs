//! Thumbnail urls for pages, records and CMS media

use super::page::{MediaKind, PhysicalPage};
use super::params::{ImageParams, Region, Size};
use super::url_handler::{with_trailing_slash, IiifUrlHandler};
use crate::config::IiifConfig;
use crate::errors::Result;
use crate::search::{fields, SolrDocument};

/// Static images used where no page image can be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackImage {
    Anchor,
    BornDigital,
    Audio,
    Video,
    Object3d,
    AccessDenied,
}

impl FallbackImage {
    pub fn file_name(self, config: &IiifConfig) -> String {
        match self {
            FallbackImage::Anchor => "multivolume_thumbnail.jpg".to_string(),
            FallbackImage::BornDigital => "thumbnail_epub.jpg".to_string(),
            FallbackImage::Audio => "thumbnail_audio.jpg".to_string(),
            FallbackImage::Video => "thumbnail_video.jpg".to_string(),
            FallbackImage::Object3d => "thumbnail_3d.png".to_string(),
            FallbackImage::AccessDenied => config.access_denied_image.clone(),
        }
    }

    fn for_media(kind: MediaKind) -> Option<FallbackImage> {
        match kind {
            MediaKind::Image => None,
            MediaKind::Audio => Some(FallbackImage::Audio),
            MediaKind::Video => Some(FallbackImage::Video),
            MediaKind::Object3d => Some(FallbackImage::Object3d),
            MediaKind::Pdf | MediaKind::Unknown => Some(FallbackImage::BornDigital),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThumbnailHandler {
    config: IiifConfig,
    urls: IiifUrlHandler,
}

impl ThumbnailHandler {
    pub fn new(config: &IiifConfig) -> Self {
        Self {
            config: config.clone(),
            urls: IiifUrlHandler::new(config),
        }
    }

    pub fn static_image_url(&self, image: FallbackImage) -> String {
        format!(
            "{}resources/themes/images/{}",
            with_trailing_slash(&self.config.viewer_url),
            image.file_name(&self.config)
        )
    }

    /// Zero means "configured default"; oversized requests are clamped
    fn thumbnail_size(&self, width: u32, height: u32) -> Size {
        let w = if width == 0 { self.config.thumbnail_width } else { width };
        let h = if height == 0 { self.config.thumbnail_height } else { height };
        Size::BestFit { w, h }.clamped(self.config.max_image_width, self.config.max_image_height)
    }

    fn fallback_for_page(&self, page: &PhysicalPage) -> Option<FallbackImage> {
        if !page.access_permitted {
            return Some(FallbackImage::AccessDenied);
        }
        FallbackImage::for_media(page.media_kind())
    }

    pub fn thumbnail_url(&self, page: &PhysicalPage, width: u32, height: u32) -> Result<String> {
        if let Some(fallback) = self.fallback_for_page(page) {
            return Ok(self.static_image_url(fallback));
        }
        let params = ImageParams::with_size(self.thumbnail_size(width, height));
        self.urls.resolve_image_url(&page.file_name, &page.pi, &params)
    }

    pub fn square_thumbnail_url(&self, page: &PhysicalPage, size: u32) -> Result<String> {
        if let Some(fallback) = self.fallback_for_page(page) {
            return Ok(self.static_image_url(fallback));
        }
        let edge = if size == 0 { self.config.thumbnail_width } else { size };
        let params = ImageParams {
            region: Region::Square,
            size: Size::Width(edge).clamped(self.config.max_image_width, self.config.max_image_height),
            ..ImageParams::default()
        };
        self.urls.resolve_image_url(&page.file_name, &page.pi, &params)
    }

    /// Representative image of a record document
    pub fn record_thumbnail_url(&self, doc: &SolrDocument, width: u32, height: u32) -> Result<String> {
        if doc.bool(fields::ISANCHOR) {
            return Ok(self.static_image_url(FallbackImage::Anchor));
        }

        if let Some(fallback) = doc
            .first_str(fields::MIMETYPE)
            .and_then(|mime| FallbackImage::for_media(MediaKind::from_mime_type(mime)))
        {
            return Ok(self.static_image_url(fallback));
        }

        let Some(thumbnail) = doc.first_str(fields::THUMBNAIL) else {
            return Ok(self.static_image_url(FallbackImage::BornDigital));
        };

        let open = doc
            .values(fields::ACCESSCONDITION)
            .iter()
            .all(|c| c == fields::OPEN_ACCESS);
        if !open {
            return Ok(self.static_image_url(FallbackImage::AccessDenied));
        }

        let pi = doc
            .first_str(fields::PI_TOPSTRUCT)
            .or_else(|| doc.first_str(fields::PI))
            .unwrap_or_default();
        let params = ImageParams::with_size(self.thumbnail_size(width, height));
        self.urls.resolve_image_url(thumbnail, pi, &params)
    }

    /// Thumbnail of a CMS media item, which is either a IIIF source or an external image
    pub fn cms_media_thumbnail_url(&self, media_url: &str, width: u32, height: u32) -> Result<String> {
        let params = ImageParams::with_size(self.thumbnail_size(width, height));
        self.urls.resolve_image_url(media_url, "", &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handler() -> ThumbnailHandler {
        ThumbnailHandler::new(&IiifConfig {
            iiif_api_url: "https://v.example.org/api/v1/".to_string(),
            viewer_url: "https://v.example.org/viewer".to_string(),
            thumbnail_width: 100,
            thumbnail_height: 120,
            max_image_width: 800,
            max_image_height: 800,
            ..IiifConfig::default()
        })
    }

    fn page(mime: &str) -> PhysicalPage {
        PhysicalPage {
            pi: "PPN1".to_string(),
            order: 3,
            file_name: "00000003.jpg".to_string(),
            mime_type: mime.to_string(),
            width: None,
            height: None,
            urn: None,
            access_permitted: true,
        }
    }

    #[test]
    fn test_default_and_clamped_sizes() {
        let h = handler();
        assert!(h.thumbnail_url(&page("image/jpeg"), 0, 0).unwrap().contains("/full/!100,120/0/"));
        assert!(h.thumbnail_url(&page("image/jpeg"), 2000, 300).unwrap().contains("/full/!800,300/0/"));
    }

    #[test]
    fn test_square_thumbnail() {
        let url = handler().square_thumbnail_url(&page("image/jpeg"), 150).unwrap();
        assert!(url.ends_with("/square/150,/0/default.jpg"));
    }

    #[test]
    fn test_media_fallbacks() {
        let h = handler();
        assert_eq!(
            h.thumbnail_url(&page("audio/mpeg"), 0, 0).unwrap(),
            "https://v.example.org/viewer/resources/themes/images/thumbnail_audio.jpg"
        );
        assert!(h.thumbnail_url(&page("video/mp4"), 0, 0).unwrap().ends_with("thumbnail_video.jpg"));
        let mut restricted = page("image/jpeg");
        restricted.access_permitted = false;
        assert!(h.thumbnail_url(&restricted, 0, 0).unwrap().ends_with("access_denied.png"));
    }

    #[test]
    fn test_record_thumbnail() {
        let h = handler();
        let doc = SolrDocument::new()
            .with("PI", "PPN1")
            .with("THUMBNAIL", "00000001.jpg")
            .with("MIMETYPE", "image");
        assert_eq!(
            h.record_thumbnail_url(&doc, 0, 0).unwrap(),
            "https://v.example.org/api/v1/records/PPN1/files/images/00000001.jpg/full/!100,120/0/default.jpg"
        );

        let anchor = SolrDocument::new().with("PI", "PPN0").with("ISANCHOR", true);
        assert!(h.record_thumbnail_url(&anchor, 0, 0).unwrap().ends_with("multivolume_thumbnail.jpg"));

        let born_digital = SolrDocument::new().with("PI", "PPN2");
        assert!(h.record_thumbnail_url(&born_digital, 0, 0).unwrap().ends_with("thumbnail_epub.jpg"));

        let restricted = doc.clone().with("ACCESSCONDITION", json!(["restricted"]));
        assert!(h.record_thumbnail_url(&restricted, 0, 0).unwrap().ends_with("access_denied.png"));
    }

    #[test]
    fn test_cms_media_thumbnail() {
        let url = handler()
            .cms_media_thumbnail_url("https://iiif.example.org/media/logo/info.json", 50, 50)
            .unwrap();
        assert_eq!(url, "https://iiif.example.org/media/logo/full/!50,50/0/default.jpg");
    }
}
