//! Image delivery for record pages

use super::page::{MediaKind, PhysicalPage};
use super::params::{Format, ImageParams, Quality, Size};
use super::url_handler::IiifUrlHandler;
use crate::config::IiifConfig;
use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// The view an image is requested for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PageType {
    #[default]
    ViewImage,
    ViewFullscreen,
    ViewThumbs,
}

impl std::str::FromStr for PageType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "viewImage" | "image" => Ok(PageType::ViewImage),
            "viewFullscreen" | "fullscreen" => Ok(PageType::ViewFullscreen),
            "viewThumbs" | "thumbs" => Ok(PageType::ViewThumbs),
            _ => Err(AppError::validation(format!("Unknown page type '{}'", s))),
        }
    }
}

/// Resolves image and image-information urls of pages
#[derive(Debug, Clone)]
pub struct ImageHandler {
    config: IiifConfig,
    urls: IiifUrlHandler,
}

impl ImageHandler {
    pub fn new(config: &IiifConfig) -> Self {
        Self {
            config: config.clone(),
            urls: IiifUrlHandler::new(config),
        }
    }

    pub fn url_handler(&self) -> &IiifUrlHandler {
        &self.urls
    }

    fn default_params(&self, size: Size) -> ImageParams {
        ImageParams {
            size: size.clamped(self.config.max_image_width, self.config.max_image_height),
            quality: self.config.default_quality.parse().unwrap_or(Quality::Default),
            format: self.config.default_format.parse().unwrap_or(Format::Jpg),
            ..ImageParams::default()
        }
    }

    /// Size delivered for a page type
    pub fn size_for(&self, page_type: PageType) -> Size {
        match page_type {
            PageType::ViewImage | PageType::ViewFullscreen => Size::BestFit {
                w: self.config.max_image_width,
                h: self.config.max_image_height,
            },
            PageType::ViewThumbs => Size::BestFit {
                w: self.config.thumbnail_width,
                h: self.config.thumbnail_height,
            },
        }
    }

    /// Url of the access-denied placeholder
    pub fn access_denied_url(&self) -> String {
        format!(
            "{}resources/themes/images/{}",
            super::url_handler::with_trailing_slash(&self.config.viewer_url),
            self.config.access_denied_image
        )
    }

    /// Image url of a page for the given view
    pub fn image_url(&self, page: &PhysicalPage, page_type: PageType) -> Result<String> {
        self.image_url_with(page, page_type, None)
    }

    /// Image url of a page with caller-provided parameters overriding the view defaults
    pub fn image_url_with(
        &self,
        page: &PhysicalPage,
        page_type: PageType,
        params: Option<ImageParams>,
    ) -> Result<String> {
        if page.media_kind() != MediaKind::Image {
            return Err(AppError::Presentation {
                message: format!(
                    "Page {} of {} has no image ({})",
                    page.order, page.pi, page.mime_type
                ),
            });
        }
        if !page.access_permitted {
            debug!(pi = %page.pi, order = page.order, "Image access denied");
            return Ok(self.access_denied_url());
        }

        let mut params = params.unwrap_or_else(|| self.default_params(self.size_for(page_type)));
        params.size = params
            .size
            .clamped(self.config.max_image_width, self.config.max_image_height);
        self.urls.resolve_image_url(&page.file_name, &page.pi, &params)
    }

    /// `info.json` url of a page image
    ///
    /// `None` for restricted pages and for external images delivered without
    /// an image service.
    pub fn image_information_url(&self, page: &PhysicalPage) -> Result<Option<String>> {
        if page.media_kind() != MediaKind::Image {
            return Err(AppError::Presentation {
                message: format!("Page {} of {} has no image", page.order, page.pi),
            });
        }
        if !page.access_permitted {
            return Ok(None);
        }
        self.urls.optional_info_url(&page.file_name, &page.pi)
    }

    /// True if the url points at this viewer or its REST API; unparseable urls are not internal
    pub fn is_internal_url(&self, value: &str) -> bool {
        let Ok(target) = url::Url::parse(value) else {
            debug!(url = %value, "Unable to parse url");
            return false;
        };
        [&self.config.viewer_url, &self.config.rest_api_url, &self.config.iiif_api_url]
            .iter()
            .filter_map(|own| url::Url::parse(own).ok())
            .any(|own| {
                own.host_str() == target.host_str()
                    && own.port_or_known_default() == target.port_or_known_default()
            })
    }

    pub fn is_external_url(&self, value: &str) -> bool {
        let lower = value.trim().to_ascii_lowercase();
        (lower.starts_with("http://") || lower.starts_with("https://")) && !self.is_internal_url(value)
    }

    /// True for urls pointing at the access-denied placeholder
    pub fn is_restricted_url(&self, value: &str) -> bool {
        let path = value.split(['?', '#']).next().unwrap_or(value);
        path.ends_with(&format!("/{}", self.config.access_denied_image))
    }

    /// True for IIIF image urls and urls of image files
    pub fn is_image_url(value: &str, require_file_ending: bool) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        if IiifUrlHandler::is_iiif_image_url(value) {
            return true;
        }
        let path = value.split(['?', '#']).next().unwrap_or(value);
        let file = path.rsplit('/').next().unwrap_or(path);
        match file.rsplit_once('.') {
            Some((_, ext)) => matches!(
                ext.to_ascii_lowercase().as_str(),
                "jpg" | "jpeg" | "png" | "tif" | "tiff" | "gif" | "jp2" | "webp" | "bmp"
            ),
            None => !require_file_ending,
        }
    }

    pub fn image_type(page: &PhysicalPage) -> MediaKind {
        page.media_kind()
    }

    /// Sizes offered by the zoomable image view
    pub fn image_sizes(&self) -> Vec<Size> {
        self.config
            .image_view_zoom_scales
            .iter()
            .filter_map(|scale| match scale.trim().parse::<u32>() {
                Ok(width) => Some(Size::Width(width)),
                Err(_) => scale.trim().parse::<Size>().ok(),
            })
            .collect()
    }

    /// Tile size -> scale factors
    pub fn tile_sizes(&self) -> BTreeMap<u32, Vec<u32>> {
        self.config
            .tile_sizes
            .iter()
            .map(|t| (t.size, t.scale_factors.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> IiifConfig {
        IiifConfig {
            iiif_api_url: "https://viewer.example.org/api/v1/".to_string(),
            rest_api_url: "https://viewer.example.org/api/v1/".to_string(),
            viewer_url: "https://viewer.example.org/viewer/".to_string(),
            max_image_width: 4000,
            max_image_height: 4000,
            ..IiifConfig::default()
        }
    }

    fn page() -> PhysicalPage {
        PhysicalPage {
            pi: "PPN123".to_string(),
            order: 1,
            file_name: "00000001.tif".to_string(),
            mime_type: "image/tiff".to_string(),
            width: Some(3000),
            height: Some(4000),
            urn: None,
            access_permitted: true,
        }
    }

    #[test]
    fn test_image_url_for_view() {
        let handler = ImageHandler::new(&config());
        assert_eq!(
            handler.image_url(&page(), PageType::ViewImage).unwrap(),
            "https://viewer.example.org/api/v1/records/PPN123/files/images/00000001.tif/full/!4000,4000/0/default.jpg"
        );
        assert!(handler
            .image_url(&page(), PageType::ViewFullscreen)
            .unwrap()
            .contains("/full/!4000,4000/0/"));
    }

    #[test]
    fn test_requested_size_is_clamped() {
        let handler = ImageHandler::new(&config());
        let params = ImageParams::with_size(Size::Width(9000));
        let url = handler
            .image_url_with(&page(), PageType::ViewImage, Some(params))
            .unwrap();
        assert!(url.contains("/full/4000,/0/"));
    }

    #[test]
    fn test_restricted_page_gets_placeholder() {
        let handler = ImageHandler::new(&config());
        let mut restricted = page();
        restricted.access_permitted = false;
        let url = handler.image_url(&restricted, PageType::ViewImage).unwrap();
        assert!(handler.is_restricted_url(&url));
        assert_eq!(handler.image_information_url(&restricted).unwrap(), None);
        assert_eq!(
            handler.image_information_url(&page()).unwrap().as_deref(),
            Some("https://viewer.example.org/api/v1/records/PPN123/files/images/00000001.tif/info.json")
        );
        assert!(!handler.is_restricted_url(&handler.image_url(&page(), PageType::ViewImage).unwrap()));
    }

    #[test]
    fn test_non_image_page_is_rejected() {
        let handler = ImageHandler::new(&config());
        let mut video = page();
        video.mime_type = "video/mp4".to_string();
        assert!(handler.image_url(&video, PageType::ViewImage).is_err());
        assert!(handler.image_information_url(&video).is_err());
    }

    #[test]
    fn test_plain_external_image_has_no_information_url() {
        let handler = ImageHandler::new(&IiifConfig {
            use_iiif_api: false,
            ..config()
        });
        let mut external = page();
        external.file_name = "https://other.example.org/scan.jpg".to_string();
        external.mime_type = "image/jpeg".to_string();
        assert_eq!(
            handler.image_url(&external, PageType::ViewImage).unwrap(),
            "https://other.example.org/scan.jpg"
        );
        assert_eq!(handler.image_information_url(&external).unwrap(), None);
    }

    #[test]
    fn test_internal_and_external_urls() {
        let handler = ImageHandler::new(&config());
        assert!(handler.is_internal_url("https://viewer.example.org/viewer/image/PPN1/1/"));
        assert!(!handler.is_internal_url("https://other.example.org/a.jpg"));
        assert!(!handler.is_internal_url("not a url"));
        assert!(handler.is_external_url("https://other.example.org/a.jpg"));
        assert!(!handler.is_external_url("00000001.tif"));
    }

    #[test]
    fn test_is_image_url() {
        assert!(ImageHandler::is_image_url("https://x.org/scan.JPG?x=1", true));
        assert!(ImageHandler::is_image_url("https://x.org/iiif/abc/full/max/0/default.jpg", true));
        assert!(!ImageHandler::is_image_url("https://x.org/file.pdf", false));
        assert!(ImageHandler::is_image_url("https://x.org/image", false));
        assert!(!ImageHandler::is_image_url("https://x.org/image", true));
        assert!(!ImageHandler::is_image_url("", false));
    }

    #[test]
    fn test_sizes_and_tiles() {
        let mut cfg = config();
        cfg.image_view_zoom_scales = vec!["600".into(), "max".into(), "bogus".into()];
        let handler = ImageHandler::new(&cfg);
        assert_eq!(handler.image_sizes(), vec![Size::Width(600), Size::Max]);
        assert_eq!(handler.tile_sizes().get(&512).map(Vec::len), Some(6));
    }
}
