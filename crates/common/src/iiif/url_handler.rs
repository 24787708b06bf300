//! IIIF image url construction and rewriting
//!
//! Image sources come in three shapes: IIIF image service urls, arbitrary
//! external urls, and file names of images stored with a record. All of them
//! are turned into IIIF image requests here.

use super::params::{ImageParams, ParamChanges};
use crate::config::IiifConfig;
use crate::errors::{AppError, Result};
use regex_lite::{Captures, Regex};
use std::sync::OnceLock;

const REGION_PATTERN: &str = r"full|square|(?:pct:)?\d+(?:\.\d+)?,\d+(?:\.\d+)?,\d+(?:\.\d+)?,\d+(?:\.\d+)?";
const SIZE_PATTERN: &str = r"full|max|\d+,|,\d+|pct:\d+(?:\.\d+)?|!?\d+,\d+";
const ROTATION_PATTERN: &str = r"!?\d{1,3}(?:\.\d+)?";
const QUALITY_PATTERN: &str = r"default|color|gray|grey|bitonal|native";
const FORMAT_PATTERN: &str = r"jpe?g|png|tiff?|gif|jp2|pdf|webp";

fn image_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"^(.+?)/({})/({})/({})/({})\.({})(\?.*)?$",
            REGION_PATTERN, SIZE_PATTERN, ROTATION_PATTERN, QUALITY_PATTERN, FORMAT_PATTERN
        );
        Regex::new(&pattern).expect("IIIF image pattern is valid")
    })
}

fn info_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.+?)/info\.json(\?.*)?$").expect("IIIF info pattern is valid"))
}

/// Percent-encode a value for use as a single path segment
pub fn encode_path_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn is_http_url(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Text of a capture group, empty when the group did not match
fn group<'h>(caps: &Captures<'h>, i: usize) -> &'h str {
    caps.get(i).map(|m| m.as_str()).unwrap_or("")
}

/// Where the image service of a source lives
enum ServiceBase {
    /// A IIIF image service base url
    Iiif(String),
    /// An external url that is delivered as-is
    Plain(String),
}

/// Builds and rewrites IIIF image urls
#[derive(Debug, Clone)]
pub struct IiifUrlHandler {
    iiif_api_url: String,
    use_iiif_api: bool,
}

impl IiifUrlHandler {
    pub fn new(config: &IiifConfig) -> Self {
        Self {
            iiif_api_url: with_trailing_slash(&config.iiif_api_url),
            use_iiif_api: config.use_iiif_api,
        }
    }

    /// Append image request parameters to an image service base url
    pub fn iiif_image_url(base: &str, params: &ImageParams) -> String {
        let base = base.strip_suffix("/info.json").unwrap_or(base);
        format!("{}/{}", base.trim_end_matches('/'), params)
    }

    pub fn is_iiif_image_url(url: &str) -> bool {
        image_regex().is_match(url)
    }

    pub fn is_iiif_image_info_url(url: &str) -> bool {
        info_regex().is_match(url)
    }

    /// Replace the given segments of a IIIF image url; other urls are returned unchanged
    pub fn modified_iiif_url(url: &str, changes: &ParamChanges) -> String {
        let Some(caps) = image_regex().captures(url) else {
            return url.to_string();
        };

        let region = changes
            .region
            .map(|r| r.to_string())
            .unwrap_or_else(|| group(&caps, 2).to_string());
        let size = changes
            .size
            .map(|s| s.to_string())
            .unwrap_or_else(|| group(&caps, 3).to_string());
        let rotation = changes
            .rotation
            .map(|r| r.to_string())
            .unwrap_or_else(|| group(&caps, 4).to_string());
        let quality = changes
            .quality
            .map(|q| q.to_string())
            .unwrap_or_else(|| group(&caps, 5).to_string());
        let format = changes
            .format
            .map(|f| f.to_string())
            .unwrap_or_else(|| group(&caps, 6).to_string());

        format!(
            "{}/{}/{}/{}/{}.{}{}",
            group(&caps, 1),
            region,
            size,
            rotation,
            quality,
            format,
            group(&caps, 7)
        )
    }

    /// Image service base of a IIIF image or info url
    pub fn image_base_url(url: &str) -> String {
        if let Some(caps) = image_regex().captures(url) {
            return caps[1].to_string();
        }
        if let Some(caps) = info_regex().captures(url) {
            return caps[1].to_string();
        }
        url.trim_end_matches('/').to_string()
    }

    fn service_base(&self, file_url: &str, pi: &str) -> Result<ServiceBase> {
        let file_url = file_url.trim();
        if file_url.is_empty() {
            return Err(AppError::validation("Image source must not be empty"));
        }

        if Self::is_iiif_image_url(file_url) || Self::is_iiif_image_info_url(file_url) {
            return Ok(ServiceBase::Iiif(Self::image_base_url(file_url)));
        }

        if is_http_url(file_url) {
            return Ok(if self.use_iiif_api {
                ServiceBase::Iiif(format!(
                    "{}image/-/{}",
                    self.iiif_api_url,
                    encode_path_segment(file_url)
                ))
            } else {
                ServiceBase::Plain(file_url.to_string())
            });
        }

        if pi.trim().is_empty() {
            return Err(AppError::validation(format!(
                "Local image '{}' needs a record identifier",
                file_url
            )));
        }

        Ok(ServiceBase::Iiif(format!(
            "{}records/{}/files/images/{}",
            self.iiif_api_url,
            encode_path_segment(pi.trim()),
            encode_path_segment(file_url)
        )))
    }

    /// Resolve any image source into an image request url
    pub fn resolve_image_url(&self, file_url: &str, pi: &str, params: &ImageParams) -> Result<String> {
        if Self::is_iiif_image_url(file_url.trim()) {
            let changes = ParamChanges {
                region: Some(params.region),
                size: Some(params.size),
                rotation: Some(params.rotation),
                quality: Some(params.quality),
                format: Some(params.format),
            };
            return Ok(Self::modified_iiif_url(file_url.trim(), &changes));
        }

        match self.service_base(file_url, pi)? {
            ServiceBase::Iiif(base) => Ok(Self::iiif_image_url(&base, params)),
            ServiceBase::Plain(url) => Ok(url),
        }
    }

    /// Resolve any image source into its `info.json` url
    pub fn info_url(&self, file_url: &str, pi: &str) -> Result<String> {
        self.optional_info_url(file_url, pi)?.ok_or_else(|| AppError::Presentation {
            message: format!("No image information available for external image {}", file_url.trim()),
        })
    }

    /// `info.json` url of an image source; `None` for external images delivered as-is
    pub fn optional_info_url(&self, file_url: &str, pi: &str) -> Result<Option<String>> {
        Ok(match self.service_base(file_url, pi)? {
            ServiceBase::Iiif(base) => Some(format!("{}/info.json", base.trim_end_matches('/'))),
            ServiceBase::Plain(_) => None,
        })
    }
}

pub(crate) fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iiif::params::{Format, Quality, Region, Rotation, Size};

    fn handler(use_iiif_api: bool) -> IiifUrlHandler {
        IiifUrlHandler {
            iiif_api_url: "https://viewer.example.org/api/v1/".to_string(),
            use_iiif_api,
        }
    }

    #[test]
    fn test_detects_image_and_info_urls() {
        assert!(IiifUrlHandler::is_iiif_image_url(
            "https://iiif.example.org/iiif/2/abc/full/max/0/default.jpg"
        ));
        assert!(IiifUrlHandler::is_iiif_image_url(
            "https://iiif.example.org/iiif/2/abc/pct:10,10,80,80/!800,600/!90/gray.png?token=1"
        ));
        assert!(!IiifUrlHandler::is_iiif_image_url("https://example.org/images/scan.jpg"));
        assert!(IiifUrlHandler::is_iiif_image_info_url(
            "https://iiif.example.org/iiif/2/abc/info.json"
        ));
    }

    #[test]
    fn test_modified_url_replaces_only_given_segments() {
        let url = "https://iiif.example.org/iiif/2/abc/full/max/0/default.jpg?token=1";
        let changes = ParamChanges {
            size: Some(Size::Width(600)),
            quality: Some(Quality::Gray),
            ..Default::default()
        };
        assert_eq!(
            IiifUrlHandler::modified_iiif_url(url, &changes),
            "https://iiif.example.org/iiif/2/abc/full/600,/0/gray.jpg?token=1"
        );
    }

    #[test]
    fn test_modified_url_leaves_other_urls() {
        let url = "https://example.org/images/scan.jpg";
        let changes = ParamChanges {
            size: Some(Size::Width(600)),
            ..Default::default()
        };
        assert_eq!(IiifUrlHandler::modified_iiif_url(url, &changes), url);
    }

    #[test]
    fn test_modified_url_keeps_percent_region() {
        let url = "https://iiif.example.org/abc/pct:5.5,0,50,50/max/0/default.jpg";
        let changes = ParamChanges {
            format: Some(Format::Png),
            ..Default::default()
        };
        assert_eq!(
            IiifUrlHandler::modified_iiif_url(url, &changes),
            "https://iiif.example.org/abc/pct:5.5,0,50,50/max/0/default.png"
        );
    }

    #[test]
    fn test_resolve_local_file() {
        let params = ImageParams::with_size(Size::BestFit { w: 100, h: 120 });
        let url = handler(true)
            .resolve_image_url("00000001 a.tif", "PPN123", &params)
            .unwrap();
        assert_eq!(
            url,
            "https://viewer.example.org/api/v1/records/PPN123/files/images/00000001%20a.tif/full/!100,120/0/default.jpg"
        );
    }

    #[test]
    fn test_resolve_external_url_through_api() {
        let url = handler(true)
            .resolve_image_url("http://example.org/a.jpg", "PPN1", &ImageParams::default())
            .unwrap();
        assert_eq!(
            url,
            "https://viewer.example.org/api/v1/image/-/http%3A%2F%2Fexample.org%2Fa.jpg/full/max/0/default.jpg"
        );
    }

    #[test]
    fn test_resolve_external_url_without_api() {
        let url = handler(false)
            .resolve_image_url("http://example.org/a.jpg", "PPN1", &ImageParams::default())
            .unwrap();
        assert_eq!(url, "http://example.org/a.jpg");
        assert!(handler(false).info_url("http://example.org/a.jpg", "PPN1").is_err());
        assert_eq!(
            handler(false).optional_info_url("http://example.org/a.jpg", "PPN1").unwrap(),
            None
        );
    }

    #[test]
    fn test_resolve_info_url_source() {
        let params = ImageParams {
            region: Region::Square,
            size: Size::Width(200),
            rotation: Rotation { degrees: 90, mirror: false },
            quality: Quality::Default,
            format: Format::Png,
        };
        let url = handler(true)
            .resolve_image_url("https://iiif.example.org/abc/info.json", "", &params)
            .unwrap();
        assert_eq!(url, "https://iiif.example.org/abc/square/200,/90/default.png");
    }

    #[test]
    fn test_info_url() {
        assert_eq!(
            handler(true).info_url("00000002.jpg", "PPN9").unwrap(),
            "https://viewer.example.org/api/v1/records/PPN9/files/images/00000002.jpg/info.json"
        );
        assert_eq!(
            handler(true)
                .info_url("https://iiif.example.org/abc/full/max/0/default.jpg", "")
                .unwrap(),
            "https://iiif.example.org/abc/info.json"
        );
    }

    #[test]
    fn test_empty_source_and_missing_pi() {
        assert!(handler(true).resolve_image_url("  ", "PPN1", &ImageParams::default()).is_err());
        assert!(handler(true).resolve_image_url("a.jpg", "", &ImageParams::default()).is_err());
    }

    #[test]
    fn test_non_ascii_file_names_are_encoded() {
        assert_eq!(encode_path_segment("Bild ü.jpg"), "Bild%20%C3%BC.jpg");
    }
}
