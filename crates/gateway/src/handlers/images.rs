//! IIIF image, thumbnail and watermark url handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::load_page;
use crate::AppState;
use viewer_common::{
    errors::Result,
    iiif::{
        IiifUrlHandler, ImageHandler, ImageParams, MediaKind, PageType, ParamChanges, PhysicalPage, Size,
        WatermarkHandler,
    },
    metrics,
};

#[derive(Debug, Default, Deserialize)]
pub struct ImageQuery {
    pub region: Option<String>,
    pub size: Option<String>,
    pub rotation: Option<String>,
    pub quality: Option<String>,
    pub format: Option<String>,
    pub page_type: Option<String>,
}

impl ImageQuery {
    fn changes(&self) -> Result<ParamChanges> {
        ParamChanges::parse(
            self.region.as_deref(),
            self.size.as_deref(),
            self.rotation.as_deref(),
            self.quality.as_deref(),
            self.format.as_deref(),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub url: String,
    /// Absent for restricted pages and external images without an image service
    pub info_url: Option<String>,
    pub media_kind: MediaKind,
    pub footer_height: u32,
}

fn image_response(
    images: &ImageHandler,
    watermarks: &WatermarkHandler,
    page: &PhysicalPage,
    query: &ImageQuery,
) -> Result<ImageResponse> {
    let page_type = match query.page_type.as_deref() {
        Some(value) => value.parse()?,
        None => PageType::default(),
    };

    let changes = query.changes()?;
    let params = (changes != ParamChanges::default())
        .then(|| changes.apply_to(ImageParams::with_size(images.size_for(page_type))));

    Ok(ImageResponse {
        url: images.image_url_with(page, page_type, params)?,
        info_url: images.image_information_url(page)?,
        media_kind: ImageHandler::image_type(page),
        footer_height: watermarks.footer_height(page_type),
    })
}

/// Image url of a page, with optional IIIF parameter overrides
pub async fn page_image(
    State(state): State<AppState>,
    Path((pi, order)): Path<(String, u32)>,
    Query(query): Query<ImageQuery>,
) -> Result<Json<ImageResponse>> {
    let (page, _) = load_page(&state, &pi, order).await?;
    let response = image_response(&state.images, &state.watermarks, &page, &query)?;
    metrics::record_iiif_url("image");
    Ok(Json(response))
}

#[derive(Debug, Default, Deserialize)]
pub struct ThumbnailQuery {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub square: bool,
}

#[derive(Debug, Serialize)]
pub struct UrlResponse {
    pub url: String,
}

/// Thumbnail of a page; `square` crops to a square of `width`
pub async fn page_thumbnail(
    State(state): State<AppState>,
    Path((pi, order)): Path<(String, u32)>,
    Query(query): Query<ThumbnailQuery>,
) -> Result<Json<UrlResponse>> {
    let (page, _) = load_page(&state, &pi, order).await?;
    let url = if query.square {
        state.thumbnails.square_thumbnail_url(&page, query.width)?
    } else {
        state.thumbnails.thumbnail_url(&page, query.width, query.height)?
    };
    metrics::record_iiif_url("thumbnail");
    Ok(Json(UrlResponse { url }))
}

/// Representative thumbnail of a record
pub async fn record_thumbnail(
    State(state): State<AppState>,
    Path(pi): Path<String>,
    Query(query): Query<ThumbnailQuery>,
) -> Result<Json<UrlResponse>> {
    let doc = state.record(&pi).await?;
    let url = state
        .thumbnails
        .record_thumbnail_url(&doc, query.width, query.height)?;
    metrics::record_iiif_url("record_thumbnail");
    Ok(Json(UrlResponse { url }))
}

#[derive(Debug, Default, Deserialize)]
pub struct WatermarkQuery {
    pub size: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WatermarkResponse {
    pub enabled: bool,
    pub text: Option<String>,
    pub id: Option<String>,
    pub url: Option<String>,
}

/// Footer text, id and image url of a page
pub async fn page_watermark(
    State(state): State<AppState>,
    Path((pi, order)): Path<(String, u32)>,
    Query(query): Query<WatermarkQuery>,
) -> Result<Json<WatermarkResponse>> {
    if !state.watermarks.is_enabled() {
        return Ok(Json(WatermarkResponse {
            enabled: false,
            text: None,
            id: None,
            url: None,
        }));
    }

    let (page, page_doc) = load_page(&state, &pi, order).await?;
    let record = state.record(&pi).await?;
    let size = match query.size.as_deref() {
        Some(value) => value.parse()?,
        None => page.width.map(Size::Width).unwrap_or(Size::Max),
    };

    let text = state
        .watermarks
        .watermark_text(&page, Some(&page_doc), Some(&record));
    let url = state
        .watermarks
        .watermark_url(&page, Some(&page_doc), Some(&record), size);
    metrics::record_iiif_url("watermark");

    Ok(Json(WatermarkResponse {
        enabled: true,
        text,
        id: state.watermarks.footer_id(&record),
        url,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ModifyRequest {
    pub url: String,
    #[serde(flatten)]
    pub params: ImageQuery,
}

#[derive(Debug, Serialize)]
pub struct ModifyResponse {
    pub url: String,
    pub modified: bool,
}

/// Replace segments of an existing IIIF image url
pub async fn modify_url(Json(request): Json<ModifyRequest>) -> Result<Json<ModifyResponse>> {
    let changes = request.params.changes()?;
    let url = IiifUrlHandler::modified_iiif_url(&request.url, &changes);
    Ok(Json(ModifyResponse {
        modified: url != request.url,
        url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use viewer_common::config::{IiifConfig, WatermarkConfig};

    fn iiif_config(use_iiif_api: bool) -> IiifConfig {
        IiifConfig {
            iiif_api_url: "https://viewer.example.org/api/v1/".into(),
            rest_api_url: "https://viewer.example.org/api/v1/".into(),
            viewer_url: "https://viewer.example.org/viewer/".into(),
            use_iiif_api,
            ..IiifConfig::default()
        }
    }

    fn scan(file_name: &str, access_permitted: bool) -> PhysicalPage {
        PhysicalPage {
            pi: "PPN1".into(),
            order: 1,
            file_name: file_name.into(),
            mime_type: "image/jpeg".into(),
            width: Some(2000),
            height: Some(3000),
            urn: None,
            access_permitted,
        }
    }

    fn respond(config: &IiifConfig, page: &PhysicalPage) -> ImageResponse {
        let images = ImageHandler::new(config);
        let watermarks = WatermarkHandler::new(&WatermarkConfig::default(), config);
        image_response(&images, &watermarks, page, &ImageQuery::default()).unwrap()
    }

    #[test]
    fn test_image_response_for_local_page() {
        let response = respond(&iiif_config(true), &scan("00000001.jpg", true));
        assert!(response.url.starts_with("https://viewer.example.org/api/v1/records/PPN1/files/images/00000001.jpg/full/"));
        assert_eq!(
            response.info_url.as_deref(),
            Some("https://viewer.example.org/api/v1/records/PPN1/files/images/00000001.jpg/info.json")
        );
        assert_eq!(response.footer_height, 0);
    }

    #[test]
    fn test_image_response_for_plain_external_image() {
        let response = respond(&iiif_config(false), &scan("https://other.example.org/scan.jpg", true));
        assert_eq!(response.url, "https://other.example.org/scan.jpg");
        assert_eq!(response.info_url, None);
    }

    #[test]
    fn test_image_response_hides_restricted_image_information() {
        let config = iiif_config(true);
        let response = respond(&config, &scan("00000001.jpg", false));
        assert!(ImageHandler::new(&config).is_restricted_url(&response.url));
        assert_eq!(response.info_url, None);
    }

    #[tokio::test]
    async fn test_modify_url() {
        let request = ModifyRequest {
            url: "https://iiif.example.org/image/PPN1/00000001.tif/full/max/0/default.jpg".into(),
            params: ImageQuery {
                size: Some("!200,200".into()),
                format: Some("png".into()),
                ..ImageQuery::default()
            },
        };
        let Json(response) = modify_url(Json(request)).await.unwrap();
        assert!(response.modified);
        assert_eq!(
            response.url,
            "https://iiif.example.org/image/PPN1/00000001.tif/full/!200,200/0/default.png"
        );
    }

    #[tokio::test]
    async fn test_modify_leaves_foreign_urls() {
        let request = ModifyRequest {
            url: "https://example.org/picture.jpg".into(),
            params: ImageQuery {
                size: Some("100,".into()),
                ..ImageQuery::default()
            },
        };
        let Json(response) = modify_url(Json(request)).await.unwrap();
        assert!(!response.modified);
    }

    #[tokio::test]
    async fn test_modify_rejects_bad_segments() {
        let request = ModifyRequest {
            url: "https://iiif.example.org/image/x/full/max/0/default.jpg".into(),
            params: ImageQuery {
                rotation: Some("sideways".into()),
                ..ImageQuery::default()
            },
        };
        assert!(modify_url(Json(request)).await.is_err());
    }
}
