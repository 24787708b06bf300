//! Watermark (image footer) text, id and url resolution

use super::image_handler::PageType;
use super::page::PhysicalPage;
use super::params::Size;
use super::url_handler::{encode_path_segment, with_trailing_slash};
use crate::config::{IiifConfig, WatermarkConfig};
use crate::search::{fields, SolrDocument};
use std::collections::HashMap;
use std::sync::Mutex;

const SOLR_SOURCE_PREFIX: &str = "SOLR:";

/// One configured text source, tried in order
#[derive(Debug, Clone, PartialEq, Eq)]
enum TextSource {
    Field(String),
    Urn,
    Purl,
    Literal(String),
}

impl TextSource {
    fn parse(value: &str) -> Option<TextSource> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if let Some(field) = value.strip_prefix(SOLR_SOURCE_PREFIX) {
            return Some(TextSource::Field(field.trim().to_string()));
        }
        Some(match value.to_ascii_uppercase().as_str() {
            "URN" => TextSource::Urn,
            "PURL" => TextSource::Purl,
            _ => TextSource::Literal(value.to_string()),
        })
    }
}

pub struct WatermarkHandler {
    config: WatermarkConfig,
    rest_api_url: String,
    viewer_url: String,
    sources: Vec<TextSource>,
    /// PI -> record-level watermark text and the index of its source
    document_texts: Mutex<HashMap<String, Option<(usize, String)>>>,
}

impl WatermarkHandler {
    pub fn new(config: &WatermarkConfig, iiif: &IiifConfig) -> Self {
        Self {
            sources: config
                .text_configuration
                .iter()
                .filter_map(|s| TextSource::parse(s))
                .collect(),
            config: config.clone(),
            rest_api_url: with_trailing_slash(&iiif.rest_api_url),
            viewer_url: with_trailing_slash(&iiif.viewer_url),
            document_texts: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Value a source takes from the page itself
    fn page_value(source: &TextSource, page: &PhysicalPage, page_doc: Option<&SolrDocument>) -> Option<String> {
        let value = match source {
            TextSource::Field(field) => page_doc.and_then(|d| d.first_str(field)),
            TextSource::Urn => page.urn.as_deref(),
            TextSource::Purl | TextSource::Literal(_) => None,
        };
        value.filter(|t| !t.trim().is_empty()).map(str::to_string)
    }

    /// First source with a record-level value, with its position in the source list
    fn resolve_document(&self, pi: &str, record_doc: Option<&SolrDocument>) -> Option<(usize, String)> {
        self.sources.iter().enumerate().find_map(|(index, source)| {
            let text = match source {
                TextSource::Field(field) => record_doc.and_then(|d| d.first_str(field)).map(str::to_string),
                TextSource::Urn => record_doc.and_then(|d| d.first_str(fields::URN)).map(str::to_string),
                TextSource::Purl => {
                    (!pi.is_empty()).then(|| format!("{}piresolver?id={}", self.viewer_url, pi))
                }
                TextSource::Literal(text) => Some(text.clone()),
            };
            text.filter(|t| !t.trim().is_empty()).map(|t| (index, t))
        })
    }

    /// Memoized record-level lookup; without a record document nothing is stored
    fn document_entry(&self, pi: &str, record_doc: Option<&SolrDocument>) -> Option<(usize, String)> {
        if record_doc.is_none() {
            return self.resolve_document(pi, None);
        }
        let mut texts = match self.document_texts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        texts
            .entry(pi.to_string())
            .or_insert_with(|| self.resolve_document(pi, record_doc))
            .clone()
    }

    /// Watermark text of a page
    ///
    /// Sources are tried in order; a page-level value wins over the
    /// record-level value of the same source. Record-level values are
    /// memoized per PI.
    pub fn watermark_text(
        &self,
        page: &PhysicalPage,
        page_doc: Option<&SolrDocument>,
        record_doc: Option<&SolrDocument>,
    ) -> Option<String> {
        if !self.config.enabled {
            return None;
        }
        let document = self.document_entry(&page.pi, record_doc);
        let limit = document
            .as_ref()
            .map(|(index, _)| index + 1)
            .unwrap_or(self.sources.len());

        self.sources[..limit]
            .iter()
            .find_map(|source| Self::page_value(source, page, page_doc))
            .or_else(|| document.map(|(_, text)| text))
    }

    /// Record-level watermark text, memoized per PI
    pub fn document_watermark_text(&self, pi: &str, record_doc: Option<&SolrDocument>) -> Option<String> {
        if !self.config.enabled {
            return None;
        }
        self.document_entry(pi, record_doc).map(|(_, text)| text)
    }

    pub fn cached_text(&self, pi: &str) -> Option<Option<String>> {
        self.document_texts
            .lock()
            .ok()
            .and_then(|texts| texts.get(pi).map(|entry| entry.as_ref().map(|(_, text)| text.clone())))
    }

    pub fn clear_cache(&self) {
        if let Ok(mut texts) = self.document_texts.lock() {
            texts.clear();
        }
    }

    /// Footer id taken from the first configured field that has a value
    pub fn footer_id(&self, doc: &SolrDocument) -> Option<String> {
        self.config.id_by_field.iter().find_map(|field| {
            doc.first_str(field).map(|value| {
                let id: String = value
                    .trim()
                    .chars()
                    .map(|c| if c.is_whitespace() || c == '/' { '_' } else { c })
                    .collect();
                format!("watermark_{}", id)
            })
        })
    }

    /// Url of the rendered footer image; `None` when watermarks are disabled
    pub fn watermark_url(
        &self,
        page: &PhysicalPage,
        page_doc: Option<&SolrDocument>,
        record_doc: Option<&SolrDocument>,
        size: Size,
    ) -> Option<String> {
        if !self.config.enabled {
            return None;
        }

        let mut url = format!(
            "{}records/{}/files/footer/full/{}/0/default.{}",
            self.rest_api_url,
            encode_path_segment(&page.pi),
            size,
            self.config.format
        );

        let text = self.watermark_text(page, page_doc, record_doc);
        let id = record_doc.and_then(|d| self.footer_id(d));

        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if let Some(text) = &text {
            query.append_pair("watermarkText", text);
        }
        if let Some(id) = &id {
            query.append_pair("watermarkId", id);
        }
        let query = query.finish();
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        Some(url)
    }

    /// Height reserved for the footer in a view; zero when disabled or for thumbnails
    pub fn footer_height(&self, page_type: PageType) -> u32 {
        match page_type {
            _ if !self.config.enabled => 0,
            PageType::ViewThumbs => 0,
            _ => self.config.footer_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn handler(sources: &[&str]) -> WatermarkHandler {
        let config = WatermarkConfig {
            enabled: true,
            text_configuration: sources.iter().map(|s| s.to_string()).collect(),
            id_by_field: vec!["MD_INSTITUTION".to_string()],
            footer_height: 40,
            format: "jpg".to_string(),
        };
        let iiif = IiifConfig {
            rest_api_url: "https://v.example.org/api/v1".to_string(),
            viewer_url: "https://v.example.org/viewer/".to_string(),
            ..IiifConfig::default()
        };
        WatermarkHandler::new(&config, &iiif)
    }

    fn page() -> PhysicalPage {
        PhysicalPage {
            pi: "PPN7".to_string(),
            order: 1,
            file_name: "00000001.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            width: None,
            height: None,
            urn: None,
            access_permitted: true,
        }
    }

    #[test]
    fn test_first_source_with_value_wins() {
        let h = handler(&["SOLR:MD_RIGHTS", "URN", "Fallback text"]);
        let record = SolrDocument::new().with("URN", "urn:nbn:de:1");
        assert_eq!(h.watermark_text(&page(), None, Some(&record)).as_deref(), Some("urn:nbn:de:1"));

        let page_doc = SolrDocument::new().with("MD_RIGHTS", "CC0");
        assert_eq!(h.watermark_text(&page(), Some(&page_doc), Some(&record)).as_deref(), Some("CC0"));

        assert_eq!(h.watermark_text(&page(), None, None).as_deref(), Some("Fallback text"));
    }

    #[test]
    fn test_page_text_reuses_record_lookup() {
        let h = handler(&["SOLR:MD_RIGHTS", "URN"]);
        let record = SolrDocument::new().with("URN", "urn:nbn:de:7");
        assert_eq!(h.watermark_text(&page(), None, Some(&record)).as_deref(), Some("urn:nbn:de:7"));
        assert_eq!(h.cached_text("PPN7"), Some(Some("urn:nbn:de:7".to_string())));

        // the record is not consulted again for the same PI
        let changed = SolrDocument::new().with("URN", "urn:nbn:de:other");
        assert_eq!(h.watermark_text(&page(), None, Some(&changed)).as_deref(), Some("urn:nbn:de:7"));

        // earlier sources on the page still win
        let page_doc = SolrDocument::new().with("MD_RIGHTS", "CC-BY");
        assert_eq!(
            h.watermark_text(&page(), Some(&page_doc), Some(&changed)).as_deref(),
            Some("CC-BY")
        );
    }

    #[test]
    fn test_record_value_of_earlier_source_beats_later_page_value() {
        let h = handler(&["SOLR:MD_RIGHTS", "URN"]);
        let record = SolrDocument::new().with("MD_RIGHTS", "Public Domain");
        let mut with_urn = page();
        with_urn.urn = Some("urn:nbn:de:page".to_string());
        assert_eq!(
            h.watermark_text(&with_urn, None, Some(&record)).as_deref(),
            Some("Public Domain")
        );
    }

    #[test]
    fn test_purl_source() {
        let h = handler(&["PURL"]);
        assert_eq!(
            h.watermark_text(&page(), None, None).as_deref(),
            Some("https://v.example.org/viewer/piresolver?id=PPN7")
        );
    }

    #[test]
    fn test_disabled_yields_nothing() {
        let config = WatermarkConfig::default();
        let h = WatermarkHandler::new(&config, &IiifConfig::default());
        assert_eq!(h.watermark_text(&page(), None, None), None);
        assert_eq!(h.watermark_url(&page(), None, None, Size::Max), None);
        assert_eq!(h.footer_height(PageType::ViewImage), 0);
    }

    #[test]
    fn test_document_text_is_cached() {
        let h = handler(&["SOLR:MD_RIGHTS"]);
        let record = SolrDocument::new().with("MD_RIGHTS", "Public Domain");
        assert_eq!(h.document_watermark_text("PPN7", Some(&record)).as_deref(), Some("Public Domain"));
        let changed = SolrDocument::new().with("MD_RIGHTS", "Other");
        assert_eq!(h.document_watermark_text("PPN7", Some(&changed)).as_deref(), Some("Public Domain"));
        assert_eq!(h.cached_text("PPN7"), Some(Some("Public Domain".to_string())));
        h.clear_cache();
        assert_eq!(h.cached_text("PPN7"), None);
    }

    #[test]
    fn test_concurrent_cache_access() {
        let h = Arc::new(handler(&["SOLR:MD_RIGHTS"]));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let h = Arc::clone(&h);
                std::thread::spawn(move || {
                    let record = SolrDocument::new().with("MD_RIGHTS", "Shared");
                    h.document_watermark_text("PPN7", Some(&record))
                })
            })
            .collect();
        for t in threads {
            assert_eq!(t.join().unwrap().as_deref(), Some("Shared"));
        }
    }

    #[test]
    fn test_footer_id_and_url() {
        let h = handler(&["Digitized by the library"]);
        let record = SolrDocument::new().with("MD_INSTITUTION", "State Library/Berlin");
        assert_eq!(h.footer_id(&record).as_deref(), Some("watermark_State_Library_Berlin"));

        let url = h
            .watermark_url(&page(), None, Some(&record), Size::Width(800))
            .unwrap();
        assert_eq!(
            url,
            "https://v.example.org/api/v1/records/PPN7/files/footer/full/800,/0/default.jpg?watermarkText=Digitized+by+the+library&watermarkId=watermark_State_Library_Berlin"
        );
        assert_eq!(h.footer_height(PageType::ViewImage), 40);
        assert_eq!(h.footer_height(PageType::ViewThumbs), 0);
    }
}
