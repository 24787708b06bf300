//! Presentation API urls of records, canvases and annotations

use super::url_handler::{encode_path_segment, with_trailing_slash};
use crate::config::IiifConfig;
use regex_lite::Regex;
use std::sync::OnceLock;

fn canvas_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^records/([^/]+)/pages/(\d+)/canvas/?$").expect("canvas pattern is valid"))
}

/// Builds REST urls of presentation resources
#[derive(Debug, Clone)]
pub struct ApiUrls {
    base: String,
}

impl ApiUrls {
    pub fn new(base: &str) -> Self {
        Self {
            base: with_trailing_slash(base),
        }
    }

    pub fn from_config(config: &IiifConfig) -> Self {
        Self::new(&config.rest_api_url)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn manifest(&self, pi: &str) -> String {
        format!("{}records/{}/manifest/", self.base, encode_path_segment(pi))
    }

    pub fn canvas(&self, pi: &str, order: u32) -> String {
        format!(
            "{}records/{}/pages/{}/canvas/",
            self.base,
            encode_path_segment(pi),
            order
        )
    }

    pub fn annotation_list(&self, pi: &str, order: u32) -> String {
        format!(
            "{}records/{}/pages/{}/annotations/",
            self.base,
            encode_path_segment(pi),
            order
        )
    }

    pub fn range(&self, pi: &str, logid: &str) -> String {
        format!(
            "{}records/{}/sections/{}/range/",
            self.base,
            encode_path_segment(pi),
            encode_path_segment(logid)
        )
    }

    pub fn annotation(&self, id: i64) -> String {
        format!("{}annotations/{}/", self.base, id)
    }

    pub fn pdf(&self, pi: &str, logid: Option<&str>) -> String {
        self.download("pdf", pi, logid)
    }

    pub fn epub(&self, pi: &str, logid: Option<&str>) -> String {
        self.download("epub", pi, logid)
    }

    fn download(&self, kind: &str, pi: &str, logid: Option<&str>) -> String {
        match logid.filter(|l| !l.is_empty()) {
            Some(logid) => format!(
                "{}records/{}/sections/{}/{}/",
                self.base,
                encode_path_segment(pi),
                encode_path_segment(logid),
                kind
            ),
            None => format!("{}records/{}/{}/", self.base, encode_path_segment(pi), kind),
        }
    }

    /// `(pi, order)` of a canvas url of this API; `None` for any other url
    pub fn parse_canvas(&self, url: &str) -> Option<(String, u32)> {
        let url = url.split(['#', '?']).next().unwrap_or(url);
        let path = url.strip_prefix(self.base.as_str())?;
        let caps = canvas_regex().captures(path)?;
        let pi = url::form_urlencoded::parse(format!("pi={}", &caps[1]).as_bytes())
            .next()
            .map(|(_, v)| v.into_owned())?;
        let order = caps[2].parse().ok()?;
        Some((pi, order))
    }
}
