//! Solr HTTP client

use super::{SearchIndex, SolrDocument};
use crate::config::SearchConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Search index backed by a Solr core
pub struct SolrSearchIndex {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SelectResponse {
    response: SelectBody,
}

#[derive(Deserialize)]
struct SelectBody {
    #[serde(rename = "numFound")]
    num_found: u64,
    #[serde(default)]
    docs: Vec<SolrDocument>,
}

impl SolrSearchIndex {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create search client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.solr_url.trim_end_matches('/').to_string(),
        })
    }

    async fn select(&self, query: &str, rows: u32, fields: &[&str]) -> Result<SelectBody> {
        let start = Instant::now();
        let rows = rows.to_string();
        let fl = fields.join(",");

        let mut params = vec![("q", query), ("rows", rows.as_str()), ("wt", "json")];
        if !fl.is_empty() {
            params.push(("fl", fl.as_str()));
        }

        let response = self
            .client
            .get(format!("{}/select", self.base_url))
            .query(&params)
            .send()
            .await
            .map_err(|e| AppError::IndexUnreachable {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            metrics::record_solr_query(start.elapsed().as_secs_f64(), false);
            return Err(AppError::Presentation {
                message: format!("Index query failed with {}: {}", status, body),
            });
        }

        let body: SelectResponse = response.json().await.map_err(|e| AppError::Presentation {
            message: format!("Unexpected index response: {}", e),
        })?;

        metrics::record_solr_query(start.elapsed().as_secs_f64(), true);
        debug!(
            query = %query,
            hits = body.response.num_found,
            duration_ms = start.elapsed().as_millis() as u64,
            "Index query"
        );

        Ok(body.response)
    }
}

#[async_trait]
impl SearchIndex for SolrSearchIndex {
    async fn search(&self, query: &str, rows: u32, fields: &[&str]) -> Result<Vec<SolrDocument>> {
        Ok(self.select(query, rows, fields).await?.docs)
    }

    async fn count(&self, query: &str) -> Result<u64> {
        Ok(self.select(query, 0, &[]).await?.num_found)
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/admin/ping", self.base_url))
            .query(&[("wt", "json")])
            .send()
            .await
            .map_err(|e| AppError::IndexUnreachable {
                message: e.to_string(),
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::IndexUnreachable {
                message: format!("Ping returned {}", response.status()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_response_parsing() {
        let json = r#"{
            "responseHeader": {"status": 0},
            "response": {"numFound": 2, "start": 0, "docs": [
                {"PI": "PPN1", "LABEL": "First"},
                {"PI": "PPN2", "LABEL": ["Second"]}
            ]}
        }"#;
        let parsed: SelectResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.response.num_found, 2);
        assert_eq!(parsed.response.docs[1].first_str("LABEL"), Some("Second"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = SearchConfig {
            solr_url: "http://localhost:8983/solr/collection1/".to_string(),
            timeout_secs: 5,
            default_rows: 10,
        };
        let index = SolrSearchIndex::new(&config).unwrap();
        assert_eq!(index.base_url, "http://localhost:8983/solr/collection1");
    }
}
