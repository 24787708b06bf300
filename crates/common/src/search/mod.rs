//! Search index access
//!
//! Records, pages and archive associations live in a Solr index.
//! Handlers talk to the [`SearchIndex`] trait so tests can swap in
//! in-memory indexes.

mod document;
pub mod fields;
mod solr;

pub use document::SolrDocument;
pub use solr::SolrSearchIndex;

use crate::errors::Result;
use async_trait::async_trait;

/// Read access to the search index
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Run a query, returning at most `rows` documents with the given fields (all when empty)
    async fn search(&self, query: &str, rows: u32, fields: &[&str]) -> Result<Vec<SolrDocument>>;

    /// Number of documents matching a query
    async fn count(&self, query: &str) -> Result<u64>;

    /// Check that the index answers
    async fn ping(&self) -> Result<()>;

    async fn first_doc(&self, query: &str, fields: &[&str]) -> Result<Option<SolrDocument>> {
        Ok(self.search(query, 1, fields).await?.into_iter().next())
    }

    /// Top-level record document of a PI
    async fn record_by_pi(&self, pi: &str) -> Result<Option<SolrDocument>> {
        self.first_doc(&record_query(pi), &[]).await
    }

    /// Page document of a record
    async fn page(&self, pi: &str, order: u32) -> Result<Option<SolrDocument>> {
        self.first_doc(&page_query(pi, Some(order)), &[]).await
    }

    async fn pages(&self, pi: &str) -> Result<Vec<SolrDocument>> {
        self.search(&page_query(pi, None), MAX_ROWS, &[]).await
    }
}

/// Upper bound for "all rows"; the index parses rows as a signed 32-bit int
pub const MAX_ROWS: u32 = i32::MAX as u32;

/// Query for the top-level record of a PI
pub fn record_query(pi: &str) -> String {
    format!(
        "{}:{} AND {}:{}",
        fields::PI,
        quoted(pi),
        fields::DOCTYPE,
        fields::DOCTYPE_DOCSTRCT
    )
}

/// Query for one page (or all pages) of a record
pub fn page_query(pi: &str, order: Option<u32>) -> String {
    let mut query = format!(
        "{}:{} AND {}:{}",
        fields::PI_TOPSTRUCT,
        quoted(pi),
        fields::DOCTYPE,
        fields::DOCTYPE_PAGE
    );
    if let Some(order) = order {
        query.push_str(&format!(" AND {}:{}", fields::ORDER, order));
    }
    query
}

/// Wrap a value in double quotes for a phrase query
pub fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Escape query syntax characters in a bare term
pub fn escape_query_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(
            c,
            '\\' | '+' | '-' | '!' | '(' | ')' | ':' | '^' | '[' | ']' | '"' | '{' | '}' | '~'
                | '*' | '?' | '|' | '&' | ';' | '/'
        ) || c.is_whitespace()
        {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_query() {
        assert_eq!(record_query("PPN123"), "PI:\"PPN123\" AND DOCTYPE:DOCSTRCT");
    }

    #[test]
    fn test_page_query() {
        assert_eq!(
            page_query("PPN123", Some(4)),
            "PI_TOPSTRUCT:\"PPN123\" AND DOCTYPE:PAGE AND ORDER:4"
        );
        assert!(!page_query("PPN123", None).contains("ORDER"));
    }

    #[test]
    fn test_escape_query_value() {
        assert_eq!(escape_query_value("a:b"), "a\\:b");
        assert_eq!(escape_query_value("x y"), "x\\ y");
        assert_eq!(escape_query_value("plain"), "plain");
    }

    #[test]
    fn test_quoted_escapes_quotes() {
        assert_eq!(quoted("a\"b"), "\"a\\\"b\"");
    }
}
