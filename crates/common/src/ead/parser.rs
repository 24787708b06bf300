//! EAD documents from a BaseX XML database
//!
//! BaseX serves the list of databases and the raw EAD files over its REST
//! interface. Parsed finding aids are flattened into [`EadTree`]s, linked to
//! the records of the search index and cached.

use super::node::EadNode;
use super::tree::EadTree;
use crate::cache::{keys, Cache};
use crate::config::EadConfig;
use crate::errors::{AppError, Result};
use crate::iiif::url_handler::encode_path_segment;
use crate::search::{fields, SearchIndex, MAX_ROWS};
use async_trait::async_trait;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EadResource {
    pub name: String,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EadDatabase {
    pub name: String,
    pub resources: Vec<EadResource>,
}

/// Raw access to stored EAD files
#[async_trait]
pub trait EadSource: Send + Sync {
    /// XML listing of databases and their resources
    async fn databases_xml(&self) -> Result<String>;

    /// One EAD file of a database
    async fn document_xml(&self, database: &str, file: &str) -> Result<String>;
}

/// BaseX REST client
pub struct BasexClient {
    client: reqwest::Client,
    base_url: String,
}

impl BasexClient {
    pub fn new(config: &EadConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create BaseX client: {}", e),
            })?;

        let base_url = if config.basex_url.ends_with('/') {
            config.basex_url.clone()
        } else {
            format!("{}/", config.basex_url)
        };

        Ok(Self { client, base_url })
    }

    async fn fetch(&self, url: String) -> Result<String> {
        let upstream = |message: String| AppError::Upstream {
            service: "basex".to_string(),
            message,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| upstream(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(upstream(format!("{} answered {}", url, response.status())));
        }

        response
            .text()
            .await
            .map_err(|e| upstream(format!("Failed to read body of {}: {}", url, e)))
    }
}

#[async_trait]
impl EadSource for BasexClient {
    async fn databases_xml(&self) -> Result<String> {
        self.fetch(format!("{}databases", self.base_url)).await
    }

    async fn document_xml(&self, database: &str, file: &str) -> Result<String> {
        self.fetch(format!(
            "{}db/{}/{}",
            self.base_url,
            encode_path_segment(database),
            encode_path_segment(file)
        ))
        .await
    }
}

fn parse_document(xml: &str) -> Result<Document<'_>> {
    Document::parse(xml).map_err(|e| AppError::Presentation {
        message: format!("Malformed XML: {}", e),
    })
}

fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

/// Whitespace-normalized text content of an element and its descendants
fn text_of(node: Node<'_, '_>) -> Option<String> {
    let text = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<Vec<_>>()
        .join(" ");
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!normalized.is_empty()).then_some(normalized)
}

/// `c` or numbered `c01` .. `c12`
fn is_component(node: &Node<'_, '_>) -> bool {
    if !node.is_element() {
        return false;
    }
    let name = node.tag_name().name();
    name == "c"
        || (name.len() == 3
            && name.starts_with('c')
            && name[1..].parse::<u8>().map(|n| (1..=12).contains(&n)).unwrap_or(false))
}

/// Parse the `<databases>` listing served by BaseX
pub fn parse_databases(xml: &str) -> Result<Vec<EadDatabase>> {
    let doc = parse_document(xml)?;
    let databases = doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "database")
        .filter_map(|db| {
            let name = child(db, "name").and_then(text_of)?;
            let resources = child(db, "details")
                .map(|details| {
                    details
                        .children()
                        .filter(|r| r.is_element() && r.tag_name().name() == "resource")
                        .filter_map(|r| {
                            text_of(r).map(|name| EadResource {
                                name,
                                last_updated: r.attribute("lastUpdated").map(str::to_string),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();
            Some(EadDatabase { name, resources })
        })
        .collect();
    Ok(databases)
}

fn build_node(element: Node<'_, '_>, fallback_id: String) -> EadNode {
    let did = child(element, "did");
    let did_text = |name: &str| did.and_then(|d| child(d, name)).and_then(text_of);

    let id = element
        .attribute("id")
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
        .unwrap_or(fallback_id);
    let unit_id = did_text("unitid");
    let label = did_text("unittitle")
        .or_else(|| unit_id.clone())
        .unwrap_or_else(|| id.clone());

    let mut node = EadNode::new(id, label);
    node.description_level = element.attribute("level").map(str::to_string);
    node.unit_id = unit_id;
    node.unit_date = did_text("unitdate");

    let components: Vec<Node<'_, '_>> = match element.tag_name().name() {
        "archdesc" => child(element, "dsc")
            .map(|dsc| dsc.children().filter(is_component).collect())
            .unwrap_or_default(),
        _ => element.children().filter(is_component).collect(),
    };

    node.children = components
        .into_iter()
        .enumerate()
        .map(|(i, c)| build_node(c, format!("{}_{}", node.id, i + 1)))
        .collect();
    node
}

/// Parse an EAD finding aid into its component hierarchy
pub fn parse_ead(xml: &str) -> Result<EadNode> {
    let doc = parse_document(xml)?;
    let archdesc = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "archdesc")
        .ok_or_else(|| AppError::Presentation {
            message: "EAD document has no archdesc element".to_string(),
        })?;

    let mut root = build_node(archdesc, "root".to_string());
    root.renumber();
    Ok(root)
}

/// Loads EAD trees and links their nodes to indexed records
pub struct BasexEadParser {
    source: Arc<dyn EadSource>,
    search: Arc<dyn SearchIndex>,
    cache: Option<Arc<Cache>>,
    config: EadConfig,
}

impl BasexEadParser {
    pub fn new(
        source: Arc<dyn EadSource>,
        search: Arc<dyn SearchIndex>,
        cache: Option<Arc<Cache>>,
        config: EadConfig,
    ) -> Self {
        Self {
            source,
            search,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &EadConfig {
        &self.config
    }

    pub async fn possible_databases(&self) -> Result<Vec<EadDatabase>> {
        let xml = self.source.databases_xml().await?;
        parse_databases(&xml)
    }

    pub async fn read_ead_document(&self, database: &str, file: &str) -> Result<EadNode> {
        let xml = self.source.document_xml(database, file).await?;
        parse_ead(&xml)
    }

    /// Attach the PI of every indexed record carrying an archive node id; returns the number of links
    pub async fn associate_records(&self, tree: &mut EadTree) -> Result<usize> {
        let query = format!("{}:*", fields::EAD_NODE_ID);
        let docs = self
            .search
            .search(&query, MAX_ROWS, &[fields::PI, fields::EAD_NODE_ID])
            .await?;

        let mut linked = 0;
        for doc in &docs {
            let (Some(pi), Some(node_id)) = (doc.first_str(fields::PI), doc.first_str(fields::EAD_NODE_ID)) else {
                continue;
            };
            if tree.set_associated_pi(node_id, pi) {
                linked += 1;
            }
        }
        debug!(candidates = docs.len(), linked, "Associated archive nodes with records");
        Ok(linked)
    }

    async fn build_tree(&self, database: &str, file: &str) -> Result<EadTree> {
        let root = self.read_ead_document(database, file).await?;
        let mut tree = EadTree::generate(root);
        self.associate_records(&mut tree).await?;
        tree.set_collapse_level(self.config.collapse_level);
        info!(database, file, nodes = tree.len(), "Loaded archive tree");
        Ok(tree)
    }

    /// Fetch, parse, link and collapse a tree; cached per database and file
    #[instrument(skip(self))]
    pub async fn load_tree(&self, database: &str, file: &str) -> Result<EadTree> {
        match &self.cache {
            Some(cache) => {
                cache
                    .get_or_load(
                        &keys::ead_tree(database, file),
                        self.config.cache_ttl_secs,
                        "ead_tree",
                        || self.build_tree(database, file),
                    )
                    .await
            }
            None => self.build_tree(database, file).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SolrDocument;

    const EAD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ead xmlns="urn:isbn:1-931666-22-9">
  <eadheader><eadid>estate</eadid></eadheader>
  <archdesc level="fonds" id="estate">
    <did><unittitle>Estate of <emph>Jane</emph> Doe</unittitle><unitid>NL-1</unitid></did>
    <dsc>
      <c01 level="series" id="letters">
        <did><unittitle>Letters</unittitle><unitdate>1850-1870</unitdate></did>
        <c02 level="file" id="letter1">
          <did><unittitle>Letter to Goethe</unittitle></did>
        </c02>
      </c01>
      <c level="series">
        <did><unitid>PH</unitid></did>
      </c>
    </dsc>
  </archdesc>
</ead>"#;

    const DATABASES: &str = r#"<databases>
  <database>
    <name>archives</name>
    <details>
      <resource lastUpdated="2024-01-02T10:00:00.000Z">estate.xml</resource>
      <resource>other.xml</resource>
    </details>
  </database>
  <database><name>empty</name></database>
</databases>"#;

    struct FakeSource;

    #[async_trait]
    impl EadSource for FakeSource {
        async fn databases_xml(&self) -> Result<String> {
            Ok(DATABASES.to_string())
        }

        async fn document_xml(&self, _database: &str, file: &str) -> Result<String> {
            match file {
                "estate.xml" => Ok(EAD.to_string()),
                _ => Err(AppError::Upstream {
                    service: "basex".to_string(),
                    message: "404".to_string(),
                }),
            }
        }
    }

    struct FakeIndex(Vec<SolrDocument>);

    #[async_trait]
    impl SearchIndex for FakeIndex {
        async fn search(&self, _query: &str, _rows: u32, _fields: &[&str]) -> Result<Vec<SolrDocument>> {
            Ok(self.0.clone())
        }

        async fn count(&self, _query: &str) -> Result<u64> {
            Ok(self.0.len() as u64)
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    fn parser(collapse_level: usize) -> BasexEadParser {
        let index = FakeIndex(vec![
            SolrDocument::new().with("PI", "PPN_LETTER").with("EAD_NODE_ID", "letter1"),
            SolrDocument::new().with("PI", "PPN_UNKNOWN").with("EAD_NODE_ID", "nowhere"),
        ]);
        BasexEadParser::new(
            Arc::new(FakeSource),
            Arc::new(index),
            None,
            EadConfig {
                collapse_level,
                ..EadConfig::default()
            },
        )
    }

    #[test]
    fn test_parse_ead() {
        let root = parse_ead(EAD).unwrap();
        assert_eq!(root.id, "estate");
        assert_eq!(root.label, "Estate of Jane Doe");
        assert_eq!(root.unit_id.as_deref(), Some("NL-1"));
        assert_eq!(root.description_level.as_deref(), Some("fonds"));
        assert_eq!(root.count(), 4);

        let letters = root.find("letters").unwrap();
        assert_eq!(letters.unit_date.as_deref(), Some("1850-1870"));
        assert_eq!(letters.level, 1);
        assert_eq!(root.find("letter1").unwrap().level, 2);

        let photos = &root.children[1];
        assert_eq!(photos.id, "estate_2");
        assert_eq!(photos.label, "PH");
    }

    #[test]
    fn test_missing_archdesc() {
        assert!(matches!(
            parse_ead("<ead><eadheader/></ead>"),
            Err(AppError::Presentation { .. })
        ));
        assert!(matches!(parse_ead("<ead>"), Err(AppError::Presentation { .. })));
    }

    #[test]
    fn test_parse_databases() {
        let dbs = parse_databases(DATABASES).unwrap();
        assert_eq!(dbs.len(), 2);
        assert_eq!(dbs[0].name, "archives");
        assert_eq!(dbs[0].resources[0].name, "estate.xml");
        assert_eq!(
            dbs[0].resources[0].last_updated.as_deref(),
            Some("2024-01-02T10:00:00.000Z")
        );
        assert_eq!(dbs[0].resources[1].last_updated, None);
        assert!(dbs[1].resources.is_empty());
    }

    #[tokio::test]
    async fn test_load_tree_links_records_and_collapses() {
        let tree = parser(1).load_tree("archives", "estate.xml").await.unwrap();
        assert_eq!(tree.len(), 4);
        let letter = tree.get(tree.index_of("letter1").unwrap()).unwrap();
        assert_eq!(letter.node.associated_pi.as_deref(), Some("PPN_LETTER"));
        assert!(!letter.node.visible);
        assert_eq!(tree.tree_view().len(), 3);
    }

    #[tokio::test]
    async fn test_upstream_errors_propagate() {
        assert!(matches!(
            parser(1).load_tree("archives", "missing.xml").await,
            Err(AppError::Upstream { .. })
        ));
        assert_eq!(parser(1).possible_databases().await.unwrap().len(), 2);
    }
}
