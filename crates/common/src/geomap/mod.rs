//! Geo maps and their GeoJSON feature sets

use crate::db::models::{FeatureSet, GeoMap};
use crate::errors::{AppError, Result};
use crate::search::{fields, SearchIndex, SolrDocument};
use futures::future::try_join_all;
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::debug;

/// Maximum number of records a query-driven feature set shows
pub const MAX_QUERY_FEATURES: u32 = 10_000;

/// Where the features of a map or feature set come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapType {
    /// Features drawn by hand and stored with the set
    Manual,
    /// Features computed from the coordinates of records matching a query
    SolrQuery,
}

impl MapType {
    pub fn as_str(self) -> &'static str {
        match self {
            MapType::Manual => "manual",
            MapType::SolrQuery => "solr_query",
        }
    }
}

impl FromStr for MapType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(MapType::Manual),
            "solr_query" | "solr" => Ok(MapType::SolrQuery),
            other => Err(AppError::Validation {
                message: format!("Unknown map type '{}'", other),
                field: Some("map_type".to_string()),
            }),
        }
    }
}

/// Initial view of a map; `null` becomes a world view
pub fn validate_initial_view(view: Value) -> Result<Value> {
    let view = if view.is_null() {
        json!({"zoom": 1, "center": [0.0, 0.0]})
    } else {
        view
    };

    let zoom_ok = view.get("zoom").map(Value::is_number).unwrap_or(false);
    let center_ok = view
        .get("center")
        .and_then(Value::as_array)
        .map(|c| c.len() == 2 && c.iter().all(Value::is_number))
        .unwrap_or(false);

    if zoom_ok && center_ok {
        Ok(view)
    } else {
        Err(AppError::Validation {
            message: "Initial view needs a numeric zoom and a [lng, lat] center".to_string(),
            field: Some("initial_view".to_string()),
        })
    }
}

/// Features of a manual set must be a list of GeoJSON `Feature`s with a geometry
pub fn validate_features(features: &Value) -> Result<()> {
    let list = features.as_array().ok_or_else(|| AppError::Validation {
        message: "Features must be a list".to_string(),
        field: Some("features".to_string()),
    })?;

    for (i, feature) in list.iter().enumerate() {
        let is_feature = feature.get("type").and_then(Value::as_str) == Some("Feature");
        let has_geometry = feature.get("geometry").map(|g| !g.is_null()).unwrap_or(false);
        if !is_feature || !has_geometry {
            return Err(AppError::Validation {
                message: format!("Element {} is not a GeoJSON feature with a geometry", i),
                field: Some("features".to_string()),
            });
        }
    }
    Ok(())
}

/// Parse `lng lat`, optionally wrapped as WKT `POINT(lng lat)`
pub fn parse_point(value: &str) -> Option<(f64, f64)> {
    let value = value.trim();
    let inner = match value.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("POINT") => value[5..]
            .trim()
            .strip_prefix('(')?
            .strip_suffix(')')?,
        _ => value,
    };

    let mut parts = inner.split(|c: char| c.is_whitespace() || c == ',').filter(|p| !p.is_empty());
    let lng: f64 = parts.next()?.parse().ok()?;
    let lat: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
        return None;
    }
    Some((lng, lat))
}

/// Point features for the coordinates of index documents, labelled with the record label
pub fn solr_features(docs: &[SolrDocument], marker: Option<&str>) -> Vec<Value> {
    let mut features = Vec::new();
    for doc in docs {
        let title = doc
            .first_str(fields::LABEL)
            .or_else(|| doc.first_str(fields::PI))
            .unwrap_or_default();

        let coords = doc
            .values(fields::WKT_COORDS)
            .into_iter()
            .chain(doc.values(fields::MD_GEOJSON_POINT));

        for (lng, lat) in coords.filter_map(|c| parse_point(&c)) {
            features.push(json!({
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [lng, lat]},
                "properties": {
                    "title": title,
                    "pi": doc.first_str(fields::PI),
                    "marker": marker,
                },
            }));
        }
    }
    features
}

/// Features of one set; query-driven sets run their query against the index
pub async fn features_of(set: &FeatureSet, search: &dyn SearchIndex) -> Result<Vec<Value>> {
    match set.kind.parse::<MapType>()? {
        MapType::Manual => Ok(set.features.as_array().cloned().unwrap_or_default()),
        MapType::SolrQuery => {
            let Some(query) = set.query.as_deref().filter(|q| !q.trim().is_empty()) else {
                return Ok(Vec::new());
            };
            let docs = search
                .search(
                    query,
                    MAX_QUERY_FEATURES,
                    &[fields::PI, fields::LABEL, fields::WKT_COORDS, fields::MD_GEOJSON_POINT],
                )
                .await?;
            debug!(feature_set = set.id, hits = docs.len(), "Ran feature set query");
            Ok(solr_features(&docs, set.marker.as_deref()))
        }
    }
}

/// All features of a map as one GeoJSON `FeatureCollection`
pub async fn feature_collection(map: &GeoMap, sets: &[FeatureSet], search: &dyn SearchIndex) -> Result<Value> {
    let per_set = try_join_all(sets.iter().map(|set| features_of(set, search))).await?;

    let mut features = Vec::new();
    for (set, set_features) in sets.iter().zip(per_set) {
        for mut feature in set_features {
            if let Some(properties) = feature.get_mut("properties").and_then(Value::as_object_mut) {
                properties.insert("featureSet".into(), json!(set.name));
            } else if let Some(object) = feature.as_object_mut() {
                object.insert("properties".into(), json!({"featureSet": set.name}));
            }
            features.push(feature);
        }
    }

    Ok(json!({
        "type": "FeatureCollection",
        "id": map.id,
        "title": map.title,
        "view": map.initial_view,
        "features": features,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

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

    fn map() -> GeoMap {
        let now = chrono::Utc::now().into();
        GeoMap {
            id: 3,
            title: "Letters".into(),
            description: None,
            map_type: "manual".into(),
            initial_view: json!({"zoom": 5, "center": [10.0, 51.0]}),
            date_created: now,
            date_updated: now,
        }
    }

    fn set(id: i64, kind: &str, features: Value, query: Option<&str>) -> FeatureSet {
        FeatureSet {
            id,
            map_id: 3,
            name: format!("set{}", id),
            kind: kind.into(),
            features,
            query: query.map(String::from),
            marker: Some("red".into()),
        }
    }

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("9.93 51.53"), Some((9.93, 51.53)));
        assert_eq!(parse_point("POINT (9.93 51.53)"), Some((9.93, 51.53)));
        assert_eq!(parse_point("point(1,2)"), Some((1.0, 2.0)));
        assert_eq!(parse_point("9.93"), None);
        assert_eq!(parse_point("200 10"), None);
        assert_eq!(parse_point("POLYGON((1 2, 3 4))"), None);
    }

    #[test]
    fn test_validate_features() {
        let ok = json!([{"type": "Feature", "geometry": {"type": "Point", "coordinates": [1, 2]}}]);
        assert!(validate_features(&ok).is_ok());
        assert!(validate_features(&json!([])).is_ok());
        assert!(validate_features(&json!({"type": "Feature"})).is_err());
        assert!(validate_features(&json!([{"type": "Feature", "geometry": null}])).is_err());
        assert!(validate_features(&json!([{"type": "Point", "coordinates": [1, 2]}])).is_err());
    }

    #[test]
    fn test_validate_initial_view() {
        assert_eq!(validate_initial_view(Value::Null).unwrap()["zoom"], 1);
        assert!(validate_initial_view(json!({"zoom": 3, "center": [1, 2]})).is_ok());
        assert!(validate_initial_view(json!({"zoom": "far", "center": [1, 2]})).is_err());
        assert!(validate_initial_view(json!({"zoom": 3, "center": [1]})).is_err());
    }

    #[test]
    fn test_map_type() {
        assert_eq!("SOLR_QUERY".parse::<MapType>().unwrap(), MapType::SolrQuery);
        assert_eq!(MapType::Manual.as_str(), "manual");
        assert!("heatmap".parse::<MapType>().is_err());
    }

    #[test]
    fn test_solr_features() {
        let docs = vec![
            SolrDocument::new()
                .with("PI", "PPN1")
                .with("LABEL", "Letter to Goethe")
                .with("WKT_COORDS", json!(["POINT(9.93 51.53)"]))
                .with("MD_GEOJSON_POINT", "13.4 52.5"),
            SolrDocument::new().with("PI", "PPN2"),
        ];
        let features = solr_features(&docs, Some("blue"));
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["geometry"]["coordinates"], json!([9.93, 51.53]));
        assert_eq!(features[1]["properties"]["title"], "Letter to Goethe");
        assert_eq!(features[1]["properties"]["marker"], "blue");
    }

    #[tokio::test]
    async fn test_feature_collection_merges_sets() {
        let index = FakeIndex(vec![SolrDocument::new().with("PI", "PPN9").with("WKT_COORDS", "1 2")]);
        let sets = vec![
            set(
                1,
                "manual",
                json!([{"type": "Feature", "geometry": {"type": "Point", "coordinates": [5, 6]}}]),
                None,
            ),
            set(2, "solr_query", Value::Null, Some("DOCSTRCT:letter")),
            set(3, "solr_query", Value::Null, None),
        ];

        let collection = feature_collection(&map(), &sets, &index).await.unwrap();
        assert_eq!(collection["type"], "FeatureCollection");
        let features = collection["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["properties"]["featureSet"], "set1");
        assert_eq!(features[1]["properties"]["pi"], "PPN9");
        assert_eq!(features[1]["properties"]["featureSet"], "set2");
    }
}
