//! Geo map handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::AppState;
use viewer_common::{
    auth::AuthContext,
    db::models::{FeatureSet, GeoMap},
    errors::{AppError, Result},
    geomap::{feature_collection, validate_features, validate_initial_view, MapType},
};

#[derive(Debug, Deserialize, Validate)]
pub struct GeoMapRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_map_type")]
    pub map_type: String,
    #[serde(default)]
    pub initial_view: Value,
}

fn default_map_type() -> String {
    MapType::Manual.as_str().to_string()
}

impl GeoMapRequest {
    /// Normalized map type and initial view
    fn checked(&self) -> Result<(MapType, Value)> {
        self.validate()?;
        let map_type: MapType = self.map_type.parse()?;
        let view = validate_initial_view(self.initial_view.clone())?;
        Ok((map_type, view))
    }
}

#[derive(Debug, Deserialize)]
pub struct FeatureSetRequest {
    pub name: String,
    #[serde(default = "default_map_type")]
    pub kind: String,
    #[serde(default)]
    pub features: Value,
    pub query: Option<String>,
    pub marker: Option<String>,
}

impl FeatureSetRequest {
    /// Manual sets need valid features, query sets need a query
    fn checked(self) -> Result<FeatureSetRequest> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation {
                message: "A feature set needs a name".to_string(),
                field: Some("name".to_string()),
            });
        }

        let kind: MapType = self.kind.parse()?;
        let query = self.query.map(|q| q.trim().to_string()).filter(|q| !q.is_empty());
        let features = match kind {
            MapType::Manual => {
                let features = if self.features.is_null() {
                    Value::Array(Vec::new())
                } else {
                    self.features
                };
                validate_features(&features)?;
                features
            }
            MapType::SolrQuery => {
                if query.is_none() {
                    return Err(AppError::Validation {
                        message: "A query feature set needs a query".to_string(),
                        field: Some("query".to_string()),
                    });
                }
                Value::Array(Vec::new())
            }
        };

        Ok(FeatureSetRequest {
            name,
            kind: kind.as_str().to_string(),
            features,
            query,
            marker: self.marker,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct GeoMapResponse {
    #[serde(flatten)]
    pub map: GeoMap,
    pub feature_sets: Vec<FeatureSet>,
}

async fn find(state: &AppState, id: i64) -> Result<GeoMap> {
    state
        .repo
        .find_geo_map(id)
        .await?
        .ok_or_else(|| AppError::not_found("map", id))
}

pub async fn list_maps(State(state): State<AppState>) -> Result<Json<Vec<GeoMap>>> {
    Ok(Json(state.repo.geo_maps().await?))
}

pub async fn create_map(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<GeoMapRequest>,
) -> Result<(StatusCode, Json<GeoMap>)> {
    auth.require_admin()?;
    let (map_type, view) = request.checked()?;

    let map = state
        .repo
        .create_geo_map(
            request.title.trim().to_string(),
            request.description,
            map_type.as_str().to_string(),
            view,
        )
        .await?;
    tracing::info!(map_id = map.id, map_type = map_type.as_str(), "Map created");

    Ok((StatusCode::CREATED, Json(map)))
}

pub async fn get_map(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<GeoMapResponse>> {
    let map = find(&state, id).await?;
    let feature_sets = state.repo.feature_sets_for_map(id).await?;
    Ok(Json(GeoMapResponse { map, feature_sets }))
}

pub async fn update_map(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(request): Json<GeoMapRequest>,
) -> Result<Json<GeoMap>> {
    auth.require_admin()?;
    let (map_type, view) = request.checked()?;
    let mut map = find(&state, id).await?;

    map.title = request.title.trim().to_string();
    map.description = request.description;
    map.map_type = map_type.as_str().to_string();
    map.initial_view = view;

    if !state.repo.update_geo_map(map).await? {
        return Err(AppError::not_found("map", id));
    }
    Ok(Json(find(&state, id).await?))
}

pub async fn delete_map(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    auth.require_admin()?;
    if !state.repo.delete_geo_map(id).await? {
        return Err(AppError::not_found("map", id));
    }
    tracing::info!(map_id = id, "Map deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_feature_set(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(request): Json<FeatureSetRequest>,
) -> Result<(StatusCode, Json<FeatureSet>)> {
    auth.require_admin()?;
    find(&state, id).await?;
    let request = request.checked()?;

    let set = state
        .repo
        .add_feature_set(id, request.name, request.kind, request.features, request.query, request.marker)
        .await?;
    tracing::info!(map_id = id, feature_set = set.id, kind = %set.kind, "Feature set added");

    Ok((StatusCode::CREATED, Json(set)))
}

/// All features of a map as one GeoJSON feature collection
pub async fn map_features(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Value>> {
    let map = find(&state, id).await?;
    let sets = state.repo.feature_sets_for_map(id).await?;
    let collection = feature_collection(&map, &sets, state.search.as_ref()).await?;
    Ok(Json(collection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature_set(kind: &str, features: Value, query: Option<&str>) -> FeatureSetRequest {
        FeatureSetRequest {
            name: " Places ".into(),
            kind: kind.into(),
            features,
            query: query.map(String::from),
            marker: None,
        }
    }

    #[test]
    fn test_manual_feature_set_is_validated() {
        let point = json!([{"type": "Feature", "geometry": {"type": "Point", "coordinates": [9.9, 51.5]}}]);
        let checked = feature_set("manual", point, None).checked().unwrap();
        assert_eq!(checked.name, "Places");
        assert_eq!(checked.kind, "manual");

        assert!(feature_set("manual", json!([{"type": "Feature"}]), None).checked().is_err());
        let empty = feature_set("manual", Value::Null, None).checked().unwrap();
        assert_eq!(empty.features, json!([]));
    }

    #[test]
    fn test_query_feature_set_needs_query() {
        assert!(feature_set("solr", Value::Null, None).checked().is_err());
        let checked = feature_set("solr", Value::Null, Some("DC:maps")).checked().unwrap();
        assert_eq!(checked.kind, "solr_query");
        assert_eq!(checked.query.as_deref(), Some("DC:maps"));
    }

    #[test]
    fn test_map_request_defaults() {
        let request: GeoMapRequest = serde_json::from_value(json!({"title": "Places"})).unwrap();
        let (map_type, view) = request.checked().unwrap();
        assert_eq!(map_type, MapType::Manual);
        assert_eq!(view["zoom"], 1);
    }
}
