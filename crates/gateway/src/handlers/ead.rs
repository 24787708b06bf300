//! Archive tree handlers
//!
//! Every session keeps its own copy of a tree so that expanding, collapsing
//! and searching do not leak between visitors. Requests without a session
//! get a freshly loaded tree that is not kept.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use viewer_common::{
    cache::keys,
    ead::{EadDatabase, EadTree, FlatEntry},
    errors::{AppError, Result},
};

#[derive(Debug, Default, Deserialize)]
pub struct TreeQuery {
    pub session: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TreeResponse {
    pub database: String,
    pub file: String,
    pub total: usize,
    /// Visible entries in document order
    pub entries: Vec<FlatEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hits: Option<usize>,
}

impl TreeResponse {
    fn new(database: &str, file: &str, tree: &EadTree, hits: Option<usize>) -> Self {
        Self {
            database: database.to_string(),
            file: file.to_string(),
            total: tree.len(),
            entries: tree.tree_view().into_iter().cloned().collect(),
            selected: tree.selected().map(|e| e.node.id.clone()),
            hits,
        }
    }
}

/// Apply an optional search term; an empty term clears earlier hits
fn apply_search(tree: &mut EadTree, search: Option<&str>) -> Option<usize> {
    search.map(|term| tree.search(term))
}

fn require_session(query: &TreeQuery) -> Result<&str> {
    query
        .session
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::Validation {
            message: "Changing the tree view requires a session".to_string(),
            field: Some("session".to_string()),
        })
}

/// Load the tree into the session store unless the session already has it
async fn ensure_session_tree(state: &AppState, session: &str, database: &str, file: &str) -> Result<()> {
    if state.ead_sessions.contains(session, database, file) {
        return Ok(());
    }
    let tree = state.ead.load_tree(database, file).await?;
    state.ead_sessions.insert(session, database, file, tree);
    Ok(())
}

/// Run `f` on a session's tree and render the result
async fn update_session_tree(
    state: &AppState,
    session: &str,
    database: &str,
    file: &str,
    f: impl FnOnce(&mut EadTree) -> Result<()>,
) -> Result<TreeResponse> {
    ensure_session_tree(state, session, database, file).await?;
    state
        .ead_sessions
        .with_tree(session, database, file, |tree| {
            f(tree)?;
            Ok(TreeResponse::new(database, file, tree, None))
        })
        .ok_or_else(|| AppError::not_found("archive tree", format!("{}/{}", database, file)))?
}

pub async fn databases(State(state): State<AppState>) -> Result<Json<Vec<EadDatabase>>> {
    let databases = match &state.cache {
        Some(cache) => {
            cache
                .get_or_load(
                    &keys::ead_databases(),
                    state.ead.config().cache_ttl_secs,
                    "ead_databases",
                    || state.ead.possible_databases(),
                )
                .await?
        }
        None => state.ead.possible_databases().await?,
    };
    Ok(Json(databases))
}

pub async fn tree(
    State(state): State<AppState>,
    Path((database, file)): Path<(String, String)>,
    Query(query): Query<TreeQuery>,
) -> Result<Json<TreeResponse>> {
    let search = query.search.as_deref();

    let Some(session) = query.session.as_deref().filter(|s| !s.trim().is_empty()) else {
        let mut tree = state.ead.load_tree(&database, &file).await?;
        let hits = apply_search(&mut tree, search);
        return Ok(Json(TreeResponse::new(&database, &file, &tree, hits)));
    };

    ensure_session_tree(&state, session, &database, &file).await?;
    state
        .ead_sessions
        .with_tree(session, &database, &file, |tree| {
            let hits = apply_search(tree, search);
            TreeResponse::new(&database, &file, tree, hits)
        })
        .map(Json)
        .ok_or_else(|| AppError::not_found("archive tree", format!("{}/{}", database, file)))
}

pub async fn expand(
    State(state): State<AppState>,
    Path((database, file, index)): Path<(String, String, usize)>,
    Query(query): Query<TreeQuery>,
) -> Result<Json<TreeResponse>> {
    let session = require_session(&query)?;
    let response = update_session_tree(&state, session, &database, &file, |tree| {
        if tree.expand(index) {
            Ok(())
        } else {
            Err(AppError::not_found("archive node", index))
        }
    })
    .await?;
    Ok(Json(response))
}

pub async fn collapse(
    State(state): State<AppState>,
    Path((database, file, index)): Path<(String, String, usize)>,
    Query(query): Query<TreeQuery>,
) -> Result<Json<TreeResponse>> {
    let session = require_session(&query)?;
    let response = update_session_tree(&state, session, &database, &file, |tree| {
        if tree.collapse(index) {
            Ok(())
        } else {
            Err(AppError::not_found("archive node", index))
        }
    })
    .await?;
    Ok(Json(response))
}

/// Select a node by id and reveal it
pub async fn select(
    State(state): State<AppState>,
    Path((database, file, id)): Path<(String, String, String)>,
    Query(query): Query<TreeQuery>,
) -> Result<Json<TreeResponse>> {
    let session = require_session(&query)?;
    let response = update_session_tree(&state, session, &database, &file, |tree| {
        tree.select(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("archive node", &id))
    })
    .await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use viewer_common::ead::EadNode;

    fn tree() -> EadTree {
        let root = EadNode::new("root", "Fonds")
            .with_child(EadNode::new("s1", "Letters").with_child(EadNode::new("f1", "Letter to Goethe")))
            .with_child(EadNode::new("s2", "Photographs"));
        EadTree::generate(root)
    }

    #[test]
    fn test_response_lists_visible_entries() {
        let mut tree = tree();
        tree.collapse(1);
        let response = TreeResponse::new("db", "estate.xml", &tree, None);
        assert_eq!(response.total, 4);
        assert_eq!(response.entries.len(), 3);
        assert!(response.selected.is_none());
    }

    #[test]
    fn test_search_reveals_hits() {
        let mut tree = tree();
        tree.collapse_all();
        assert_eq!(apply_search(&mut tree, Some("goethe")), Some(1));
        let response = TreeResponse::new("db", "estate.xml", &tree, Some(1));
        assert!(response.entries.iter().any(|e| e.node.id == "f1"));
        assert_eq!(apply_search(&mut tree, None), None);
    }

    #[test]
    fn test_changes_require_session() {
        assert!(require_session(&TreeQuery::default()).is_err());
        let query = TreeQuery {
            session: Some("abc".into()),
            search: None,
        };
        assert_eq!(require_session(&query).unwrap(), "abc");
    }
}
