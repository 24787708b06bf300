//! Bookmark list handlers, for stored lists and anonymous session lists

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use viewer_common::{
    auth::{AuthContext, OptionalAuth},
    bookmarks::{ensure_owner, generate_share_key, to_search_query, NewBookmark},
    db::models::{Bookmark, BookmarkList},
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize, Validate)]
pub struct BookmarkListRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Serialize)]
pub struct BookmarkListResponse {
    pub id: i64,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    /// Only shown to the owner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_key: Option<String>,
    pub date_created: String,
    pub date_updated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Bookmark>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
}

impl BookmarkListResponse {
    fn new(list: BookmarkList, viewer: Option<Uuid>) -> Self {
        let is_owner = viewer.map(|u| list.is_owned_by(u)).unwrap_or(false);
        Self {
            id: list.id,
            owner_id: list.owner_id,
            name: list.name,
            description: list.description,
            is_public: list.is_public,
            share_key: is_owner.then_some(list.share_key),
            date_created: list.date_created.to_rfc3339(),
            date_updated: list.date_updated.to_rfc3339(),
            items: None,
            search_query: None,
        }
    }

    fn with_items(mut self, items: Vec<Bookmark>) -> Self {
        let drafts: Vec<NewBookmark> = items.iter().map(NewBookmark::from).collect();
        self.search_query = to_search_query(&drafts);
        self.items = Some(items);
        self
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ShareQuery {
    pub key: Option<String>,
}

async fn find(state: &AppState, id: i64) -> Result<BookmarkList> {
    state
        .repo
        .find_bookmark_list(id)
        .await?
        .ok_or_else(|| AppError::not_found("bookmark list", id))
}

/// Own lists when logged in, public lists otherwise
pub async fn list_bookmark_lists(
    State(state): State<AppState>,
    auth: OptionalAuth,
) -> Result<Json<Vec<BookmarkListResponse>>> {
    let user_id = auth.user_id();
    let lists = match user_id {
        Some(user) => state.repo.bookmark_lists_for_user(user).await?,
        None => state.repo.public_bookmark_lists().await?,
    };
    Ok(Json(
        lists
            .into_iter()
            .map(|l| BookmarkListResponse::new(l, user_id))
            .collect(),
    ))
}

pub async fn create_bookmark_list(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<BookmarkListRequest>,
) -> Result<(StatusCode, Json<BookmarkListResponse>)> {
    request.validate()?;

    let list = state
        .repo
        .create_bookmark_list(
            auth.user_id,
            request.name.trim().to_string(),
            request.description,
            request.is_public,
            generate_share_key(),
        )
        .await?;
    tracing::info!(list_id = list.id, user_id = %auth.user_id, "Bookmark list created");

    Ok((
        StatusCode::CREATED,
        Json(BookmarkListResponse::new(list, Some(auth.user_id)).with_items(Vec::new())),
    ))
}

pub async fn get_bookmark_list(
    State(state): State<AppState>,
    auth: OptionalAuth,
    Path(id): Path<i64>,
    Query(share): Query<ShareQuery>,
) -> Result<Json<BookmarkListResponse>> {
    let list = find(&state, id).await?;
    if !list.is_readable_by(auth.user_id(), share.key.as_deref()) {
        return Err(AppError::Forbidden {
            message: format!("Bookmark list {} is private", id),
        });
    }

    let items = state.repo.bookmarks_in_list(id).await?;
    Ok(Json(BookmarkListResponse::new(list, auth.user_id()).with_items(items)))
}

pub async fn shared_bookmark_list(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<BookmarkListResponse>> {
    let list = state
        .repo
        .find_bookmark_list_by_share_key(&key)
        .await?
        .ok_or_else(|| AppError::not_found("bookmark list", &key))?;

    let items = state.repo.bookmarks_in_list(list.id).await?;
    Ok(Json(BookmarkListResponse::new(list, None).with_items(items)))
}

pub async fn update_bookmark_list(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(request): Json<BookmarkListRequest>,
) -> Result<Json<BookmarkListResponse>> {
    request.validate()?;
    let mut list = find(&state, id).await?;
    ensure_owner(&list, auth.user_id)?;

    list.name = request.name.trim().to_string();
    list.description = request.description;
    list.is_public = request.is_public;

    if !state.repo.update_bookmark_list(list).await? {
        return Err(AppError::not_found("bookmark list", id));
    }
    let list = find(&state, id).await?;
    Ok(Json(BookmarkListResponse::new(list, Some(auth.user_id))))
}

pub async fn delete_bookmark_list(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let list = find(&state, id).await?;
    ensure_owner(&list, auth.user_id)?;

    if !state.repo.delete_bookmark_list(id).await? {
        return Err(AppError::not_found("bookmark list", id));
    }
    tracing::info!(list_id = id, user_id = %auth.user_id, "Bookmark list deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_bookmark(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(bookmark): Json<NewBookmark>,
) -> Result<(StatusCode, Json<Bookmark>)> {
    let list = find(&state, id).await?;
    ensure_owner(&list, auth.user_id)?;
    let bookmark = bookmark.validated()?;

    let existing = state.repo.bookmarks_in_list(id).await?;
    if existing.iter().any(|b| NewBookmark::from(b).same_target(&bookmark)) {
        return Err(AppError::Conflict {
            message: "The list already contains this bookmark".to_string(),
        });
    }

    let stored = state.repo.add_bookmark(id, bookmark).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn delete_bookmark(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((id, item)): Path<(i64, i64)>,
) -> Result<StatusCode> {
    let list = find(&state, id).await?;
    ensure_owner(&list, auth.user_id)?;

    match state.repo.find_bookmark(item).await? {
        Some(bookmark) if bookmark.list_id == id => {
            state.repo.delete_bookmark(item).await?;
            Ok(StatusCode::NO_CONTENT)
        }
        _ => Err(AppError::not_found("bookmark", item)),
    }
}

// ============================================================================
// Session lists
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub session: String,
    pub bookmarks: Vec<NewBookmark>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
}

impl SessionListResponse {
    fn new(session: String, bookmarks: Vec<NewBookmark>) -> Self {
        Self {
            search_query: to_search_query(&bookmarks),
            session,
            bookmarks,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoveQuery {
    pub index: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub name: String,
}

pub async fn session_bookmarks(
    State(state): State<AppState>,
    Path(session): Path<String>,
) -> Json<SessionListResponse> {
    let bookmarks = state.bookmark_sessions.get_or_create(&session);
    Json(SessionListResponse::new(session, bookmarks))
}

pub async fn add_session_bookmark(
    State(state): State<AppState>,
    Path(session): Path<String>,
    Json(bookmark): Json<NewBookmark>,
) -> Result<(StatusCode, Json<SessionListResponse>)> {
    let added = state.bookmark_sessions.add(&session, bookmark)?;
    let bookmarks = state.bookmark_sessions.get_or_create(&session);
    let status = if added { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(SessionListResponse::new(session, bookmarks))))
}

/// Remove one bookmark by `index`, or the whole list without it
pub async fn remove_session_bookmarks(
    State(state): State<AppState>,
    Path(session): Path<String>,
    Query(query): Query<RemoveQuery>,
) -> Result<StatusCode> {
    let removed = match query.index {
        Some(index) => state.bookmark_sessions.remove(&session, index),
        None => state.bookmark_sessions.clear(&session),
    };
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("session bookmark", &session))
    }
}

/// Store a session list as a list of the logged-in user
pub async fn transfer_session_bookmarks(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(session): Path<String>,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<BookmarkListResponse>)> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation {
            message: "A bookmark list needs a name".to_string(),
            field: Some("name".to_string()),
        });
    }

    let list = state
        .bookmark_sessions
        .transfer(&session, auth.user_id, name.to_string(), &state.repo)
        .await?;
    let items = state.repo.bookmarks_in_list(list.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(BookmarkListResponse::new(list, Some(auth.user_id)).with_items(items)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(owner: Uuid) -> BookmarkList {
        let now = chrono::Utc::now().into();
        BookmarkList {
            id: 9,
            owner_id: owner,
            name: "Favourites".into(),
            description: None,
            is_public: true,
            share_key: "0123456789abcdef0123456789abcdef".into(),
            date_created: now,
            date_updated: now,
        }
    }

    #[test]
    fn test_share_key_only_for_owner() {
        let owner = Uuid::new_v4();
        assert!(BookmarkListResponse::new(list(owner), Some(owner)).share_key.is_some());
        assert!(BookmarkListResponse::new(list(owner), Some(Uuid::new_v4())).share_key.is_none());
        assert!(BookmarkListResponse::new(list(owner), None).share_key.is_none());
    }

    #[test]
    fn test_items_produce_search_query() {
        let item = Bookmark {
            id: 1,
            list_id: 9,
            pi: Some("PPN1".into()),
            logid: None,
            page_order: None,
            url: None,
            title: "Record".into(),
            description: None,
            date_added: chrono::Utc::now().into(),
        };
        let response = BookmarkListResponse::new(list(Uuid::new_v4()), None).with_items(vec![item]);
        assert_eq!(response.search_query.as_deref(), Some("PI:(\"PPN1\")"));
        assert_eq!(response.items.map(|i| i.len()), Some(1));
    }

    #[test]
    fn test_list_request_validation() {
        let empty = BookmarkListRequest {
            name: String::new(),
            description: None,
            is_public: false,
        };
        assert!(empty.validate().is_err());
    }
}
