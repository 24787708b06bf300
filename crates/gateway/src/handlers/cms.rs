//! CMS page handlers
//!
//! Everyone may read published pages; administrators see drafts too and
//! are the only ones allowed to write.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::AppState;
use viewer_common::{
    auth::{AuthContext, OptionalAuth},
    cms::{migrate_overview_page, CmsPageInput},
    db::models::CmsPage,
    errors::{AppError, Result},
};

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// Only pages related to this record
    pub pi: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MigrateRequest {
    pub description: Option<String>,
    pub publication_text: Option<String>,
}

fn is_admin(auth: &OptionalAuth) -> bool {
    auth.0.as_ref().map(|a| a.is_admin).unwrap_or(false)
}

async fn find(state: &AppState, id: i64) -> Result<CmsPage> {
    state
        .repo
        .find_cms_page(id)
        .await?
        .ok_or_else(|| AppError::not_found("cms page", id))
}

pub async fn list_pages(
    State(state): State<AppState>,
    auth: OptionalAuth,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<CmsPage>>> {
    let admin = is_admin(&auth);
    let pages = match query.pi.as_deref() {
        Some(pi) => state
            .repo
            .cms_pages_for_record(pi)
            .await?
            .into_iter()
            .filter(|p| admin || p.published)
            .collect(),
        None => state.repo.cms_pages(!admin).await?,
    };
    Ok(Json(pages))
}

pub async fn create_page(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(input): Json<CmsPageInput>,
) -> Result<(StatusCode, Json<CmsPage>)> {
    auth.require_admin()?;
    let input = input.validated()?;

    let page = state
        .repo
        .create_cms_page(input.title, input.menu_title, input.content, input.published, input.related_pi)
        .await?;
    tracing::info!(page_id = page.id, user_id = %auth.user_id, "CMS page created");

    Ok((StatusCode::CREATED, Json(page)))
}

/// Unpublished pages look missing to everyone but administrators
pub async fn get_page(
    State(state): State<AppState>,
    auth: OptionalAuth,
    Path(id): Path<i64>,
) -> Result<Json<CmsPage>> {
    let page = find(&state, id).await?;
    if !page.published && !is_admin(&auth) {
        return Err(AppError::not_found("cms page", id));
    }
    Ok(Json(page))
}

pub async fn update_page(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(input): Json<CmsPageInput>,
) -> Result<Json<CmsPage>> {
    auth.require_admin()?;
    let input = input.validated()?;
    let page = find(&state, id).await?;

    if !state.repo.update_cms_page(input.apply_to(page)).await? {
        return Err(AppError::not_found("cms page", id));
    }
    Ok(Json(find(&state, id).await?))
}

pub async fn delete_page(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    auth.require_admin()?;
    if !state.repo.delete_cms_page(id).await? {
        return Err(AppError::not_found("cms page", id));
    }
    tracing::info!(page_id = id, user_id = %auth.user_id, "CMS page deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Build a CMS page from a record's legacy overview texts
pub async fn migrate_overview(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(pi): Path<String>,
    Json(request): Json<MigrateRequest>,
) -> Result<(StatusCode, Json<CmsPage>)> {
    auth.require_admin()?;

    let migrated = migrate_overview_page(
        &state.repo,
        &pi,
        request.description.as_deref(),
        request.publication_text.as_deref(),
    )
    .await?;

    match migrated {
        Some(page) => Ok((StatusCode::CREATED, Json(page))),
        None => Err(AppError::Conflict {
            message: format!("Record {} already has a CMS page", pi),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_admin_detection() {
        assert!(!is_admin(&OptionalAuth(None)));
        let user = AuthContext {
            user_id: Uuid::new_v4(),
            is_admin: false,
            request_id: "test".into(),
        };
        assert!(!is_admin(&OptionalAuth(Some(user.clone()))));
        assert!(is_admin(&OptionalAuth(Some(AuthContext { is_admin: true, ..user }))));
    }
}
