//! Page comment handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::page_order;
use crate::AppState;
use viewer_common::{
    auth::AuthContext,
    comments::{ensure_can_modify, validate_target, validate_text},
    db::models::Comment,
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: i64,
    pub pi: String,
    pub order: i32,
    pub owner_id: Uuid,
    pub text: String,
    pub date_created: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_updated: Option<String>,
}

impl From<Comment> for CommentResponse {
    fn from(c: Comment) -> Self {
        Self {
            id: c.id,
            pi: c.pi,
            order: c.page_order,
            owner_id: c.owner_id,
            text: c.text,
            date_created: c.date_created.to_rfc3339(),
            date_updated: c.date_updated.map(|d| d.to_rfc3339()),
        }
    }
}

async fn find(state: &AppState, id: i64) -> Result<Comment> {
    state
        .repo
        .find_comment(id)
        .await?
        .ok_or_else(|| AppError::not_found("comment", id))
}

pub async fn page_comments(
    State(state): State<AppState>,
    Path((pi, order)): Path<(String, u32)>,
) -> Result<Json<Vec<CommentResponse>>> {
    let comments = state.repo.comments_for_page(&pi, page_order(order)?).await?;
    Ok(Json(comments.into_iter().map(Into::into).collect()))
}

pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((pi, order)): Path<(String, u32)>,
    Json(request): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>)> {
    let order = page_order(order)?;
    validate_target(&pi, order)?;
    let text = validate_text(&request.text)?;

    let comment = state.repo.add_comment(pi, order, auth.user_id, text).await?;
    tracing::info!(
        comment_id = comment.id,
        pi = %comment.pi,
        order,
        user_id = %auth.user_id,
        "Comment created"
    );

    Ok((StatusCode::CREATED, Json(comment.into())))
}

pub async fn update_comment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(request): Json<CommentRequest>,
) -> Result<Json<CommentResponse>> {
    let comment = find(&state, id).await?;
    ensure_can_modify(&comment, &auth)?;
    let text = validate_text(&request.text)?;

    if !state.repo.update_comment(id, text).await? {
        return Err(AppError::not_found("comment", id));
    }
    Ok(Json(find(&state, id).await?.into()))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let comment = find(&state, id).await?;
    ensure_can_modify(&comment, &auth)?;

    if !state.repo.delete_comment(id).await? {
        return Err(AppError::not_found("comment", id));
    }
    tracing::info!(comment_id = id, user_id = %auth.user_id, "Comment deleted");
    Ok(StatusCode::NO_CONTENT)
}
