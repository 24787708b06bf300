//! Web annotation handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use super::page_order;
use crate::AppState;
use viewer_common::{
    annotations::{annotation_list, from_web_annotation, to_web_annotation},
    auth::AuthContext,
    db::models::Annotation,
    errors::{AppError, Result},
};

/// Annotations without a creator belong to administrators
fn ensure_can_modify(annotation: &Annotation, auth: &AuthContext) -> Result<()> {
    match annotation.creator_id {
        Some(creator) => auth.require_owner_or_admin(creator),
        None => auth.require_admin(),
    }
}

async fn find(state: &AppState, id: i64) -> Result<Annotation> {
    state
        .repo
        .find_annotation(id)
        .await?
        .ok_or_else(|| AppError::not_found("annotation", id))
}

/// IIIF annotation list of a page
pub async fn page_annotations(
    State(state): State<AppState>,
    Path((pi, order)): Path<(String, u32)>,
) -> Result<Json<Value>> {
    let annotations = state
        .repo
        .annotations_for_target(&pi, Some(page_order(order)?))
        .await?;
    Ok(Json(annotation_list(&pi, order, &annotations, &state.api_urls)))
}

pub async fn create_annotation(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    let draft = from_web_annotation(&body, &state.api_urls)?;

    let annotation = state
        .repo
        .add_annotation(
            draft.motivation,
            draft.body,
            draft.target,
            Some(auth.user_id),
            draft.target_pi,
            draft.target_page,
        )
        .await?;

    tracing::info!(
        annotation_id = annotation.id,
        pi = %annotation.target_pi,
        user_id = %auth.user_id,
        "Annotation created"
    );

    Ok((StatusCode::CREATED, Json(to_web_annotation(&annotation, &state.api_urls))))
}

pub async fn get_annotation(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Value>> {
    let annotation = find(&state, id).await?;
    Ok(Json(to_web_annotation(&annotation, &state.api_urls)))
}

pub async fn update_annotation(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    let mut annotation = find(&state, id).await?;
    ensure_can_modify(&annotation, &auth)?;

    let draft = from_web_annotation(&body, &state.api_urls)?;
    annotation.motivation = draft.motivation;
    annotation.body = draft.body;
    annotation.target = draft.target;
    annotation.target_pi = draft.target_pi;
    annotation.target_page = draft.target_page;

    if !state.repo.update_annotation(annotation).await? {
        return Err(AppError::not_found("annotation", id));
    }
    let annotation = find(&state, id).await?;
    Ok(Json(to_web_annotation(&annotation, &state.api_urls)))
}

pub async fn delete_annotation(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let annotation = find(&state, id).await?;
    ensure_can_modify(&annotation, &auth)?;

    if !state.repo.delete_annotation(id).await? {
        return Err(AppError::not_found("annotation", id));
    }
    tracing::info!(annotation_id = id, user_id = %auth.user_id, "Annotation deleted");
    Ok(StatusCode::NO_CONTENT)
}
