use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use crate::app::App;
use crate::error::AppError;
use crate::json::Json;
use crate::store::RuleKind;

use super::stories::StoryDto;

pub async fn mark_opened(State(app): State<App>, Path(id): Path<i64>) -> Result<(), AppError> {
    crate::store::run_blocking(&app.store, move |store| store.mark_opened(id)).await?;
    Ok(())
}

pub async fn dismiss(State(app): State<App>, Path(id): Path<i64>) -> Result<(), AppError> {
    crate::store::run_blocking(&app.store, move |store| store.dismiss(id)).await?;
    Ok(())
}

pub async fn undismiss(State(app): State<App>, Path(id): Path<i64>) -> Result<(), AppError> {
    crate::store::run_blocking(&app.store, move |store| store.undismiss(id)).await?;
    Ok(())
}

pub async fn undismiss_all(State(app): State<App>) -> Result<(), AppError> {
    crate::store::run_blocking(&app.store, |store| store.undismiss_all()).await?;
    Ok(())
}

pub async fn add_read_later(State(app): State<App>, Path(id): Path<i64>) -> Result<(), AppError> {
    crate::store::run_blocking(&app.store, move |store| store.add_read_later(id)).await?;
    Ok(())
}

pub async fn remove_read_later(State(app): State<App>, Path(id): Path<i64>) -> Result<(), AppError> {
    crate::store::run_blocking(&app.store, move |store| store.remove_read_later(id)).await?;
    Ok(())
}

pub async fn list_read_later(State(app): State<App>) -> Result<Json<Vec<StoryDto>>, AppError> {
    let stories = crate::store::run_blocking(&app.store, |store| store.list_read_later()).await?;
    Ok(Json(stories.into_iter().map(super::stories::plain_dto).collect()))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchAction {
    Dismiss { id: i64 },
    Undismiss { id: i64 },
    ReadLaterAdd { id: i64 },
    ReadLaterRemove { id: i64 },
    Opened { id: i64 },
    BlockDomain { domain: String },
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub actions: Vec<BatchAction>,
}

#[derive(Serialize)]
pub struct BatchResponse {
    pub applied: usize,
}

/// Applies a list of actions in order inside one blocking task. Any entry that fails to parse
/// (unknown `type`, missing field for its variant) is rejected by the `Json` extractor itself as
/// 422/400 before this handler ever runs; an empty list is rejected outright rather than silently
/// applying nothing.
pub async fn batch(
    State(app): State<App>,
    Json(body): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, AppError> {
    if body.actions.is_empty() {
        return Err(AppError::BadRequest("batch must contain at least one action".into()));
    }

    let applied = crate::store::run_blocking(&app.store, move |store| {
        for action in &body.actions {
            match action {
                BatchAction::Dismiss { id } => store.dismiss(*id)?,
                BatchAction::Undismiss { id } => store.undismiss(*id)?,
                BatchAction::ReadLaterAdd { id } => store.add_read_later(*id)?,
                BatchAction::ReadLaterRemove { id } => store.remove_read_later(*id)?,
                BatchAction::Opened { id } => store.mark_opened(*id)?,
                BatchAction::BlockDomain { domain } => {
                    store.add_rule(RuleKind::BlockedDomain, domain, 0)?
                }
            }
        }
        Ok(body.actions.len())
    })
    .await?;

    Ok(Json(BatchResponse { applied }))
}
