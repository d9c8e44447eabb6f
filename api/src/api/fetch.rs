use axum::extract::State;
use serde::Serialize;

use crate::app::App;
use crate::error::AppError;
use crate::ingest::TriggerResult;
use crate::json::Json;

#[derive(Serialize)]
pub struct FetchResponse {
    pub ingested: usize,
}

/// Runs one ingestion pass synchronously and reports how many stories it wrote. Unlike the
/// background ingestor, a failure here is surfaced to the caller as a 500 instead of being
/// absorbed, since the caller explicitly asked for this run. Refuses with 409 if an ingestion
/// pass (scheduled or another `/api/fetch` call) is already in flight.
pub async fn trigger_fetch(State(app): State<App>) -> Result<Json<FetchResponse>, AppError> {
    match crate::ingest::trigger_ingest(&app).await? {
        TriggerResult::Ran(ingested) => Ok(Json(FetchResponse { ingested })),
        TriggerResult::AlreadyInProgress => {
            Err(AppError::Conflict("an ingestion pass is already in progress".into()))
        }
    }
}
