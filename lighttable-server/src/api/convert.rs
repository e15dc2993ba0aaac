//! Video conversion endpoints and progress stream

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use futures::stream::Stream;
use lighttable_common::access::{self, User};
use lighttable_common::metadata::Actor;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::files::PathQuery;
use super::required_path;
use crate::error::ApiResult;
use crate::transcode::{ConversionStatus, OriginalInfo};
use crate::AppState;

const SSE_KEEP_ALIVE_SECS: u64 = 15;

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub message: String,
    pub job_id: Uuid,
    pub original_info: OriginalInfo,
}

/// POST /api/convert {path}
///
/// 409 while a job for the path is recorded; 400 when the file has no
/// video stream.
pub async fn start_conversion(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(body): Json<ConvertRequest>,
) -> ApiResult<Json<ConvertResponse>> {
    let path = required_path(&user, body.path.as_deref())?;
    let started = state.transcoder.start(&path, Actor::from(&user)).await?;

    info!(email = %user.email, path = %path, job_id = %started.job_id, "Conversion requested");
    Ok(Json(ConvertResponse {
        message: "Conversion started".to_string(),
        job_id: started.job_id,
        original_info: started.original_info,
    }))
}

/// GET /api/convert?path=
pub async fn conversion_status(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<PathQuery>,
) -> ApiResult<Json<ConversionStatus>> {
    let path = required_path(&user, query.path.as_deref())?;
    Ok(Json(state.transcoder.status(&path).await?))
}

/// GET /api/convert/events - SSE stream of conversion progress
///
/// Only jobs inside the user's start path are forwarded.
pub async fn conversion_events(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(email = %user.email, "SSE client connected to conversion events");
    let mut rx = state.transcoder.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !access::authorize(&user, &event.path).is_allowed() {
                        continue;
                    }
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            debug!(path = %event.path, status = %event.status, "SSE: Conversion event");
                            yield Ok(Event::default().event("conversion").data(json));
                        }
                        Err(e) => warn!("SSE: Failed to serialize conversion event: {}", e),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "SSE: Client lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEP_ALIVE_SECS))
            .text("heartbeat"),
    )
}
