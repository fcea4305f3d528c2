//! HTTP handlers for document submission and the progress/result stream.

use std::convert::Infallible;

use axum::extract::{Multipart, Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::analysis::pipeline;
use crate::analysis::registry::Subscription;
use crate::errors::AppError;
use crate::state::AppState;

/// POST /api/v1/analyses
/// Accepts a single-file multipart upload, creates the job at progress 0 and
/// returns its id immediately; processing continues in the background.
pub async fn handle_submit(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut upload: Option<(Vec<u8>, Option<String>)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let declared_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await?;
            upload = Some((bytes.to_vec(), declared_type));
            break;
        }
    }

    let (bytes, declared_type) =
        upload.ok_or_else(|| AppError::Validation("No file uploaded".to_string()))?;
    if bytes.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }

    let id = Uuid::new_v4();
    state.registry.create_or_get(id);
    info!(job = %id, size = bytes.len(), "document accepted");

    tokio::spawn(pipeline::run(
        state.registry.clone(),
        state.engines.clone(),
        id,
        bytes,
        declared_type,
    ));

    Ok(Json(json!({ "id": id })))
}

/// GET /api/v1/analyses/:id/events
/// SSE stream of progress frames. The first frame is the current snapshot;
/// the frame with `progress == 100` (or a failure code) is terminal — no
/// explicit end-of-stream marker follows, consumers stop on their own.
pub async fn handle_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    let Subscription { mut receiver, .. } = state
        .registry
        .subscribe(id)
        .ok_or_else(|| AppError::NotFound(format!("No job with id {id}")))?;

    let stream = async_stream::stream! {
        while let Some(frame) = receiver.recv().await {
            let json = serde_json::to_string(&frame).unwrap_or_default();
            yield Ok(Event::default().data(json));
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
