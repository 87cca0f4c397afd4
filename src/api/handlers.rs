use axum::{
    Json,
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use crate::data_models::StreamEvent;
use crate::error::ApiError;
use crate::pipeline::{ERROR_MESSAGE, SearchPipeline};

use super::models::{HelloResponse, SearchParams, StatusResponse};

pub const END_OF_STREAM: &str = "end-of-stream";

pub async fn root_handler() -> Json<HelloResponse> {
    Json(HelloResponse {
        message: "hello world perplexity alternative v1",
    })
}

pub async fn up_test_handler() -> Json<StatusResponse> {
    Json(StatusResponse { status: "ok" })
}

pub async fn search_handler(
    State(pipeline): State<Arc<SearchPipeline>>,
    Query(params): Query<SearchParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let request = params.into_request().ok_or(ApiError::EmptyQuery)?;
    tracing::info!(query = %request.query, pro_mode = request.pro_mode, "search request");

    let events = pipeline
        .stream(request)
        .flat_map(|event| stream::iter(to_sse_events(&event)))
        .map(Ok::<Event, Infallible>);

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// Frames one pipeline event as SSE. `finished` is followed by the
/// `end-of-stream` marker the client closes on.
fn to_sse_events(event: &StreamEvent) -> Vec<Event> {
    let data = serde_json::to_string(event).unwrap_or_else(|e| {
        tracing::error!("failed to encode {} event: {e}", event.kind());
        serde_json::json!({"type": "error", "data": ERROR_MESSAGE}).to_string()
    });
    let mut frames = vec![Event::default().data(data)];
    if let StreamEvent::Finished { .. } = event {
        frames.push(Event::default().event(END_OF_STREAM).data("null"));
    }
    frames
}
