use axum::{
    response::sse::{Event, KeepAlive, Sse},
    extract::State,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::StreamExt as _;
use tracing::info;

use super::http::AppState;
use crate::session::SessionEvent;

pub async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected");

    let rx = state.controller.subscribe();

    let stream = tokio_stream::wrappers::BroadcastStream::new(rx)
        .map(|result| Ok(session_event(result.ok())));

    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(30))
                .text("keep-alive")
        )
}

/// `None` means the client lagged behind and should re-read the status.
fn session_event(event: Option<SessionEvent>) -> Event {
    match event.map(|event| serde_json::to_string(&event)) {
        Some(Ok(json)) => Event::default()
            .event("session-event")
            .data(json),
        _ => sync_required(),
    }
}

fn sync_required() -> Event {
    Event::default()
        .event("sync-required")
        .data("{}")
}
