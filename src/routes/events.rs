//! Event Stream Route
//!
//! GET /events - Server-Sent Events carrying the session's record snapshots

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use futures::stream::{Stream, StreamExt};

use crate::events::watch_snapshots;
use crate::session::SessionId;
use crate::state::AppState;

/// GET /events
///
/// Each message is `data: <compact-json>`; nothing is sent until the
/// session has a record file.
pub async fn stream_events(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let store_file = state.store().session_dirs(session.as_str()).store_file;

    tracing::debug!(session_id = %session, "Event stream opened");

    let stream = watch_snapshots(
        store_file,
        state.config().poll_interval(),
        state.shutdown_signal(),
    )
    .map(|snapshot| Ok(Event::default().data(snapshot)));

    let sse = Sse::new(stream);
    match state.config().keepalive() {
        Some(interval) => sse.keep_alive(KeepAlive::new().interval(interval)),
        None => sse,
    }
}
