use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use tracelog_sessions::ExplorerEvent;

use super::{ApiError, AppState};

pub async fn explorer_events(
    State(state): State<AppState>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let rx = state.read()?.subscribe();
    let stream = BroadcastStream::new(rx).map(|result| {
        let event = match result {
            Ok(evt) => {
                let event_type = match &evt {
                    ExplorerEvent::Loaded { .. } => "loaded",
                    ExplorerEvent::RootSelected { .. } => "root_selected",
                    ExplorerEvent::NodeSelected { .. } => "node_selected",
                    ExplorerEvent::Cleared { .. } => "cleared",
                };
                Event::default()
                    .event(event_type)
                    .data(serde_json::to_string(&evt).unwrap_or_default())
            }
            Err(_) => Event::default().comment("missed event"),
        };
        Ok(event)
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
