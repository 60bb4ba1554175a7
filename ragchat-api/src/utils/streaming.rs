use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use ragchat_core::{TurnEvent, TurnStream};
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tracing::error;

use crate::models::error::ApiError;

/// SSE event name of a turn event
pub fn event_name(event: &TurnEvent) -> &'static str {
    match event {
        TurnEvent::Question { .. } => "question",
        TurnEvent::Draft { .. } => "draft",
        TurnEvent::Completed { .. } => "done",
    }
}

fn json_event<T: Serialize>(name: &str, data: &T) -> Event {
    Event::default()
        .event(name)
        .data(serde_json::to_string(data).unwrap_or_default())
}

/// Render a turn as server-sent events: `question`, `draft`..., then `done` or `error`
///
/// A client that disconnects only stops the events; the turn itself finishes.
pub fn turn_sse(turn: TurnStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let event_stream = turn.map(|item| {
        Ok(match item {
            Ok(event) => json_event(event_name(&event), &event),
            Err(e) => {
                error!("Turn failed: {}", e);
                json_event("error", &ApiError::from(e).detail())
            },
        })
    });

    Sse::new(event_stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(
            event_name(&TurnEvent::Draft {
                content: "a▌".to_string()
            }),
            "draft"
        );
        assert_eq!(
            event_name(&TurnEvent::Completed {
                content: "a".to_string(),
                sources: vec![]
            }),
            "done"
        );
    }
}
