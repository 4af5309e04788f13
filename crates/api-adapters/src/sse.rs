//! Live queries as Server-Sent Events.
//!
//! Each event carries a full snapshot (`event: snapshot`) or a user-facing
//! failure (`event: error`). The stream ends when the change feed closes;
//! a disconnecting client drops the stream and with it the subscription.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream};
use serde::Serialize;
use services::live::Snapshot;
use services::{Action, LiveQuery};

use crate::error::ApiError;

pub fn live_events<Q>(
    live: LiveQuery<Q>,
    action: Action,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    Q: Snapshot + 'static,
    Q::Output: Serialize,
{
    let events = stream::unfold(live, move |mut live| async move {
        let next = live.next().await?;
        let event = match next {
            Ok(snapshot) => snapshot_event(&snapshot),
            Err(err) => error_event(&ApiError::from_domain(action, err)),
        };
        Some((Ok(event), live))
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

fn snapshot_event<T: Serialize>(snapshot: &T) -> Event {
    match Event::default().event("snapshot").json_data(snapshot) {
        Ok(event) => event,
        Err(err) => {
            tracing::error!(error = %err, "failed to encode live snapshot");
            Event::default().event("error").data("snapshot encoding failed")
        }
    }
}

fn error_event(err: &ApiError) -> Event {
    Event::default()
        .event("error")
        .json_data(err.body())
        .unwrap_or_else(|_| Event::default().event("error").data(err.message.as_str()))
}
