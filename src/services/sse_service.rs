use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::sse::{Handshake, ServerEvent, SystemStatus},
    state::{Notification, SharedState},
};

const EVENT_HANDSHAKE: &str = "handshake";
const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Subscribe to the notification hub.
pub fn subscribe(state: &SharedState) -> broadcast::Receiver<Notification> {
    state.notifications().subscribe()
}

/// Convert a notification receiver into an SSE response.
///
/// The stream opens with a handshake, reports degraded-mode changes and forwards every
/// notification until the client disconnects. Lagging clients skip what they missed.
pub fn to_sse_stream(
    state: SharedState,
    mut receiver: broadcast::Receiver<Notification>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);
    let mut degraded = state.degraded_watcher();

    tokio::spawn(async move {
        let handshake = Handshake {
            message: "notification stream connected".into(),
            degraded: *degraded.borrow_and_update(),
        };
        if let Ok(event) = ServerEvent::json(EVENT_HANDSHAKE.to_owned(), &handshake) {
            if tx.send(Ok(to_event(event))).await.is_err() {
                return;
            }
        }

        loop {
            let event = tokio::select! {
                _ = tx.closed() => break,
                changed = degraded.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = SystemStatus { degraded: *degraded.borrow_and_update() };
                    ServerEvent::json(EVENT_SYSTEM_STATUS.to_owned(), &status)
                }
                recv_result = receiver.recv() => match recv_result {
                    Ok(notification) => ServerEvent::try_from(&notification),
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "notification stream lagged");
                        continue;
                    }
                },
            };

            match event {
                Ok(event) => {
                    if tx.send(Ok(to_event(event))).await.is_err() {
                        break;
                    }
                }
                Err(err) => warn!(error = %err, "failed to serialise notification"),
            }
        }

        info!("notification stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}
