//! Real-time fan-out: one broadcast channel per family, exposed to clients
//! as a server-sent-events stream.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::StreamExt;
use kinboard_shared::api::ServerEvent;
use kinboard_shared::jwt::{self, AccessClaims};
use serde::Deserialize;
use tokio::sync::{Mutex, broadcast};
use tokio_stream::wrappers::BroadcastStream;

use super::{AppError, AppState};

const CHANNEL_CAPACITY: usize = 64;

/// Per-family broadcast hub. Channels are created lazily on first subscribe
/// and dropped once the last subscriber is gone.
#[derive(Clone, Default)]
pub struct Notifier {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<ServerEvent>>>>,
}

impl Notifier {
    pub async fn subscribe(&self, family_id: &str) -> broadcast::Receiver<ServerEvent> {
        let mut channels = self.channels.lock().await;
        channels
            .entry(family_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub async fn publish(&self, family_id: &str, event: ServerEvent) {
        let mut channels = self.channels.lock().await;
        if let Some(sender) = channels.get(family_id) {
            if sender.send(event).is_err() {
                // Nobody is listening anymore; drop the idle channel.
                channels.remove(family_id);
            }
        }
    }
}

#[derive(Deserialize)]
pub struct StreamOpts {
    token: String,
}

/// SSE stream of family events. EventSource clients cannot set headers, so
/// the access token travels as a query parameter. The channel is selected by
/// the verified token's family claim alone; a session can only ever join its
/// own family's room.
pub async fn api_chat_stream(
    State(state): State<AppState>,
    Query(opts): Query<StreamOpts>,
) -> Result<Sse<impl futures::Stream<Item = Result<Event, Infallible>>>, AppError> {
    let claims: AccessClaims =
        jwt::decode_and_verify(&opts.token, state.config.jwt_secret.as_bytes()).map_err(|e| {
            tracing::warn!(error = %e, "sse: token rejected");
            AppError::forbidden()
        })?;

    let rx = state.notifier().subscribe(&claims.family_id).await;
    let shutdown = state.shutdown_token();
    let stream = BroadcastStream::new(rx)
        .take_until(shutdown.cancelled_owned())
        .filter_map(|item| {
            futures::future::ready(match item {
                Ok(event) => sse_event(&event),
                // A lagged subscriber skips the missed events.
                Err(_) => None,
            })
        });
    Ok(Sse::new(stream).keep_alive(KeepAlive::new()))
}

fn sse_event(event: &ServerEvent) -> Option<Result<Event, Infallible>> {
    match event.payload_json() {
        Ok(payload) => Some(Ok(Event::default().event(event.name()).data(payload))),
        Err(err) => {
            tracing::error!(error = %err, "sse: failed to serialize event");
            None
        }
    }
}
