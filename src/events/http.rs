//! HTTP surface for the notification hub.
//!
//! `GET /events` streams hub frames verbatim as `text/event-stream`, with a
//! comment frame every [`KEEP_ALIVE`] while idle. When the client goes away the
//! receiving end is dropped and the hub removes the connection on its next
//! write.

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{interval_at, Instant};
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::events::{NotificationHub, Subscription};

pub const KEEP_ALIVE: Duration = Duration::from_secs(15);
const KEEP_ALIVE_FRAME: &str = ": keep-alive\n\n";

pub fn router(hub: Arc<NotificationHub>) -> Router {
    Router::new()
        .route("/events", get(stream_events))
        .route("/health", get(health))
        .with_state(hub)
}

async fn health() -> &'static str {
    "ok"
}

/// Hub frames for one subscription, interleaved with keep-alive comments.
///
/// Ends as soon as the hub closes the subscription.
pub fn event_stream(
    subscription: Subscription,
    keep_alive: Duration,
) -> impl Stream<Item = String> + Send + 'static {
    let frames = subscription
        .into_stream()
        .map(Some)
        .chain(tokio_stream::once(None));
    let pings = IntervalStream::new(interval_at(Instant::now() + keep_alive, keep_alive))
        .map(|_| Some(KEEP_ALIVE_FRAME.to_string()));
    frames.merge(pings).map_while(|frame| frame)
}

async fn stream_events(State(hub): State<Arc<NotificationHub>>) -> Response {
    let stream = event_stream(hub.connect(), KEEP_ALIVE).map(Ok::<_, Infallible>);
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Serve the event stream on an already bound listener until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    hub: Arc<NotificationHub>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    tracing::info!("Event stream listening on http://{}/events", listener.local_addr()?);
    axum::serve(listener, router(hub))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
