use std::convert::Infallible;
use std::pin::Pin;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;

use crate::engine::TrackerHandle;

pub type SeamStream = Sse<Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>>;

/// Build a Server-Sent Events stream of seam outputs.
///
/// Lagged receivers skip the missed outputs; the stream itself stays open.
pub fn seam_outputs(handle: &TrackerHandle) -> SeamStream {
    let receiver = handle.subscribe_seam();

    let stream = BroadcastStream::new(receiver).filter_map(|result| async move {
        match result {
            Ok(output) => match serde_json::to_string(&output) {
                Ok(payload) => Some(Ok(Event::default().event("seam").data(payload))),
                Err(_) => None,
            },
            Err(_) => None,
        }
    });

    Sse::new(Box::pin(stream) as Pin<Box<_>>).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(5))
            .text("seam-keepalive"),
    )
}
