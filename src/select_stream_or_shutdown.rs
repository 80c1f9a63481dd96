use futures_util::Stream;
use futures_util::StreamExt;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Notify;

/// Outcome of waiting on a stream while shutdown may be requested.
#[derive(Debug, PartialEq, Eq)]
pub enum Next<T> {
    Item(T),
    Ended,
    Shutdown,
}

/// Await the next item from a stream or a shutdown signal, whichever is first.
pub async fn select_stream_or_shutdown<T>(
    mut stream: Pin<&mut (dyn Stream<Item = T> + Send)>,
    shutdown_notify: Arc<Notify>,
) -> Next<T> {
    tokio::select! {
        item = stream.next() => match item {
            Some(item) => Next::Item(item),
            None => Next::Ended,
        },
        _ = shutdown_notify.notified() => Next::Shutdown,
    }
}
