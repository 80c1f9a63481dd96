use crate::select_stream_or_shutdown::{select_stream_or_shutdown, Next};
use crate::types::GenericBoxedStream;

use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

/// Hand every item of `stream` to `handler` until the stream ends or shutdown
/// is requested. Handlers run detached; in-flight requests are not awaited.
pub async fn serve_stream<T>(
    mut stream: GenericBoxedStream<T>,
    shutdown_notify: Arc<Notify>,
    handler: impl Fn(T) -> tokio::task::JoinHandle<()> + Send + Sync + 'static,
) {
    loop {
        match select_stream_or_shutdown(stream.as_mut(), shutdown_notify.clone()).await {
            Next::Item(item) => {
                handler(item);
            }
            Next::Ended => {
                info!("Listener stream ended");
                break;
            }
            Next::Shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }
}
