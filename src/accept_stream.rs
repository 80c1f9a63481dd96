use std::io;
use std::net::SocketAddr;

use async_stream::stream;
use futures_util::Stream;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, trace};

/// Accepted connections as a stream. Accept errors are logged and skipped so
/// one bad connection does not end the listener.
pub fn accept_stream(listener: TcpListener) -> impl Stream<Item = io::Result<TcpStream>> {
    stream! {
        loop {
            let (stream, addr): (TcpStream, SocketAddr) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!("TCP accept error: {}", e);
                    continue;
                }
            };

            if let Err(e) = stream.set_nodelay(true) {
                error!("Failed to set TCP_NODELAY for {}: {}", addr, e);
            }
            trace!("Accepted connection from {}", addr);
            yield Ok(stream);
        }
    }
}
