use crate::config::ForwardPolicy;
use crate::error::NeuronError;
use crate::types::{tree_depth, Neuron};
use futures_util::future::BoxFuture;
use hyper::body::HttpBody;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Request};
use tracing::debug;

/// Request header carrying how many hops the chain has made so far.
pub const HOPS_HEADER: &str = "x-neuron-hops";

/// Performs the single outbound hop of a request.
pub trait PeerClient: Send + Sync {
    /// GET the root resource of `endpoint` and decode its peer tree.
    fn fetch<'a>(&'a self, endpoint: &'a str, hops: u32) -> BoxFuture<'a, Result<Vec<Neuron>, NeuronError>>;
}

pub struct HttpPeerClient {
    client: Client<HttpConnector, Body>,
    policy: ForwardPolicy,
}

impl HttpPeerClient {
    pub fn new(policy: ForwardPolicy) -> Self {
        Self {
            client: Client::new(),
            policy,
        }
    }

    async fn fetch_unbounded(&self, endpoint: &str, hops: u32) -> Result<Vec<Neuron>, NeuronError> {
        let req = Request::get(endpoint)
            .header(HOPS_HEADER, hops.to_string())
            .body(Body::empty())
            .map_err(|e| NeuronError::PeerCommunication(e.to_string()))?;

        let resp = self
            .client
            .request(req)
            .await
            .map_err(|e| NeuronError::PeerCommunication(e.to_string()))?;
        debug!("{} answered {}", endpoint, resp.status());

        let body = read_limited(resp.into_body(), self.policy.max_body_bytes).await?;
        decode_peers(&body, self.policy.max_decode_depth)
    }
}

impl PeerClient for HttpPeerClient {
    fn fetch<'a>(&'a self, endpoint: &'a str, hops: u32) -> BoxFuture<'a, Result<Vec<Neuron>, NeuronError>> {
        Box::pin(async move {
            match self.policy.timeout {
                Some(limit) => tokio::time::timeout(limit, self.fetch_unbounded(endpoint, hops))
                    .await
                    .map_err(|_| NeuronError::PeerTimeout {
                        endpoint: endpoint.to_string(),
                        elapsed: limit,
                    })?,
                None => self.fetch_unbounded(endpoint, hops).await,
            }
        })
    }
}

async fn read_limited(mut body: Body, limit: usize) -> Result<Vec<u8>, NeuronError> {
    let mut buf = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|e| NeuronError::PeerCommunication(e.to_string()))?;
        if buf.len() + chunk.len() > limit {
            return Err(NeuronError::Decode(format!(
                "payload exceeds {} bytes",
                limit
            )));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// Decode a forwarded peer's answer, refusing trees nested deeper than
/// `max_depth`.
pub fn decode_peers(body: &[u8], max_depth: usize) -> Result<Vec<Neuron>, NeuronError> {
    let neurons: Vec<Neuron> =
        serde_json::from_slice(body).map_err(|e| NeuronError::Decode(e.to_string()))?;
    let depth = tree_depth(&neurons);
    if depth > max_depth {
        return Err(NeuronError::Decode(format!(
            "peer tree depth {} exceeds {}",
            depth, max_depth
        )));
    }
    Ok(neurons)
}

/// Hop count of an incoming request; absent or malformed counts as zero.
pub fn incoming_hops(headers: &hyper::HeaderMap) -> u32 {
    headers
        .get(HOPS_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    /// Records every fetch and answers with a canned result.
    pub struct ScriptedPeer {
        pub reply: Result<Vec<Neuron>, String>,
        pub calls: Mutex<Vec<(String, u32)>>,
    }

    impl ScriptedPeer {
        pub fn replying(reply: Vec<Neuron>) -> Self {
            Self {
                reply: Ok(reply),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn unreachable(msg: &str) -> Self {
            Self {
                reply: Err(msg.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<(String, u32)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PeerClient for ScriptedPeer {
        fn fetch<'a>(&'a self, endpoint: &'a str, hops: u32) -> BoxFuture<'a, Result<Vec<Neuron>, NeuronError>> {
            self.calls.lock().unwrap().push((endpoint.to_string(), hops));
            let reply = self
                .reply
                .clone()
                .map_err(NeuronError::PeerCommunication);
            Box::pin(async move { reply })
        }
    }
}
