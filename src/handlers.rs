use crate::chain::{select_peer, should_continue};
use crate::discovery::discover_peers;
use crate::error::NeuronError;
use crate::forward::incoming_hops;
use crate::state::SharedState;
use crate::types::Neuron;
use hyper::server::conn::Http;
use hyper::service::service_fn;
use hyper::{Body, Request, Response, StatusCode};
use std::convert::Infallible;
use tokio::net::TcpStream;
use tracing::{debug, error, info_span, warn, Instrument};

pub async fn handle_connection(stream: TcpStream, state: SharedState) {
    let service = service_fn(move |req| {
        let state = state.clone();
        async move { route_request(req, state).await }
    });

    if let Err(e) = Http::new().serve_connection(stream, service).await {
        error!("Connection error: {}", e);
    }
}

pub async fn route_request(
    req: Request<Body>,
    state: SharedState,
) -> Result<Response<Body>, Infallible> {
    // the whole request target must be "/", query strings included
    let target = req.uri().path_and_query().map(|pq| pq.as_str());
    let result = match target {
        Some("/") => {
            let hops = incoming_hops(req.headers());
            let span = info_span!("request", hops);
            handle_root(hops, &state).instrument(span).await
        }
        _ => Err(NeuronError::NotFound),
    };

    Ok(match result {
        Ok(json) => Response::builder()
            .header("Content-Type", "application/json")
            .body(Body::from(json))
            .unwrap_or_else(|_| bare_500()),
        Err(e) => {
            if e.status() == StatusCode::NOT_FOUND {
                debug!("Not found: {}", req.uri());
            } else {
                warn!("Request failed while {:?}: {}", e.stage(), e);
            }
            plain(e.status(), format!("{}\n", e))
        }
    })
}

/// Discover, maybe forward one hop, and serialise the resulting peer set.
async fn handle_root(hops: u32, state: &SharedState) -> Result<Vec<u8>, NeuronError> {
    let containers = state.registry.list_containers().await?;
    let mut neurons = discover_peers(&state.identity, &state.host, &containers);

    if should_continue(neurons.len(), hops, state.policy.max_hops, state.rng.as_ref()) {
        let chosen = select_peer(neurons.len(), state.rng.as_ref());
        let n = &mut neurons[chosen];
        debug!("Forwarding to {} ({})", n.endpoint, n.container);
        n.send = state.peers.fetch(&n.endpoint, hops + 1).await?;
    } else {
        debug!("Chain ends here with {} peers", neurons.len());
    }

    encode(&neurons)
}

fn encode(neurons: &[Neuron]) -> Result<Vec<u8>, NeuronError> {
    let mut json = serde_json::to_vec(neurons).map_err(NeuronError::Serialize)?;
    json.push(b'\n');
    Ok(json)
}

fn plain(status: StatusCode, text: String) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Body::from(text))
        .unwrap_or_else(|_| bare_500())
}

fn bare_500() -> Response<Body> {
    let mut resp = Response::new(Body::empty());
    *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    resp
}
