use std::path::PathBuf;
use std::time::Duration;

use hyper::StatusCode;
use thiserror::Error;

/// Startup configuration problems. Fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not retrieve {0}, not provided as option and not in env")]
    Missing(&'static str),

    #[error("invalid docker host '{host}': {reason}")]
    InvalidDockerHost { host: String, reason: String },

    #[error("credential file not found at '{}'", .0.display())]
    MissingCredential(PathBuf),

    #[error("could not read local hostname: {0}")]
    Hostname(std::io::Error),

    #[error("max hops {max_hops} must stay below max decode depth {max_decode_depth}")]
    HopsExceedDepth { max_hops: u32, max_decode_depth: usize },

    #[error("max decode depth {depth} outside 1..={limit}")]
    DecodeDepth { depth: usize, limit: usize },

    #[error("tls setup failed: {0}")]
    Tls(#[from] openssl::error::ErrorStack),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Transport(#[from] hyper::Error),

    #[error("registry request could not be built: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("registry returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("registry payload invalid: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Where in the handling of a request something went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Routing,
    Discovering,
    Forwarding,
    Merging,
    Responding,
}

/// Per-request failures. Every variant is terminal for the request.
#[derive(Debug, Error)]
pub enum NeuronError {
    #[error("{0}")]
    Registry(#[from] RegistryError),

    #[error("{0}")]
    PeerCommunication(String),

    #[error("forward to {endpoint} timed out after {elapsed:?}")]
    PeerTimeout { endpoint: String, elapsed: Duration },

    #[error("decode other neuron: {0}")]
    Decode(String),

    #[error("{0}")]
    Serialize(serde_json::Error),

    #[error("404 page not found")]
    NotFound,
}

impl NeuronError {
    pub fn status(&self) -> StatusCode {
        match self {
            NeuronError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            NeuronError::NotFound => Stage::Routing,
            NeuronError::Registry(_) => Stage::Discovering,
            NeuronError::PeerCommunication(_) | NeuronError::PeerTimeout { .. } => Stage::Forwarding,
            NeuronError::Decode(_) => Stage::Merging,
            NeuronError::Serialize(_) => Stage::Responding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_failures_are_prefixed() {
        let e = NeuronError::Decode("expected value at line 1 column 1".into());
        assert_eq!(
            e.to_string(),
            "decode other neuron: expected value at line 1 column 1"
        );
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.stage(), Stage::Merging);
    }

    #[test]
    fn only_not_found_maps_to_404() {
        assert_eq!(NeuronError::NotFound.status(), StatusCode::NOT_FOUND);
        let registry = NeuronError::from(RegistryError::Status {
            status: StatusCode::BAD_GATEWAY,
            body: "down".into(),
        });
        assert_eq!(registry.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(registry.stage(), Stage::Discovering);
    }

    #[test]
    fn config_error_names_missing_variable() {
        assert_eq!(
            ConfigError::Missing("DOCKER_HOST").to_string(),
            "could not retrieve DOCKER_HOST, not provided as option and not in env"
        );
    }
}
