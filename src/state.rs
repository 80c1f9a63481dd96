use crate::chain::RandomSource;
use crate::config::ForwardPolicy;
use crate::discovery::SelfIdentity;
use crate::forward::PeerClient;
use crate::registry::Registry;
use std::sync::Arc;

/// Read-only startup state shared by every request.
pub struct NodeState {
    pub registry: Arc<dyn Registry>,
    pub peers: Arc<dyn PeerClient>,
    pub rng: Arc<dyn RandomSource>,
    pub identity: SelfIdentity,
    /// Network address at which sibling ports are published.
    pub host: String,
    pub policy: ForwardPolicy,
}

pub type SharedState = Arc<NodeState>;

pub fn new_state(
    registry: Arc<dyn Registry>,
    peers: Arc<dyn PeerClient>,
    rng: Arc<dyn RandomSource>,
    identity: SelfIdentity,
    host: String,
    policy: ForwardPolicy,
) -> SharedState {
    Arc::new(NodeState {
        registry,
        peers,
        rng,
        identity,
        host,
        policy,
    })
}
