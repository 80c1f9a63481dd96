use serde::{Deserialize, Serialize};

use futures_util::Stream;
use std::pin::Pin;

/// A sibling node as seen on the wire.
///
/// `send` holds the tree returned by this peer when the request was forwarded
/// to it, and is empty for every other peer in a set.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Neuron {
    #[serde(rename = "Endpoint")]
    pub endpoint: String,
    #[serde(rename = "Container")]
    pub container: String,
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "Send", default, deserialize_with = "null_as_empty")]
    pub send: Vec<Neuron>,
}

impl Neuron {
    pub fn new(endpoint: String, container: String, image: String) -> Self {
        Self {
            endpoint,
            container,
            image,
            send: Vec::new(),
        }
    }

    /// Nesting depth of this node, counting itself.
    pub fn depth(&self) -> usize {
        1 + tree_depth(&self.send)
    }
}

/// Nesting depth of a peer set; an empty set has depth 0.
pub fn tree_depth(neurons: &[Neuron]) -> usize {
    neurons.iter().map(Neuron::depth).max().unwrap_or(0)
}

// Nodes that never forwarded may have serialised a nil slice as `null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Neuron>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Neuron>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One running container as reported by the registry.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ContainerSummary {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "Ports", default)]
    pub ports: Vec<PortMapping>,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PortMapping {
    #[serde(rename = "PrivatePort")]
    pub private_port: u16,
    #[serde(rename = "PublicPort", default)]
    pub public_port: Option<u16>,
}

pub type GenericBoxedStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;
