use crate::registry::Registry;
use crate::types::{ContainerSummary, Neuron};
use tracing::{debug, warn};

/// Images whose name starts with this are neurons; everything else on the
/// host is ignored.
pub const NEURON_IMAGE_PREFIX: &str = "neuron";

/// Port every neuron listens on inside its container.
pub const SERVICE_PORT: u16 = 8090;

/// How this node recognises itself in a registry listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelfIdentity {
    /// Exact container ID reported by the registry.
    ContainerId(String),
    /// Container IDs starting with the local hostname are taken to be us.
    HostnamePrefix(String),
}

impl SelfIdentity {
    /// Ask the registry who we are, keeping the hostname rule when it can't say.
    pub async fn resolve(registry: &dyn Registry, hostname: &str) -> Self {
        match registry.resolve_self(hostname).await {
            Ok(Some(id)) => {
                debug!("Resolved own container id {}", id);
                SelfIdentity::ContainerId(id)
            }
            Ok(None) => {
                warn!("Registry does not know container '{}', excluding by hostname prefix", hostname);
                SelfIdentity::HostnamePrefix(hostname.to_string())
            }
            Err(e) => {
                warn!("Could not resolve own container id: {}, excluding by hostname prefix", e);
                SelfIdentity::HostnamePrefix(hostname.to_string())
            }
        }
    }

    pub fn is_self(&self, container_id: &str) -> bool {
        match self {
            SelfIdentity::ContainerId(id) => container_id == id,
            SelfIdentity::HostnamePrefix(hn) => container_id.starts_with(hn.as_str()),
        }
    }
}

/// Turn a registry listing into the peers this node may forward to, in
/// listing order. A container publishing the service port more than once
/// yields one peer per mapping.
pub fn discover_peers(
    identity: &SelfIdentity,
    host: &str,
    containers: &[ContainerSummary],
) -> Vec<Neuron> {
    let mut neurons = Vec::new();

    for c in containers {
        if !c.image.starts_with(NEURON_IMAGE_PREFIX) {
            continue;
        }
        if identity.is_self(&c.id) {
            continue;
        }

        for p in &c.ports {
            if p.private_port != SERVICE_PORT {
                continue;
            }
            // mapped internally but not published on the host
            let Some(public) = p.public_port else {
                continue;
            };

            neurons.push(Neuron::new(
                format!("http://{}:{}", host, public),
                c.id.clone(),
                c.image.clone(),
            ));
        }
    }

    debug!("Discovered {} peers among {} containers", neurons.len(), containers.len());
    neurons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::fake::StaticRegistry;
    use crate::types::PortMapping;
    use proptest::prelude::*;

    fn container(id: &str, image: &str, ports: &[(u16, Option<u16>)]) -> ContainerSummary {
        ContainerSummary {
            id: id.to_string(),
            image: image.to_string(),
            ports: ports
                .iter()
                .map(|&(private_port, public_port)| PortMapping {
                    private_port,
                    public_port,
                })
                .collect(),
        }
    }

    fn by_hostname(hn: &str) -> SelfIdentity {
        SelfIdentity::HostnamePrefix(hn.to_string())
    }

    #[test]
    fn single_sibling_becomes_peer() {
        let cs = vec![container("hostB123", "neuron-x", &[(8090, Some(9001))])];
        let peers = discover_peers(&by_hostname("hostA"), "10.0.0.5", &cs);
        assert_eq!(
            peers,
            vec![Neuron::new(
                "http://10.0.0.5:9001".into(),
                "hostB123".into(),
                "neuron-x".into()
            )]
        );
    }

    #[test]
    fn non_neuron_images_are_invisible() {
        let cs = vec![container("hostC1", "worker", &[(8090, Some(9002))])];
        assert!(discover_peers(&by_hostname("hostA"), "10.0.0.5", &cs).is_empty());
    }

    #[test]
    fn own_container_is_excluded() {
        let cs = vec![
            container("hostA9f", "neuron", &[(8090, Some(9000))]),
            container("hostB1", "neuron", &[(8090, Some(9001))]),
        ];
        let peers = discover_peers(&by_hostname("hostA"), "h", &cs);
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].container, "hostB1");
    }

    #[test]
    fn exact_identity_does_not_exclude_prefix_collisions() {
        let cs = vec![
            container("abc123", "neuron", &[(8090, Some(9000))]),
            container("abc123ff", "neuron", &[(8090, Some(9001))]),
        ];
        let me = SelfIdentity::ContainerId("abc123".into());
        let peers = discover_peers(&me, "h", &cs);
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].container, "abc123ff");
    }

    #[test]
    fn only_service_port_mappings_count() {
        let cs = vec![container(
            "hostB",
            "neuron",
            &[(22, Some(2222)), (8090, Some(9001)), (8090, None), (8090, Some(9003))],
        )];
        let endpoints: Vec<_> = discover_peers(&by_hostname("hostA"), "h", &cs)
            .into_iter()
            .map(|n| n.endpoint)
            .collect();
        assert_eq!(endpoints, vec!["http://h:9001", "http://h:9003"]);
    }

    #[test]
    fn listing_order_is_kept() {
        let cs = vec![
            container("z", "neuron", &[(8090, Some(3))]),
            container("a", "neuron", &[(8090, Some(1))]),
            container("m", "neuron", &[(8090, Some(2))]),
        ];
        let ids: Vec<_> = discover_peers(&by_hostname("self"), "h", &cs)
            .into_iter()
            .map(|n| n.container)
            .collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[tokio::test]
    async fn resolve_prefers_registry_identity() {
        let registry = StaticRegistry::new(vec![container("hostAfull", "neuron", &[])]);
        assert_eq!(
            SelfIdentity::resolve(&registry, "hostA").await,
            SelfIdentity::ContainerId("hostAfull".into())
        );
        assert_eq!(
            SelfIdentity::resolve(&registry, "other").await,
            by_hostname("other")
        );
    }

    fn arb_container() -> impl Strategy<Value = ContainerSummary> {
        (
            "[a-f0-9]{1,12}",
            prop_oneof!["neuron[a-z-]{0,6}", "[a-z]{1,8}"],
            prop::collection::vec(
                (prop_oneof![Just(8090u16), 1u16..9000], prop::option::of(1u16..65535)),
                0..4,
            ),
        )
            .prop_map(|(id, image, ports)| container(&id, &image, &ports))
    }

    proptest! {
        /// Property: no discovered peer claims to be this node
        #[test]
        fn prop_self_never_discovered(
            hostname in "[a-f0-9]{1,4}",
            cs in prop::collection::vec(arb_container(), 0..12),
        ) {
            let peers = discover_peers(&by_hostname(&hostname), "10.0.0.5", &cs);
            for p in &peers {
                prop_assert!(!p.container.starts_with(&hostname));
            }
        }

        /// Property: every discovered peer runs a neuron image on a published service port
        #[test]
        fn prop_only_neuron_images(
            cs in prop::collection::vec(arb_container(), 0..12),
        ) {
            let peers = discover_peers(&by_hostname("zz"), "10.0.0.5", &cs);
            for p in &peers {
                prop_assert!(p.image.starts_with(NEURON_IMAGE_PREFIX));
                prop_assert!(p.send.is_empty());
            }
            let expected: usize = cs
                .iter()
                .filter(|c| c.image.starts_with(NEURON_IMAGE_PREFIX))
                .flat_map(|c| &c.ports)
                .filter(|p| p.private_port == SERVICE_PORT && p.public_port.is_some())
                .count();
            prop_assert_eq!(peers.len(), expected);
        }
    }
}
