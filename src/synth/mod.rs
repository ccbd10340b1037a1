//! # Routing Configuration Synthesis
//!
//! Renders BIRD 2 configuration for every router of a topology and boot
//! scripts for its hosts. Synthesis only reads the topology, through a
//! [`TopologyView`], and resolves peer names at render time.
//!
//! ## Per-router documents
//!
//! - [`Router`]: router id, device and kernel protocols, a `direct` protocol
//!   for its connected prefixes and OSPF over all interfaces.
//! - [`BgpRouter`]: OSPF on the backbone interface, an iBGP full mesh with
//!   the other BGP routers of its AS, and one eBGP session per peer.
//! - [`RouteServer`]: one `rs client` session per exchange member.
//!
//! ## Unresolved peers
//!
//! A peer name the topology cannot resolve is handled by [`PeerPolicy`]:
//! skipped with a warning, or reported as [`SynthesisError::UnresolvedPeer`].

pub mod bgp;
pub mod ospf;
pub mod templates;

use serde::{Deserialize, Serialize};

use crate::machine::{BgpRouter, Machine, RouteServer, Router, RouterNode};
use crate::topology::{Asn, TopologyView};

/// What to do with a peer name that resolves to nothing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerPolicy {
    /// Fail synthesis
    Strict,
    /// Log a warning and leave the session out
    #[default]
    Lenient,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisOptions {
    #[serde(default)]
    pub peer_policy: PeerPolicy,
}

/// Synthesis errors
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("Router {router} refers to unknown BGP peer {peer}")]
    UnresolvedPeer { router: String, peer: String },

    #[error("Machine {machine} is attached to unknown network {network}")]
    UnknownNetwork { machine: String, network: String },

    #[error("Unknown autonomous system: AS{0}")]
    UnknownAs(Asn),

    #[error("Router {router} has no interface {index}")]
    MissingInterface { router: String, index: usize },
}

impl PeerPolicy {
    /// Apply the policy to an unresolved `peer` of `router`
    pub(crate) fn unresolved(self, router: &str, peer: &str) -> Result<(), SynthesisError> {
        match self {
            PeerPolicy::Strict => Err(SynthesisError::UnresolvedPeer {
                router: router.to_string(),
                peer: peer.to_string(),
            }),
            PeerPolicy::Lenient => {
                log::warn!("{}: skipping unresolved peer {}", router, peer);
                Ok(())
            }
        }
    }
}

/// Full `bird.conf` of any router
pub fn synthesize_router(
    node: &RouterNode,
    view: &dyn TopologyView,
    options: &SynthesisOptions,
) -> Result<String, SynthesisError> {
    let config = match node {
        RouterNode::Router(router) => synthesize_interior(router)?,
        RouterNode::Bgp(router) => synthesize_border(router, view, options.peer_policy)?,
        RouterNode::RouteServer(rs) => synthesize_route_server(rs, view, options.peer_policy)?,
    };
    log::debug!("Synthesized {} config for {}", node.kind(), node.name());
    Ok(config)
}

fn synthesize_interior(router: &Router) -> Result<String, SynthesisError> {
    let id = router.interface(0).ok_or_else(|| SynthesisError::MissingInterface {
        router: router.name().to_string(),
        index: 0,
    })?;

    let mut config = templates::header(id.address);
    if !router.direct().is_empty() {
        config.push_str(&templates::direct(router.direct()));
    }
    config.push_str(&router.synthesize_ospf_config());
    Ok(config)
}

fn synthesize_border(
    router: &BgpRouter,
    view: &dyn TopologyView,
    policy: PeerPolicy,
) -> Result<String, SynthesisError> {
    let mut config = templates::header(router.internal().address);

    let ibgp = router.synthesize_ibgp_config(view, policy)?;
    if ibgp.is_empty() {
        // still reach the rest of the AS over the backbone
        config.push_str(&templates::ospf(&[0]));
    } else {
        config.push_str(&ibgp);
    }
    config.push_str(&router.synthesize_ebgp_config(view, policy)?);
    Ok(config)
}

fn synthesize_route_server(
    rs: &RouteServer,
    view: &dyn TopologyView,
    policy: PeerPolicy,
) -> Result<String, SynthesisError> {
    let mut config = templates::header(rs.interface().address);
    config.push_str(&rs.synthesize_multilateral_config(view, policy)?);
    Ok(config)
}
