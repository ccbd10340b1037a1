//! # Machine Model
//!
//! Hosts and routers of the emulated Internet. Every machine is a set of
//! interfaces, each one an `(network name, address)` pair handed out by the
//! network's allocator.
//!
//! ## Router Variants
//!
//! - [`Router`]: any number of interfaces plus directly connected prefixes;
//!   runs OSPF on all of them.
//! - [`BgpRouter`]: exactly two interfaces. Index 0 is the AS-internal
//!   backbone, index 1 the IXP peering LAN. Position carries meaning.
//! - [`RouteServer`]: exactly one interface, on the IXP peering LAN.
//!
//! ## References
//!
//! Machines refer to networks and to their BGP peers by *name*. Names are
//! resolved through a [`TopologyView`] when configuration is synthesized, so a
//! peering can be declared before the peer exists.
//!
//! ## Artifact Boundary
//!
//! [`Machine::compose_entry`] returns the tuple shape a container serializer
//! needs: the machine name, a relative build context, and the list of
//! `(network, prefix, netmask)` attachments.

pub mod host;
pub mod router;

use serde::Serialize;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use crate::synth::SynthesisError;
use crate::topology::{Asn, TopologyView};

pub use host::Host;
pub use router::{BgpRouter, RouteServer, Router};

/// A single `(network, address)` attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interface {
    pub network: String,
    pub address: Ipv4Addr,
}

impl Interface {
    pub fn new(network: &str, address: Ipv4Addr) -> Self {
        Self {
            network: network.to_string(),
            address,
        }
    }
}

/// Network attachment as seen by the container serializer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkAttachment {
    pub network: String,
    pub prefix: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub address: Ipv4Addr,
}

/// Everything the serializer needs to emit one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposeEntry {
    pub name: String,
    pub build_context: PathBuf,
    pub networks: Vec<NetworkAttachment>,
}

/// Common capability of hosts and routers
pub trait Machine {
    fn name(&self) -> &str;

    /// Interfaces in index order (`eth0`, `eth1`, ...)
    fn interfaces(&self) -> Vec<&Interface>;

    fn compose_entry(&self, view: &dyn TopologyView) -> Result<ComposeEntry, SynthesisError> {
        let networks = self
            .interfaces()
            .into_iter()
            .map(|iface| -> Result<NetworkAttachment, SynthesisError> {
                let network = view.network(&iface.network).ok_or_else(|| {
                    SynthesisError::UnknownNetwork {
                        machine: self.name().to_string(),
                        network: iface.network.clone(),
                    }
                })?;
                Ok(NetworkAttachment {
                    network: iface.network.clone(),
                    prefix: network.prefix().network(),
                    netmask: network.netmask(),
                    address: iface.address,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ComposeEntry {
            name: self.name().to_string(),
            build_context: PathBuf::from(".").join(self.name()),
            networks,
        })
    }
}

/// Any router stored in the topology registry
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RouterNode {
    Router(Router),
    Bgp(BgpRouter),
    #[serde(rename = "rs")]
    RouteServer(RouteServer),
}

impl RouterNode {
    /// Short kind tag, matching the serialized `type`
    pub fn kind(&self) -> &'static str {
        match self {
            RouterNode::Router(_) => "router",
            RouterNode::Bgp(_) => "bgp",
            RouterNode::RouteServer(_) => "rs",
        }
    }

    /// ASN the router speaks BGP with, if it speaks BGP at all
    pub fn asn(&self) -> Option<Asn> {
        match self {
            RouterNode::Router(_) => None,
            RouterNode::Bgp(router) => Some(router.asn),
            RouterNode::RouteServer(rs) => Some(rs.asn),
        }
    }

    /// Address on the IXP peering LAN
    pub fn exchange_address(&self) -> Option<Ipv4Addr> {
        match self {
            RouterNode::Router(_) => None,
            RouterNode::Bgp(router) => Some(router.exchange().address),
            RouterNode::RouteServer(rs) => Some(rs.interface().address),
        }
    }

    pub fn as_bgp(&self) -> Option<&BgpRouter> {
        match self {
            RouterNode::Bgp(router) => Some(router),
            _ => None,
        }
    }

    pub fn as_bgp_mut(&mut self) -> Option<&mut BgpRouter> {
        match self {
            RouterNode::Bgp(router) => Some(router),
            _ => None,
        }
    }

    pub fn as_route_server_mut(&mut self) -> Option<&mut RouteServer> {
        match self {
            RouterNode::RouteServer(rs) => Some(rs),
            _ => None,
        }
    }
}

impl Machine for RouterNode {
    fn name(&self) -> &str {
        match self {
            RouterNode::Router(router) => router.name(),
            RouterNode::Bgp(router) => router.name(),
            RouterNode::RouteServer(rs) => rs.name(),
        }
    }

    fn interfaces(&self) -> Vec<&Interface> {
        match self {
            RouterNode::Router(router) => router.interfaces(),
            RouterNode::Bgp(router) => router.interfaces(),
            RouterNode::RouteServer(rs) => rs.interfaces(),
        }
    }
}
