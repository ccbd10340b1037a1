//! Router, BGP router and route server entities.

use ipnet::Ipv4Net;
use serde::Serialize;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use super::{Interface, Machine};
use crate::topology::{Asn, IxpId};

/// Interior router with an ordered list of interfaces
#[derive(Debug, Clone, Serialize)]
pub struct Router {
    name: String,
    interfaces: Vec<Interface>,
    /// Directly connected prefixes, originated into the routing daemon
    direct: Vec<Ipv4Net>,
}

impl Router {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            interfaces: Vec::new(),
            direct: Vec::new(),
        }
    }

    /// Append an interface. No de-duplication: joining the same network
    /// twice yields two interfaces.
    pub fn add_interface(&mut self, network: &str, address: Ipv4Addr) {
        self.interfaces.push(Interface::new(network, address));
    }

    pub fn add_direct(&mut self, prefix: Ipv4Net) {
        self.direct.push(prefix);
    }

    pub fn direct(&self) -> &[Ipv4Net] {
        &self.direct
    }

    pub fn interface(&self, index: usize) -> Option<&Interface> {
        self.interfaces.get(index)
    }
}

impl Machine for Router {
    fn name(&self) -> &str {
        &self.name
    }

    fn interfaces(&self) -> Vec<&Interface> {
        self.interfaces.iter().collect()
    }
}

/// Edge router of an AS on one exchange.
///
/// Always has exactly two interfaces: `eth0` on the AS backbone and `eth1` on
/// the IXP peering LAN.
#[derive(Debug, Clone, Serialize)]
pub struct BgpRouter {
    name: String,
    pub asn: Asn,
    pub ixp: IxpId,
    internal: Interface,
    exchange: Interface,
    peers: BTreeSet<String>,
}

impl BgpRouter {
    pub fn new(name: &str, asn: Asn, ixp: IxpId, internal: Interface, exchange: Interface) -> Self {
        Self {
            name: name.to_string(),
            asn,
            ixp,
            internal,
            exchange,
            peers: BTreeSet::new(),
        }
    }

    /// Interface 0, on the AS backbone
    pub fn internal(&self) -> &Interface {
        &self.internal
    }

    /// Interface 1, on the peering LAN
    pub fn exchange(&self) -> &Interface {
        &self.exchange
    }

    pub fn peers(&self) -> &BTreeSet<String> {
        &self.peers
    }

    /// Returns false if the peer was already known
    pub fn add_peer(&mut self, name: &str) -> bool {
        self.peers.insert(name.to_string())
    }
}

impl Machine for BgpRouter {
    fn name(&self) -> &str {
        &self.name
    }

    fn interfaces(&self) -> Vec<&Interface> {
        vec![&self.internal, &self.exchange]
    }
}

/// Route server of an exchange
#[derive(Debug, Clone, Serialize)]
pub struct RouteServer {
    name: String,
    pub ixp: IxpId,
    pub asn: Asn,
    interface: Interface,
    peers: BTreeSet<String>,
}

impl RouteServer {
    pub fn new(name: &str, ixp: IxpId, asn: Asn, interface: Interface) -> Self {
        Self {
            name: name.to_string(),
            ixp,
            asn,
            interface,
            peers: BTreeSet::new(),
        }
    }

    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    pub fn peers(&self) -> &BTreeSet<String> {
        &self.peers
    }

    pub fn add_peer(&mut self, name: &str) -> bool {
        self.peers.insert(name.to_string())
    }
}

impl Machine for RouteServer {
    fn name(&self) -> &str {
        &self.name
    }

    fn interfaces(&self) -> Vec<&Interface> {
        vec![&self.interface]
    }
}
