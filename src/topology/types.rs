//! Topology type definitions.
//!
//! Autonomous systems, Internet exchanges and the peering relationships
//! between them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Autonomous system number
pub type Asn = u32;

/// Internet exchange identifier (the data source's peering LAN id)
pub type IxpId = u32;

/// Commercial role of a BGP session, seen from the local AS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    /// The remote AS is our upstream
    Provider,
    /// The remote AS is our downstream
    Customer,
    /// Settlement-free peering
    Peer,
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relationship::Provider => write!(f, "provider"),
            Relationship::Customer => write!(f, "customer"),
            Relationship::Peer => write!(f, "peer"),
        }
    }
}

impl FromStr for Relationship {
    type Err = String;

    /// Accepts both our own names and the RIPEstat neighbour types, where
    /// `left` neighbours are upstreams and `right` neighbours downstreams.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "provider" | "left" => Ok(Relationship::Provider),
            "customer" | "right" => Ok(Relationship::Customer),
            "peer" | "uncertain" => Ok(Relationship::Peer),
            other => Err(format!("unknown peering relationship '{}'", other)),
        }
    }
}

/// An autonomous system and the names of its components
#[derive(Debug, Clone, Serialize)]
pub struct AutonomousSystem {
    pub asn: Asn,
    pub name: String,
    /// Internal network carrying OSPF and iBGP between the AS's routers
    pub backbone: String,
    /// Networks created from announced prefixes
    pub networks: Vec<String>,
    /// Non-BGP routers
    pub routers: BTreeSet<String>,
    /// BGP routers, keyed by the exchange they sit on
    pub bgp_routers: BTreeMap<IxpId, String>,
}

impl AutonomousSystem {
    pub fn new(asn: Asn) -> Self {
        Self {
            asn,
            name: as_name(asn),
            backbone: format!("{}_backbone", as_name(asn)),
            networks: Vec::new(),
            routers: BTreeSet::new(),
            bgp_routers: BTreeMap::new(),
        }
    }

    /// Names of all BGP routers of this AS
    pub fn bgp_router_names(&self) -> BTreeSet<&str> {
        self.bgp_routers.values().map(String::as_str).collect()
    }
}

/// An Internet exchange point: a shared peering LAN plus its route server
#[derive(Debug, Clone, Serialize)]
pub struct InternetExchange {
    pub id: IxpId,
    pub name: String,
    /// Name of the peering LAN network
    pub network: String,
    pub route_server: String,
    /// Member ASes joined so far
    pub members: BTreeSet<Asn>,
}

impl InternetExchange {
    pub fn new(id: IxpId) -> Self {
        Self {
            id,
            name: ixp_name(id),
            network: ixp_name(id),
            route_server: format!("{}_rs", ixp_name(id)),
            members: BTreeSet::new(),
        }
    }
}

/// A directional eBGP peering record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Peering {
    pub local: Asn,
    pub remote: Asn,
    pub ixp: IxpId,
    pub relationship: Relationship,
}

pub fn as_name(asn: Asn) -> String {
    format!("as{}", asn)
}

pub fn ixp_name(id: IxpId) -> String {
    format!("ix{}", id)
}
