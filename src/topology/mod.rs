//! Network topology module.
//!
//! This module contains the registry owning every entity of an emulated
//! Internet, the types describing ASes, exchanges and peerings, and the
//! recursive generator that discovers a topology from real-world BGP data.

pub mod generator;
pub mod registry;
pub mod types;

use crate::ip::AddressError;

// Re-export key types and functions for easier access
pub use generator::{GenerateError, Generator, GeneratorOptions};
pub use registry::{TopologyRegistry, TopologyView};
pub use types::{Asn, AutonomousSystem, InternetExchange, IxpId, Peering, Relationship};

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Unknown router: {0}")]
    UnknownRouter(String),

    #[error("Unknown autonomous system: AS{0}")]
    UnknownAs(Asn),

    #[error("Unknown exchange: IX{0}")]
    UnknownIxp(IxpId),

    #[error("AS{asn} has no BGP router on IX{ixp}")]
    NotOnExchange { asn: Asn, ixp: IxpId },

    #[error(transparent)]
    Address(#[from] AddressError),
}
