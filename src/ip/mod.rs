//! IP address allocation and management module.
//!
//! This module owns the address plan of every emulated network: the
//! per-role allocation ranges, the allocator bound to each network, and the
//! pool internal backbone subnets are carved from.

pub mod network;
pub mod pool;
pub mod ranges;

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

// Re-export commonly used types
pub use network::Network;
pub use pool::PrefixPool;
pub use ranges::{AddressRange, AddressRanges, AllocationRole};

/// Address allocation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("Address range exhausted on network {network}: no {role} address left in {range}")]
    Exhausted {
        network: String,
        role: AllocationRole,
        range: AddressRange,
    },

    #[error("Address {address} is already in use on network {network}")]
    Collision { network: String, address: Ipv4Addr },

    #[error("Address {address} is not a usable address of network {network} ({prefix})")]
    OutsidePrefix {
        network: String,
        prefix: Ipv4Net,
        address: Ipv4Addr,
    },

    #[error("AS{asn} maps to reserved offset {offset} on network {network}")]
    ReservedOffset { network: String, asn: u32, offset: u32 },

    #[error("Invalid address ranges: {0}")]
    InvalidRanges(String),

    #[error("Prefix pool {pool} is exhausted")]
    PoolExhausted { pool: Ipv4Net },
}
