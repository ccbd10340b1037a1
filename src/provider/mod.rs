//! # Real-World BGP Data Providers
//!
//! The topology generator learns which prefixes an AS announces, who its BGP
//! neighbours are and at which exchanges it peers from a [`DataProvider`].
//!
//! ## Implementations
//!
//! - [`HttpDataProvider`]: queries RIPEstat (prefixes, neighbours) and
//!   PeeringDB (exchanges) over HTTP and memoizes every response for the
//!   lifetime of the provider.
//! - [`FixtureProvider`]: static data loaded from a YAML file, for offline
//!   and reproducible builds.
//!
//! ## Failure Model
//!
//! Any non-success response is a hard error. There is no retry and no
//! partial result: a failed lookup aborts topology generation.

pub mod fixture;
pub mod http;

use ipnet::{IpNet, Ipv4Net};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

use crate::topology::{Asn, IxpId, Relationship};

pub use fixture::{AsFixture, FixtureProvider, IxpFixture};
pub use http::{HttpDataProvider, Transport, UreqTransport};

/// Source of real-world routing data
pub trait DataProvider {
    /// Prefixes announced by `asn`, IPv4 and IPv6
    fn prefixes(&mut self, asn: Asn) -> Result<Vec<IpNet>, ProviderError>;

    /// BGP neighbours of `asn` and their relationship to it
    fn peers(&mut self, asn: Asn) -> Result<BTreeMap<Asn, Relationship>, ProviderError>;

    /// Exchanges `asn` is connected to
    fn internet_exchanges(&mut self, asn: Asn) -> Result<Vec<IxpId>, ProviderError>;

    /// Members of exchange `ixp` and their peering LAN address, if known
    fn internet_exchange_members(
        &mut self,
        ixp: IxpId,
    ) -> Result<BTreeMap<Asn, Option<Ipv4Addr>>, ProviderError>;

    /// IPv4 prefix of the peering LAN of `ixp`
    fn internet_exchange_prefix(&mut self, ixp: IxpId) -> Result<Ipv4Net, ProviderError>;
}

/// Kind of lookup, used as cache key together with the queried resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    AnnouncedPrefixes,
    AsnNeighbours,
    NetworkExchanges,
    ExchangeMembers,
    ExchangePrefix,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verb::AnnouncedPrefixes => "announced-prefixes",
            Verb::AsnNeighbours => "asn-neighbours",
            Verb::NetworkExchanges => "netixlan-by-asn",
            Verb::ExchangeMembers => "netixlan-by-ixlan",
            Verb::ExchangePrefix => "ixpfx",
        };
        write!(f, "{}", name)
    }
}

/// Data provider errors
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} answered with status '{status}'")]
    Status { url: String, status: String },

    #[error("Cannot decode {verb} response for {resource}: {message}")]
    Decode {
        verb: Verb,
        resource: String,
        message: String,
    },

    #[error("No {verb} data for {resource}")]
    MissingData { verb: Verb, resource: String },

    #[error("Failed to read fixture file '{path}': {message}")]
    Fixture { path: String, message: String },
}
