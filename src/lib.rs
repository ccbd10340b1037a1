//! # Emunet - Emulated Internet topology and routing configuration generator
//!
//! This library builds a container-ready model of a slice of the real
//! Internet and renders the BIRD routing configuration for every router in
//! it.
//!
//! ## Overview
//!
//! Starting from a seed autonomous system, emunet asks a BGP data source
//! which prefixes the AS announces, which exchanges it peers at and who its
//! neighbours are, then expands recursively over exchange members up to a
//! configurable depth. Every AS becomes a backbone network, an interior
//! router, one network per announced prefix and one BGP router per exchange.
//! Every exchange becomes a peering LAN with a route server.
//!
//! ## Key Features
//!
//! - **Real-world data**: RIPEstat and PeeringDB over HTTP, or a YAML fixture
//! - **Deterministic addressing**: per-role address ranges on every network
//! - **BIRD 2 output**: OSPF, iBGP full mesh, eBGP and route server sessions
//! - **Fail-fast builds**: artifacts are only written when everything succeeded
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - `config`: Type-safe configuration structures and YAML parsing
//! - `config_loader`: Configuration file loading and CLI overrides
//! - `ip`: Address ranges, per-network allocators and the backbone pool
//! - `machine`: Hosts, routers, BGP routers and route servers
//! - `topology`: Registry, topology types and the recursive generator
//! - `provider`: BGP data providers
//! - `synth`: BIRD configuration and host script synthesis
//! - `orchestrator`: High-level orchestration of a complete build
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use emunet::{config_loader, orchestrator};
//! use std::path::Path;
//!
//! // Load configuration from YAML file
//! let config = config_loader::load_config(Path::new("emunet.yaml"))?;
//!
//! // Generate the topology and write its artifacts
//! orchestrator::run(&config)?;
//!
//! // The output directory now contains:
//! // - <router>/bird.conf: BIRD configuration of every router
//! // - <host>/start.sh: boot script of every host
//! // - topology.json: machines, ASes, exchanges and peerings
//! # Ok::<(), color_eyre::Report>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! general:
//!   seed_asn: 3320
//!   depth: 1
//!   output: emunet_output
//!   log_level: info
//!
//! generator:
//!   max_members_per_ixp: 20
//!   hosts_per_network: 1
//!
//! synthesis:
//!   peer_policy: lenient   # or strict
//!
//! provider:
//!   timeout: 30s           # or path: fixture.yaml
//! ```
//!
//! ## Error Handling
//!
//! Library modules return `thiserror` enums (`AddressError`,
//! `TopologyError`, `ProviderError`, `SynthesisError`, `GenerateError`,
//! `ValidationError`). The loader and orchestrator wrap them into
//! `color_eyre` reports with context.

pub mod config;
pub mod config_loader;
pub mod ip;
pub mod machine;
pub mod orchestrator;
pub mod provider;
pub mod synth;
pub mod topology;

// Re-export commonly used types for convenience
pub use config::Config;
pub use orchestrator::run;
pub use topology::{Generator, TopologyRegistry};
