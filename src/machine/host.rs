//! End hosts.

use serde::Serialize;
use std::net::Ipv4Addr;

use super::{Interface, Machine};
use crate::synth::{templates, SynthesisError};
use crate::topology::TopologyView;

/// A host with a single interface
#[derive(Debug, Clone, Serialize)]
pub struct Host {
    name: String,
    interface: Interface,
}

impl Host {
    pub fn new(name: &str, network: &str, address: Ipv4Addr) -> Self {
        Self {
            name: name.to_string(),
            interface: Interface::new(network, address),
        }
    }

    pub fn network(&self) -> &str {
        &self.interface.network
    }

    pub fn address(&self) -> Ipv4Addr {
        self.interface.address
    }

    /// Render the boot script that points the default route at the network's
    /// default router.
    pub fn create_start_script(&self, view: &dyn TopologyView) -> Result<String, SynthesisError> {
        let network = view
            .network(self.network())
            .ok_or_else(|| SynthesisError::UnknownNetwork {
                machine: self.name.clone(),
                network: self.network().to_string(),
            })?;

        Ok(templates::host_start_script(network.default_router()))
    }
}

impl Machine for Host {
    fn name(&self) -> &str {
        &self.name
    }

    fn interfaces(&self) -> Vec<&Interface> {
        vec![&self.interface]
    }
}
