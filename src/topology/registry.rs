//! Topology registry.
//!
//! The registry is the single owner of every network, AS, exchange, router and
//! host of a generated topology. Everything else refers to its entries by
//! name and resolves them through [`TopologyView`].

use ipnet::Ipv4Net;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use super::types::{AutonomousSystem, InternetExchange, Peering, Relationship};
use super::{Asn, IxpId, TopologyError};
use crate::ip::network::prefix_size;
use crate::ip::{AddressRanges, AllocationRole, Network, PrefixPool};
use crate::machine::{BgpRouter, Host, Interface, Machine, RouteServer, RouterNode};

/// Read-only lookups needed while synthesizing configuration
pub trait TopologyView {
    fn network(&self, name: &str) -> Option<&Network>;
    fn router(&self, name: &str) -> Option<&RouterNode>;
    fn autonomous_system(&self, asn: Asn) -> Option<&AutonomousSystem>;
}

/// Owner of all topology entities, keyed by name
#[derive(Debug, Serialize)]
pub struct TopologyRegistry {
    #[serde(skip)]
    ranges: AddressRanges,
    #[serde(skip)]
    pool: PrefixPool,
    networks: BTreeMap<String, Network>,
    systems: BTreeMap<Asn, AutonomousSystem>,
    exchanges: BTreeMap<IxpId, InternetExchange>,
    routers: BTreeMap<String, RouterNode>,
    hosts: BTreeMap<String, Host>,
    peerings: Vec<Peering>,
}

impl TopologyRegistry {
    /// `ranges` applies to every network created through the registry,
    /// backbone networks are carved from `pool`.
    pub fn new(ranges: AddressRanges, pool: PrefixPool) -> Self {
        Self {
            ranges,
            pool,
            networks: BTreeMap::new(),
            systems: BTreeMap::new(),
            exchanges: BTreeMap::new(),
            routers: BTreeMap::new(),
            hosts: BTreeMap::new(),
            peerings: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Networks
    // ------------------------------------------------------------------

    pub fn create_network(
        &mut self,
        name: &str,
        prefix: Ipv4Net,
    ) -> Result<&mut Network, TopologyError> {
        if self.networks.contains_key(name) {
            return Err(TopologyError::DuplicateName {
                kind: "network",
                name: name.to_string(),
            });
        }
        let network = Network::new(name, prefix, self.ranges)?;
        log::debug!("Created network {} ({})", name, network.prefix());
        Ok(self.networks.entry(name.to_string()).or_insert(network))
    }

    /// Whether the address plan fits into `prefix`
    pub fn fits(&self, prefix: &Ipv4Net) -> bool {
        self.ranges.validate(prefix_size(prefix)).is_ok()
    }

    pub fn network_mut(&mut self, name: &str) -> Result<&mut Network, TopologyError> {
        self.networks
            .get_mut(name)
            .ok_or_else(|| TopologyError::UnknownNetwork(name.to_string()))
    }

    /// Allocate an address for `role` on the named network
    pub fn allocate(
        &mut self,
        network: &str,
        role: AllocationRole,
    ) -> Result<Ipv4Addr, TopologyError> {
        Ok(self.network_mut(network)?.allocate(role)?)
    }

    pub fn networks(&self) -> impl Iterator<Item = &Network> {
        self.networks.values()
    }

    // ------------------------------------------------------------------
    // Autonomous systems
    // ------------------------------------------------------------------

    pub fn contains_as(&self, asn: Asn) -> bool {
        self.systems.contains_key(&asn)
    }

    /// The set of ASNs generated so far
    pub fn visited(&self) -> BTreeSet<Asn> {
        self.systems.keys().copied().collect()
    }

    /// Register a new AS together with its backbone network
    pub fn create_as(&mut self, asn: Asn) -> Result<&mut AutonomousSystem, TopologyError> {
        if self.systems.contains_key(&asn) {
            return Err(TopologyError::DuplicateName {
                kind: "autonomous system",
                name: super::types::as_name(asn),
            });
        }

        let system = AutonomousSystem::new(asn);
        let prefix = self.pool.next_prefix()?;
        self.create_network(&system.backbone, prefix)?;

        log::info!("Created AS{} (backbone {})", asn, prefix);
        Ok(self.systems.entry(asn).or_insert(system))
    }

    pub fn autonomous_system_mut(
        &mut self,
        asn: Asn,
    ) -> Result<&mut AutonomousSystem, TopologyError> {
        self.systems.get_mut(&asn).ok_or(TopologyError::UnknownAs(asn))
    }

    pub fn autonomous_systems(&self) -> impl Iterator<Item = &AutonomousSystem> {
        self.systems.values()
    }

    // ------------------------------------------------------------------
    // Exchanges
    // ------------------------------------------------------------------

    pub fn contains_ixp(&self, id: IxpId) -> bool {
        self.exchanges.contains_key(&id)
    }

    pub fn exchange(&self, id: IxpId) -> Option<&InternetExchange> {
        self.exchanges.get(&id)
    }

    pub fn exchanges(&self) -> impl Iterator<Item = &InternetExchange> {
        self.exchanges.values()
    }

    /// Create an exchange: its peering LAN and a route server at the top of
    /// the LAN's BGP range. The route server speaks BGP with the exchange id
    /// as its ASN.
    pub fn create_ixp(
        &mut self,
        id: IxpId,
        prefix: Ipv4Net,
    ) -> Result<&InternetExchange, TopologyError> {
        if self.exchanges.contains_key(&id) {
            return Err(TopologyError::DuplicateName {
                kind: "exchange",
                name: super::types::ixp_name(id),
            });
        }

        let exchange = InternetExchange::new(id);
        self.create_network(&exchange.network, prefix)?;
        let address = self.allocate(&exchange.network, AllocationRole::Bgp)?;
        let route_server = RouteServer::new(
            &exchange.route_server,
            id,
            id,
            Interface::new(&exchange.network, address),
        );
        self.add_router(RouterNode::RouteServer(route_server))?;

        log::info!("Created IX{} on {} (route server {})", id, prefix, address);
        Ok(self.exchanges.entry(id).or_insert(exchange))
    }

    /// Name of the BGP router `asn` runs on exchange `ixp`
    pub fn bgp_router_on(&self, asn: Asn, ixp: IxpId) -> Option<&str> {
        self.systems
            .get(&asn)
            .and_then(|system| system.bgp_routers.get(&ixp))
            .map(String::as_str)
    }

    /// Attach `asn` to exchange `ixp` through a new BGP router.
    ///
    /// The router's internal interface is allocated on the AS backbone. Its
    /// exchange interface claims `address` on the peering LAN, or the next
    /// free BGP address of the LAN if none is given. The router and the
    /// exchange's route server become each other's peers.
    pub fn join_exchange(
        &mut self,
        asn: Asn,
        ixp: IxpId,
        address: Option<Ipv4Addr>,
    ) -> Result<String, TopologyError> {
        let (lan, rs_name) = {
            let exchange = self.exchanges.get(&ixp).ok_or(TopologyError::UnknownIxp(ixp))?;
            (exchange.network.clone(), exchange.route_server.clone())
        };
        let backbone = self
            .systems
            .get(&asn)
            .ok_or(TopologyError::UnknownAs(asn))?
            .backbone
            .clone();
        if let Some(existing) = self.bgp_router_on(asn, ixp) {
            return Err(TopologyError::DuplicateName {
                kind: "router",
                name: existing.to_string(),
            });
        }

        let address = match address {
            Some(addr) => {
                self.network_mut(&lan)?.assign(addr)?;
                addr
            }
            None => self.allocate(&lan, AllocationRole::Bgp)?,
        };
        let internal = self.allocate(&backbone, AllocationRole::Router)?;

        let name = format!("{}_{}", super::types::as_name(asn), super::types::ixp_name(ixp));
        let mut router = BgpRouter::new(
            &name,
            asn,
            ixp,
            Interface::new(&backbone, internal),
            Interface::new(&lan, address),
        );
        router.add_peer(&rs_name);
        self.add_router(RouterNode::Bgp(router))?;

        if let Some(rs) = self.routers.get_mut(&rs_name).and_then(RouterNode::as_route_server_mut) {
            rs.add_peer(&name);
        }
        self.autonomous_system_mut(asn)?.bgp_routers.insert(ixp, name.clone());
        if let Some(exchange) = self.exchanges.get_mut(&ixp) {
            exchange.members.insert(asn);
        }

        log::debug!("AS{} joined IX{} at {} via {}", asn, ixp, address, name);
        Ok(name)
    }

    // ------------------------------------------------------------------
    // Routers and hosts
    // ------------------------------------------------------------------

    pub fn add_router(&mut self, router: RouterNode) -> Result<(), TopologyError> {
        let name = router.name().to_string();
        if self.routers.contains_key(&name) {
            return Err(TopologyError::DuplicateName { kind: "router", name });
        }
        self.routers.insert(name, router);
        Ok(())
    }

    pub fn router_mut(&mut self, name: &str) -> Result<&mut RouterNode, TopologyError> {
        self.routers
            .get_mut(name)
            .ok_or_else(|| TopologyError::UnknownRouter(name.to_string()))
    }

    pub fn routers(&self) -> impl Iterator<Item = &RouterNode> {
        self.routers.values()
    }

    /// Create a host on `network` with the next free host address
    pub fn add_host(&mut self, name: &str, network: &str) -> Result<&Host, TopologyError> {
        if self.hosts.contains_key(name) {
            return Err(TopologyError::DuplicateName {
                kind: "host",
                name: name.to_string(),
            });
        }
        let address = self.allocate(network, AllocationRole::Host)?;
        Ok(self
            .hosts
            .entry(name.to_string())
            .or_insert_with(|| Host::new(name, network, address)))
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    // ------------------------------------------------------------------
    // Peerings
    // ------------------------------------------------------------------

    /// Record an eBGP peering between the BGP routers of `local` and `remote`
    /// on exchange `ixp`. Returns false if this directional peering was
    /// already recorded.
    pub fn add_peering(
        &mut self,
        local: Asn,
        remote: Asn,
        ixp: IxpId,
        relationship: Relationship,
    ) -> Result<bool, TopologyError> {
        let local_router = self
            .bgp_router_on(local, ixp)
            .ok_or(TopologyError::NotOnExchange { asn: local, ixp })?
            .to_string();
        let remote_router = self
            .bgp_router_on(remote, ixp)
            .ok_or(TopologyError::NotOnExchange { asn: remote, ixp })?
            .to_string();

        if self
            .peerings
            .iter()
            .any(|p| p.local == local && p.remote == remote && p.ixp == ixp)
        {
            return Ok(false);
        }

        for (router, peer) in [(&local_router, &remote_router), (&remote_router, &local_router)] {
            if let Some(bgp) = self.router_mut(router)?.as_bgp_mut() {
                bgp.add_peer(peer);
            }
        }
        self.peerings.push(Peering {
            local,
            remote,
            ixp,
            relationship,
        });

        log::info!("Peering AS{} -> AS{} on IX{} ({})", local, remote, ixp, relationship);
        Ok(true)
    }

    pub fn peerings(&self) -> &[Peering] {
        &self.peerings
    }

    /// Peerings recorded from the point of view of `asn`
    pub fn peerings_of(&self, asn: Asn) -> impl Iterator<Item = &Peering> {
        self.peerings.iter().filter(move |p| p.local == asn)
    }
}

impl TopologyView for TopologyRegistry {
    fn network(&self, name: &str) -> Option<&Network> {
        self.networks.get(name)
    }

    fn router(&self, name: &str) -> Option<&RouterNode> {
        self.routers.get(name)
    }

    fn autonomous_system(&self, asn: Asn) -> Option<&AutonomousSystem> {
        self.systems.get(&asn)
    }
}
