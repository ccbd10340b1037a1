//! Recursive topology generator.
//!
//! Starting from a seed AS, the generator asks a [`DataProvider`] for the
//! AS's prefixes, neighbours and exchanges, materializes them in the
//! [`TopologyRegistry`], then walks every member of every joined exchange
//! with one hop less of depth budget.

use ipnet::{IpNet, Ipv4Net};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use super::registry::{TopologyRegistry, TopologyView};
use super::types::as_name;
use super::{Asn, IxpId, Relationship, TopologyError};
use crate::ip::{AddressError, AllocationRole};
use crate::machine::{Router, RouterNode};
use crate::provider::{DataProvider, ProviderError};

/// Knobs bounding the size of a generated topology
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratorOptions {
    pub max_prefixes_per_as: Option<usize>,
    pub max_ixps_per_as: Option<usize>,
    pub max_members_per_ixp: Option<usize>,
    /// Hosts created on every prefix network
    pub hosts_per_network: usize,
}

/// Topology generation errors
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("Data provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Address error: {0}")]
    Address(#[from] AddressError),
}

/// Depth-bounded walk over the AS graph
pub struct Generator<'a> {
    registry: &'a mut TopologyRegistry,
    provider: &'a mut dyn DataProvider,
    options: GeneratorOptions,
}

impl<'a> Generator<'a> {
    pub fn new(
        registry: &'a mut TopologyRegistry,
        provider: &'a mut dyn DataProvider,
        options: GeneratorOptions,
    ) -> Self {
        Self {
            registry,
            provider,
            options,
        }
    }

    /// Generate the topology around `seed`.
    ///
    /// The seed is hop 0: `max_depth = 0` creates the seed AS alone, and no
    /// AS further than `max_depth` hops away is ever created. Running it
    /// again on the same registry is a no-op.
    pub fn generate(&mut self, seed: Asn, max_depth: u32) -> Result<(), GenerateError> {
        log::info!("Generating topology from AS{} with depth {}", seed, max_depth);
        self.expand(seed, max_depth.saturating_add(1))?;
        log::info!(
            "Topology has {} ASes, {} exchanges, {} peerings",
            self.registry.visited().len(),
            self.registry.exchanges().count(),
            self.registry.peerings().len()
        );
        Ok(())
    }

    fn expand(&mut self, asn: Asn, remaining: u32) -> Result<(), GenerateError> {
        if remaining == 0 {
            return Ok(());
        }
        if self.registry.contains_as(asn) {
            log::debug!("AS{} already generated, skipping", asn);
            return Ok(());
        }

        let prefixes = self.provider.prefixes(asn)?;
        let peers = self.provider.peers(asn)?;
        let mut ixps = self.provider.internet_exchanges(asn)?;
        if let Some(max) = self.options.max_ixps_per_as {
            ixps.truncate(max);
        }

        // registered before fanning out, so cycles through this AS stop here
        self.registry.create_as(asn)?;
        self.build_interior(asn, &prefixes)?;

        let mut joined = Vec::new();
        for ixp in ixps {
            if !self.registry.contains_ixp(ixp) {
                let prefix = self.provider.internet_exchange_prefix(ixp)?;
                if !self.registry.fits(&prefix) {
                    log::debug!(
                        "AS{}: skipping IX{}, peering LAN {} is too small",
                        asn,
                        ixp,
                        prefix
                    );
                    continue;
                }
                self.registry.create_ixp(ixp, prefix)?;
            }
            let members = self.provider.internet_exchange_members(ixp)?;
            let address = self.exchange_address(asn, ixp, &members)?;
            self.registry.join_exchange(asn, ixp, address)?;
            joined.push((ixp, members));
        }

        for (ixp, members) in joined {
            self.fan_out(asn, ixp, &members, &peers, remaining)?;
        }
        Ok(())
    }

    /// Backbone router plus one network (and its hosts) per usable prefix
    fn build_interior(&mut self, asn: Asn, prefixes: &[IpNet]) -> Result<(), GenerateError> {
        let name = format!("{}_router0", as_name(asn));
        let backbone = self.registry.autonomous_system_mut(asn)?.backbone.clone();
        let mut router = Router::new(&name);
        router.add_interface(&backbone, self.registry.allocate(&backbone, AllocationRole::Router)?);

        let usable: Vec<Ipv4Net> = prefixes
            .iter()
            .filter_map(|prefix| match prefix {
                IpNet::V4(v4) if self.registry.fits(v4) => Some(*v4),
                other => {
                    log::debug!("AS{}: skipping prefix {}", asn, other);
                    None
                }
            })
            .take(self.options.max_prefixes_per_as.unwrap_or(usize::MAX))
            .collect();

        for (i, prefix) in usable.into_iter().enumerate() {
            let network = format!("{}_net{}", as_name(asn), i);
            self.registry.create_network(&network, prefix)?;
            router.add_interface(&network, self.registry.allocate(&network, AllocationRole::Bgp)?);
            router.add_direct(prefix.trunc());

            for h in 0..self.options.hosts_per_network {
                self.registry.add_host(&format!("{}_host{}", network, h), &network)?;
            }
            self.registry.autonomous_system_mut(asn)?.networks.push(network);
        }

        self.registry.add_router(RouterNode::Router(router))?;
        self.registry.autonomous_system_mut(asn)?.routers.insert(name);
        Ok(())
    }

    /// Address of `asn` on the peering LAN of `ixp`: the one the data source
    /// knows if it is usable, else the ASN-derived one. `None` leaves the
    /// choice to the LAN's BGP allocator.
    fn exchange_address(
        &self,
        asn: Asn,
        ixp: IxpId,
        members: &BTreeMap<Asn, Option<Ipv4Addr>>,
    ) -> Result<Option<Ipv4Addr>, GenerateError> {
        let lan = &self
            .registry
            .exchange(ixp)
            .ok_or(TopologyError::UnknownIxp(ixp))?
            .network;
        let network = self
            .registry
            .network(lan)
            .ok_or_else(|| TopologyError::UnknownNetwork(lan.clone()))?;
        let prefix = network.prefix();
        let usable = |addr: &Ipv4Addr| {
            prefix.contains(addr)
                && *addr != prefix.network()
                && *addr != prefix.broadcast()
                && !network.is_assigned(*addr)
        };

        if let Some(addr) = members.get(&asn).copied().flatten().filter(|a| usable(a)) {
            return Ok(Some(addr));
        }
        match network.allocate_by_asn(asn).ok().filter(|a| usable(a)) {
            Some(addr) => {
                log::debug!("AS{} on IX{}: using ASN-derived address {}", asn, ixp, addr);
                Ok(Some(addr))
            }
            None => {
                log::debug!("AS{} on IX{}: no usable address, allocating", asn, ixp);
                Ok(None)
            }
        }
    }

    fn fan_out(
        &mut self,
        asn: Asn,
        ixp: IxpId,
        members: &BTreeMap<Asn, Option<Ipv4Addr>>,
        peers: &BTreeMap<Asn, Relationship>,
        remaining: u32,
    ) -> Result<(), GenerateError> {
        let limit = self.options.max_members_per_ixp.unwrap_or(usize::MAX);
        for &member in members.keys().filter(|&&m| m != asn).take(limit) {
            self.expand(member, remaining - 1)?;

            if let Some(&relationship) = peers.get(&member) {
                if self.registry.bgp_router_on(member, ixp).is_some() {
                    self.registry.add_peering(asn, member, ixp, relationship)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ip::{AddressRanges, PrefixPool};
    use crate::machine::Machine;
    use crate::provider::{AsFixture, FixtureProvider};
    use std::collections::BTreeSet;

    fn registry() -> TopologyRegistry {
        TopologyRegistry::new(
            AddressRanges::default(),
            PrefixPool::new("10.0.0.0/8".parse().unwrap(), 24).unwrap(),
        )
    }

    /// 100 peers with 200 and sells transit to 300 on IX1; 200 also sits on
    /// IX2 together with 400.
    fn provider() -> FixtureProvider {
        let system =
            |prefixes: &[&str], peers: &[(Asn, Relationship)], exchanges: &[IxpId]| AsFixture {
                prefixes: prefixes.iter().map(|p| p.parse().unwrap()).collect(),
                peers: peers.iter().copied().collect(),
                exchanges: exchanges.to_vec(),
            };
        FixtureProvider::default()
            .with_system(
                100,
                system(
                    &["192.0.2.0/24", "2001:db8::/32", "198.51.100.0/25"],
                    &[(200, Relationship::Peer), (300, Relationship::Customer)],
                    &[1],
                ),
            )
            .with_system(200, system(&["203.0.113.0/24"], &[(100, Relationship::Peer)], &[1, 2]))
            .with_system(300, system(&[], &[(100, Relationship::Provider)], &[1]))
            .with_system(400, system(&[], &[], &[2]))
            .with_exchange(1, "80.81.192.0/24".parse().unwrap())
            .with_exchange(2, "80.81.193.0/24".parse().unwrap())
    }

    fn generate(depth: u32, options: GeneratorOptions) -> TopologyRegistry {
        let mut reg = registry();
        let mut data = provider();
        Generator::new(&mut reg, &mut data, options).generate(100, depth).unwrap();
        reg
    }

    fn asns(list: &[Asn]) -> BTreeSet<Asn> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_depth_one_scenario() {
        let reg = generate(1, GeneratorOptions::default());
        assert_eq!(reg.visited(), asns(&[100, 200, 300]));

        let peerings: Vec<_> = reg.peerings_of(100).collect();
        assert_eq!(peerings.len(), 2);
        assert!(peerings
            .iter()
            .any(|p| p.remote == 200 && p.ixp == 1 && p.relationship == Relationship::Peer));
        assert!(peerings
            .iter()
            .any(|p| p.remote == 300 && p.ixp == 1 && p.relationship == Relationship::Customer));

        // 200 reaches IX2 but its members are beyond the depth budget
        assert!(reg.contains_ixp(2));
        assert!(!reg.contains_as(400));
    }

    #[test]
    fn test_depth_zero_creates_only_seed() {
        let reg = generate(0, GeneratorOptions::default());
        assert_eq!(reg.visited(), asns(&[100]));
        assert!(reg.peerings().is_empty());
        assert_eq!(reg.exchange(1).unwrap().members, asns(&[100]));
    }

    #[test]
    fn test_depth_two_reaches_second_hop() {
        let reg = generate(2, GeneratorOptions::default());
        assert_eq!(reg.visited(), asns(&[100, 200, 300, 400]));
        // 200 and 100 both record their side of the session
        assert!(reg.peerings_of(200).any(|p| p.remote == 100));
    }

    #[test]
    fn test_generation_is_idempotent() {
        let mut reg = registry();
        let mut data = provider();
        let mut generator = Generator::new(&mut reg, &mut data, GeneratorOptions::default());
        generator.generate(100, 1).unwrap();
        generator.generate(100, 1).unwrap();
        generator.generate(200, 0).unwrap();

        assert_eq!(reg.visited().len(), 3);
        // 100 -> 200, 100 -> 300 and the reverse sessions seen from 200 and 300
        assert_eq!(reg.peerings().len(), 4);
    }

    #[test]
    fn test_as_layout() {
        let options = GeneratorOptions {
            hosts_per_network: 2,
            ..Default::default()
        };
        let reg = generate(0, options);

        let system = reg.autonomous_system(100).unwrap();
        // IPv6 and /25 prefixes are skipped
        assert_eq!(system.networks, vec!["as100_net0".to_string()]);

        let router0 = reg.router("as100_router0").unwrap();
        let ifaces = router0.interfaces();
        assert_eq!(ifaces[0].network, "as100_backbone");
        assert_eq!(ifaces[0].address, Ipv4Addr::new(10, 0, 0, 100));
        assert_eq!(ifaces[1].address, Ipv4Addr::new(192, 0, 2, 254));

        let bgp = reg.router("as100_ix1").and_then(RouterNode::as_bgp).unwrap();
        assert_eq!(bgp.internal().address, Ipv4Addr::new(10, 0, 0, 101));
        assert_eq!(bgp.exchange().address, Ipv4Addr::new(80, 81, 192, 100));

        let hosts: Vec<_> = reg.hosts().map(|h| h.address()).collect();
        assert_eq!(hosts, vec![Ipv4Addr::new(192, 0, 2, 71), Ipv4Addr::new(192, 0, 2, 72)]);
    }

    #[test]
    fn test_member_cap() {
        let options = GeneratorOptions {
            max_members_per_ixp: Some(1),
            ..Default::default()
        };
        let reg = generate(1, options);
        assert_eq!(reg.visited(), asns(&[100, 200]));
        assert_eq!(reg.peerings().len(), 2);
    }

    fn exchange_address(reg: &TopologyRegistry, asn: Asn, ixp: IxpId) -> Ipv4Addr {
        reg.bgp_router_on(asn, ixp)
            .and_then(|name| reg.router(name))
            .and_then(RouterNode::as_bgp)
            .map(|router| router.exchange().address)
            .unwrap()
    }

    fn member(exchanges: &[IxpId]) -> AsFixture {
        AsFixture {
            exchanges: exchanges.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn test_fallback_steps_over_asn_derived_address() {
        // 509 % 256 lands on the address 253 already holds
        let mut data = FixtureProvider::default()
            .with_system(253, member(&[1]))
            .with_system(509, member(&[1]))
            .with_exchange(1, "80.81.192.0/24".parse().unwrap());
        let mut reg = registry();
        Generator::new(&mut reg, &mut data, GeneratorOptions::default())
            .generate(253, 1)
            .unwrap();

        assert_eq!(exchange_address(&reg, 253, 1), Ipv4Addr::new(80, 81, 192, 253));
        assert_eq!(exchange_address(&reg, 509, 1), Ipv4Addr::new(80, 81, 192, 252));
    }

    #[test]
    fn test_fallback_steps_over_provider_address() {
        let mut data = FixtureProvider::default()
            .with_system(100, member(&[1]))
            .with_system(512, member(&[1]))
            .with_exchange(1, "80.81.192.0/24".parse().unwrap());
        data.exchanges
            .get_mut(&1)
            .unwrap()
            .members
            .insert(100, Some(Ipv4Addr::new(80, 81, 192, 253)));
        let mut reg = registry();
        Generator::new(&mut reg, &mut data, GeneratorOptions::default())
            .generate(100, 1)
            .unwrap();

        assert_eq!(exchange_address(&reg, 100, 1), Ipv4Addr::new(80, 81, 192, 253));
        // 512 % 256 is the network address
        assert_eq!(exchange_address(&reg, 512, 1), Ipv4Addr::new(80, 81, 192, 252));
    }

    #[test]
    fn test_small_exchange_is_skipped() {
        let mut data = FixtureProvider::default()
            .with_system(100, member(&[1, 2]))
            .with_exchange(1, "185.1.0.0/26".parse().unwrap())
            .with_exchange(2, "80.81.193.0/24".parse().unwrap());
        let mut reg = registry();
        Generator::new(&mut reg, &mut data, GeneratorOptions::default())
            .generate(100, 0)
            .unwrap();

        assert!(!reg.contains_ixp(1));
        assert!(reg.contains_ixp(2));
        assert!(reg.bgp_router_on(100, 1).is_none());
        assert_eq!(exchange_address(&reg, 100, 2), Ipv4Addr::new(80, 81, 193, 100));
    }

    #[test]
    fn test_provider_failure_aborts() {
        let mut reg = registry();
        // IX1 is listed but its prefix is unknown
        let mut data = FixtureProvider::default().with_system(
            100,
            AsFixture {
                exchanges: vec![1],
                ..Default::default()
            },
        );
        let result =
            Generator::new(&mut reg, &mut data, GeneratorOptions::default()).generate(100, 1);
        assert!(matches!(result, Err(GenerateError::Provider(_))));
    }
}
