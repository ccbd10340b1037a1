//! BGP synthesis: eBGP and iBGP sessions of border routers, and the client
//! sessions of route servers.

use std::net::Ipv4Addr;

use super::templates::{self, protocol_name};
use super::{PeerPolicy, SynthesisError};
use crate::machine::{BgpRouter, Machine, RouteServer, RouterNode};
use crate::topology::{Asn, TopologyView};

/// ASN and peering LAN address of a BGP speaker
fn resolve_speaker(view: &dyn TopologyView, name: &str) -> Option<(Asn, Ipv4Addr)> {
    let node = view.router(name)?;
    Some((node.asn()?, node.exchange_address()?))
}

impl BgpRouter {
    /// One eBGP session per peer, other members and the route server alike
    pub fn synthesize_ebgp_config(
        &self,
        view: &dyn TopologyView,
        policy: PeerPolicy,
    ) -> Result<String, SynthesisError> {
        let mut config = String::new();
        for peer in self.peers() {
            match resolve_speaker(view, peer) {
                Some((asn, address)) => config.push_str(&templates::ebgp(
                    &protocol_name("ebgp", peer),
                    self.exchange().address,
                    self.asn,
                    address,
                    asn,
                )),
                None => policy.unresolved(self.name(), peer)?,
            }
        }
        Ok(config)
    }

    /// OSPF on the backbone plus a full iBGP mesh with the other BGP routers
    /// of the AS. Empty when the router is alone in its AS.
    pub fn synthesize_ibgp_config(
        &self,
        view: &dyn TopologyView,
        policy: PeerPolicy,
    ) -> Result<String, SynthesisError> {
        let system = view
            .autonomous_system(self.asn)
            .ok_or(SynthesisError::UnknownAs(self.asn))?;
        let names = system.bgp_router_names();
        if names.len() < 2 {
            return Ok(String::new());
        }

        let mut config = templates::ospf(&[0]);
        for name in names.into_iter().filter(|name| *name != self.name()) {
            match view.router(name).and_then(RouterNode::as_bgp) {
                Some(peer) => config.push_str(&templates::ibgp(
                    &protocol_name("ibgp", name),
                    self.internal().address,
                    peer.internal().address,
                    self.asn,
                )),
                None => policy.unresolved(self.name(), name)?,
            }
        }
        Ok(config)
    }
}

impl RouteServer {
    /// One `rs client` session per exchange member
    pub fn synthesize_multilateral_config(
        &self,
        view: &dyn TopologyView,
        policy: PeerPolicy,
    ) -> Result<String, SynthesisError> {
        let mut config = String::new();
        for peer in self.peers() {
            match resolve_speaker(view, peer) {
                Some((asn, address)) => config.push_str(&templates::route_server(
                    &protocol_name("rs", peer),
                    self.interface().address,
                    self.asn,
                    address,
                    asn,
                )),
                None => policy.unresolved(self.name(), peer)?,
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ip::{AddressRanges, PrefixPool};
    use crate::topology::{Relationship, TopologyRegistry};

    /// AS100 on IX7 and IX8, AS200 on IX7, peering on IX7
    fn topology() -> TopologyRegistry {
        let mut reg = TopologyRegistry::new(
            AddressRanges::default(),
            PrefixPool::new("10.0.0.0/8".parse().unwrap(), 24).unwrap(),
        );
        reg.create_ixp(7, "80.81.192.0/24".parse().unwrap()).unwrap();
        reg.create_ixp(8, "80.81.193.0/24".parse().unwrap()).unwrap();
        reg.create_as(100).unwrap();
        reg.create_as(200).unwrap();
        reg.join_exchange(100, 7, None).unwrap();
        reg.join_exchange(100, 8, None).unwrap();
        reg.join_exchange(200, 7, Some("80.81.192.200".parse().unwrap())).unwrap();
        reg.add_peering(100, 200, 7, Relationship::Peer).unwrap();
        reg
    }

    fn bgp<'a>(reg: &'a TopologyRegistry, name: &str) -> &'a BgpRouter {
        reg.router(name).and_then(RouterNode::as_bgp).unwrap()
    }

    #[test]
    fn test_ebgp_sessions() {
        let reg = topology();
        let config = bgp(&reg, "as100_ix7")
            .synthesize_ebgp_config(&reg, PeerPolicy::Strict)
            .unwrap();

        assert_eq!(config.matches("protocol bgp ").count(), 2);
        assert!(config.contains("protocol bgp ebgp_as200_ix7 {"));
        assert!(config.contains("protocol bgp ebgp_ix7_rs {"));
        assert!(config.contains("neighbor 80.81.192.200 as 200;"));
        // route server speaks with the exchange id as ASN
        assert!(config.contains("neighbor 80.81.192.254 as 7;"));
        assert!(config.contains("local 80.81.192.253 as 100;"));
    }

    #[test]
    fn test_ibgp_full_mesh() {
        let mut reg = topology();
        reg.create_ixp(9, "80.81.194.0/24".parse().unwrap()).unwrap();
        reg.join_exchange(100, 9, None).unwrap();

        let names = ["as100_ix7", "as100_ix8", "as100_ix9"];
        for name in names {
            let router = bgp(&reg, name);
            let config = router.synthesize_ibgp_config(&reg, PeerPolicy::Strict).unwrap();
            assert_eq!(config.matches("protocol bgp ibgp_").count(), 2, "{}", name);
            assert!(!config.contains(&format!("ibgp_{} ", name)));
            assert!(!config.contains(&format!("neighbor {} ", router.internal().address)));
            assert!(config.contains("next hop self;"));
            assert!(config.contains("interface \"eth0\" {};"));
            assert!(!config.contains("eth1"));
        }
    }

    #[test]
    fn test_ibgp_single_router_is_empty() {
        let reg = topology();
        let config = bgp(&reg, "as200_ix7")
            .synthesize_ibgp_config(&reg, PeerPolicy::Strict)
            .unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn test_route_server_clients() {
        let reg = topology();
        let rs = match reg.router("ix7_rs").unwrap() {
            RouterNode::RouteServer(rs) => rs,
            other => panic!("unexpected router kind {}", other.kind()),
        };
        let config = rs.synthesize_multilateral_config(&reg, PeerPolicy::Strict).unwrap();

        assert_eq!(config.matches("rs client;").count(), 2);
        assert!(config.contains("local 80.81.192.254 as 7;"));
        assert!(config.contains("neighbor 80.81.192.200 as 200;"));
    }

    #[test]
    fn test_unresolved_peer_policy() {
        let mut reg = topology();
        reg.router_mut("as100_ix7")
            .unwrap()
            .as_bgp_mut()
            .unwrap()
            .add_peer("as999_ix7");
        let router = bgp(&reg, "as100_ix7");

        let lenient = router.synthesize_ebgp_config(&reg, PeerPolicy::Lenient).unwrap();
        assert_eq!(lenient.matches("protocol bgp ").count(), 2);

        let strict = router.synthesize_ebgp_config(&reg, PeerPolicy::Strict);
        assert!(matches!(
            strict,
            Err(SynthesisError::UnresolvedPeer { ref peer, .. }) if peer == "as999_ix7"
        ));
    }

    #[test]
    fn test_ibgp_unknown_as() {
        let reg = topology();
        let stray = BgpRouter::new(
            "as300_ix7",
            300,
            7,
            crate::machine::Interface::new("as300_backbone", "10.0.9.100".parse().unwrap()),
            crate::machine::Interface::new("ix7", "80.81.192.44".parse().unwrap()),
        );
        assert!(matches!(
            stray.synthesize_ibgp_config(&reg, PeerPolicy::Lenient),
            Err(SynthesisError::UnknownAs(300))
        ));
    }
}
