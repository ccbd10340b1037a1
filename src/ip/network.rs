//! Per-network address allocation.
//!
//! A `Network` owns a prefix and three allocation cursors, one per
//! [`AllocationRole`]. Cursors only ever move in one direction and the
//! allocator refuses to cross a range bound, so every address handed out by a
//! network is unique within it.

use ipnet::Ipv4Net;
use serde::Serialize;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use super::ranges::{AddressRanges, AllocationRole};
use super::AddressError;

/// An emulated L2 network with its address plan
#[derive(Debug, Clone, Serialize)]
pub struct Network {
    name: String,
    prefix: Ipv4Net,
    ranges: AddressRanges,
    next_host: u32,
    next_router: u32,
    next_bgp: u32,
    /// Set once the BGP cursor has moved below its floor
    bgp_exhausted: bool,
    default_router: Ipv4Addr,
    #[serde(skip)]
    assigned: BTreeSet<Ipv4Addr>,
}

impl Network {
    /// Create a network for `prefix`. The prefix is truncated to its network
    /// address, and the ranges must fit inside it.
    pub fn new(name: &str, prefix: Ipv4Net, ranges: AddressRanges) -> Result<Self, AddressError> {
        let prefix = prefix.trunc();
        ranges.validate(prefix_size(&prefix)).map_err(|e| match e {
            AddressError::InvalidRanges(msg) => {
                AddressError::InvalidRanges(format!("network {} ({}): {}", name, prefix, msg))
            }
            other => other,
        })?;

        let default_router = offset_address(&prefix, ranges.bgp.end);
        Ok(Self {
            name: name.to_string(),
            prefix,
            ranges,
            next_host: ranges.host.start,
            next_router: ranges.router.start,
            next_bgp: ranges.bgp.end,
            bgp_exhausted: false,
            default_router,
            assigned: BTreeSet::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> Ipv4Net {
        self.prefix
    }

    pub fn netmask(&self) -> Ipv4Addr {
        self.prefix.netmask()
    }

    pub fn ranges(&self) -> &AddressRanges {
        &self.ranges
    }

    /// Conventional gateway of the network: the top of the BGP range.
    pub fn default_router(&self) -> Ipv4Addr {
        self.default_router
    }

    /// All addresses handed out so far, in address order
    pub fn assigned(&self) -> impl Iterator<Item = &Ipv4Addr> {
        self.assigned.iter()
    }

    pub fn is_assigned(&self, addr: Ipv4Addr) -> bool {
        self.assigned.contains(&addr)
    }

    /// Allocate the next address for `role`.
    ///
    /// Host and router cursors ascend, the BGP cursor descends. Crossing the
    /// configured bound fails with [`AddressError::Exhausted`]; the cursor is
    /// left untouched on failure. The BGP cursor steps over addresses that
    /// were claimed through [`Network::assign`].
    pub fn allocate(&mut self, role: AllocationRole) -> Result<Ipv4Addr, AddressError> {
        let range = self.ranges.range(role);
        let offset = match role {
            AllocationRole::Host if self.next_host <= range.end => self.next_host,
            AllocationRole::Router if self.next_router <= range.end => self.next_router,
            AllocationRole::Bgp if !self.bgp_exhausted => {
                match (range.start..=self.next_bgp)
                    .rev()
                    .find(|&o| !self.assigned.contains(&offset_address(&self.prefix, o)))
                {
                    Some(offset) => offset,
                    None => {
                        self.bgp_exhausted = true;
                        return Err(self.exhausted(role));
                    }
                }
            }
            _ => return Err(self.exhausted(role)),
        };

        let addr = offset_address(&self.prefix, offset);
        if self.assigned.contains(&addr) {
            return Err(AddressError::Collision {
                network: self.name.clone(),
                address: addr,
            });
        }

        match role {
            AllocationRole::Host => self.next_host += 1,
            AllocationRole::Router => self.next_router += 1,
            AllocationRole::Bgp => {
                if offset == range.start {
                    self.bgp_exhausted = true;
                } else {
                    self.next_bgp = offset - 1;
                }
            }
        }
        self.assigned.insert(addr);

        log::trace!("{}: allocated {} address {}", self.name, role, addr);
        Ok(addr)
    }

    fn exhausted(&self, role: AllocationRole) -> AddressError {
        AddressError::Exhausted {
            network: self.name.clone(),
            role,
            range: self.ranges.range(role),
        }
    }

    /// Deterministic address of `asn` on this network: the ASN modulo 256
    /// used as host offset. Does not touch any cursor and does not claim the
    /// address; use [`Network::assign`] for that.
    pub fn allocate_by_asn(&self, asn: u32) -> Result<Ipv4Addr, AddressError> {
        let offset = asn % 256;
        if offset == 0 || u64::from(offset) + 1 >= prefix_size(&self.prefix) {
            return Err(AddressError::ReservedOffset {
                network: self.name.clone(),
                asn,
                offset,
            });
        }
        Ok(offset_address(&self.prefix, offset))
    }

    /// Claim an address chosen outside the allocator.
    pub fn assign(&mut self, addr: Ipv4Addr) -> Result<(), AddressError> {
        if !self.prefix.contains(&addr)
            || addr == self.prefix.network()
            || addr == self.prefix.broadcast()
        {
            return Err(AddressError::OutsidePrefix {
                network: self.name.clone(),
                prefix: self.prefix,
                address: addr,
            });
        }
        if !self.assigned.insert(addr) {
            return Err(AddressError::Collision {
                network: self.name.clone(),
                address: addr,
            });
        }
        Ok(())
    }
}

/// Number of addresses in `prefix`
pub(crate) fn prefix_size(prefix: &Ipv4Net) -> u64 {
    1u64 << (32 - u32::from(prefix.prefix_len()))
}

/// Address at host offset `offset` inside `prefix`
pub(crate) fn offset_address(prefix: &Ipv4Net, offset: u32) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(prefix.network()).wrapping_add(offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ip::ranges::AddressRange;
    use std::collections::HashSet;

    fn net(prefix: &str) -> Network {
        Network::new("net0", prefix.parse().unwrap(), AddressRanges::default()).unwrap()
    }

    #[test]
    fn test_host_range_exhaustion() {
        let mut network = net("10.0.0.0/24");
        for i in 0..29 {
            let addr = network.allocate(AllocationRole::Host).unwrap();
            assert_eq!(addr, Ipv4Addr::new(10, 0, 0, 71 + i));
        }
        let err = network.allocate(AllocationRole::Host).unwrap_err();
        assert!(matches!(err, AddressError::Exhausted { role: AllocationRole::Host, .. }));
        // stays exhausted
        assert!(network.allocate(AllocationRole::Host).is_err());
    }

    #[test]
    fn test_bgp_descends_and_exhausts() {
        let ranges = AddressRanges {
            bgp: AddressRange::new(250, 254),
            ..AddressRanges::default()
        };
        let mut network = Network::new("ix", "10.1.0.0/24".parse().unwrap(), ranges).unwrap();
        assert_eq!(network.default_router(), Ipv4Addr::new(10, 1, 0, 254));

        let got: Vec<_> = (0..5)
            .map(|_| network.allocate(AllocationRole::Bgp).unwrap())
            .collect();
        assert_eq!(got[0], Ipv4Addr::new(10, 1, 0, 254));
        assert_eq!(got[4], Ipv4Addr::new(10, 1, 0, 250));
        assert!(matches!(
            network.allocate(AllocationRole::Bgp),
            Err(AddressError::Exhausted { role: AllocationRole::Bgp, .. })
        ));
    }

    #[test]
    fn test_bgp_skips_claimed_addresses() {
        let ranges = AddressRanges {
            bgp: AddressRange::new(250, 254),
            ..AddressRanges::default()
        };
        let mut network = Network::new("ix", "10.1.0.0/24".parse().unwrap(), ranges).unwrap();
        for last in [253, 252, 250] {
            network.assign(Ipv4Addr::new(10, 1, 0, last)).unwrap();
        }

        assert_eq!(network.allocate(AllocationRole::Bgp).unwrap(), Ipv4Addr::new(10, 1, 0, 254));
        assert_eq!(network.allocate(AllocationRole::Bgp).unwrap(), Ipv4Addr::new(10, 1, 0, 251));
        // only claimed addresses remain below the cursor
        assert!(matches!(
            network.allocate(AllocationRole::Bgp),
            Err(AddressError::Exhausted { role: AllocationRole::Bgp, .. })
        ));
        assert_eq!(network.assigned().count(), 5);
    }

    #[test]
    fn test_roles_are_disjoint() {
        let mut network = net("192.0.2.0/24");
        let mut seen = HashSet::new();
        let ranges = *network.ranges();

        for role in [AllocationRole::Host, AllocationRole::Router, AllocationRole::Bgp] {
            while let Ok(addr) = network.allocate(role) {
                let offset = u32::from(addr) - u32::from(network.prefix().network());
                assert!(ranges.range(role).contains(offset), "{} outside {} range", addr, role);
                assert!(seen.insert(addr), "duplicate address {}", addr);
            }
        }
        assert_eq!(seen.len() as u32, 29 + 100 + 55);
        assert_eq!(network.assigned().count(), seen.len());
    }

    #[test]
    fn test_allocate_by_asn() {
        let network = net("80.81.192.0/24");
        assert_eq!(network.allocate_by_asn(3356).unwrap(), Ipv4Addr::new(80, 81, 192, 28));
        assert_eq!(network.allocate_by_asn(100).unwrap(), Ipv4Addr::new(80, 81, 192, 100));
        // no cursor moved
        assert_eq!(network.assigned().count(), 0);
        assert!(matches!(
            network.allocate_by_asn(512),
            Err(AddressError::ReservedOffset { offset: 0, .. })
        ));
        assert!(network.allocate_by_asn(255).is_err());
    }

    #[test]
    fn test_assign_detects_collision() {
        let mut network = net("10.0.0.0/24");
        network.assign(Ipv4Addr::new(10, 0, 0, 254)).unwrap();
        assert!(matches!(
            network.assign(Ipv4Addr::new(10, 0, 0, 254)),
            Err(AddressError::Collision { .. })
        ));
        // the BGP cursor steps over the claimed address
        assert_eq!(network.allocate(AllocationRole::Bgp).unwrap(), Ipv4Addr::new(10, 0, 0, 253));
        assert!(matches!(
            network.assign(Ipv4Addr::new(10, 0, 1, 1)),
            Err(AddressError::OutsidePrefix { .. })
        ));
        assert!(network.assign(Ipv4Addr::new(10, 0, 0, 0)).is_err());
    }

    #[test]
    fn test_prefix_is_truncated_and_validated() {
        let network = net("10.2.3.77/24");
        assert_eq!(network.prefix().to_string(), "10.2.3.0/24");
        assert_eq!(network.netmask(), Ipv4Addr::new(255, 255, 255, 0));

        let small = Network::new("tiny", "10.0.0.0/25".parse().unwrap(), AddressRanges::default());
        assert!(matches!(small, Err(AddressError::InvalidRanges(_))));
    }
}
