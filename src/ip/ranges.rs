//! Allocation roles and the per-network address ranges they draw from.
//!
//! Every network splits its host part into three disjoint ranges. Hosts and
//! routers grow upwards from the low end of their range, BGP speakers grow
//! downwards from the top of theirs, so the few edge addresses stay fixed at
//! the top of the prefix regardless of how many hosts a network ends up with.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::AddressError;

/// Role an address is allocated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationRole {
    Host,
    Router,
    Bgp,
}

impl fmt::Display for AllocationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationRole::Host => write!(f, "host"),
            AllocationRole::Router => write!(f, "router"),
            AllocationRole::Bgp => write!(f, "bgp"),
        }
    }
}

/// Inclusive range of host offsets inside a prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRange {
    pub start: u32,
    pub end: u32,
}

impl AddressRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Number of offsets in the range
    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn contains(&self, offset: u32) -> bool {
        offset >= self.start && offset <= self.end
    }

    fn overlaps(&self, other: &AddressRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// The three role ranges of a network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRanges {
    pub host: AddressRange,
    pub router: AddressRange,
    /// Allocated top-down, starting at `bgp.end`
    pub bgp: AddressRange,
}

impl Default for AddressRanges {
    fn default() -> Self {
        Self {
            host: AddressRange::new(71, 99),
            router: AddressRange::new(100, 199),
            bgp: AddressRange::new(200, 254),
        }
    }
}

impl AddressRanges {
    pub fn range(&self, role: AllocationRole) -> AddressRange {
        match role {
            AllocationRole::Host => self.host,
            AllocationRole::Router => self.router,
            AllocationRole::Bgp => self.bgp,
        }
    }

    /// Check that all ranges are well-formed, disjoint, and fit into a prefix
    /// with `size` addresses (network and broadcast offsets excluded).
    pub fn validate(&self, size: u64) -> Result<(), AddressError> {
        let roles = [AllocationRole::Host, AllocationRole::Router, AllocationRole::Bgp];

        for role in roles {
            let range = self.range(role);
            if range.start > range.end {
                return Err(AddressError::InvalidRanges(format!(
                    "{} range {} is empty", role, range
                )));
            }
            if range.start == 0 {
                return Err(AddressError::InvalidRanges(format!(
                    "{} range {} includes the network address", role, range
                )));
            }
            if u64::from(range.end) + 1 >= size {
                return Err(AddressError::InvalidRanges(format!(
                    "{} range {} does not fit into a prefix of {} addresses", role, range, size
                )));
            }
        }

        for (i, a) in roles.iter().enumerate() {
            for b in &roles[i + 1..] {
                if self.range(*a).overlaps(&self.range(*b)) {
                    return Err(AddressError::InvalidRanges(format!(
                        "{} range {} overlaps {} range {}",
                        a, self.range(*a), b, self.range(*b)
                    )));
                }
            }
        }

        Ok(())
    }
}
