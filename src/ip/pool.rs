//! Sequential carving of internal subnets.
//!
//! AS backbone networks have no real-world prefix, so they are cut out of a
//! private supernet one subnet at a time.

use ipnet::Ipv4Net;

use super::AddressError;

/// Hands out consecutive, non-overlapping subnets of a supernet
#[derive(Debug, Clone)]
pub struct PrefixPool {
    supernet: Ipv4Net,
    subnet_len: u8,
    next: u64,
}

impl PrefixPool {
    pub fn new(supernet: Ipv4Net, subnet_len: u8) -> Result<Self, AddressError> {
        if subnet_len < supernet.prefix_len() || subnet_len > 30 {
            return Err(AddressError::InvalidRanges(format!(
                "cannot carve /{} subnets out of {}",
                subnet_len, supernet
            )));
        }
        Ok(Self {
            supernet: supernet.trunc(),
            subnet_len,
            next: 0,
        })
    }

    pub fn supernet(&self) -> Ipv4Net {
        self.supernet
    }

    /// Take the next free subnet
    pub fn next_prefix(&mut self) -> Result<Ipv4Net, AddressError> {
        let capacity = 1u64 << (self.subnet_len - self.supernet.prefix_len());
        if self.next >= capacity {
            return Err(AddressError::PoolExhausted {
                pool: self.supernet,
            });
        }

        let step = 1u64 << (32 - u32::from(self.subnet_len));
        let base = u64::from(u32::from(self.supernet.network())) + self.next * step;
        self.next += 1;

        Ipv4Net::new((base as u32).into(), self.subnet_len)
            .map_err(|e| AddressError::InvalidRanges(e.to_string()))
    }
}
