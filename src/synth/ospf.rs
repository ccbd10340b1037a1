//! OSPF synthesis for interior routers.

use super::templates;
use crate::machine::{Machine, Router};

impl Router {
    /// Single-area OSPF over every interface, `eth0` first
    pub fn synthesize_ospf_config(&self) -> String {
        let indices: Vec<usize> = (0..self.interfaces().len()).collect();
        templates::ospf(&indices)
    }
}
