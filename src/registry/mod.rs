//! # Verification Inventory Module
//!
//! This module builds the inventory document handed to the external
//! connectivity test. The test does not read the plan; it only needs to know
//! which addresses to ping from where, and which pairs are expected to fail.
//!
//! ## Inventory Contents
//!
//! For every spoke the inventory records:
//!
//! - The spoke's address block and workload subnet
//! - The private addresses of its test instances
//! - The peers it should be able to reach through the hub
//!
//! Spokes missing from a peer list are expected to be unreachable; in
//! isolated mode this is how the test checks that partitions hold.
//!
//! ## Example
//!
//! ```json
//! {
//!   "spokes": {
//!     "dev": {
//!       "cidr_block": "10.201.0.0/16",
//!       "workload_subnet_cidr": "10.201.10.0/24",
//!       "instance_addresses": ["10.201.10.4"],
//!       "reachable_peers": ["lab"]
//!     },
//!     "lab": { ... }
//!   }
//! }
//! ```

use ipnet::Ipv4Net;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use crate::ip::registry::InstanceAddressRegistry;
use crate::topology::types::TopologyPlan;

/// What the connectivity test needs to know about one spoke
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpokeInventory {
    pub cidr_block: Ipv4Net,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workload_subnet_cidr: Option<Ipv4Net>,
    pub instance_addresses: Vec<Ipv4Addr>,
    pub reachable_peers: Vec<String>,
}

/// Inventory for a whole plan, keyed by spoke name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inventory {
    pub spokes: BTreeMap<String, SpokeInventory>,
}

impl Inventory {
    /// Whether `from` is expected to reach `to`
    pub fn expects_reachable(&self, from: &str, to: &str) -> bool {
        self.spokes
            .get(from)
            .is_some_and(|s| s.reachable_peers.iter().any(|p| p == to))
    }
}

/// Build the inventory from a resolved plan and its instance addresses
pub fn build_inventory(plan: &TopologyPlan, addresses: &InstanceAddressRegistry) -> Inventory {
    let spokes = plan
        .spokes
        .values()
        .map(|spoke| {
            let entry = SpokeInventory {
                cidr_block: spoke.cidr_block,
                workload_subnet_cidr: plan.workload_subnet(&spoke.name).map(|s| s.cidr),
                instance_addresses: addresses.addresses_for(&spoke.name, spoke.instance_count),
                reachable_peers: plan.reachable_peers(&spoke.name),
            };
            (spoke.name.clone(), entry)
        })
        .collect();

    Inventory { spokes }
}
