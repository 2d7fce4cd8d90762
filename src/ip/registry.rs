//! Instance address registry.
//!
//! Hands out deterministic private addresses for test instances inside each
//! spoke's workload subnet and tracks which instance owns which address so
//! the verification step knows what to ping.

use log::debug;
use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;

use super::cidr::{block_size, host_at, RESERVED_LOW_ADDRESSES};
use crate::error::{PlanError, Result};
use crate::topology::types::TopologyPlan;

/// Registry of instance addresses across all spokes
#[derive(Debug, Default)]
pub struct InstanceAddressRegistry {
    /// Instance name -> address
    assigned: BTreeMap<String, Ipv4Addr>,
    /// Fast uniqueness check
    used: HashSet<Ipv4Addr>,
}

impl InstanceAddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign addresses for every instance of every spoke in the plan
    pub fn for_plan(plan: &TopologyPlan) -> Result<Self> {
        let mut registry = Self::new();
        for spoke in plan.spokes.values() {
            for index in 0..spoke.instance_count {
                registry.assign(plan, &spoke.name, index)?;
            }
        }
        Ok(registry)
    }

    /// Instance name used in specs and the inventory
    pub fn instance_name(spoke: &str, index: usize) -> String {
        format!("{}-instance-{}", spoke, index)
    }

    /// Assign the address for instance `index` of `spoke`
    pub fn assign(&mut self, plan: &TopologyPlan, spoke: &str, index: usize) -> Result<Ipv4Addr> {
        let name = Self::instance_name(spoke, index);
        if let Some(ip) = self.assigned.get(&name) {
            return Ok(*ip);
        }

        let subnet = plan
            .workload_subnet(spoke)
            .map(|s| s.cidr)
            .ok_or_else(|| PlanError::CapacityExceeded {
                spoke: spoke.to_string(),
                cidr: plan.spokes.get(spoke).map(|s| s.cidr_block).unwrap_or_default(),
                requested: "workload subnet for instances".to_string(),
            })?;

        // Skip the reserved low addresses and never hand out the broadcast address
        let offset = RESERVED_LOW_ADDRESSES + index as u64;
        let exhausted = || PlanError::AddressExhausted {
            spoke: spoke.to_string(),
            cidr: subnet,
        };
        if offset >= block_size(subnet.prefix_len()) - 1 {
            return Err(exhausted());
        }
        let ip = host_at(&subnet, offset).ok_or_else(exhausted)?;

        if !self.used.insert(ip) {
            return Err(exhausted());
        }
        debug!("Assigned {} to {}", ip, name);
        self.assigned.insert(name, ip);
        Ok(ip)
    }

    pub fn address_of(&self, instance: &str) -> Option<Ipv4Addr> {
        self.assigned.get(instance).copied()
    }

    /// Addresses of one spoke's instances in index order
    pub fn addresses_for(&self, spoke: &str, count: usize) -> Vec<Ipv4Addr> {
        (0..count)
            .filter_map(|i| self.address_of(&Self::instance_name(spoke, i)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}
