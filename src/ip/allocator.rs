//! Address planning.
//!
//! Validates that spoke blocks never overlap and carves each spoke block
//! into one workload subnet and one hub-attachment subnet per zone.
//! Attachment subnets are taken from the top of the block downward and the
//! workload subnet from the bottom, so both ends grow toward each other and
//! a collision means the block is too small.

use log::{debug, info};

use super::cidr::{block_at, block_size, contains, first, is_aligned, last, overlaps, prefix_for_hosts, MIN_SUBNET_PREFIX};
use crate::error::{PlanError, Result};
use crate::topology::types::{HubConfig, SpokeDefinition, SubnetPlan, SubnetRole, WorkloadSubnet};

/// Plan every subnet of every spoke.
///
/// The result depends only on the spoke inputs and the hub zones: spokes are
/// handled in name order, zones in label order, and the output is sorted.
pub fn plan_addresses(spokes: &[SpokeDefinition], hub: &HubConfig) -> Result<Vec<SubnetPlan>> {
    check_unique_names(spokes)?;
    check_spoke_overlaps(spokes)?;

    let mut ordered: Vec<&SpokeDefinition> = spokes.iter().collect();
    ordered.sort_by(|a, b| a.name.cmp(&b.name));

    let mut subnets = Vec::new();
    for spoke in ordered {
        subnets.extend(carve_spoke(spoke, hub)?);
    }
    subnets.sort();

    info!("Planned {} subnets across {} spokes", subnets.len(), spokes.len());
    Ok(subnets)
}

/// Spoke names key every later stage, so a repeated name is fatal
fn check_unique_names(spokes: &[SpokeDefinition]) -> Result<()> {
    let mut ordered: Vec<&SpokeDefinition> = spokes.iter().collect();
    ordered.sort_by(|a, b| a.name.cmp(&b.name).then(a.cidr_block.cmp(&b.cidr_block)));

    match ordered.windows(2).find(|pair| pair[0].name == pair[1].name) {
        Some(pair) => Err(PlanError::DuplicateSpoke {
            spoke: pair[0].name.clone(),
            first_cidr: pair[0].cidr_block,
            second_cidr: pair[1].cidr_block,
        }),
        None => Ok(()),
    }
}

/// Fail on the first overlapping pair, examined in name order
fn check_spoke_overlaps(spokes: &[SpokeDefinition]) -> Result<()> {
    let mut ordered: Vec<&SpokeDefinition> = spokes.iter().collect();
    ordered.sort_by(|a, b| a.name.cmp(&b.name).then(a.cidr_block.cmp(&b.cidr_block)));

    for (i, a) in ordered.iter().enumerate() {
        for b in &ordered[i + 1..] {
            if overlaps(&a.cidr_block, &b.cidr_block) {
                return Err(PlanError::AddressConflict {
                    first: a.name.clone(),
                    second: b.name.clone(),
                    first_cidr: a.cidr_block,
                    second_cidr: b.cidr_block,
                });
            }
        }
    }
    Ok(())
}

fn capacity_error(spoke: &SpokeDefinition, requested: String) -> PlanError {
    PlanError::CapacityExceeded {
        spoke: spoke.name.clone(),
        cidr: spoke.cidr_block,
        requested,
    }
}

/// Carve one spoke block
fn carve_spoke(spoke: &SpokeDefinition, hub: &HubConfig) -> Result<Vec<SubnetPlan>> {
    let block = spoke.cidr_block;
    let zones = spoke.zones(hub);

    let attach_prefix = prefix_for_hosts(zones.len() as u64);
    let attach_size = block_size(attach_prefix);
    let needed = attach_size * zones.len() as u64;
    if attach_prefix < block.prefix_len() || needed > block_size(block.prefix_len()) {
        return Err(capacity_error(
            spoke,
            format!("{} hub-attachment /{} subnets", zones.len(), attach_prefix),
        ));
    }

    let mut subnets = Vec::with_capacity(zones.len() + 1);
    let top = last(&block) + 1;
    for (i, zone) in zones.iter().enumerate() {
        let start = top - attach_size * (i as u64 + 1);
        let cidr = block_at(start, attach_prefix)
            .ok_or_else(|| capacity_error(spoke, format!("hub-attachment subnet for {}", zone)))?;
        debug!("Spoke {}: hub-attachment subnet {} in {}", spoke.name, cidr, zone);
        subnets.push(SubnetPlan {
            spoke: spoke.name.clone(),
            role: SubnetRole::HubAttachment,
            availability_zone: zone.clone(),
            cidr,
        });
    }

    let workload = workload_cidr(spoke)?;
    if let Some(clash) = subnets.iter().find(|s| overlaps(&s.cidr, &workload)) {
        return Err(capacity_error(
            spoke,
            format!("workload subnet {} overlaps hub-attachment subnet {}", workload, clash.cidr),
        ));
    }

    // Workload instances live in the first zone
    let workload_zone = zones
        .first()
        .or_else(|| hub.availability_zones.first())
        .cloned()
        .unwrap_or_default();
    debug!("Spoke {}: workload subnet {} in {}", spoke.name, workload, workload_zone);
    subnets.push(SubnetPlan {
        spoke: spoke.name.clone(),
        role: SubnetRole::Workload,
        availability_zone: workload_zone,
        cidr: workload,
    });

    Ok(subnets)
}

fn workload_cidr(spoke: &SpokeDefinition) -> Result<ipnet::Ipv4Net> {
    let block = spoke.cidr_block;
    match spoke.workload_subnet {
        WorkloadSubnet::Explicit(cidr) => {
            if !is_aligned(&cidr) {
                return Err(capacity_error(spoke, format!("misaligned workload subnet {}", cidr)));
            }
            if !contains(&block, &cidr) {
                return Err(capacity_error(spoke, format!("workload subnet {} outside the spoke block", cidr)));
            }
            if cidr.prefix_len() > MIN_SUBNET_PREFIX {
                return Err(capacity_error(spoke, format!("workload subnet {} below the /{} minimum", cidr, MIN_SUBNET_PREFIX)));
            }
            Ok(cidr)
        }
        WorkloadSubnet::Size(prefix_len) => {
            if prefix_len < block.prefix_len() || prefix_len > MIN_SUBNET_PREFIX {
                return Err(capacity_error(spoke, format!("workload subnet /{}", prefix_len)));
            }
            block_at(first(&block), prefix_len)
                .ok_or_else(|| capacity_error(spoke, format!("workload subnet /{}", prefix_len)))
        }
    }
}
