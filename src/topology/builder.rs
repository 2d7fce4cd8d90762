//! Attachment wiring.
//!
//! Links every spoke to the hub through one attachment backed by the
//! spoke's hub-attachment subnets, one per hub zone. An attachment spanning
//! K zones survives the loss of K-1 of them, so coverage is checked strictly.

use log::{debug, info, warn};

use crate::error::{PlanError, Result};
use crate::topology::types::{AttachmentPlan, HubConfig, SpokeDefinition, SubnetPlan, SubnetRole};

/// Build one attachment per spoke.
///
/// Fails with `InsufficientAzCoverage` when a spoke asks for a zone the hub
/// does not serve, when it has fewer qualifying subnets than the hub has
/// zones, or when the hub spans a single zone without `allow_single_az`.
pub fn build_topology(
    spokes: &[SpokeDefinition],
    subnets: &[SubnetPlan],
    hub: &HubConfig,
) -> Result<Vec<AttachmentPlan>> {
    let hub_zones = hub.zone_set();
    let required = hub_zones.len();

    let mut ordered: Vec<&SpokeDefinition> = spokes.iter().collect();
    ordered.sort_by(|a, b| a.name.cmp(&b.name));

    let mut attachments = Vec::with_capacity(ordered.len());
    for spoke in ordered {
        if required == 1 && !hub.allow_single_az {
            return Err(PlanError::InsufficientAzCoverage {
                spoke: spoke.name.clone(),
                required: 2,
                available: 1,
            });
        }

        let requested = spoke.zones(hub);
        let served = requested.iter().filter(|z| hub_zones.contains(z.as_str())).count();
        if served < requested.len() {
            return Err(PlanError::InsufficientAzCoverage {
                spoke: spoke.name.clone(),
                required: requested.len(),
                available: served,
            });
        }

        let mut backing: Vec<SubnetPlan> = subnets
            .iter()
            .filter(|s| {
                s.spoke == spoke.name
                    && s.role == SubnetRole::HubAttachment
                    && hub_zones.contains(s.availability_zone.as_str())
            })
            .cloned()
            .collect();
        backing.sort_by(|a, b| a.availability_zone.cmp(&b.availability_zone));
        backing.dedup_by(|a, b| a.availability_zone == b.availability_zone);

        if backing.len() < required || backing.is_empty() {
            return Err(PlanError::InsufficientAzCoverage {
                spoke: spoke.name.clone(),
                required: required.max(1),
                available: backing.len(),
            });
        }
        if backing.len() == 1 {
            warn!("Spoke {} attaches through a single zone; a zone failure disconnects it", spoke.name);
        }

        debug!(
            "Attachment for {} spans {:?}",
            spoke.name,
            backing.iter().map(|s| s.availability_zone.as_str()).collect::<Vec<_>>()
        );
        attachments.push(AttachmentPlan {
            spoke: spoke.name.clone(),
            subnets: backing,
        });
    }

    info!("Built {} hub attachments across {} zones", attachments.len(), required);
    Ok(attachments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ip::allocator::plan_addresses;

    fn spoke(name: &str, cidr: &str) -> SpokeDefinition {
        SpokeDefinition::new(name, cidr.parse().unwrap())
    }

    fn build(spokes: &[SpokeDefinition], hub: &HubConfig) -> Result<Vec<AttachmentPlan>> {
        let subnets = plan_addresses(spokes, hub)?;
        build_topology(spokes, &subnets, hub)
    }

    #[test]
    fn test_lab_dev_attachments() {
        let hub = HubConfig::new(64512, &["a", "b"]);
        let spokes = vec![spoke("Lab", "10.200.0.0/16"), spoke("Dev", "10.201.0.0/16")];
        let attachments = build(&spokes, &hub).unwrap();

        assert_eq!(attachments.len(), 2);
        assert!(attachments.iter().all(|a| a.subnets.len() == 2));
        assert_eq!(attachments.iter().map(|a| a.subnets.len()).sum::<usize>(), 4);
        assert_eq!(attachments[0].spoke, "Dev");
        assert_eq!(attachments[0].availability_zones(), vec!["a", "b"]);
    }

    #[test]
    fn test_one_attachment_per_spoke() {
        let hub = HubConfig::new(64512, &["a", "b", "c"]);
        let spokes: Vec<SpokeDefinition> = (0..12)
            .map(|i| spoke(&format!("spoke{:02}", i), &format!("10.{}.0.0/16", i)))
            .collect();
        let attachments = build(&spokes, &hub).unwrap();
        assert_eq!(attachments.len(), 12);
        assert!(attachments.iter().all(|a| a.subnets.len() == 3));
    }

    #[test]
    fn test_single_az_requires_opt_in() {
        let hub = HubConfig::new(64512, &["a"]);
        let spokes = vec![spoke("lab", "10.200.0.0/16")];
        assert!(matches!(
            build(&spokes, &hub),
            Err(PlanError::InsufficientAzCoverage { required: 2, available: 1, .. })
        ));

        let hub = hub.allowing_single_az();
        let attachments = build(&spokes, &hub).unwrap();
        assert_eq!(attachments[0].subnets.len(), 1);
    }

    #[test]
    fn test_spoke_with_fewer_zones() {
        let hub = HubConfig::new(64512, &["a", "b"]);
        let spokes = vec![spoke("lab", "10.200.0.0/16").with_availability_zones(&["a"])];
        assert!(matches!(
            build(&spokes, &hub),
            Err(PlanError::InsufficientAzCoverage { required: 2, available: 1, .. })
        ));
    }

    #[test]
    fn test_spoke_zone_not_served_by_hub() {
        let hub = HubConfig::new(64512, &["a", "b"]);
        let spokes = vec![spoke("lab", "10.200.0.0/16").with_availability_zones(&["a", "b", "c"])];
        match build(&spokes, &hub) {
            Err(PlanError::InsufficientAzCoverage { spoke, required, available }) => {
                assert_eq!(spoke, "lab");
                assert_eq!(required, 3);
                assert_eq!(available, 2);
            }
            other => panic!("expected InsufficientAzCoverage, got {:?}", other),
        }
    }
}
