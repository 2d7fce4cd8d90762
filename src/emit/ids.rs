//! Content-derived resource identifiers.
//!
//! Each identifier hashes the resource kind together with a natural key that
//! embeds the resource's defining content, so an unchanged topology always
//! yields the same identifiers and a changed one yields new ones.

use sha2::{Digest, Sha256};

use super::types::ResourceKind;
use crate::topology::types::{AttachmentPlan, HubConfig, RouteEntry, RouteTableId, SpokeDefinition, SubnetPlan};

/// Hex digits of the digest kept in identifiers
const ID_HEX_LEN: usize = 16;

/// `<kind>-<hash>` for a natural key
pub fn resource_id(kind: ResourceKind, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(key.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{}-{}", kind.as_str(), &digest[..ID_HEX_LEN])
}

pub fn virtual_network(spoke: &SpokeDefinition) -> String {
    resource_id(ResourceKind::VirtualNetwork, &format!("{}/{}", spoke.name, spoke.cidr_block))
}

pub fn subnet(subnet: &SubnetPlan) -> String {
    resource_id(
        ResourceKind::Subnet,
        &format!("{}/{}/{}/{}", subnet.spoke, subnet.role, subnet.availability_zone, subnet.cidr),
    )
}

pub fn hub(hub: &HubConfig) -> String {
    resource_id(ResourceKind::Hub, &format!("{}/{:?}", hub.asn, hub.route_table_mode))
}

pub fn hub_route_table(name: &str) -> String {
    resource_id(ResourceKind::HubRouteTable, name)
}

pub fn attachment(attachment: &AttachmentPlan) -> String {
    let subnets: Vec<String> = attachment.subnets.iter().map(|s| s.cidr.to_string()).collect();
    resource_id(
        ResourceKind::Attachment,
        &format!("{}/{}", attachment.spoke, subnets.join(",")),
    )
}

pub fn hub_association(table: &str, spoke: &str) -> String {
    resource_id(ResourceKind::RouteTableAssociation, &format!("hub/{}/{}", table, spoke))
}

pub fn hub_propagation(table: &str, spoke: &str) -> String {
    resource_id(ResourceKind::RouteTablePropagation, &format!("{}/{}", table, spoke))
}

pub fn subnet_association(subnet: &SubnetPlan) -> String {
    resource_id(
        ResourceKind::RouteTableAssociation,
        &format!("subnet/{}/{}", subnet.spoke, subnet.cidr),
    )
}

pub fn spoke_route_table(spoke: &str) -> String {
    resource_id(ResourceKind::RouteTable, spoke)
}

pub fn internet_gateway(spoke: &str) -> String {
    resource_id(ResourceKind::InternetGateway, spoke)
}

pub fn route_entry(route: &RouteEntry) -> String {
    let table = match &route.table {
        RouteTableId::Hub(name) => format!("hub:{}", name),
        RouteTableId::Spoke(name) => format!("spoke:{}", name),
    };
    resource_id(
        ResourceKind::RouteEntry,
        &format!("{}/{}/{}", table, route.destination, route.target),
    )
}

pub fn security_group(spoke: &str) -> String {
    resource_id(ResourceKind::SecurityGroup, spoke)
}

pub fn instance(name: &str, address: &std::net::Ipv4Addr) -> String {
    resource_id(ResourceKind::Instance, &format!("{}/{}", name, address))
}
