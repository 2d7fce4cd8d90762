//! Topology type definitions.
//!
//! This file contains the planning data model: spoke and hub inputs, the
//! subnets, attachments and routes derived from them, and the
//! [`TopologyPlan`] aggregate that owns everything handed to the emitter.

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Default workload subnet prefix length when none is configured
pub const DEFAULT_WORKLOAD_PREFIX: u8 = 24;

/// How the workload subnet of a spoke is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadSubnet {
    /// Use this exact block
    Explicit(Ipv4Net),
    /// Carve the first aligned block of this prefix length
    Size(u8),
}

/// A spoke network as requested by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpokeDefinition {
    pub name: String,
    pub cidr_block: Ipv4Net,
    pub workload_subnet: WorkloadSubnet,
    /// Zones requested for this spoke; `None` means "every hub zone"
    pub availability_zones: Option<Vec<String>>,
    pub internet_access: bool,
    pub instance_count: usize,
}

impl SpokeDefinition {
    pub fn new(name: &str, cidr_block: Ipv4Net) -> Self {
        Self {
            name: name.to_string(),
            cidr_block: cidr_block.trunc(),
            workload_subnet: WorkloadSubnet::Size(DEFAULT_WORKLOAD_PREFIX),
            availability_zones: None,
            internet_access: false,
            instance_count: 1,
        }
    }

    pub fn with_workload_cidr(mut self, cidr: Ipv4Net) -> Self {
        self.workload_subnet = WorkloadSubnet::Explicit(cidr);
        self
    }

    pub fn with_workload_size(mut self, prefix_len: u8) -> Self {
        self.workload_subnet = WorkloadSubnet::Size(prefix_len);
        self
    }

    pub fn with_availability_zones(mut self, zones: &[&str]) -> Self {
        self.availability_zones = Some(zones.iter().map(|z| z.to_string()).collect());
        self
    }

    pub fn with_internet_access(mut self, enabled: bool) -> Self {
        self.internet_access = enabled;
        self
    }

    pub fn with_instances(mut self, count: usize) -> Self {
        self.instance_count = count;
        self
    }

    /// Sorted, de-duplicated zone labels this spoke wants attachment subnets in
    pub fn zones(&self, hub: &HubConfig) -> Vec<String> {
        let zones = self.availability_zones.as_ref().unwrap_or(&hub.availability_zones);
        zones.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect()
    }
}

/// Hub route-table mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RouteTableMode {
    /// All attachments associate with and propagate into one default table
    #[default]
    SharedDefault,
    /// Reachability only within explicit route-table associations
    PerSpokeIsolated,
}

/// What spokes put in their local route tables to reach peers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SpokeRoutePolicy {
    /// Summarized peer CIDRs
    #[default]
    PeerCidrs,
    /// A single 0.0.0.0/0 entry
    DefaultRouteViaHub,
}

/// Hub settings shared by every planning call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub asn: u32,
    pub availability_zones: Vec<String>,
    pub route_table_mode: RouteTableMode,
    pub spoke_route_policy: SpokeRoutePolicy,
    pub allow_single_az: bool,
    /// Hub route-table group name -> member spokes (isolated mode only)
    pub associations: BTreeMap<String, BTreeSet<String>>,
    /// Passed through to instance specs, never interpreted
    pub instance_type: String,
}

impl HubConfig {
    pub fn new(asn: u32, availability_zones: &[&str]) -> Self {
        Self {
            asn,
            availability_zones: availability_zones.iter().map(|z| z.to_string()).collect(),
            route_table_mode: RouteTableMode::SharedDefault,
            spoke_route_policy: SpokeRoutePolicy::PeerCidrs,
            allow_single_az: false,
            associations: BTreeMap::new(),
            instance_type: "t3.micro".to_string(),
        }
    }

    pub fn with_mode(mut self, mode: RouteTableMode) -> Self {
        self.route_table_mode = mode;
        self
    }

    pub fn with_policy(mut self, policy: SpokeRoutePolicy) -> Self {
        self.spoke_route_policy = policy;
        self
    }

    pub fn with_association(mut self, group: &str, spokes: &[&str]) -> Self {
        self.associations.insert(
            group.to_string(),
            spokes.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn allowing_single_az(mut self) -> Self {
        self.allow_single_az = true;
        self
    }

    /// Distinct hub zones in sorted order
    pub fn zone_set(&self) -> BTreeSet<&str> {
        self.availability_zones.iter().map(String::as_str).collect()
    }
}

/// Role of a subnet inside its spoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubnetRole {
    Workload,
    HubAttachment,
}

impl fmt::Display for SubnetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubnetRole::Workload => write!(f, "workload"),
            SubnetRole::HubAttachment => write!(f, "hub-attachment"),
        }
    }
}

/// A computed subnet
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubnetPlan {
    pub spoke: String,
    pub role: SubnetRole,
    pub availability_zone: String,
    pub cidr: Ipv4Net,
}

/// The edge between a spoke and the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPlan {
    pub spoke: String,
    /// Hub-attachment subnets, one per zone, sorted by zone
    pub subnets: Vec<SubnetPlan>,
}

impl AttachmentPlan {
    pub fn availability_zones(&self) -> Vec<&str> {
        self.subnets.iter().map(|s| s.availability_zone.as_str()).collect()
    }
}

/// A route table on the hub and the spokes associated with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubRouteTable {
    pub name: String,
    pub associated_spokes: Vec<String>,
}

/// Name of the hub's route table in shared-default mode
pub const DEFAULT_HUB_TABLE: &str = "default";

/// Which route table an entry lives in
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RouteTableId {
    Hub(String),
    Spoke(String),
}

impl fmt::Display for RouteTableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteTableId::Hub(name) => write!(f, "hub route table '{}'", name),
            RouteTableId::Spoke(name) => write!(f, "spoke route table '{}'", name),
        }
    }
}

/// Where matching traffic is sent
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RouteTarget {
    /// The named spoke's hub attachment
    Attachment(String),
    /// The named spoke's internet gateway
    InternetGateway(String),
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteTarget::Attachment(spoke) => write!(f, "{}-attachment", spoke),
            RouteTarget::InternetGateway(spoke) => write!(f, "{}-igw", spoke),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RouteOrigin {
    /// Inserted by hub route propagation
    Propagated,
    /// Explicit entry in a spoke table
    Static,
}

/// One row of a route table
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteEntry {
    pub table: RouteTableId,
    pub destination: Ipv4Net,
    pub target: RouteTarget,
    pub origin: RouteOrigin,
}

impl RouteEntry {
    pub fn is_default_route(&self) -> bool {
        self.destination.prefix_len() == 0
    }
}

impl fmt::Display for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.destination, self.target)
    }
}

/// The aggregate root handed to the emitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyPlan {
    pub hub: HubConfig,
    pub spokes: BTreeMap<String, SpokeDefinition>,
    pub subnets: Vec<SubnetPlan>,
    pub attachments: Vec<AttachmentPlan>,
    pub route_tables: Vec<HubRouteTable>,
    pub routes: Vec<RouteEntry>,
    /// Spoke pairs with no path between them, each pair sorted
    pub partitions: Vec<(String, String)>,
}

impl TopologyPlan {
    pub fn new(spokes: &[SpokeDefinition], hub: &HubConfig) -> Self {
        Self {
            hub: hub.clone(),
            spokes: spokes.iter().map(|s| (s.name.clone(), s.clone())).collect(),
            subnets: Vec::new(),
            attachments: Vec::new(),
            route_tables: Vec::new(),
            routes: Vec::new(),
            partitions: Vec::new(),
        }
    }

    pub fn subnets_for<'a>(&'a self, spoke: &'a str) -> impl Iterator<Item = &'a SubnetPlan> + 'a {
        self.subnets.iter().filter(move |s| s.spoke == spoke)
    }

    pub fn workload_subnet(&self, spoke: &str) -> Option<&SubnetPlan> {
        self.subnets
            .iter()
            .find(|s| s.spoke == spoke && s.role == SubnetRole::Workload)
    }

    pub fn attachment(&self, spoke: &str) -> Option<&AttachmentPlan> {
        self.attachments.iter().find(|a| a.spoke == spoke)
    }

    pub fn routes_in<'a>(&'a self, table: &'a RouteTableId) -> impl Iterator<Item = &'a RouteEntry> + 'a {
        self.routes.iter().filter(move |r| &r.table == table)
    }

    pub fn hub_routes(&self) -> impl Iterator<Item = &RouteEntry> {
        self.routes.iter().filter(|r| matches!(r.table, RouteTableId::Hub(_)))
    }

    pub fn hub_table_for(&self, spoke: &str) -> Option<&HubRouteTable> {
        self.route_tables
            .iter()
            .find(|t| t.associated_spokes.iter().any(|s| s == spoke))
    }

    /// Spokes reachable from `spoke` through the hub
    pub fn reachable_peers(&self, spoke: &str) -> Vec<String> {
        self.hub_table_for(spoke)
            .map(|t| {
                t.associated_spokes
                    .iter()
                    .filter(|s| s.as_str() != spoke)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_partitioned(&self) -> bool {
        !self.partitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spoke_zones_default_to_hub() {
        let hub = HubConfig::new(64512, &["us-east-1b", "us-east-1a"]);
        let spoke = SpokeDefinition::new("lab", "10.200.0.0/16".parse().unwrap());
        assert_eq!(spoke.zones(&hub), vec!["us-east-1a", "us-east-1b"]);

        let spoke = spoke.with_availability_zones(&["us-east-1c", "us-east-1a", "us-east-1c"]);
        assert_eq!(spoke.zones(&hub), vec!["us-east-1a", "us-east-1c"]);
    }

    #[test]
    fn test_spoke_cidr_truncated() {
        let spoke = SpokeDefinition::new("lab", "10.200.3.7/16".parse().unwrap());
        assert_eq!(spoke.cidr_block.to_string(), "10.200.0.0/16");
    }

    #[test]
    fn test_route_table_mode_serde() {
        let mode: RouteTableMode = serde_yaml::from_str("per-spoke-isolated").unwrap();
        assert_eq!(mode, RouteTableMode::PerSpokeIsolated);
        let policy: SpokeRoutePolicy = serde_yaml::from_str("default-route-via-hub").unwrap();
        assert_eq!(policy, SpokeRoutePolicy::DefaultRouteViaHub);
    }

    #[test]
    fn test_workload_subnet_outlives_lookup_key() {
        let hub = HubConfig::new(64512, &["us-east-1a", "us-east-1b"]);
        let spoke = SpokeDefinition::new("lab", "10.200.0.0/16".parse().unwrap());
        let mut plan = TopologyPlan::new(&[spoke], &hub);
        plan.subnets.push(SubnetPlan {
            spoke: "lab".to_string(),
            role: SubnetRole::HubAttachment,
            availability_zone: "us-east-1a".to_string(),
            cidr: "10.200.255.240/28".parse().unwrap(),
        });
        plan.subnets.push(SubnetPlan {
            spoke: "lab".to_string(),
            role: SubnetRole::Workload,
            availability_zone: "us-east-1a".to_string(),
            cidr: "10.200.0.0/24".parse().unwrap(),
        });

        // The key is dropped before the returned subnet is used
        let workload = {
            let key = String::from("lab");
            plan.workload_subnet(&key)
        };
        assert_eq!(workload.map(|s| s.cidr.to_string()), Some("10.200.0.0/24".to_string()));
        assert!(plan.workload_subnet("dev").is_none());
        assert_eq!(plan.subnets_for("lab").count(), 2);
    }

    #[test]
    fn test_route_entry_display() {
        let entry = RouteEntry {
            table: RouteTableId::Spoke("lab".to_string()),
            destination: "10.201.0.0/16".parse().unwrap(),
            target: RouteTarget::Attachment("lab".to_string()),
            origin: RouteOrigin::Static,
        };
        assert_eq!(entry.to_string(), "10.201.0.0/16 -> lab-attachment");
        assert!(!entry.is_default_route());
    }
}
