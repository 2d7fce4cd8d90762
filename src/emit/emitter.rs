//! Plan emission.
//!
//! Turns a resolved [`TopologyPlan`] into the ordered stream of
//! [`ResourceSpec`] records the provisioner consumes. Specs are produced
//! lazily; every call to [`PlanEmitter::specs`] starts a fresh pass.

use log::debug;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::ids;
use super::types::{EmitSettings, ResourceKind, ResourceSpec};
use crate::error::Result;
use crate::ip::registry::InstanceAddressRegistry;
use crate::topology::types::{
    AttachmentPlan, HubRouteTable, RouteEntry, RouteOrigin, RouteTableId, RouteTableMode, RouteTarget,
    SpokeDefinition, SubnetPlan, SubnetRole, TopologyPlan,
};

/// Build an emitter for a resolved plan.
///
/// Instance addresses are assigned up front, so an exhausted workload
/// subnet fails here rather than halfway through the stream.
pub fn emit<'a>(plan: &'a TopologyPlan, settings: &'a EmitSettings) -> Result<PlanEmitter<'a>> {
    let addresses = InstanceAddressRegistry::for_plan(plan)?;
    debug!("Emitter ready with {} instance addresses", addresses.len());
    Ok(PlanEmitter {
        plan,
        settings,
        addresses,
    })
}

/// Restartable source of resource specs for one plan
#[derive(Debug)]
pub struct PlanEmitter<'a> {
    plan: &'a TopologyPlan,
    settings: &'a EmitSettings,
    addresses: InstanceAddressRegistry,
}

impl<'a> PlanEmitter<'a> {
    pub fn addresses(&self) -> &InstanceAddressRegistry {
        &self.addresses
    }

    /// Lazily yield every spec, dependencies before dependents
    pub fn specs(&'a self) -> impl Iterator<Item = ResourceSpec> + 'a {
        let plan = self.plan;
        let isolated = plan.hub.route_table_mode == RouteTableMode::PerSpokeIsolated;

        plan.spokes
            .values()
            .map(move |s| self.virtual_network(s))
            .chain(plan.subnets.iter().map(move |s| self.subnet(s)))
            .chain(std::iter::once_with(move || self.hub()))
            .chain(
                plan.route_tables
                    .iter()
                    .filter(move |_| isolated)
                    .map(move |t| self.hub_route_table(t)),
            )
            .chain(plan.attachments.iter().map(move |a| self.attachment(a)))
            .chain(
                plan.route_tables
                    .iter()
                    .filter(move |_| isolated)
                    .flat_map(move |t| t.associated_spokes.iter().map(move |s| self.hub_association(t, s))),
            )
            .chain(
                plan.route_tables
                    .iter()
                    .filter(move |_| isolated)
                    .flat_map(move |t| t.associated_spokes.iter().map(move |s| self.hub_propagation(t, s))),
            )
            .chain(plan.spokes.values().map(move |s| self.spoke_route_table(s)))
            .chain(
                plan.spokes
                    .values()
                    .filter(|s| s.internet_access)
                    .map(move |s| self.internet_gateway(s)),
            )
            .chain(plan.routes.iter().map(move |r| self.route_entry(r)))
            .chain(
                plan.subnets
                    .iter()
                    .filter(|s| s.role == SubnetRole::Workload)
                    .map(move |s| self.subnet_association(s)),
            )
            .chain(plan.spokes.values().map(move |s| self.security_group(s)))
            .chain(plan.spokes.values().flat_map(move |s| {
                (0..s.instance_count).filter_map(move |i| self.instance(s, i))
            }))
    }

    fn name(&self, suffix: &str) -> String {
        format!("{}-{}", self.settings.project, suffix)
    }

    /// Common tags plus a `Name` tag
    fn tags(&self, name_tag: &str) -> Value {
        let mut tags: BTreeMap<String, String> = self.settings.tags.clone();
        tags.insert("Project".to_string(), self.settings.project.clone());
        tags.insert("Environment".to_string(), self.settings.stack.clone());
        tags.insert("ManagedBy".to_string(), "hubnet".to_string());
        tags.insert("Name".to_string(), format!("{}-{}", name_tag, self.settings.stack));
        json!(tags)
    }

    fn spec(
        &self,
        kind: ResourceKind,
        identifier: String,
        name: String,
        name_tag: &str,
        mut attributes: BTreeMap<String, Value>,
        depends_on: Vec<String>,
    ) -> ResourceSpec {
        attributes.insert("name".to_string(), json!(name));
        attributes.insert("tags".to_string(), self.tags(name_tag));
        ResourceSpec {
            kind,
            identifier,
            attributes,
            depends_on,
        }
    }

    fn virtual_network(&self, spoke: &SpokeDefinition) -> ResourceSpec {
        let attributes = attrs([
            ("spoke", json!(spoke.name)),
            ("cidr_block", json!(spoke.cidr_block.to_string())),
            ("enable_dns_support", json!(true)),
            ("enable_dns_hostnames", json!(true)),
        ]);
        self.spec(
            ResourceKind::VirtualNetwork,
            ids::virtual_network(spoke),
            self.name(&format!("{}-vpc", spoke.name)),
            &format!("{}-vpc", spoke.name),
            attributes,
            Vec::new(),
        )
    }

    fn subnet(&self, subnet: &SubnetPlan) -> ResourceSpec {
        let spoke = &self.plan.spokes[&subnet.spoke];
        let public = subnet.role == SubnetRole::Workload && spoke.internet_access;
        let (suffix, role_tag) = match subnet.role {
            SubnetRole::Workload => ("workload".to_string(), "Workload"),
            SubnetRole::HubAttachment => (format!("hub-{}", subnet.availability_zone), "TransitGateway"),
        };

        let attributes = attrs([
            ("virtual_network", json!(ids::virtual_network(spoke))),
            ("cidr_block", json!(subnet.cidr.to_string())),
            ("availability_zone", json!(subnet.availability_zone)),
            ("role", json!(subnet.role.to_string())),
            ("map_public_ip_on_launch", json!(public)),
        ]);
        let mut spec = self.spec(
            ResourceKind::Subnet,
            ids::subnet(subnet),
            self.name(&format!("{}-{}", subnet.spoke, suffix)),
            &format!("{}-{}-subnet", subnet.spoke, suffix),
            attributes,
            vec![ids::virtual_network(spoke)],
        );
        if let Some(Value::Object(tags)) = spec.attributes.get_mut("tags") {
            tags.insert("Type".to_string(), json!(role_tag));
        }
        spec
    }

    fn hub(&self) -> ResourceSpec {
        let hub = &self.plan.hub;
        let shared = if hub.route_table_mode == RouteTableMode::SharedDefault {
            "enable"
        } else {
            "disable"
        };
        let attributes = attrs([
            ("amazon_side_asn", json!(hub.asn)),
            ("description", json!(format!("Transit hub for {}", self.settings.project))),
            ("default_route_table_association", json!(shared)),
            ("default_route_table_propagation", json!(shared)),
            ("dns_support", json!("enable")),
            ("vpn_ecmp_support", json!("enable")),
            ("availability_zones", json!(hub.zone_set())),
        ]);
        self.spec(ResourceKind::Hub, ids::hub(hub), self.name("tgw"), "tgw", attributes, Vec::new())
    }

    fn hub_route_table(&self, table: &HubRouteTable) -> ResourceSpec {
        let attributes = attrs([
            ("transit_gateway", json!(ids::hub(&self.plan.hub))),
            ("associated_spokes", json!(table.associated_spokes)),
        ]);
        self.spec(
            ResourceKind::HubRouteTable,
            ids::hub_route_table(&table.name),
            self.name(&format!("tgw-rt-{}", table.name)),
            &format!("tgw-rt-{}", table.name),
            attributes,
            vec![ids::hub(&self.plan.hub)],
        )
    }

    fn attachment(&self, attachment: &AttachmentPlan) -> ResourceSpec {
        let spoke = &self.plan.spokes[&attachment.spoke];
        let subnet_ids: Vec<String> = attachment.subnets.iter().map(ids::subnet).collect();

        let attributes = attrs([
            ("transit_gateway", json!(ids::hub(&self.plan.hub))),
            ("virtual_network", json!(ids::virtual_network(spoke))),
            ("subnet_ids", json!(subnet_ids)),
            ("availability_zones", json!(attachment.availability_zones())),
            ("dns_support", json!("enable")),
            ("ipv6_support", json!("disable")),
            ("appliance_mode_support", json!("disable")),
        ]);

        let mut depends_on = vec![ids::hub(&self.plan.hub), ids::virtual_network(spoke)];
        depends_on.extend(subnet_ids);

        let mut spec = self.spec(
            ResourceKind::Attachment,
            ids::attachment(attachment),
            self.name(&format!("{}-tgw-attachment", attachment.spoke)),
            &format!("{}-tgw-attachment", attachment.spoke),
            attributes,
            depends_on,
        );
        if let Some(Value::Object(tags)) = spec.attributes.get_mut("tags") {
            tags.insert("VPC".to_string(), json!(attachment.spoke));
        }
        spec
    }

    fn attachment_id(&self, spoke: &str) -> Option<String> {
        self.plan.attachment(spoke).map(ids::attachment)
    }

    fn hub_association(&self, table: &HubRouteTable, spoke: &str) -> ResourceSpec {
        let table_id = ids::hub_route_table(&table.name);
        let mut depends_on = vec![table_id.clone()];
        depends_on.extend(self.attachment_id(spoke));

        let attributes = attrs([
            ("route_table", json!(table_id)),
            ("attachment", json!(self.attachment_id(spoke))),
        ]);
        self.spec(
            ResourceKind::RouteTableAssociation,
            ids::hub_association(&table.name, spoke),
            self.name(&format!("tgw-rt-{}-{}", table.name, spoke)),
            &format!("tgw-rt-{}-{}", table.name, spoke),
            attributes,
            depends_on,
        )
    }

    /// Explicit propagation of an attachment's routes into an isolated hub table
    fn hub_propagation(&self, table: &HubRouteTable, spoke: &str) -> ResourceSpec {
        let table_id = ids::hub_route_table(&table.name);
        let mut depends_on = vec![table_id.clone()];
        depends_on.extend(self.attachment_id(spoke));

        let attributes = attrs([
            ("route_table", json!(table_id)),
            ("attachment", json!(self.attachment_id(spoke))),
        ]);
        self.spec(
            ResourceKind::RouteTablePropagation,
            ids::hub_propagation(&table.name, spoke),
            self.name(&format!("tgw-rt-{}-{}-propagation", table.name, spoke)),
            &format!("tgw-rt-{}-{}-propagation", table.name, spoke),
            attributes,
            depends_on,
        )
    }

    /// The propagation that installs `route`, when the hub does not propagate by default
    fn propagation_for(&self, route: &RouteEntry) -> Option<String> {
        if self.plan.hub.route_table_mode != RouteTableMode::PerSpokeIsolated
            || route.origin != RouteOrigin::Propagated
        {
            return None;
        }
        match (&route.table, &route.target) {
            (RouteTableId::Hub(table), RouteTarget::Attachment(spoke)) => self
                .plan
                .route_tables
                .iter()
                .any(|t| &t.name == table && t.associated_spokes.contains(spoke))
                .then(|| ids::hub_propagation(table, spoke)),
            _ => None,
        }
    }

    fn spoke_route_table(&self, spoke: &SpokeDefinition) -> ResourceSpec {
        let attributes = attrs([("virtual_network", json!(ids::virtual_network(spoke)))]);
        self.spec(
            ResourceKind::RouteTable,
            ids::spoke_route_table(&spoke.name),
            self.name(&format!("{}-workload-rt", spoke.name)),
            &format!("{}-workload-rt", spoke.name),
            attributes,
            vec![ids::virtual_network(spoke)],
        )
    }

    fn internet_gateway(&self, spoke: &SpokeDefinition) -> ResourceSpec {
        let attributes = attrs([("virtual_network", json!(ids::virtual_network(spoke)))]);
        self.spec(
            ResourceKind::InternetGateway,
            ids::internet_gateway(&spoke.name),
            self.name(&format!("{}-igw", spoke.name)),
            &format!("{}-igw", spoke.name),
            attributes,
            vec![ids::virtual_network(spoke)],
        )
    }

    fn route_entry(&self, route: &RouteEntry) -> ResourceSpec {
        let (table_id, table_label) = match &route.table {
            RouteTableId::Hub(name) => {
                let id = if self.plan.hub.route_table_mode == RouteTableMode::PerSpokeIsolated {
                    ids::hub_route_table(name)
                } else {
                    ids::hub(&self.plan.hub)
                };
                (id, format!("tgw-{}", name))
            }
            RouteTableId::Spoke(name) => (ids::spoke_route_table(name), name.clone()),
        };
        let (target_id, target_field) = match &route.target {
            RouteTarget::Attachment(spoke) => (self.attachment_id(spoke), "attachment"),
            RouteTarget::InternetGateway(spoke) => (Some(ids::internet_gateway(spoke)), "gateway"),
        };

        let attributes = attrs([
            ("route_table", json!(table_id)),
            ("destination_cidr_block", json!(route.destination.to_string())),
            (target_field, json!(target_id)),
            ("propagated", json!(route.origin == RouteOrigin::Propagated)),
        ]);
        let mut depends_on = vec![table_id];
        depends_on.extend(target_id);
        depends_on.extend(self.propagation_for(route));

        let label = format!("{}-to-{}", table_label, route.target);
        self.spec(
            ResourceKind::RouteEntry,
            ids::route_entry(route),
            self.name(&label),
            &label,
            attributes,
            depends_on,
        )
    }

    fn subnet_association(&self, subnet: &SubnetPlan) -> ResourceSpec {
        let table_id = ids::spoke_route_table(&subnet.spoke);
        let attributes = attrs([
            ("route_table", json!(table_id)),
            ("subnet", json!(ids::subnet(subnet))),
        ]);
        self.spec(
            ResourceKind::RouteTableAssociation,
            ids::subnet_association(subnet),
            self.name(&format!("{}-workload-rta", subnet.spoke)),
            &format!("{}-workload-rta", subnet.spoke),
            attributes,
            vec![table_id, ids::subnet(subnet)],
        )
    }

    fn security_group(&self, spoke: &SpokeDefinition) -> ResourceSpec {
        let mut ingress = vec![json!({
            "protocol": "tcp",
            "from_port": 22,
            "to_port": 22,
            "cidr_blocks": ["0.0.0.0/0"],
            "description": "SSH access",
        })];
        for peer in self.plan.reachable_peers(&spoke.name) {
            let cidr = self.plan.spokes[&peer].cidr_block.to_string();
            ingress.push(json!({
                "protocol": "icmp",
                "from_port": -1,
                "to_port": -1,
                "cidr_blocks": [cidr],
                "description": format!("ICMP from {}", peer),
            }));
            ingress.push(json!({
                "protocol": "-1",
                "from_port": 0,
                "to_port": 0,
                "cidr_blocks": [cidr],
                "description": format!("All traffic from {}", peer),
            }));
        }

        let attributes = attrs([
            ("virtual_network", json!(ids::virtual_network(spoke))),
            ("description", json!(format!("Test instance access for {}", spoke.name))),
            ("ingress", Value::Array(ingress)),
            (
                "egress",
                json!([{
                    "protocol": "-1",
                    "from_port": 0,
                    "to_port": 0,
                    "cidr_blocks": ["0.0.0.0/0"],
                    "description": "Allow all outbound",
                }]),
            ),
        ]);
        self.spec(
            ResourceKind::SecurityGroup,
            ids::security_group(&spoke.name),
            self.name(&format!("{}-sg", spoke.name)),
            &format!("{}-sg", spoke.name),
            attributes,
            vec![ids::virtual_network(spoke)],
        )
    }

    fn instance(&self, spoke: &SpokeDefinition, index: usize) -> Option<ResourceSpec> {
        let workload = self.plan.workload_subnet(&spoke.name)?;
        let name = InstanceAddressRegistry::instance_name(&spoke.name, index);
        let address = self.addresses.address_of(&name)?;

        let attributes = attrs([
            ("instance_type", json!(self.plan.hub.instance_type)),
            ("subnet", json!(ids::subnet(workload))),
            ("security_groups", json!([ids::security_group(&spoke.name)])),
            ("private_ip", json!(address.to_string())),
            ("associate_public_ip_address", json!(spoke.internet_access)),
        ]);
        Some(self.spec(
            ResourceKind::Instance,
            ids::instance(&name, &address),
            self.name(&name),
            &name,
            attributes,
            vec![ids::subnet(workload), ids::security_group(&spoke.name)],
        ))
    }
}

impl<'a> IntoIterator for &'a PlanEmitter<'a> {
    type Item = ResourceSpec;
    type IntoIter = Box<dyn Iterator<Item = ResourceSpec> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.specs())
    }
}

fn attrs<const N: usize>(pairs: [(&str, Value); N]) -> BTreeMap<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}
