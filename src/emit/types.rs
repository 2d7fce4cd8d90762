//! Provisioner-facing type definitions.
//!
//! This module contains the declarative records handed to the external
//! provisioning engine and the settings that shape their names and tags.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Resource Specifications
// ============================================================================

/// Kind of resource a spec describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    VirtualNetwork,
    Subnet,
    Hub,
    HubRouteTable,
    Attachment,
    RouteTableAssociation,
    RouteTablePropagation,
    RouteTable,
    InternetGateway,
    RouteEntry,
    SecurityGroup,
    Instance,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::VirtualNetwork => "virtual-network",
            ResourceKind::Subnet => "subnet",
            ResourceKind::Hub => "hub",
            ResourceKind::HubRouteTable => "hub-route-table",
            ResourceKind::Attachment => "attachment",
            ResourceKind::RouteTableAssociation => "route-table-association",
            ResourceKind::RouteTablePropagation => "route-table-propagation",
            ResourceKind::RouteTable => "route-table",
            ResourceKind::InternetGateway => "internet-gateway",
            ResourceKind::RouteEntry => "route-entry",
            ResourceKind::SecurityGroup => "security-group",
            ResourceKind::Instance => "instance",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declarative resource for the provisioner.
///
/// `depends_on` lists identifiers that must be realized before this one;
/// the emitter always yields dependencies first.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ResourceSpec {
    /// Resource kind
    pub kind: ResourceKind,
    /// Stable identifier derived from the resource's content
    pub identifier: String,
    /// Provider attributes, sorted by key
    pub attributes: BTreeMap<String, Value>,
    /// Identifiers this resource depends on
    pub depends_on: Vec<String>,
}

impl ResourceSpec {
    /// The `name` attribute, if present
    pub fn name(&self) -> Option<&str> {
        self.attributes.get("name").and_then(Value::as_str)
    }
}

// ============================================================================
// Emission Settings
// ============================================================================

/// Naming and tagging inputs that do not affect topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitSettings {
    /// Prefix for every resource name
    pub project: String,
    /// Environment name, appended to `Name` tags
    pub stack: String,
    /// Extra tags applied to every resource
    pub tags: BTreeMap<String, String>,
}

impl Default for EmitSettings {
    fn default() -> Self {
        Self {
            project: "hubnet".to_string(),
            stack: "dev".to_string(),
            tags: BTreeMap::new(),
        }
    }
}
