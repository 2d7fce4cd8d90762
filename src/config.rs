use ipnet::Ipv4Net;
use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use crate::emit::EmitSettings;
use crate::topology::components::isolated_table_name;
use crate::topology::types::{HubConfig, RouteTableMode, SpokeDefinition, SpokeRoutePolicy};

/// Lowercase DNS-label style names for projects, stacks, spokes and groups
static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]{0,31}$").expect("Invalid name regex"));

/// Region labels such as `us-east-1`
static REGION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d+$").expect("Invalid region regex"));

/// Private ASN ranges accepted for the hub
const PRIVATE_ASN_16: std::ops::RangeInclusive<u32> = 64512..=65534;
const PRIVATE_ASN_32: std::ops::RangeInclusive<u32> = 4_200_000_000..=4_294_967_294;

/// Top-level planner configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_project")]
    pub project: String,
    #[serde(default = "default_stack")]
    pub stack: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub hub: HubSection,
    pub spokes: BTreeMap<String, SpokeSection>,
}

fn default_project() -> String {
    "hubnet".to_string()
}

fn default_stack() -> String {
    "dev".to_string()
}

/// Hub settings as written in YAML
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HubSection {
    pub asn: u32,
    pub availability_zones: Vec<String>,
    #[serde(default)]
    pub route_table_mode: RouteTableMode,
    #[serde(default)]
    pub spoke_route_policy: SpokeRoutePolicy,
    #[serde(default)]
    pub allow_single_az: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    #[serde(default)]
    pub associations: BTreeMap<String, Vec<String>>,
}

/// One spoke as written in YAML
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpokeSection {
    pub cidr_block: Ipv4Net,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workload_subnet_cidr: Option<Ipv4Net>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workload_subnet_size: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zones: Option<Vec<String>>,
    #[serde(default)]
    pub internet_access: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instances: Option<usize>,
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid hub configuration: {0}")]
    InvalidHub(String),
    #[error("Invalid spoke '{spoke}': {reason}")]
    InvalidSpoke { spoke: String, reason: String },
    #[error("Invalid association group '{group}': {reason}")]
    InvalidAssociation { group: String, reason: String },
}

impl Config {
    /// Validate the configuration.
    ///
    /// Only shape and naming are checked here. Address capacity, overlaps
    /// and zone coverage are planning errors and are left to the planner.
    pub fn validate(&self) -> Result<(), ValidationError> {
        Self::validate_name("project", &self.project).map_err(ValidationError::InvalidGeneral)?;
        Self::validate_name("stack", &self.stack).map_err(ValidationError::InvalidGeneral)?;
        if let Some(region) = &self.region {
            if !REGION_PATTERN.is_match(region) {
                return Err(ValidationError::InvalidGeneral(format!(
                    "region '{}' is not a valid region name",
                    region
                )));
            }
        }

        self.validate_hub()?;

        if self.spokes.is_empty() {
            return Err(ValidationError::InvalidGeneral(
                "at least one spoke must be defined".to_string(),
            ));
        }
        for (name, spoke) in &self.spokes {
            Self::validate_spoke(name, spoke)?;
        }

        self.validate_associations()
    }

    fn validate_name(what: &str, name: &str) -> Result<(), String> {
        if NAME_PATTERN.is_match(name) {
            Ok(())
        } else {
            Err(format!(
                "{} '{}' must start with a lowercase letter and contain only lowercase letters, digits and hyphens (max 32)",
                what, name
            ))
        }
    }

    fn validate_hub(&self) -> Result<(), ValidationError> {
        let hub = &self.hub;
        if !PRIVATE_ASN_16.contains(&hub.asn) && !PRIVATE_ASN_32.contains(&hub.asn) {
            return Err(ValidationError::InvalidHub(format!(
                "asn {} is outside the private ranges 64512-65534 and 4200000000-4294967294",
                hub.asn
            )));
        }

        if hub.availability_zones.is_empty() {
            return Err(ValidationError::InvalidHub(
                "availability_zones cannot be empty".to_string(),
            ));
        }
        let distinct: BTreeSet<&String> = hub.availability_zones.iter().collect();
        if distinct.len() != hub.availability_zones.len() {
            return Err(ValidationError::InvalidHub(
                "availability_zones contains duplicates".to_string(),
            ));
        }

        if let Some(instance_type) = &hub.instance_type {
            if instance_type.trim().is_empty() {
                return Err(ValidationError::InvalidHub(
                    "instance_type cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn validate_spoke(name: &str, spoke: &SpokeSection) -> Result<(), ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidSpoke {
            spoke: name.to_string(),
            reason,
        };

        Self::validate_name("spoke name", name).map_err(invalid)?;

        if spoke.cidr_block != spoke.cidr_block.trunc() {
            return Err(invalid(format!(
                "cidr_block {} has host bits set (did you mean {}?)",
                spoke.cidr_block,
                spoke.cidr_block.trunc()
            )));
        }

        match (spoke.workload_subnet_cidr, spoke.workload_subnet_size) {
            (Some(_), Some(_)) => {
                return Err(invalid(
                    "workload_subnet_cidr and workload_subnet_size are mutually exclusive".to_string(),
                ));
            }
            (Some(cidr), None) if cidr != cidr.trunc() => {
                return Err(invalid(format!("workload_subnet_cidr {} has host bits set", cidr)));
            }
            (None, Some(size)) if size > 32 => {
                return Err(invalid(format!("workload_subnet_size /{} is not a valid prefix", size)));
            }
            _ => {}
        }

        if let Some(zones) = &spoke.availability_zones {
            if zones.is_empty() {
                return Err(invalid("availability_zones cannot be an empty list".to_string()));
            }
        }
        Ok(())
    }

    fn validate_associations(&self) -> Result<(), ValidationError> {
        let associations = &self.hub.associations;
        if associations.is_empty() {
            return Ok(());
        }

        if self.hub.route_table_mode == RouteTableMode::SharedDefault {
            warn!("hub.associations is ignored in shared-default route table mode");
        }

        for (group, members) in associations {
            let invalid = |reason: String| ValidationError::InvalidAssociation {
                group: group.clone(),
                reason,
            };

            Self::validate_name("group name", group).map_err(invalid)?;
            if group.starts_with(&isolated_table_name("")) {
                return Err(invalid("names starting with 'isolated-' are reserved".to_string()));
            }
            if members.is_empty() {
                return Err(invalid("group has no members".to_string()));
            }
            if let Some(unknown) = members.iter().find(|m| !self.spokes.contains_key(*m)) {
                return Err(invalid(format!("unknown spoke '{}'", unknown)));
            }
        }
        Ok(())
    }

    /// Spoke definitions for the planner, in name order
    pub fn to_spokes(&self) -> Vec<SpokeDefinition> {
        self.spokes
            .iter()
            .map(|(name, section)| {
                let mut spoke = SpokeDefinition::new(name, section.cidr_block)
                    .with_internet_access(section.internet_access);
                if let Some(cidr) = section.workload_subnet_cidr {
                    spoke = spoke.with_workload_cidr(cidr);
                } else if let Some(size) = section.workload_subnet_size {
                    spoke = spoke.with_workload_size(size);
                }
                if let Some(count) = section.instances {
                    spoke = spoke.with_instances(count);
                }
                spoke.availability_zones = section.availability_zones.clone();
                spoke
            })
            .collect()
    }

    /// Hub settings for the planner
    pub fn to_hub(&self) -> HubConfig {
        let section = &self.hub;
        let mut hub = HubConfig::new(section.asn, &[])
            .with_mode(section.route_table_mode)
            .with_policy(section.spoke_route_policy);
        hub.availability_zones = section.availability_zones.clone();
        hub.allow_single_az = section.allow_single_az;
        if let Some(instance_type) = &section.instance_type {
            hub.instance_type = instance_type.clone();
        }
        hub.associations = section
            .associations
            .iter()
            .map(|(group, members)| (group.clone(), members.iter().cloned().collect()))
            .collect();
        hub
    }

    pub fn emit_settings(&self) -> EmitSettings {
        EmitSettings {
            project: self.project.clone(),
            stack: self.stack.clone(),
            tags: self.tags.clone(),
        }
    }
}
