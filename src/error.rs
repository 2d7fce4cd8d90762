//! Planning errors and the diagnostics channel.
//!
//! Every fatal planning failure is a [`PlanError`] variant carrying the
//! entities involved. Before anything is handed to the provisioner, errors
//! and warnings are flattened into [`Diagnostic`] records so callers can
//! report them uniformly.

use ipnet::Ipv4Net;
use serde::Serialize;
use thiserror::Error;

use crate::topology::types::{RouteEntry, RouteTableId};

/// Result type for planning operations
pub type Result<T> = std::result::Result<T, PlanError>;

/// Fatal planning errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("Address conflict: spoke '{first}' ({first_cidr}) overlaps spoke '{second}' ({second_cidr})")]
    AddressConflict {
        first: String,
        second: String,
        first_cidr: Ipv4Net,
        second_cidr: Ipv4Net,
    },

    #[error("Duplicate spoke '{spoke}': declared with {first_cidr} and {second_cidr}")]
    DuplicateSpoke {
        spoke: String,
        first_cidr: Ipv4Net,
        second_cidr: Ipv4Net,
    },

    #[error("Capacity exceeded in spoke '{spoke}' ({cidr}): {requested}")]
    CapacityExceeded {
        spoke: String,
        cidr: Ipv4Net,
        requested: String,
    },

    #[error("Insufficient AZ coverage for spoke '{spoke}': {available} qualifying zone(s), {required} required")]
    InsufficientAzCoverage {
        spoke: String,
        required: usize,
        available: usize,
    },

    #[error("Route conflict in {table}: {first} and {second} claim overlapping destinations")]
    RouteConflict {
        table: RouteTableId,
        first: RouteEntry,
        second: RouteEntry,
    },

    #[error("No addresses left in workload subnet {cidr} of spoke '{spoke}'")]
    AddressExhausted { spoke: String, cidr: Ipv4Net },
}

impl PlanError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            PlanError::AddressConflict { .. } => "AddressConflict",
            PlanError::DuplicateSpoke { .. } => "DuplicateSpoke",
            PlanError::CapacityExceeded { .. } => "CapacityExceeded",
            PlanError::InsufficientAzCoverage { .. } => "InsufficientAZCoverage",
            PlanError::RouteConflict { .. } => "RouteConflict",
            PlanError::AddressExhausted { .. } => "AddressExhausted",
        }
    }

    /// Names of the entities involved in the failure
    pub fn affected_entities(&self) -> Vec<String> {
        match self {
            PlanError::AddressConflict { first, second, .. } => vec![first.clone(), second.clone()],
            PlanError::DuplicateSpoke { spoke, .. }
            | PlanError::CapacityExceeded { spoke, .. }
            | PlanError::InsufficientAzCoverage { spoke, .. }
            | PlanError::AddressExhausted { spoke, .. } => vec![spoke.clone()],
            PlanError::RouteConflict { table, .. } => vec![table.to_string()],
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            code: self.code().to_string(),
            message: self.to_string(),
            affected: self.affected_entities(),
        }
    }
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A structured diagnostic record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub affected: Vec<String>,
}

impl Diagnostic {
    /// Warning raised for a pair of spokes with no path between them
    pub fn partitioned(first: &str, second: &str) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            code: "PartitionedTopology".to_string(),
            message: format!(
                "Spokes '{}' and '{}' share no route-table association and cannot reach each other",
                first, second
            ),
            affected: vec![first.to_string(), second.to_string()],
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}
