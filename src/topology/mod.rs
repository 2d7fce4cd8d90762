//! Network topology module.
//!
//! This module contains the planning data model and the steps that turn
//! validated spoke definitions into an attached, routed hub-and-spoke
//! topology: attachment wiring, reachability components, and route
//! propagation.

pub mod builder;
pub mod components;
pub mod routes;
pub mod types;

// Re-export key types and functions for easier access
pub use builder::build_topology;
pub use components::{reachability_components, Component};
pub use routes::{resolve_routes, RouteResolution};
pub use types::{
    AttachmentPlan, HubConfig, HubRouteTable, RouteEntry, RouteOrigin, RouteTableId, RouteTableMode,
    RouteTarget, SpokeDefinition, SpokeRoutePolicy, SubnetPlan, SubnetRole, TopologyPlan, WorkloadSubnet,
};
