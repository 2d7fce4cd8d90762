//! # Hubnet - Planner for hub-and-spoke transit network topologies
//!
//! This library turns a declarative description of a transit hub and its
//! spoke networks into a validated, deterministic provisioning plan.
//!
//! ## Overview
//!
//! Every spoke is an independently addressed virtual network. Spokes never
//! connect to each other directly; each one attaches to a central hub, and
//! traffic between two spokes transits the hub. Hubnet decides how each spoke
//! block is carved into subnets, how attachments span availability zones, and
//! which routes make spoke-to-spoke traffic flow through the hub. Provisioning
//! itself is left to an external engine that consumes the emitted plan.
//!
//! ## Key Features
//!
//! - **Address Planning**: Overlap detection and deterministic subnet carving
//! - **Zone Redundancy**: Attachments span every hub zone, or fail loudly
//! - **Route Propagation**: Shared or isolated hub route tables with
//!   summarized spoke routes
//! - **Partition Detection**: Warnings for spoke pairs that cannot reach each other
//! - **Stable Identifiers**: Content-derived ids so unchanged input gives
//!   byte-identical plans
//! - **Verification Inventory**: Instance addresses and expected reachability
//!   for an external connectivity test
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - `config`: Typed YAML configuration and validation
//! - `config_loader`: Configuration file loading
//! - `error`: Planning errors and diagnostics
//! - `ip`: CIDR arithmetic, subnet planning and instance addressing
//! - `topology`: Planning data model, attachments, reachability and routes
//! - `emit`: Resource spec emission for the provisioner
//! - `registry`: Verification inventory
//! - `orchestrator`: High-level orchestration of a planning run
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use hubnet::{config_loader, orchestrator};
//! use std::path::Path;
//!
//! // Load configuration from YAML file
//! let config = config_loader::load_config(Path::new("transit.yaml"))?;
//!
//! // Plan and write the outputs
//! let summary = orchestrator::generate_outputs(&config, Path::new("hubnet_output"))?;
//!
//! // The hubnet_output directory now contains:
//! // - plan.yaml: ordered resource specs for the provisioner
//! // - inventory.json: instance addresses and expected reachability
//! // - diagnostics.json: warnings raised while planning
//! println!("{} resources planned", summary.resource_count);
//! # Ok::<(), color_eyre::Report>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! project: transit-lab
//! stack: dev
//! tags: { Tutorial: 6-Transit-Gateway }
//!
//! hub:
//!   asn: 64512
//!   availability_zones: [us-east-1a, us-east-1b]
//!   route_table_mode: shared-default   # or per-spoke-isolated
//!   spoke_route_policy: peer-cidrs     # or default-route-via-hub
//!
//! spokes:
//!   lab:
//!     cidr_block: 10.200.0.0/16
//!     workload_subnet_cidr: 10.200.10.0/24
//!     internet_access: true
//!   dev:
//!     cidr_block: 10.201.0.0/16
//! ```
//!
//! ## Error Handling
//!
//! Planning functions return [`error::PlanError`]; configuration problems are
//! [`config::ValidationError`]. File-level entry points wrap both in
//! `color_eyre` reports with context.

pub mod config;
pub mod config_loader;
pub mod emit;
pub mod error;
pub mod ip;
pub mod orchestrator;
pub mod registry;
pub mod topology;
