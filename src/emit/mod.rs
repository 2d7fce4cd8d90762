//! # Plan Emission Module
//!
//! This module turns a resolved topology plan into the declarative resource
//! records consumed by the external provisioning engine. The planner never
//! talks to a cloud API itself; everything it decides leaves through here.
//!
//! ## Key Components
//!
//! - `types.rs`: `ResourceSpec`, `ResourceKind` and the naming/tagging settings
//! - `ids.rs`: content-derived identifiers (`<kind>-<sha256 prefix>`)
//! - `emitter.rs`: the lazy, restartable spec stream
//!
//! ## Emission Order
//!
//! Specs are yielded so that every identifier in a spec's `depends_on`
//! has already been yielded:
//!
//! 1. **Networks**: one virtual network per spoke
//! 2. **Subnets**: workload and hub-attachment subnets
//! 3. **Hub**: the transit hub, then its explicit route tables (isolated mode)
//! 4. **Attachments**: one per spoke, then hub route-table associations and
//!    propagations (isolated mode)
//! 5. **Routing**: spoke route tables, internet gateways, route entries,
//!    subnet associations
//! 6. **Verification**: security groups and test instances
//!
//! ## Identifiers
//!
//! Identifiers hash the resource kind together with the content that defines
//! the resource. Planning the same topology twice gives identical identifiers;
//! changing a CIDR or a zone gives new ones, which the provisioner treats as a
//! replacement.
//!
//! ## Example Output
//!
//! ```yaml
//! - kind: subnet
//!   identifier: subnet-3f9c0a6d2b1e4c57
//!   attributes:
//!     availability_zone: us-east-1a
//!     cidr_block: 10.200.255.240/28
//!     role: hub-attachment
//!     ...
//!   depends_on:
//!   - virtual-network-8e21b47c0d9af613
//! ```

pub mod emitter;
pub mod ids;
pub mod types;

// Re-export commonly used types
pub use emitter::{emit, PlanEmitter};
pub use types::{EmitSettings, ResourceKind, ResourceSpec};
