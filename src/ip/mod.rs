//! Address planning and management module.
//!
//! This module owns all IPv4 arithmetic: validating that spoke blocks do not
//! collide, carving each spoke into workload and hub-attachment subnets, and
//! assigning instance addresses inside workload subnets for verification.

pub mod allocator;
pub mod cidr;
pub mod registry;

// Re-export commonly used types
pub use allocator::plan_addresses;
pub use registry::InstanceAddressRegistry;
