//! Single-Node MicroK8s Provisioning Template
//!
//! This crate synthesizes a declarative resource graph for standing up a
//! single-node MicroK8s deployment on cloud virtual machines: a virtual
//! network with one public and one isolated subnet per availability zone,
//! an additive ingress rule set, a single instance or autoscaling group
//! bootstrapped via user-data, an optional static public address, and an
//! optional generated SSH key pair.
//!
//! ## Design
//!
//! 1. **Declarative**: the output is a static graph; the external
//!    provisioning engine owns creation, retries, and rollback
//! 2. **One template**: every deployment variant is a flag on
//!    `StackConfig` (autoscaling, key pair, static address), not a
//!    separate near-duplicate declaration
//! 3. **Value Objects**: immutable, validated data types
//! 4. **No runtime**: synthesis is a pure synchronous function with no
//!    I/O, no state machine, and no concurrency
//!
//! ## Usage
//!
//! ```rust
//! use microk8s_stack::{StackConfig, StackTemplate};
//!
//! // The full single-node deployment
//! let graph = StackTemplate::synthesize(&StackConfig::single_node()).unwrap();
//! assert!(!graph.is_empty());
//!
//! // An empty configuration synthesizes an empty graph
//! let empty = StackTemplate::synthesize(&StackConfig::default()).unwrap();
//! assert!(empty.is_empty());
//! ```

pub mod bootstrap;
pub mod config;
pub mod resources;
pub mod template;
pub mod value_objects;

// Re-export commonly used types
pub use bootstrap::{BootstrapScript, ADMIN_USER};
pub use config::{ComputeSpec, NetworkSpec, StackConfig};
pub use resources::{
    AddressAssociation, AutoScalingGroup, Instance, InstanceRole, KeyPair, Resource,
    ResourceGraph, ResourceNode, SecurityGroup, StackOutput, Subnet, UpdatePolicy, Vpc,
};
pub use template::{ids, StackTemplate};
pub use value_objects::{
    BlockDevice, FirewallRule, InstanceType, Ipv4Cidr, KeyPairName, LogicalId, MachineImage,
    Protocol, ProvisionError, ResourceRef, Result, RulePeer, StackId, SubnetDef,
    SubnetVisibility,
};
