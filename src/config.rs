//! Stack Configuration
//!
//! A `StackConfig` is the complete input to the provisioning template. The
//! near-duplicate deployment variants (with/without autoscaling, generated
//! key pair, static address) collapse into the single flag set carried here.

use super::value_objects::*;
use serde::{Deserialize, Serialize};

/// Specification for the virtual network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// IPv4 CIDR block of the network
    pub cidr: Ipv4Cidr,
    /// Number of availability zones to spread subnets across
    pub max_azs: u8,
    /// Ordered subnet definitions; each is instantiated once per zone
    pub subnets: Vec<SubnetDef>,
}

impl NetworkSpec {
    pub fn new(cidr: Ipv4Cidr, max_azs: u8, subnets: Vec<SubnetDef>) -> Result<Self> {
        if max_azs == 0 || max_azs > 6 {
            return Err(ProvisionError::InvalidAzCount(max_azs));
        }
        for (i, def) in subnets.iter().enumerate() {
            if subnets[..i].iter().any(|d| d.name == def.name) {
                return Err(ProvisionError::InvalidSubnetDef(format!(
                    "Duplicate subnet name: {}",
                    def.name
                )));
            }
        }
        Ok(Self {
            cidr,
            max_azs,
            subnets,
        })
    }

    /// Total number of subnets this specification emits
    pub fn subnet_count(&self) -> usize {
        self.subnets.len() * self.max_azs as usize
    }
}

/// Specification for the compute resource (instance or autoscaling group)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeSpec {
    /// Instance size class
    pub instance_type: InstanceType,
    /// Machine image to boot from
    pub machine_image: MachineImage,
    /// Block devices attached at launch
    pub block_devices: Vec<BlockDevice>,
}

impl ComputeSpec {
    pub fn new(instance_type: InstanceType, machine_image: MachineImage) -> Self {
        Self {
            instance_type,
            machine_image,
            block_devices: Vec::new(),
        }
    }

    pub fn with_block_device(mut self, device: BlockDevice) -> Self {
        self.block_devices.push(device);
        self
    }
}

/// Complete input to the provisioning template
///
/// The default configuration is empty and synthesizes an empty resource
/// graph. `single_node()` is the preset for the full single-node MicroK8s
/// deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    /// Virtual network; required for any firewall or compute resource
    pub network: Option<NetworkSpec>,
    /// Ingress rules, emitted additively in order
    pub firewall_rules: Vec<FirewallRule>,
    /// Compute resource running the bootstrap script
    pub compute: Option<ComputeSpec>,
    /// Emit an autoscaling group instead of a single instance
    pub use_autoscaling: bool,
    /// Generate an SSH key pair and reference it from the compute resource
    pub use_key_pair: bool,
    /// Allocate a static public address and associate it post-creation
    pub use_static_address: bool,
}

impl StackConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_network(mut self, network: NetworkSpec) -> Self {
        self.network = Some(network);
        self
    }

    pub fn with_firewall_rule(mut self, rule: FirewallRule) -> Self {
        self.firewall_rules.push(rule);
        self
    }

    pub fn with_compute(mut self, compute: ComputeSpec) -> Self {
        self.compute = Some(compute);
        self
    }

    pub fn autoscaling(mut self, enabled: bool) -> Self {
        self.use_autoscaling = enabled;
        self
    }

    pub fn key_pair(mut self, enabled: bool) -> Self {
        self.use_key_pair = enabled;
        self
    }

    pub fn static_address(mut self, enabled: bool) -> Self {
        self.use_static_address = enabled;
        self
    }

    /// The full single-node MicroK8s deployment: a /16 network over three
    /// zones, SSH/HTTPS/HTTP open to the world, an autoscaled t3.micro on
    /// Ubuntu with a 20 GiB root volume, a generated key pair, and a static
    /// public address for the load-balancer add-on.
    pub fn single_node() -> Self {
        let network = NetworkSpec::new(
            "10.0.0.0/16".parse().unwrap(),
            3,
            vec![
                SubnetDef::new("public-subnet-1", SubnetVisibility::Public, 24).unwrap(),
                SubnetDef::new("private-subnet-1", SubnetVisibility::Isolated, 28).unwrap(),
            ],
        )
        .unwrap();

        let compute = ComputeSpec::new(InstanceType::t3_micro(), MachineImage::ubuntu_focal())
            .with_block_device(BlockDevice::new("/dev/sda1", 20).unwrap());

        Self::new()
            .with_network(network)
            .with_firewall_rule(FirewallRule::tcp_from_anywhere(
                22,
                "allow SSH connections from anywhere",
            ))
            .with_firewall_rule(FirewallRule::tcp_from_anywhere(
                443,
                "allow HTTPS connections from anywhere",
            ))
            .with_firewall_rule(FirewallRule::tcp_from_anywhere(
                80,
                "allow HTTP connections from anywhere",
            ))
            .with_compute(compute)
            .autoscaling(true)
            .key_pair(true)
            .static_address(true)
    }
}
