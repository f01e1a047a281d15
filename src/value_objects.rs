//! Provisioning Value Objects
//!
//! These are the building blocks of the provisioning template.
//! All value objects are immutable and validated on construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Error types for provisioning value objects and synthesis
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProvisionError {
    #[error("Invalid logical ID: {0}")]
    InvalidLogicalId(String),

    #[error("Invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("Invalid subnet mask /{mask}: must not be wider than the network prefix /{prefix}")]
    InvalidSubnetMask { mask: u8, prefix: u8 },

    #[error("Address space exhausted: {0}")]
    AddressSpaceExhausted(String),

    #[error("Invalid availability zone count: {0} (must be 1-6)")]
    InvalidAzCount(u8),

    #[error("Invalid subnet definition: {0}")]
    InvalidSubnetDef(String),

    #[error("Invalid device name: {0}")]
    InvalidDeviceName(String),

    #[error("Invalid key pair name: {0}")]
    InvalidKeyPairName(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;

// ============================================================================
// Identity Value Objects
// ============================================================================

/// Unique identifier for one synthesis of the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackId(Uuid);

impl StackId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for StackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable string identity of a node inside the resource graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalId(String);

impl LogicalId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(ProvisionError::InvalidLogicalId(
                "Logical ID cannot be empty".into(),
            ));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        {
            return Err(ProvisionError::InvalidLogicalId(format!(
                "Logical ID contains invalid characters: {}",
                id
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LogicalId {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Reference to another node in the resource graph, by logical ID
///
/// The external provisioning engine resolves references at deploy time;
/// inside strings handed to the engine a reference renders as `${id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef(LogicalId);

impl ResourceRef {
    pub fn new(id: LogicalId) -> Self {
        Self(id)
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.0
    }

    /// Substitution token for use inside engine-resolved strings
    pub fn token(&self) -> String {
        format!("${{{}}}", self.0)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Network Value Objects
// ============================================================================

/// IPv4 network with CIDR notation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ipv4Cidr {
    pub address: Ipv4Addr,
    pub prefix_len: u8,
}

impl Ipv4Cidr {
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Result<Self> {
        if prefix_len > 32 {
            return Err(ProvisionError::InvalidCidr(
                "IPv4 prefix length must be <= 32".into(),
            ));
        }
        Ok(Self {
            address,
            prefix_len,
        })
    }

    /// Number of addresses covered by this block
    pub fn capacity(&self) -> u64 {
        1u64 << (32 - self.prefix_len)
    }

    fn netmask(prefix_len: u8) -> u32 {
        if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - prefix_len)
        }
    }

    /// Network address of the block (host bits cleared)
    pub fn network_address(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.address) & Self::netmask(self.prefix_len))
    }

    /// Carve consecutive sub-blocks of the given mask sizes out of this block.
    ///
    /// Allocation is sequential and aligned to each block's natural boundary.
    /// Fails with `AddressSpaceExhausted` when the requested blocks do not
    /// fit, and with `InvalidSubnetMask` when a mask is wider than the
    /// network prefix.
    pub fn carve(&self, masks: &[u8]) -> Result<Vec<Ipv4Cidr>> {
        let base = u64::from(u32::from(self.network_address()));
        let mut offset: u64 = 0;
        let mut blocks = Vec::with_capacity(masks.len());

        for &mask in masks {
            if mask > 32 || mask < self.prefix_len {
                return Err(ProvisionError::InvalidSubnetMask {
                    mask,
                    prefix: self.prefix_len,
                });
            }

            let size = 1u64 << (32 - mask);
            // Align to the block's natural boundary
            offset = offset.div_ceil(size) * size;

            if offset + size > self.capacity() {
                return Err(ProvisionError::AddressSpaceExhausted(format!(
                    "subnet /{} does not fit in {}",
                    mask, self
                )));
            }

            let address = Ipv4Addr::from((base + offset) as u32);
            blocks.push(Ipv4Cidr {
                address,
                prefix_len: mask,
            });
            offset += size;
        }

        Ok(blocks)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() != 2 {
            return Err(ProvisionError::InvalidCidr(format!(
                "Invalid CIDR notation: {}",
                s
            )));
        }

        let address = parts[0]
            .parse::<Ipv4Addr>()
            .map_err(|e| ProvisionError::InvalidCidr(format!("Invalid IPv4 address: {}", e)))?;

        let prefix_len = parts[1]
            .parse::<u8>()
            .map_err(|e| ProvisionError::InvalidCidr(format!("Invalid prefix length: {}", e)))?;

        Self::new(address, prefix_len)
    }
}

/// Whether a subnet is reachable from the public internet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubnetVisibility {
    /// Routable from the internet via the network's gateway
    Public,
    /// No route to or from the internet
    Isolated,
}

impl fmt::Display for SubnetVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubnetVisibility::Public => write!(f, "public"),
            SubnetVisibility::Isolated => write!(f, "isolated"),
        }
    }
}

/// Definition of one subnet group, instantiated once per availability zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetDef {
    pub name: String,
    pub visibility: SubnetVisibility,
    pub cidr_mask: u8,
}

impl SubnetDef {
    pub fn new(name: impl Into<String>, visibility: SubnetVisibility, cidr_mask: u8) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(ProvisionError::InvalidSubnetDef(
                "Subnet name cannot be empty".into(),
            ));
        }
        if cidr_mask > 32 {
            return Err(ProvisionError::InvalidSubnetDef(format!(
                "Subnet mask /{} out of range",
                cidr_mask
            )));
        }
        Ok(Self {
            name,
            visibility,
            cidr_mask,
        })
    }
}

// ============================================================================
// Firewall Value Objects
// ============================================================================

/// Traffic source matched by a firewall rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RulePeer {
    /// Any IPv4 source (0.0.0.0/0)
    AnyIpv4,
    /// A specific IPv4 block
    Ipv4(Ipv4Cidr),
}

impl fmt::Display for RulePeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulePeer::AnyIpv4 => write!(f, "0.0.0.0/0"),
            RulePeer::Ipv4(cidr) => write!(f, "{}", cidr),
        }
    }
}

/// Transport protocol of a firewall rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// A single ingress rule
///
/// Rules are additive and order-preserving; no conflict detection is
/// performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    pub peer: RulePeer,
    pub protocol: Protocol,
    pub port: u16,
    pub description: String,
}

impl FirewallRule {
    pub fn new(
        peer: RulePeer,
        protocol: Protocol,
        port: u16,
        description: impl Into<String>,
    ) -> Self {
        Self {
            peer,
            protocol,
            port,
            description: description.into(),
        }
    }

    /// TCP rule open to any IPv4 source
    pub fn tcp_from_anywhere(port: u16, description: impl Into<String>) -> Self {
        Self::new(RulePeer::AnyIpv4, Protocol::Tcp, port, description)
    }
}

// ============================================================================
// Compute Value Objects
// ============================================================================

/// Instance size class (e.g. "t3.micro")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceType(String);

impl InstanceType {
    pub fn new(class: impl Into<String>) -> Self {
        Self(class.into())
    }

    pub fn t3_micro() -> Self {
        Self("t3.micro".into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for InstanceType {
    fn default() -> Self {
        Self::t3_micro()
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a machine image
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachineImage {
    /// Image id resolved at deploy time from a parameter-store path
    SsmParameter(String),
    /// Literal image id
    ImageId(String),
}

impl MachineImage {
    /// Ubuntu 20.04 LTS amd64 server image, resolved from the parameter store
    pub fn ubuntu_focal() -> Self {
        Self::SsmParameter(
            "/aws/service/canonical/ubuntu/server/focal/stable/current/amd64/hvm/ebs-gp2/ami-id"
                .into(),
        )
    }
}

impl fmt::Display for MachineImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineImage::SsmParameter(path) => write!(f, "ssm:{}", path),
            MachineImage::ImageId(id) => write!(f, "{}", id),
        }
    }
}

/// Block storage attached to an instance at launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDevice {
    pub device_name: String,
    pub volume_gib: u32,
}

impl BlockDevice {
    pub fn new(device_name: impl Into<String>, volume_gib: u32) -> Result<Self> {
        let device_name = device_name.into();
        if !device_name.starts_with("/dev/") {
            return Err(ProvisionError::InvalidDeviceName(device_name));
        }
        Ok(Self {
            device_name,
            volume_gib,
        })
    }
}

/// Name of a generated SSH key pair
///
/// The private key material is exported by the provisioning engine to an
/// external secret store and is never held in-process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyPairName(String);

impl KeyPairName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(ProvisionError::InvalidKeyPairName(
                "Key pair name cannot be empty".into(),
            ));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path under which the engine stores the private key
    pub fn secret_path(&self) -> String {
        format!("ec2-ssh-key/{}/private", self.0)
    }
}

impl fmt::Display for KeyPairName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for KeyPairName {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_id_creation() {
        let id = LogicalId::new("instance-sg").unwrap();
        assert_eq!(id.as_str(), "instance-sg");
    }

    #[test]
    fn test_logical_id_rejects_invalid() {
        assert!(LogicalId::new("").is_err());
        assert!(LogicalId::new("has space").is_err());
        assert!(LogicalId::new("under_score").is_err());
    }

    #[test]
    fn test_resource_ref_token() {
        let r = ResourceRef::new(LogicalId::new("static-ip").unwrap());
        assert_eq!(r.token(), "${static-ip}");
    }

    #[test]
    fn test_ipv4_cidr_parsing() {
        let net: Ipv4Cidr = "10.0.0.0/16".parse().unwrap();
        assert_eq!(net.prefix_len, 16);
        assert_eq!(net.to_string(), "10.0.0.0/16");
        assert_eq!(net.capacity(), 65536);
    }

    #[test]
    fn test_ipv4_cidr_rejects_invalid() {
        assert!("10.0.0.0".parse::<Ipv4Cidr>().is_err());
        assert!("10.0.0.0/33".parse::<Ipv4Cidr>().is_err());
        assert!("not-an-ip/16".parse::<Ipv4Cidr>().is_err());
    }

    #[test]
    fn test_carve_sequential_aligned() {
        let net: Ipv4Cidr = "10.0.0.0/16".parse().unwrap();
        let blocks = net.carve(&[24, 24, 28]).unwrap();
        assert_eq!(blocks[0].to_string(), "10.0.0.0/24");
        assert_eq!(blocks[1].to_string(), "10.0.1.0/24");
        assert_eq!(blocks[2].to_string(), "10.0.2.0/28");
    }

    #[test]
    fn test_carve_exhausts_address_space() {
        let net: Ipv4Cidr = "10.0.0.0/24".parse().unwrap();
        let result = net.carve(&[25, 25, 25]);
        assert!(matches!(
            result,
            Err(ProvisionError::AddressSpaceExhausted(_))
        ));
    }

    #[test]
    fn test_carve_rejects_wide_mask() {
        let net: Ipv4Cidr = "10.0.0.0/24".parse().unwrap();
        let result = net.carve(&[16]);
        assert_eq!(
            result,
            Err(ProvisionError::InvalidSubnetMask {
                mask: 16,
                prefix: 24
            })
        );
    }

    #[test]
    fn test_rule_peer_display() {
        assert_eq!(RulePeer::AnyIpv4.to_string(), "0.0.0.0/0");
        let cidr: Ipv4Cidr = "192.168.0.0/24".parse().unwrap();
        assert_eq!(RulePeer::Ipv4(cidr).to_string(), "192.168.0.0/24");
    }

    #[test]
    fn test_block_device_validation() {
        assert!(BlockDevice::new("/dev/sda1", 20).is_ok());
        assert!(BlockDevice::new("sda1", 20).is_err());
    }

    #[test]
    fn test_key_pair_secret_path() {
        let name = KeyPairName::new("microk8s-keypair").unwrap();
        assert_eq!(name.secret_path(), "ec2-ssh-key/microk8s-keypair/private");
    }

    #[test]
    fn test_stack_id_is_v7() {
        let id = StackId::new();
        assert_eq!(id.as_uuid().get_version_num(), 7);
    }
}
