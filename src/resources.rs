//! Declarative Resource Graph
//!
//! The output of the provisioning template: an ordered list of resource
//! nodes plus informational outputs, serializable for consumption by an
//! external provisioning engine. Nodes are immutable once emitted; the
//! crate never mutates a graph after synthesis.

use super::value_objects::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Resource Entities
// ============================================================================

/// Virtual network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vpc {
    pub cidr: Ipv4Cidr,
    pub max_azs: u8,
    pub nat_gateways: u8,
}

/// One subnet inside one availability zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub name: String,
    pub visibility: SubnetVisibility,
    pub cidr: Ipv4Cidr,
    pub availability_zone: u8,
    pub vpc: ResourceRef,
}

/// Security group with its ordered ingress rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub vpc: ResourceRef,
    pub ingress: Vec<FirewallRule>,
}

/// Generated SSH key pair
///
/// The engine writes the private key to `secret_path` in the external
/// secret store; the key material never appears in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub name: KeyPairName,
    pub description: String,
    pub secret_path: String,
}

/// Role assumed by the compute resource, with the actions it may perform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRole {
    pub assumed_by: String,
    pub allowed_actions: Vec<String>,
}

/// Rolling behavior when an autoscaling group is replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdatePolicy {
    RollingUpdate,
}

/// A single compute instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub vpc: ResourceRef,
    pub subnet_visibility: SubnetVisibility,
    pub security_group: ResourceRef,
    pub instance_type: InstanceType,
    pub machine_image: MachineImage,
    pub block_devices: Vec<BlockDevice>,
    pub key_pair: Option<KeyPairName>,
    pub role: Option<ResourceRef>,
    pub user_data: String,
}

/// Autoscaling group of identical instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoScalingGroup {
    pub vpc: ResourceRef,
    pub subnet_visibility: SubnetVisibility,
    pub security_group: ResourceRef,
    pub instance_type: InstanceType,
    pub machine_image: MachineImage,
    pub block_devices: Vec<BlockDevice>,
    pub key_pair: Option<KeyPairName>,
    pub role: Option<ResourceRef>,
    pub user_data: String,
    pub update_policy: UpdatePolicy,
}

/// Binding of a static address to a compute resource
///
/// Emitted after the compute node. The two-phase allocate/associate split
/// is deliberate: association can fail independently and is not retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressAssociation {
    pub allocation: ResourceRef,
    pub instance: ResourceRef,
}

/// A resource in the declarative graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resource {
    Vpc(Vpc),
    Subnet(Subnet),
    SecurityGroup(SecurityGroup),
    KeyPair(KeyPair),
    /// Static public address, allocated before any compute resource
    ElasticIp,
    InstanceRole(InstanceRole),
    Instance(Instance),
    AutoScalingGroup(AutoScalingGroup),
    AddressAssociation(AddressAssociation),
}

// ============================================================================
// Graph
// ============================================================================

/// One node of the resource graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub logical_id: LogicalId,
    /// Logical IDs this node depends on; always emitted earlier in the graph
    pub depends_on: Vec<LogicalId>,
    pub resource: Resource,
}

/// Informational output surfaced to the operator after deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackOutput {
    pub name: String,
    pub value: String,
}

/// The synthesized resource graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceGraph {
    pub stack_id: StackId,
    pub synthesized_at: DateTime<Utc>,
    pub resources: Vec<ResourceNode>,
    pub outputs: Vec<StackOutput>,
}

impl ResourceGraph {
    pub fn new(stack_id: StackId) -> Self {
        Self {
            stack_id,
            synthesized_at: Utc::now(),
            resources: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.outputs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Look up a node by logical ID
    pub fn get(&self, id: &str) -> Option<&ResourceNode> {
        self.resources.iter().find(|n| n.logical_id.as_str() == id)
    }

    /// All subnet entities, in emission order
    pub fn subnets(&self) -> impl Iterator<Item = &Subnet> {
        self.resources.iter().filter_map(|n| match &n.resource {
            Resource::Subnet(subnet) => Some(subnet),
            _ => None,
        })
    }

    /// Ingress rules of the first security group, in emission order
    pub fn ingress_rules(&self) -> &[FirewallRule] {
        self.resources
            .iter()
            .find_map(|n| match &n.resource {
                Resource::SecurityGroup(sg) => Some(sg.ingress.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Append a node, enforcing unique logical IDs and dependency order.
    ///
    /// Every `depends_on` target must already be present in the graph, so a
    /// well-formed graph is always topologically ordered.
    pub fn push(
        &mut self,
        logical_id: &str,
        depends_on: Vec<LogicalId>,
        resource: Resource,
    ) -> Result<ResourceRef> {
        let logical_id = LogicalId::new(logical_id)?;

        if self.get(logical_id.as_str()).is_some() {
            return Err(ProvisionError::ValidationError(format!(
                "Resource {} already exists",
                logical_id
            )));
        }
        for dep in &depends_on {
            if self.get(dep.as_str()).is_none() {
                return Err(ProvisionError::ValidationError(format!(
                    "Resource {} depends on {}, which has not been emitted",
                    logical_id, dep
                )));
            }
        }

        let reference = ResourceRef::new(logical_id.clone());
        self.resources.push(ResourceNode {
            logical_id,
            depends_on,
            resource,
        });
        Ok(reference)
    }

    pub fn add_output(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.outputs.push(StackOutput {
            name: name.into(),
            value: value.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vpc_resource() -> Resource {
        Resource::Vpc(Vpc {
            cidr: "10.0.0.0/16".parse().unwrap(),
            max_azs: 3,
            nat_gateways: 0,
        })
    }

    #[test]
    fn test_push_and_lookup() {
        let mut graph = ResourceGraph::new(StackId::new());
        let vpc = graph.push("vpc", vec![], vpc_resource()).unwrap();
        assert_eq!(graph.len(), 1);
        assert!(graph.get("vpc").is_some());
        assert_eq!(vpc.logical_id().as_str(), "vpc");
    }

    #[test]
    fn test_push_rejects_duplicate_id() {
        let mut graph = ResourceGraph::new(StackId::new());
        graph.push("vpc", vec![], vpc_resource()).unwrap();
        let result = graph.push("vpc", vec![], vpc_resource());
        assert!(result.is_err());
    }

    #[test]
    fn test_push_rejects_forward_dependency() {
        let mut graph = ResourceGraph::new(StackId::new());
        let result = graph.push(
            "instance",
            vec![LogicalId::new("vpc").unwrap()],
            vpc_resource(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_graph() {
        let graph = ResourceGraph::new(StackId::new());
        assert!(graph.is_empty());
        assert_eq!(graph.ingress_rules(), &[] as &[FirewallRule]);
    }

    #[test]
    fn test_graph_serializes_to_json() {
        let mut graph = ResourceGraph::new(StackId::new());
        graph.push("vpc", vec![], vpc_resource()).unwrap();
        graph.add_output("note", "hello");

        let json = serde_json::to_string(&graph).unwrap();
        let back: ResourceGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(graph, back);
    }
}
