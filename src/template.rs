//! Provisioning Template
//!
//! One-shot synthesis of a `StackConfig` into a `ResourceGraph`. Emission
//! order is the dependency order the external engine must respect: network
//! first, then firewall, key pair, static address, compute, and finally the
//! address association. There is no running process and no retry logic;
//! the template emits once and the engine does the rest.

use super::bootstrap::BootstrapScript;
use super::config::{ComputeSpec, NetworkSpec, StackConfig};
use super::resources::*;
use super::value_objects::*;
use tracing::{debug, info};

/// Well-known logical IDs of the emitted nodes
pub mod ids {
    pub const VPC: &str = "vpc";
    pub const SECURITY_GROUP: &str = "instance-sg";
    pub const KEY_PAIR: &str = "microk8s-keypair";
    pub const STATIC_IP: &str = "static-ip";
    pub const INSTANCE_ROLE: &str = "instance-role";
    pub const INSTANCE: &str = "instance";
    pub const AUTOSCALING_GROUP: &str = "instance-asg";
    pub const ADDRESS_ASSOCIATION: &str = "static-ip-association";
    pub const DOWNLOAD_KEY_COMMAND: &str = "download-key-command";
}

/// The provisioning template
pub struct StackTemplate;

impl StackTemplate {
    /// Synthesize the resource graph for a configuration.
    ///
    /// An empty configuration yields an empty graph. Malformed
    /// configurations fail here; nothing is emitted partially to the
    /// caller on error.
    pub fn synthesize(config: &StackConfig) -> Result<ResourceGraph> {
        let mut graph = ResourceGraph::new(StackId::new());

        let vpc = match &config.network {
            Some(network) => Some(Self::emit_network(&mut graph, network)?),
            None => None,
        };

        let needs_security_group = !config.firewall_rules.is_empty() || config.compute.is_some();
        let security_group = if needs_security_group {
            let vpc = vpc.clone().ok_or_else(|| {
                ProvisionError::ValidationError(
                    "Firewall rules and compute resources require a network".into(),
                )
            })?;
            Some(Self::emit_security_group(&mut graph, vpc, &config.firewall_rules)?)
        } else {
            None
        };

        let key_pair = if config.use_key_pair {
            Some(Self::emit_key_pair(&mut graph)?)
        } else {
            None
        };

        // The static address is allocated before any compute resource;
        // association comes after (two-phase, not atomic).
        let static_ip = if config.use_static_address {
            Some(graph.push(ids::STATIC_IP, vec![], Resource::ElasticIp)?)
        } else {
            None
        };

        let compute = match &config.compute {
            Some(spec) => {
                let vpc = vpc.clone().ok_or_else(|| {
                    ProvisionError::ValidationError(
                        "Firewall rules and compute resources require a network".into(),
                    )
                })?;
                let security_group = security_group.clone().ok_or_else(|| {
                    ProvisionError::ValidationError(
                        "Compute resources require a security group".into(),
                    )
                })?;
                Some(Self::emit_compute(
                    &mut graph,
                    config,
                    spec,
                    vpc,
                    security_group,
                    key_pair.as_ref(),
                    static_ip.as_ref(),
                )?)
            }
            None => None,
        };

        if let (Some(static_ip), Some(compute)) = (&static_ip, &compute) {
            graph.push(
                ids::ADDRESS_ASSOCIATION,
                vec![
                    static_ip.logical_id().clone(),
                    compute.logical_id().clone(),
                ],
                Resource::AddressAssociation(AddressAssociation {
                    allocation: static_ip.clone(),
                    instance: compute.clone(),
                }),
            )?;
            debug!(address = %static_ip, instance = %compute, "emitted address association");
        }

        info!(
            stack_id = %graph.stack_id,
            resources = graph.len(),
            outputs = graph.outputs.len(),
            "synthesized resource graph"
        );
        Ok(graph)
    }

    fn emit_network(graph: &mut ResourceGraph, network: &NetworkSpec) -> Result<ResourceRef> {
        let vpc = graph.push(
            ids::VPC,
            vec![],
            Resource::Vpc(Vpc {
                cidr: network.cidr,
                max_azs: network.max_azs,
                nat_gateways: 0,
            }),
        )?;

        // One subnet per definition per zone, carved sequentially out of
        // the network block.
        let placements: Vec<(&SubnetDef, u8)> = network
            .subnets
            .iter()
            .flat_map(|def| (0..network.max_azs).map(move |az| (def, az)))
            .collect();
        let masks: Vec<u8> = placements.iter().map(|(def, _)| def.cidr_mask).collect();
        let blocks = network.cidr.carve(&masks)?;

        for ((def, az), cidr) in placements.into_iter().zip(blocks) {
            let logical_id = format!("{}-az{}", def.name, az);
            graph.push(
                &logical_id,
                vec![vpc.logical_id().clone()],
                Resource::Subnet(Subnet {
                    name: def.name.clone(),
                    visibility: def.visibility,
                    cidr,
                    availability_zone: az,
                    vpc: vpc.clone(),
                }),
            )?;
        }

        debug!(cidr = %network.cidr, subnets = network.subnet_count(), "emitted network");
        Ok(vpc)
    }

    fn emit_security_group(
        graph: &mut ResourceGraph,
        vpc: ResourceRef,
        rules: &[FirewallRule],
    ) -> Result<ResourceRef> {
        debug!(rules = rules.len(), "emitted security group");
        graph.push(
            ids::SECURITY_GROUP,
            vec![vpc.logical_id().clone()],
            Resource::SecurityGroup(SecurityGroup {
                vpc,
                ingress: rules.to_vec(),
            }),
        )
    }

    fn emit_key_pair(graph: &mut ResourceGraph) -> Result<ResourceRef> {
        let name = KeyPairName::new(ids::KEY_PAIR)?;
        let secret_path = name.secret_path();
        let reference = graph.push(
            ids::KEY_PAIR,
            vec![],
            Resource::KeyPair(KeyPair {
                name: name.clone(),
                description: "SSH key pair for the MicroK8s instance".into(),
                secret_path: secret_path.clone(),
            }),
        )?;

        graph.add_output(
            ids::DOWNLOAD_KEY_COMMAND,
            format!(
                "aws secretsmanager get-secret-value --secret-id {secret_path} \
                 --query SecretString --output text > {name}.pem && chmod 400 {name}.pem"
            ),
        );
        Ok(reference)
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_compute(
        graph: &mut ResourceGraph,
        config: &StackConfig,
        spec: &ComputeSpec,
        vpc: ResourceRef,
        security_group: ResourceRef,
        key_pair: Option<&ResourceRef>,
        static_ip: Option<&ResourceRef>,
    ) -> Result<ResourceRef> {
        // The role exists so the instance may associate and release the
        // static address.
        let role = match static_ip {
            Some(_) => Some(graph.push(
                ids::INSTANCE_ROLE,
                vec![],
                Resource::InstanceRole(InstanceRole {
                    assumed_by: "ec2.amazonaws.com".into(),
                    allowed_actions: vec![
                        "ec2:AssociateAddress".into(),
                        "ec2:DisassociateAddress".into(),
                    ],
                }),
            )?),
            None => None,
        };

        let user_data = BootstrapScript::single_node(static_ip).render();

        let key_pair_name = match key_pair {
            Some(reference) => Some(KeyPairName::new(reference.logical_id().as_str())?),
            None => None,
        };

        let mut depends_on = vec![security_group.logical_id().clone()];
        depends_on.extend(
            graph
                .subnets()
                .filter(|s| s.visibility == SubnetVisibility::Public)
                .map(|s| format!("{}-az{}", s.name, s.availability_zone))
                .collect::<Vec<_>>()
                .into_iter()
                .map(LogicalId::new)
                .collect::<Result<Vec<_>>>()?,
        );
        for reference in [key_pair, static_ip, role.as_ref()].into_iter().flatten() {
            depends_on.push(reference.logical_id().clone());
        }

        let reference = if config.use_autoscaling {
            graph.push(
                ids::AUTOSCALING_GROUP,
                depends_on,
                Resource::AutoScalingGroup(AutoScalingGroup {
                    vpc,
                    subnet_visibility: SubnetVisibility::Public,
                    security_group,
                    instance_type: spec.instance_type.clone(),
                    machine_image: spec.machine_image.clone(),
                    block_devices: spec.block_devices.clone(),
                    key_pair: key_pair_name,
                    role,
                    user_data,
                    update_policy: UpdatePolicy::RollingUpdate,
                }),
            )?
        } else {
            graph.push(
                ids::INSTANCE,
                depends_on,
                Resource::Instance(Instance {
                    vpc,
                    subnet_visibility: SubnetVisibility::Public,
                    security_group,
                    instance_type: spec.instance_type.clone(),
                    machine_image: spec.machine_image.clone(),
                    block_devices: spec.block_devices.clone(),
                    key_pair: key_pair_name,
                    role,
                    user_data,
                }),
            )?
        };

        debug!(compute = %reference, autoscaling = config.use_autoscaling, "emitted compute");
        Ok(reference)
    }
}
