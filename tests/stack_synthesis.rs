//! End-to-end synthesis tests for the provisioning template.

use microk8s_stack::{
    ids, FirewallRule, NetworkSpec, Resource, StackConfig, StackTemplate, SubnetDef,
    SubnetVisibility,
};
use proptest::prelude::*;
use test_case::test_case;

fn network(max_azs: u8, defs: usize) -> NetworkSpec {
    let subnets = (0..defs)
        .map(|i| SubnetDef::new(format!("subnet-{i}"), SubnetVisibility::Public, 24).unwrap())
        .collect();
    NetworkSpec::new("10.0.0.0/16".parse().unwrap(), max_azs, subnets).unwrap()
}

#[test]
fn empty_config_emits_empty_graph() {
    use pretty_assertions::assert_eq;
    let graph = StackTemplate::synthesize(&StackConfig::default()).unwrap();
    assert!(graph.is_empty());
    assert_eq!(graph.len(), 0);
    assert!(graph.outputs.is_empty());
}

#[test_case(1, 1 => 1)]
#[test_case(2, 3 => 6)]
#[test_case(3, 2 => 6)]
#[test_case(6, 4 => 24)]
fn subnet_count_is_defs_times_azs(max_azs: u8, defs: usize) -> usize {
    let config = StackConfig::new().with_network(network(max_azs, defs));
    let graph = StackTemplate::synthesize(&config).unwrap();
    graph.subnets().count()
}

#[test]
fn firewall_emission_is_additive_and_order_preserving() {
    use pretty_assertions::assert_eq;
    let ports = [22u16, 443, 80, 8080, 6443];
    let mut config = StackConfig::new().with_network(network(1, 1));
    for port in ports {
        config = config.with_firewall_rule(FirewallRule::tcp_from_anywhere(
            port,
            format!("allow port {port}"),
        ));
    }

    let graph = StackTemplate::synthesize(&config).unwrap();
    let rules = graph.ingress_rules();
    assert_eq!(rules.len(), ports.len());
    let emitted: Vec<u16> = rules.iter().map(|r| r.port).collect();
    assert_eq!(emitted, ports.to_vec());
}

#[test]
fn static_address_yields_association_referencing_both_sides() {
    use pretty_assertions::assert_eq;
    let graph = StackTemplate::synthesize(&StackConfig::single_node()).unwrap();

    let node = graph.get(ids::ADDRESS_ASSOCIATION).unwrap();
    let Resource::AddressAssociation(assoc) = &node.resource else {
        panic!("expected an address association, got {:?}", node.resource);
    };
    assert_eq!(assoc.allocation.logical_id().as_str(), ids::STATIC_IP);
    assert_eq!(
        assoc.instance.logical_id().as_str(),
        ids::AUTOSCALING_GROUP
    );
    assert!(node
        .depends_on
        .iter()
        .any(|d| d.as_str() == ids::STATIC_IP));
    assert!(node
        .depends_on
        .iter()
        .any(|d| d.as_str() == ids::AUTOSCALING_GROUP));
}

#[test]
fn bootstrap_ends_with_ready_wait_then_addon_enable() {
    use pretty_assertions::assert_eq;
    let graph = StackTemplate::synthesize(&StackConfig::single_node()).unwrap();
    let node = graph.get(ids::AUTOSCALING_GROUP).unwrap();
    let Resource::AutoScalingGroup(asg) = &node.resource else {
        panic!("expected an autoscaling group");
    };

    let lines: Vec<&str> = asg.user_data.lines().collect();
    let n = lines.len();
    assert_eq!(lines[n - 2], "microk8s status --wait-ready");
    assert!(lines[n - 1].starts_with("microk8s enable dns storage helm3"));
    assert!(lines[n - 1].contains("metallb:${static-ip}"));
}

#[test]
fn every_dependency_precedes_its_dependent() {
    let graph = StackTemplate::synthesize(&StackConfig::single_node()).unwrap();

    for (position, node) in graph.resources.iter().enumerate() {
        for dep in &node.depends_on {
            let dep_position = graph
                .resources
                .iter()
                .position(|other| other.logical_id == *dep)
                .unwrap_or_else(|| panic!("{} depends on missing {}", node.logical_id, dep));
            assert!(
                dep_position < position,
                "{} emitted before its dependency {}",
                node.logical_id,
                dep
            );
        }
    }
}

#[test]
fn network_precedes_compute() {
    let graph = StackTemplate::synthesize(&StackConfig::single_node()).unwrap();
    let position = |id: &str| {
        graph
            .resources
            .iter()
            .position(|n| n.logical_id.as_str() == id)
            .unwrap()
    };
    assert!(position(ids::VPC) < position(ids::AUTOSCALING_GROUP));
    assert!(position(ids::STATIC_IP) < position(ids::AUTOSCALING_GROUP));
    assert!(position(ids::AUTOSCALING_GROUP) < position(ids::ADDRESS_ASSOCIATION));
}

#[test]
fn single_node_graph_round_trips_through_json() {
    use pretty_assertions::assert_eq;
    let graph = StackTemplate::synthesize(&StackConfig::single_node()).unwrap();
    let json = serde_json::to_string(&graph).unwrap();
    let back: microk8s_stack::ResourceGraph = serde_json::from_str(&json).unwrap();
    assert_eq!(graph, back);
}

#[test]
fn subnet_blocks_are_disjoint_and_inside_the_network() {
    use pretty_assertions::assert_eq;
    let config = StackConfig::single_node();
    let graph = StackTemplate::synthesize(&config).unwrap();

    let cidrs: Vec<_> = graph.subnets().map(|s| s.cidr).collect();
    assert_eq!(cidrs.len(), 6);

    for (i, a) in cidrs.iter().enumerate() {
        let a_start = u32::from(a.network_address()) as u64;
        let a_end = a_start + a.capacity();
        assert!(a.to_string().starts_with("10.0."));
        for b in &cidrs[i + 1..] {
            let b_start = u32::from(b.network_address()) as u64;
            let b_end = b_start + b.capacity();
            assert!(
                a_end <= b_start || b_end <= a_start,
                "{a} overlaps {b}"
            );
        }
    }
}

proptest! {
    /// Subnet emission scales as definitions × zones for any valid shape.
    #[test]
    fn prop_subnet_count(max_azs in 1u8..=6, defs in 1usize..=4) {
        let config = StackConfig::new().with_network(network(max_azs, defs));
        let graph = StackTemplate::synthesize(&config).unwrap();
        prop_assert_eq!(graph.subnets().count(), defs * max_azs as usize);
    }

    /// Rule emission is additive: N rules in, exactly N ingress entries out.
    #[test]
    fn prop_firewall_rule_count(ports in proptest::collection::vec(1u16..=65535, 0..16)) {
        let mut config = StackConfig::new().with_network(network(1, 1));
        for port in &ports {
            config = config.with_firewall_rule(FirewallRule::tcp_from_anywhere(*port, "rule"));
        }
        let graph = StackTemplate::synthesize(&config).unwrap();
        prop_assert_eq!(graph.ingress_rules().len(), ports.len());
    }
}
