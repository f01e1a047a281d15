//! Bootstrap Script
//!
//! The shell commands embedded as instance user-data. The sequence is fixed:
//! package-manager extension, distribution install, group membership,
//! config-directory ownership, ready wait, add-on enable. Execution is
//! fire-and-forget; a failure here only surfaces through external
//! monitoring of the instance.

use super::value_objects::ResourceRef;
use serde::{Deserialize, Serialize};

/// User the provisioning engine creates on the image
pub const ADMIN_USER: &str = "ubuntu";

/// Ordered shell commands run once at first boot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapScript {
    commands: Vec<String>,
}

impl BootstrapScript {
    /// Build the single-node MicroK8s bootstrap sequence.
    ///
    /// When a static address is present the load-balancer add-on is enabled
    /// and parameterized with a reference to it; the reference is resolved
    /// by the engine when the user-data is rendered into the instance.
    pub fn single_node(static_address: Option<&ResourceRef>) -> Self {
        let mut commands = vec![
            "apt update".to_string(),
            "apt install snapd".to_string(),
            "snap install microk8s --classic".to_string(),
            format!("usermod -a -G microk8s {ADMIN_USER}"),
            format!("chown -f -R {ADMIN_USER} ~/.kube"),
            "microk8s status --wait-ready".to_string(),
        ];

        let mut enable = "microk8s enable dns storage helm3".to_string();
        if let Some(address) = static_address {
            enable.push_str(&format!(" metallb:{}", address.token()));
        }
        commands.push(enable);

        Self { commands }
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Render as a user-data shell script
    pub fn render(&self) -> String {
        let mut script = String::from("#!/bin/bash\n");
        for command in &self.commands {
            script.push_str(command);
            script.push('\n');
        }
        script
    }
}
