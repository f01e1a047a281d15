//! Stack Synthesizer
//!
//! Synthesizes the single-node MicroK8s deployment and prints the resource
//! graph as JSON on stdout, for handing to the external provisioning
//! engine or for inspection.
//!
//! Run with: cargo run --bin stack-synth
//!
//! Set RUST_LOG=debug to see per-resource emission logging.

use anyhow::{Context, Result};
use microk8s_stack::{StackConfig, StackTemplate};
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = StackConfig::single_node();
    let graph =
        StackTemplate::synthesize(&config).context("Failed to synthesize resource graph")?;

    info!(
        stack_id = %graph.stack_id,
        resources = graph.len(),
        "synthesis complete"
    );

    for output in &graph.outputs {
        info!(name = %output.name, value = %output.value, "stack output");
    }

    let json = serde_json::to_string_pretty(&graph).context("Failed to serialize graph")?;
    println!("{json}");

    Ok(())
}
