//! dvsim - distance-vector routing simulator
//!
//! Builds a small fixed topology, seeds the first wave of advertisements and
//! lets every node actor relax its vector until the protocol goes quiet.
//! The converged tables are printed and checked against a centralized
//! shortest-path computation.
//!
//! ## Configuration
//!
//! All settings come from `DVSIM_*` environment variables; see `config.rs`.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use dvsim_routing::{reference, DistanceVector, Graph, NodeName};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod topology;

use config::{Config, LogFormat, OutputFormat};

/// Final state printed with `DVSIM_OUTPUT=json`.
#[derive(Debug, Serialize)]
struct Report {
    converged: bool,
    matches_reference: bool,
    dropped_advertisements: u64,
    routes: BTreeMap<NodeName, DistanceVector>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config);

    info!(
        mailbox_capacity = config.mailbox_capacity,
        overflow = ?config.overflow,
        max_latency_ms = config.max_latency_ms,
        latency_seed = ?config.latency_seed,
        "Configuration loaded"
    );

    let mut graph = Graph::with_config(config.graph_config());

    let errors = topology::build(&mut graph).await;
    if !errors.is_empty() {
        warn!(count = errors.len(), "Topology built with errors");
    }

    // Let every Connect land before showing the direct-edge view.
    graph.wait_for_quiescence(config.settle_timeout()).await?;
    if config.output == OutputFormat::Text {
        println!("Graph:\n{}", graph.describe());
    }

    info!("Broadcasting initial distance vectors");
    graph.broadcast().await;

    let converged = tokio::select! {
        result = graph.wait_for_quiescence(config.settle_timeout()) => match result {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Protocol did not settle");
                false
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            false
        }
    };

    let routes = graph.snapshot();
    let matches_reference = reference::tables_match(&routes, &graph.reference_table());

    match config.output {
        OutputFormat::Text => println!("Graph:\n{}", graph.describe()),
        OutputFormat::Json => {
            let report = Report {
                converged,
                matches_reference,
                dropped_advertisements: graph.dropped_advertisements(),
                routes,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    graph.shutdown().await;

    if converged && !matches_reference {
        bail!("converged routing tables differ from the reference shortest paths");
    }
    if !converged {
        bail!("protocol did not converge");
    }

    info!("Simulation complete");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries the routing tables.
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
