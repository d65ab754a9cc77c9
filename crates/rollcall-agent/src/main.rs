use clap::Parser;
use tracing::{error, info};

use rollcall_agent::signal::spawn_signal_listener;
use rollcall_agent::{
    Agent, AgentConfig, Cli, LoggingConfig, init_logging, install_metrics_exporter,
};
use rollcall_membership::ShutdownSignal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AgentConfig::load(&cli)?;

    let _logging_guard = init_logging(&LoggingConfig::from_section(&config.logging))?;

    info!(
        node_id = config.node_id(),
        backend = %config.storage.backend,
        version = env!("CARGO_PKG_VERSION"),
        "Starting rollcall agent"
    );

    if let Some(addr) = config.metrics_listen()? {
        install_metrics_exporter(addr)?;
    }

    let shutdown = ShutdownSignal::new();
    spawn_signal_listener(shutdown.clone());

    let agent = match Agent::start(config, shutdown).await {
        Ok(agent) => agent,
        Err(e) => {
            error!("Failed to start agent: {:#}", e);
            return Err(e);
        }
    };

    agent.run().await
}
