use crate::cli::RunArgs;
use crate::common::load_config;
use anyhow::Context;
use pgvisor_core::{AdminControl, OutputMode};
use pgvisor_ipc::AdminServer;
use pgvisor_supervisor::{ChannelKind, Signal, Supervisor};
use std::sync::Arc;
use tracing::info;

pub async fn execute(args: RunArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref()).await?;
    if args.pipe {
        config.output = OutputMode::Pipe;
    }
    if let Some(ms) = args.graceful_timeout {
        config.graceful_timeout_ms = ms;
    }

    let specs = config.specs().context("Invalid process configuration")?;

    let mut supervisor = Supervisor::new(&config.name, config.graceful_timeout())
        .with_channel_kind(ChannelKind::from(config.output));
    for spec in specs {
        supervisor.add_spec(spec);
    }

    supervisor
        .stop_on_signal(&[Signal::Interrupt, Signal::Terminate])
        .context("Failed to install signal handlers")?;

    if let Some(path) = args.admin_socket.or_else(|| config.admin_socket.clone()) {
        let server = AdminServer::bind(&path)
            .await
            .with_context(|| format!("Failed to bind admin socket {}", path.display()))?;
        let control: Arc<dyn AdminControl> = Arc::new(supervisor.handle());
        supervisor.start_admin_listener(server.serve(control));
    }

    info!(
        "Running {} with {:?} output and a {:?} grace period",
        config.name,
        config.output,
        config.graceful_timeout()
    );
    supervisor.run().await?;
    Ok(())
}
