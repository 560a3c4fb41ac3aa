mod cli;
mod commands;
mod common;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout belongs to the multiplexed process output.
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Run(args) => commands::run::execute(args).await,
        cli::Command::Check(args) => commands::check::execute(args).await,
        cli::Command::Status(args) => commands::status::execute(args).await,
        cli::Command::Stop(args) => commands::stop::execute(args).await,
    }
}
