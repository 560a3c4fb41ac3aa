use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pgvisor")]
#[command(about = "Process supervisor for a Postgres HA node", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start and supervise every configured process
    Run(RunArgs),

    /// Validate a configuration file and print its processes
    Check(CheckArgs),

    /// Show the processes of a running supervisor
    Status(StatusArgs),

    /// Ask a running supervisor to shut down gracefully
    Stop(StopArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Config file (searches ./pgvisor.json and ./config/pgvisor.json if omitted)
    #[arg(short, long, env = "PGVISOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Serve the admin socket at this path
    #[arg(long)]
    pub admin_socket: Option<PathBuf>,

    /// Connect children through pipes instead of pseudo-terminals
    #[arg(long)]
    pub pipe: bool,

    /// Grace period between the stop signal and SIGKILL (milliseconds)
    #[arg(long)]
    pub graceful_timeout: Option<u64>,
}

#[derive(Parser)]
pub struct CheckArgs {
    /// Config file (searches ./pgvisor.json and ./config/pgvisor.json if omitted)
    #[arg(short, long, env = "PGVISOR_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Parser)]
pub struct StatusArgs {
    /// Admin socket of the running supervisor
    #[arg(short, long)]
    pub socket: Option<PathBuf>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct StopArgs {
    /// Admin socket of the running supervisor
    #[arg(short, long)]
    pub socket: Option<PathBuf>,
}
