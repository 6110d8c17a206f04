use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "cardfeed",
    about = "Cardfeed Server - Federated card cache daemon",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, env = "CARDFEED_PORT", default_value = "8046")]
    pub port: u16,

    #[arg(short, long, env = "CARDFEED_BIND", default_value = "127.0.0.1")]
    pub bind: String,

    #[arg(short, long, env = "CARDFEED_CONFIG", help = "Path to config.json")]
    pub config: Option<PathBuf>,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the daemon (default if no command specified)")]
    Serve,

    #[command(about = "Print the effective configuration as JSON")]
    ShowConfig,

    #[command(about = "Write the effective configuration to the config path")]
    InitConfig,
}
