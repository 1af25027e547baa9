//! CLI commands for the hybrid blockchain node.
use clap::{Parser, Subcommand};

/// Hybrid blockchain node
#[derive(Parser)]
#[clap(name = "hybrid-node", version, about, long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Option<Commands>,

    /// Run as development node with additional debugging features
    #[clap(long, global = true)]
    pub dev: bool,

    /// TCP port for the RLPx transport
    #[clap(long, global = true, default_value_t = 30303)]
    pub tcp_port: u16,

    /// UDP port for peer discovery
    #[clap(long, global = true, default_value_t = 30303)]
    pub udp_port: u16,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the node's network host
    Start,
    /// Print node configuration
    Config,
    /// Run a short interpreter demo and print its result
    Demo,
}
