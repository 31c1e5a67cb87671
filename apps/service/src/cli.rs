//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "netpulse", version, about = "Partitioned reachability monitor")]
pub struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/netpulse/config.toml)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Override the HTTP bind address
    #[arg(long)]
    pub bind: Option<String>,

    /// Override the HTTP port
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Print the resolved configuration and exit
    #[arg(long)]
    pub print_config: bool,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
