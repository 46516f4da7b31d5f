use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "reelio-server", version, about = "Stream resolution and delivery engine")]
pub struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(long, env = "REELIO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address, overrides the config file.
    #[arg(long, env = "REELIO_BIND")]
    pub bind: Option<SocketAddr>,
}
