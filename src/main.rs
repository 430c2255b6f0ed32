//! TCP Bridge Command Line Tool
//!
//! This binary is the command-line interface for TCP Bridge.

use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;

use tcp_bridge::{Bridge, VERSION, APP_NAME};
use tcp_bridge::common::{Result, init_logger};
use tcp_bridge::config::{
    self, ConfigSource, ConfigValues, EnvSource, FileSource, ValuesSource,
};

/// TCP Bridge: relay every connection on a local port to a fixed target
#[derive(Parser, Debug)]
#[clap(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Host to listen on
    #[clap(long = "l-host", alias = "l_host")]
    listen_host: Option<String>,

    /// Port to listen on
    #[clap(long = "l-port", alias = "l_port")]
    listen_port: Option<u16>,

    /// Target host every connection is relayed to
    #[clap(long = "s-host", alias = "s_host")]
    target_host: Option<String>,

    /// Target port every connection is relayed to
    #[clap(long = "s-port", alias = "s_port")]
    target_port: Option<u16>,

    /// Load configuration from a JSON file
    #[clap(long)]
    config_file: Option<PathBuf>,

    /// Load configuration from TCP_BRIDGE_* environment variables
    #[clap(long)]
    from_env: bool,

    /// Log level
    #[clap(long)]
    log_level: Option<String>,

    /// Poll interval for accept and readiness waits, in milliseconds
    #[clap(long)]
    poll_interval_ms: Option<u64>,

    /// Read chunk size in bytes
    #[clap(long)]
    buffer_size: Option<usize>,

    /// Upstream connect timeout in seconds
    #[clap(long)]
    connect_timeout: Option<u64>,
}

impl Args {
    fn values(&self) -> ConfigValues {
        ConfigValues {
            listen_host: self.listen_host.clone(),
            listen_port: self.listen_port,
            target_host: self.target_host.clone(),
            target_port: self.target_port,
            poll_interval_ms: self.poll_interval_ms,
            buffer_size: self.buffer_size,
            connect_timeout: self.connect_timeout,
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Lowest to highest priority
    let file_source = args.config_file.as_ref().map(FileSource::new);
    let env_source = args.from_env.then(EnvSource::default);
    let cli_source = ValuesSource(args.values());

    let mut sources: Vec<&dyn ConfigSource> = Vec::new();
    if let Some(source) = &file_source {
        sources.push(source);
    }
    if let Some(source) = &env_source {
        sources.push(source);
    }
    sources.push(&cli_source);

    let config = config::load_config(&sources)?;

    init_logger(&config.log_level);

    info!("Starting {} v{}", APP_NAME, VERSION);
    for warning in config::check_warnings(&config) {
        warn!("{}", warning);
    }

    info!("Configuration loaded successfully");
    info!("Listen address: {}:{}", config.listen_host, config.listen_port);
    info!("Target service: {}", config.target_label());

    let mut bridge = Bridge::new(config)?;

    let shutdown = bridge.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    info!("Bridge ready, press Ctrl+C to stop");

    bridge.start(true).await?;

    info!("Bridge stopped");
    Ok(())
}
