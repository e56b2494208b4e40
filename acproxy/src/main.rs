//! Active-NameNode proxy: a single stable HTTP address in front of an HDFS HA pair.

use std::{net::SocketAddr, process, sync::Arc};

use clap::Parser;
use log::{error, info};
use tokio::net::TcpListener;

use acproxy_config::validator::validate as validate_config;
use acproxy_edge::{ProxyServer, RetryPolicy};
use acproxy_provider::{HdfsProvider, Provider, ProviderKind};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path of the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Proxy provider type
    #[arg(short = 't', long = "type", default_value = "hdfs")]
    provider_type: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match acproxy_config::loader::read_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("Error loading config: {}", err);
            process::exit(1);
        }
    };

    if let Err(err) =
        acproxy_utils::logger::init_logger(&config.global.log_level, config.global.log_file.as_deref())
    {
        eprintln!("Error opening log file: {}", err);
        process::exit(1);
    }

    if !validate_config(&config) {
        error!("Configuration validation failed. Exiting...");
        process::exit(1);
    }

    let kind: ProviderKind = match cli.provider_type.parse() {
        Ok(kind) => kind,
        Err(err) => {
            error!("{}", err);
            process::exit(1);
        }
    };

    let provider: Arc<dyn Provider> = match kind {
        ProviderKind::Hdfs => {
            let hdfs = match config.hdfs() {
                Ok(hdfs) => hdfs,
                Err(err) => {
                    error!("{}", err);
                    process::exit(1);
                }
            };
            match HdfsProvider::connect(hdfs).await {
                Ok(provider) => Arc::new(provider),
                Err(err) => {
                    error!("Failed to start {}: {}", kind, err);
                    process::exit(1);
                }
            }
        }
    };

    let addr = format!("{}:{}", config.global.listen_address, config.global.server_port);
    let addr: SocketAddr = match addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!("Invalid listen address {}: {}", addr, err);
            process::exit(1);
        }
    };
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("Failed to bind {}: {}", addr, err);
            process::exit(1);
        }
    };

    info!("Proxy is starting with provider {}", kind);
    let server = Arc::new(ProxyServer::new(
        vec![provider],
        RetryPolicy::from_config(&config.global),
        config.global.recent_request_nums,
    ));

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", err);
            std::future::pending::<()>().await;
        }
    };

    if let Err(err) = server.serve(listener, shutdown).await {
        error!("Proxy stopped: {}", err);
        process::exit(1);
    }
    info!("Proxy stopped");
}
