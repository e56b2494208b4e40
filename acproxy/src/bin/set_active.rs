//! Publishes or clears the active-NameNode record, the way a failover
//! controller would, so the proxy can be driven without a real HA pair.

use std::time::Duration;

use clap::Parser;

use acproxy_discovery::{
    leader_info::{ActiveNodeInfo, encode_leader},
    zookeeper::ZkCoordinator,
};

#[derive(Parser)]
#[command(version, about = "Set or clear the active NameNode record in ZooKeeper")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1:2181")]
    zk_servers: String,

    #[arg(long, default_value = "/hadoop-ha/ns1/ActiveBreadCrumb")]
    path: String,

    /// Host of the new active NameNode; omit together with --clear
    #[arg(long)]
    hostname: Option<String>,

    #[arg(long, default_value = "ns1")]
    nameservice: String,

    #[arg(long, default_value = "nn1")]
    namenode: String,

    /// Delete the record, as when the active NameNode goes away
    #[arg(long)]
    clear: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let zk = ZkCoordinator::connect(&cli.zk_servers, Duration::from_secs(5)).await?;

    if cli.clear {
        let removed = zk.remove(&cli.path).await?;
        println!("{} {}", if removed { "cleared" } else { "already empty:" }, cli.path);
        return Ok(());
    }

    let Some(hostname) = cli.hostname else {
        return Err("either --hostname or --clear is required".into());
    };

    let info = ActiveNodeInfo {
        nameservice_id: cli.nameservice,
        namenode_id: cli.namenode,
        hostname,
        port: 8020,
        zkfc_port: 8019,
    };
    zk.publish(&cli.path, &encode_leader(&info)).await?;
    println!("{} now points at {}", cli.path, info.hostname);
    Ok(())
}
