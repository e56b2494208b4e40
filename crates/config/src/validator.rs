use log::{error, info};

use crate::config::{Config, GlobalConfig, HdfsConfig};

pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

pub fn validate(config: &Config) -> bool {
    info!("Starting configuration validation...");

    if !validate_global(&config.global) {
        return false;
    }

    if let Some(hdfs) = &config.hdfs
        && !validate_hdfs(hdfs)
    {
        return false;
    }

    info!("Configuration validation passed successfully");

    true
}

pub fn validate_global(global: &GlobalConfig) -> bool {
    // --- Validate Log level ---
    if !VALID_LOG_LEVELS
        .iter()
        .any(|lvl| lvl.eq_ignore_ascii_case(&global.log_level))
    {
        error!("Invalid log level: {}", global.log_level);
        return false;
    }

    // --- Validate listen address ---
    if global.listen_address.is_empty() {
        error!("Listen address is empty");
        return false;
    }

    // --- Validate listen port ---
    if global.server_port == 0 {
        error!("Invalid listen port: 0 (must be between 1 and 65535)");
        return false;
    }

    // --- Validate retry policy ---
    if global.retry_attempts == 0 {
        error!("Retry attempts must be at least 1");
        return false;
    }

    if global.recent_request_nums == 0 {
        error!("Recent request buffer size must be at least 1");
        return false;
    }

    true
}

pub fn validate_hdfs(hdfs: &HdfsConfig) -> bool {
    if hdfs.zk_servers.is_empty() {
        error!("No ZooKeeper servers configured for hdfs provider");
        return false;
    }

    if !hdfs.zk_lock_path.starts_with('/') {
        error!(
            "ZooKeeper lock path must be absolute, found '{}'",
            hdfs.zk_lock_path
        );
        return false;
    }

    if hdfs.max_connections == 0 {
        error!("Max connections is invalid (0) for hdfs provider");
        return false;
    }

    if hdfs.webhdfs_port == 0 {
        error!("WebHDFS port is invalid (0) for hdfs provider");
        return false;
    }

    if hdfs.request_timeout_ms == 0 {
        error!("Request timeout is invalid (0) for hdfs provider");
        return false;
    }

    if hdfs.poll_interval_ms == 0 {
        error!("Poll interval is invalid (0) for hdfs provider");
        return false;
    }

    if hdfs.zk_connect_timeout_ms == 0 {
        error!("ZooKeeper connect timeout is invalid (0) for hdfs provider");
        return false;
    }

    true
}
