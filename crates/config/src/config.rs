use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

use serde_yaml::Value;

use crate::default::{
    get_default_cancel_on_timeout, get_default_listen_address, get_default_log_level,
    get_default_poll_interval_ms, get_default_zk_connect_timeout_ms,
};
use crate::error::ConfigError;

pub const GLOBAL_SECTION: &str = "GLOBAL";
pub const HDFS_SECTION: &str = "HDFS";

// GLOBAL keys
pub const LOG_LEVEL_KEY: &str = "PROXY_LOG_LEVEL";
pub const LOG_FILE_KEY: &str = "PROXY_LOG_FILE";
pub const LISTEN_ADDRESS_KEY: &str = "PROXY_LISTEN_ADDRESS";
pub const SERVER_PORT_KEY: &str = "PROXY_SERVER_PORT";
pub const RETRY_ATTEMPTS_KEY: &str = "PROXY_RETRY_ATTEMPTS";
pub const RETRY_DELAY_KEY: &str = "PROXY_RETRY_DELAY";
pub const RECENT_REQUEST_NUMS_KEY: &str = "PROXY_RECENT_REQUEST_NUMS";

// HDFS keys
pub const ZK_SERVERS_KEY: &str = "HDFS_ZK_SERVERS";
pub const ZK_LOCK_PATH_KEY: &str = "HDFS_ZK_LOCK_PATH";
pub const ZK_CONNECT_TIMEOUT_KEY: &str = "HDFS_ZK_CONNECT_TIMEOUT";
pub const MAX_CONNECTIONS_KEY: &str = "HDFS_MAX_CONNECTIONS";
pub const WEBHDFS_PORT_KEY: &str = "HDFS_WEBHDFS_PORT";
pub const REQUEST_TIMEOUT_KEY: &str = "HDFS_REQUEST_TIMEOUT";
pub const POLL_INTERVAL_KEY: &str = "HDFS_POLL_INTERVAL";
pub const CANCEL_ON_TIMEOUT_KEY: &str = "HDFS_CANCEL_ON_TIMEOUT";

/// Source of override values consulted before the file.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub fn process_env() -> EnvLookup {
    Arc::new(|key| std::env::var(key).ok())
}

/// A flat key/value block of the config file.
///
/// Every accessor checks the identically named environment variable first;
/// a non-empty value there wins over the file. Values that do not parse as
/// the requested type are reported instead of falling back to a default.
#[derive(Clone)]
pub struct Section {
    name: String,
    values: BTreeMap<String, Value>,
    env: EnvLookup,
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Section")
            .field("name", &self.name)
            .field("values", &self.values)
            .finish()
    }
}

impl Section {
    pub fn new(name: impl Into<String>, values: BTreeMap<String, Value>, env: EnvLookup) -> Self {
        Self {
            name: name.into(),
            values,
            env,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_string(&self, key: &str) -> Result<String, ConfigError> {
        self.string_opt(key)?.ok_or_else(|| self.missing(key))
    }

    pub fn get_string_or(&self, key: &str, default: String) -> Result<String, ConfigError> {
        Ok(self.string_opt(key)?.unwrap_or(default))
    }

    pub fn get_u64(&self, key: &str) -> Result<u64, ConfigError> {
        self.u64_opt(key)?.ok_or_else(|| self.missing(key))
    }

    pub fn get_u64_or(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        Ok(self.u64_opt(key)?.unwrap_or(default))
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        if let Some(raw) = self.env_value(key) {
            return parse_bool(key, &raw);
        }

        match self.values.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(flag)) => Ok(*flag),
            Some(Value::String(raw)) => parse_bool(key, raw),
            Some(other) => Err(invalid(key, describe(other), "a boolean")),
        }
    }

    fn env_value(&self, key: &str) -> Option<String> {
        (self.env)(key).filter(|value| !value.is_empty())
    }

    fn string_opt(&self, key: &str) -> Result<Option<String>, ConfigError> {
        if let Some(raw) = self.env_value(key) {
            return Ok(Some(raw));
        }

        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(Value::Number(value)) => Ok(Some(value.to_string())),
            Some(Value::Bool(value)) => Ok(Some(value.to_string())),
            Some(other) => Err(invalid(key, describe(other), "a scalar value")),
        }
    }

    fn u64_opt(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        if let Some(raw) = self.env_value(key) {
            return parse_u64(key, &raw).map(Some);
        }

        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(value)) => value
                .as_u64()
                .map(Some)
                .ok_or_else(|| invalid(key, value.to_string(), "a non-negative integer")),
            Some(Value::String(raw)) => parse_u64(key, raw).map(Some),
            Some(other) => Err(invalid(key, describe(other), "a non-negative integer")),
        }
    }

    fn missing(&self, key: &str) -> ConfigError {
        ConfigError::MissingKey {
            section: self.name.clone(),
            key: key.to_string(),
        }
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| invalid(key, raw.to_string(), "a non-negative integer"))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(key, raw.to_string(), "a boolean")),
    }
}

fn describe(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|text| text.trim().to_string())
        .unwrap_or_else(|_| format!("{value:?}"))
}

fn invalid(key: &str, value: String, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value,
        expected,
    }
}

fn narrow<T: TryFrom<u64>>(key: &str, value: u64, expected: &'static str) -> Result<T, ConfigError> {
    T::try_from(value).map_err(|_| invalid(key, value.to_string(), expected))
}

#[derive(Debug, Clone)]
pub struct Config {
    pub global: GlobalConfig,

    // present only when the file carries an HDFS section
    pub hdfs: Option<HdfsConfig>,
}

impl Config {
    pub fn hdfs(&self) -> Result<&HdfsConfig, ConfigError> {
        self.hdfs
            .as_ref()
            .ok_or_else(|| ConfigError::MissingSection(HDFS_SECTION.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalConfig {
    pub log_level: String,
    pub log_file: Option<String>,
    pub listen_address: String,
    pub server_port: u16,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub recent_request_nums: usize,
}

impl GlobalConfig {
    pub fn from_section(section: &Section) -> Result<Self, ConfigError> {
        let log_file = section.get_string_or(LOG_FILE_KEY, String::new())?;

        Ok(Self {
            log_level: section.get_string_or(LOG_LEVEL_KEY, get_default_log_level())?,
            log_file: (!log_file.is_empty()).then_some(log_file),
            listen_address: section
                .get_string_or(LISTEN_ADDRESS_KEY, get_default_listen_address())?,
            server_port: narrow(
                SERVER_PORT_KEY,
                section.get_u64(SERVER_PORT_KEY)?,
                "a port number",
            )?,
            retry_attempts: narrow(
                RETRY_ATTEMPTS_KEY,
                section.get_u64(RETRY_ATTEMPTS_KEY)?,
                "a 32-bit attempt count",
            )?,
            retry_delay_ms: section.get_u64(RETRY_DELAY_KEY)?,
            recent_request_nums: narrow(
                RECENT_REQUEST_NUMS_KEY,
                section.get_u64(RECENT_REQUEST_NUMS_KEY)?,
                "a buffer size",
            )?,
        })
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HdfsConfig {
    pub zk_servers: Vec<String>,
    pub zk_lock_path: String,
    pub zk_connect_timeout_ms: u64,
    pub max_connections: usize,
    pub webhdfs_port: u16,
    pub request_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub cancel_on_timeout: bool,
}

impl HdfsConfig {
    pub fn from_section(section: &Section) -> Result<Self, ConfigError> {
        let zk_servers = section
            .get_string(ZK_SERVERS_KEY)?
            .split(',')
            .map(str::trim)
            .filter(|server| !server.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            zk_servers,
            zk_lock_path: section.get_string(ZK_LOCK_PATH_KEY)?,
            zk_connect_timeout_ms: section
                .get_u64_or(ZK_CONNECT_TIMEOUT_KEY, get_default_zk_connect_timeout_ms())?,
            max_connections: narrow(
                MAX_CONNECTIONS_KEY,
                section.get_u64(MAX_CONNECTIONS_KEY)?,
                "a connection count",
            )?,
            webhdfs_port: narrow(
                WEBHDFS_PORT_KEY,
                section.get_u64(WEBHDFS_PORT_KEY)?,
                "a port number",
            )?,
            request_timeout_ms: section.get_u64(REQUEST_TIMEOUT_KEY)?,
            poll_interval_ms: section
                .get_u64_or(POLL_INTERVAL_KEY, get_default_poll_interval_ms())?,
            cancel_on_timeout: section
                .get_bool_or(CANCEL_ON_TIMEOUT_KEY, get_default_cancel_on_timeout())?,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn zk_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.zk_connect_timeout_ms)
    }

    /// Connection string in the `host:port,host:port` form the ZooKeeper client expects.
    pub fn zk_cluster(&self) -> String {
        self.zk_servers.join(",")
    }
}
