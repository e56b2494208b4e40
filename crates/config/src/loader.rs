use std::{collections::BTreeMap, fs};

use serde_yaml::{Mapping, Value};

use crate::config::{
    Config, EnvLookup, GLOBAL_SECTION, GlobalConfig, HDFS_SECTION, HdfsConfig, Section,
    process_env,
};
use crate::error::ConfigError;

pub fn read_config(filename: &str) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(filename).map_err(|source| ConfigError::Read {
        path: filename.to_string(),
        source,
    })?;

    parse_config(&text, filename, process_env())
}

/// Builds a [`Config`] from YAML text, resolving overrides through `env`.
pub fn parse_config(text: &str, origin: &str, env: EnvLookup) -> Result<Config, ConfigError> {
    let document: Mapping = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
        path: origin.to_string(),
        source,
    })?;

    let global = section(&document, GLOBAL_SECTION, &env)?
        .ok_or_else(|| ConfigError::MissingSection(GLOBAL_SECTION.to_string()))?;
    let global = GlobalConfig::from_section(&global)?;

    let hdfs = match section(&document, HDFS_SECTION, &env)? {
        Some(section) => Some(HdfsConfig::from_section(&section)?),
        None => None,
    };

    Ok(Config { global, hdfs })
}

fn section(document: &Mapping, name: &str, env: &EnvLookup) -> Result<Option<Section>, ConfigError> {
    let body = match document.get(name) {
        Some(Value::Mapping(body)) => body,
        Some(Value::Null) | None => return Ok(None),
        Some(_) => {
            return Err(ConfigError::InvalidValue {
                key: name.to_string(),
                value: "non-mapping section".to_string(),
                expected: "a key/value mapping",
            });
        }
    };

    let mut values = BTreeMap::new();
    for (key, value) in body {
        let key = match key {
            Value::String(key) => key.clone(),
            Value::Number(key) => key.to_string(),
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: name.to_string(),
                    value: format!("{key:?}"),
                    expected: "string keys",
                });
            }
        };
        values.insert(key, value.clone());
    }

    Ok(Some(Section::new(name, values, env.clone())))
}
