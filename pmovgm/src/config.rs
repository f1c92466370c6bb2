//! Loader configuration.
//!
//! Values come from three layers, later ones winning: the embedded
//! `pmovgm.yaml`, an optional user YAML file, then `PMOVGM_CONFIG__*`
//! environment variables (`PMOVGM_CONFIG__SOURCE__BUFFER_SIZE=4096`).
//! Keys are case-insensitive.

use std::{env, fs, path::Path};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::info;

use crate::{decoder::DEFAULT_SCAN_CHUNK_SIZE, source::DEFAULT_BUFFER_SIZE};

const DEFAULT_CONFIG: &str = include_str!("pmovgm.yaml");
const ENV_PREFIX: &str = "PMOVGM_CONFIG__";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Read buffer of [`FileSource`](crate::source::FileSource), in bytes.
    pub buffer_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Window used when looking for the last Ogg page.
    pub scan_chunk_size: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            scan_chunk_size: DEFAULT_SCAN_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// An `EnvFilter` directive, `info` or `pmovgm=trace` for instance.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub source: SourceConfig,
    pub decoder: DecoderConfig,
    pub log: LogConfig,
}

impl LoaderConfig {
    /// Loads the configuration, merging `path` over the defaults when given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let user = match path {
            Some(path) => {
                let data = fs::read_to_string(path)
                    .map_err(|e| anyhow!("Cannot read config file {}: {}", path.display(), e))?;
                info!(config_file = %path.display(), "Loaded config file");
                Some(data)
            }
            None => None,
        };
        Self::from_layers(user.as_deref(), env::vars())
    }

    /// Builds a configuration from a user YAML document and `(name, value)`
    /// environment pairs.
    pub fn from_layers<I>(user_yaml: Option<&str>, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut value = lower_keys_value(serde_yaml::from_str(DEFAULT_CONFIG)?);
        if let Some(user_yaml) = user_yaml {
            let external: Value = serde_yaml::from_str(user_yaml)?;
            // an empty file parses as null
            if !external.is_null() {
                merge_yaml(&mut value, external);
            }
        }
        apply_env_overrides(&mut value, vars);
        Ok(serde_yaml::from_value(value)?)
    }

    /// Filter directive for `tracing_subscriber::EnvFilter`.
    pub fn tracing_filter(&self) -> &str {
        &self.log.level
    }
}

fn apply_env_overrides<I>(config: &mut Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let Some(path) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let key_path = path.split("__").collect::<Vec<_>>();
        let _ = set_value(config, &key_path, convert_env_value(&value));
    }
}

fn convert_env_value(value: &str) -> Value {
    serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn set_value(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((first, rest)) = path.split_first() else {
        *data = value;
        return Ok(());
    };
    let Value::Mapping(map) = data else {
        return Err(anyhow!("Current node is not a map"));
    };
    let key = Value::String(first.to_lowercase());
    if rest.is_empty() {
        map.insert(key, value);
        Ok(())
    } else {
        let entry = map.entry(key).or_insert(Value::Mapping(Mapping::new()));
        set_value(entry, rest, value)
    }
}

fn lower_key(key: Value) -> Value {
    match key {
        Value::String(s) => Value::String(s.to_lowercase()),
        other => other,
    }
}

fn lower_keys_value(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| (lower_key(k), lower_keys_value(v)))
                .collect(),
        ),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys_value).collect()),
        _ => value,
    }
}

/// Folds `external` into the lower-cased tree `target`. Keys are matched
/// case-insensitively; anything that is not a mapping on both sides is
/// replaced.
fn merge_yaml(target: &mut Value, external: Value) {
    match (target, external) {
        (Value::Mapping(section), Value::Mapping(overrides)) => {
            for (key, value) in overrides {
                let key = lower_key(key);
                match section.get_mut(&key) {
                    Some(slot) => merge_yaml(slot, value),
                    None => {
                        section.insert(key, lower_keys_value(value));
                    }
                }
            }
        }
        (slot, value) => *slot = lower_keys_value(value),
    }
}
