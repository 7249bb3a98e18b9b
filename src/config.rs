use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::GdmError;

pub const DEFAULT_INSTANCE_KEY: &str = "__default";

/// On-disk configuration: a map of instance name to connection details, plus
/// an optional `__default` entry naming the instance used when none is given.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(
        rename = "__default",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub default_instance: Option<String>,
    #[serde(flatten)]
    pub instances: BTreeMap<String, InstanceConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstanceConfig {
    pub url: String,
    pub apikey: String,
}

pub fn global_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("GALAXY_DM_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".galaxy-dm.json"))
        .unwrap_or_else(|| PathBuf::from(".galaxy-dm.json"))
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the config file and pick one instance out of it.
    pub fn resolve(
        path: Option<&str>,
        instance: Option<&str>,
    ) -> Result<InstanceConfig, GdmError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => global_config_path(),
        };

        if !config_path.exists() {
            return Err(GdmError::MissingConfig(config_path));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| GdmError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| GdmError::ConfigParse(err.to_string()))?;

        Self::pick_instance(&config, instance)
    }

    pub fn pick_instance(
        config: &Config,
        instance: Option<&str>,
    ) -> Result<InstanceConfig, GdmError> {
        let name = match instance {
            Some(name) if name != DEFAULT_INSTANCE_KEY => name.to_string(),
            _ => config
                .default_instance
                .clone()
                .ok_or_else(|| GdmError::UnknownInstance(DEFAULT_INSTANCE_KEY.to_string()))?,
        };

        config
            .instances
            .get(&name)
            .cloned()
            .ok_or(GdmError::UnknownInstance(name))
    }

    /// Write a fresh config file with a single `local` instance set as the
    /// default. Refuses to clobber an existing file.
    pub fn write_initial(path: &Path, url: &str, apikey: &str) -> Result<(), GdmError> {
        if path.exists() {
            return Err(GdmError::ConfigExists(path.to_path_buf()));
        }

        let mut instances = BTreeMap::new();
        instances.insert(
            "local".to_string(),
            InstanceConfig {
                url: url.to_string(),
                apikey: apikey.to_string(),
            },
        );
        let config = Config {
            default_instance: Some("local".to_string()),
            instances,
        };

        let content = serde_json::to_string_pretty(&config)
            .map_err(|err| GdmError::ConfigParse(err.to_string()))?;
        fs::write(path, content).map_err(|err| GdmError::Filesystem(err.to_string()))?;
        Ok(())
    }
}
