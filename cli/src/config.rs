//! Configuration management for the slot storage location and hydration
//! policy.

use color_eyre::eyre::Result;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "config.yml";
pub const DEFAULT_SLOTS_DIR: &str = "slots";

/// Persisted settings for slotcli
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub storage_dir: String,
    pub initialize_with_value: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: String::new(),
            initialize_with_value: true,
        }
    }
}

impl Config {
    /// Creates a new config storing slots in storage_dir
    pub fn new(storage_dir: String) -> Self {
        Self {
            storage_dir,
            ..Self::default()
        }
    }
}

/// Persists and retrieves the config from a YAML file.
#[derive(Builder)]
#[builder(setter(into), build_fn(private, name = "_build"))]
pub struct ConfigManager {
    /// The slot directory to use when no config file is found
    default_storage_dir: String,
    /// The path the config file
    path: String,
    #[builder(setter(skip))]
    config: Config,
}

impl ConfigManagerBuilder {
    pub fn build(&self) -> Result<ConfigManager> {
        let mut manager = self._build()?;

        let f = std::fs::File::open(&manager.path);

        match f {
            Ok(file) => {
                manager.config = match serde_yaml::from_reader(file) {
                    Ok(c) => c,
                    Err(e) => {
                        log::warn!(
                            "Failed to parse config file, using defaults: {}",
                            e
                        );
                        Config::new(manager.default_storage_dir.clone())
                    }
                };
                Ok(manager)
            }
            Err(_) => {
                manager.config =
                    Config::new(manager.default_storage_dir.clone());
                manager.write()?;
                Ok(manager)
            }
        }
    }
}

impl ConfigManager {
    /// Returns a new instance of ConfigManagerBuilder.
    pub fn builder() -> ConfigManagerBuilder {
        ConfigManagerBuilder::default()
    }

    /// Returns the loaded config
    pub fn get(&self) -> Config {
        self.config.clone()
    }

    /// Replaces the config and persists it to disk.
    pub fn update_config(&mut self, new_config: Config) -> Result<()> {
        self.config = new_config;
        self.write()
    }

    fn write(&mut self) -> Result<()> {
        let serialized = serde_yaml::to_string(&self.config)?;
        std::fs::write(&self.path, serialized)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "./config_tests.rs"]
mod tests;
