//! Configuration management for StarNotary

use serde::Deserialize;
use std::fs;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_data_dir")]
    pub path: String,
}

pub fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    let config_str = fs::read_to_string("config.toml").unwrap_or_default();
    let config: Config = if config_str.is_empty() {
        // Provide sane defaults when config.toml is absent
        Config {
            network: NetworkConfig {
                api_port: default_api_port(),
            },
            database: DatabaseConfig {
                path: default_data_dir(),
            },
        }
    } else {
        toml::from_str(&config_str)?
    };

    if config.database.path.is_empty() {
        return Err("database.path must be set in config.toml".into());
    }

    Ok(config)
}

fn default_api_port() -> u16 {
    8000
}

fn default_data_dir() -> String {
    "./chaindata".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: Config = toml::from_str("[network]\n[database]\n").unwrap();
        assert_eq!(config.network.api_port, 8000);
        assert_eq!(config.database.path, "./chaindata");
    }

    #[test]
    fn test_explicit_values_override_defaults() {
        let config: Config =
            toml::from_str("[network]\napi_port = 9000\n[database]\npath = \"/tmp/stars\"\n")
                .unwrap();
        assert_eq!(config.network.api_port, 9000);
        assert_eq!(config.database.path, "/tmp/stars");
    }
}
