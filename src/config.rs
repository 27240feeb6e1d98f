//! Runtime configuration
//!
//! One `Config` value is loaded per process run and passed by reference to the
//! components that need file locations or remediation endpoints.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level configuration.
///
/// Loaded from a TOML file given on the command line, or built with
/// `Config::default()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON file where validated remediations are appended
    pub remediations_history_path: PathBuf,
    /// Folder holding the per-action-type cost parameter files
    pub cost_parameters_path: PathBuf,
    /// Destination of the DNAT rule of a packet redirection
    pub ddos_mitigation_server: String,
    /// Black hole used by packet redirections
    pub black_hole_address: String,
    /// Filtering equipment used by packet redirections
    pub ddos_filtering_equipment_address: String,
    /// Hop limit of the routing simulation
    pub max_hops: usize,
    /// Previous maximum used to normalize the global score
    pub previous_max_score: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remediations_history_path: PathBuf::from("remediations-history.json"),
            cost_parameters_path: PathBuf::from("cost-parameters"),
            ddos_mitigation_server: "127.0.0.1".to_string(),
            black_hole_address: "blackhole".to_string(),
            ddos_filtering_equipment_address: "127.0.0.1".to_string(),
            max_hops: 64,
            previous_max_score: 1.0,
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        log::info!("Configuration loaded from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = Config::from_toml_str("max_hops = 12\n").unwrap();
        assert_eq!(config.max_hops, 12);
        assert_eq!(config.previous_max_score, 1.0);
        assert_eq!(config.remediations_history_path, PathBuf::from("remediations-history.json"));
    }

    #[test]
    fn invalid_toml_is_reported() {
        assert!(Config::from_toml_str("max_hops = [").is_err());
    }
}
