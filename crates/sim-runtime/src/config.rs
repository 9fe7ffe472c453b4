//! Simulator configuration.

use luna_db::StoreConfig;
use shared_bus::BusConfig;
use std::env;
use std::path::PathBuf;

/// Database services started when `LUNA_DB_SERVICES` is unset.
pub const DEFAULT_DB_SERVICES: [&str; 2] = ["com.webos.service.db", "com.webos.service.tempdb"];

/// Everything the simulator needs to start.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub bus: BusConfig,
    pub store: StoreConfig,
    /// One database service is registered per name.
    pub db_services: Vec<String>,
    /// Snapshot loaded into the first database service at start.
    pub snapshot: Option<PathBuf>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            store: StoreConfig::default(),
            db_services: DEFAULT_DB_SERVICES.iter().map(ToString::to_string).collect(),
            snapshot: None,
        }
    }
}

impl SimConfig {
    /// Read bus, store and runtime settings from the environment.
    ///
    /// - `LUNA_DB_SERVICES`: comma-separated service names
    /// - `LUNA_DB_SNAPSHOT`: JSON snapshot path
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bus: BusConfig::from_env(),
            store: StoreConfig::from_env(),
            db_services: env::var("LUNA_DB_SERVICES")
                .ok()
                .map(|v| parse_services(&v))
                .filter(|names| !names.is_empty())
                .unwrap_or(defaults.db_services),
            snapshot: env::var_os("LUNA_DB_SNAPSHOT")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }
}

fn parse_services(value: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in value.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}
