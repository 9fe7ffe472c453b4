//! Bus plus database services, started together.

use crate::config::SimConfig;
use luna_db::{DbError, DbService};
use shared_bus::{BusError, LunaBus};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Start-up failures.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("no database services configured")]
    NoDbServices,

    #[error("failed to register service: {0}")]
    Bus(#[from] BusError),

    #[error("failed to load snapshot: {0}")]
    Snapshot(#[from] DbError),
}

/// A running simulator.
#[derive(Debug)]
pub struct Simulator {
    bus: Arc<LunaBus>,
    dbs: Vec<DbService>,
}

impl Simulator {
    /// Start the bus dispatcher, register every database service and load
    /// the snapshot, if any.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(config: SimConfig) -> Result<Self, RuntimeError> {
        if config.db_services.is_empty() {
            return Err(RuntimeError::NoDbServices);
        }

        let bus = LunaBus::start(config.bus.clone());
        let mut dbs = Vec::with_capacity(config.db_services.len());
        for name in &config.db_services {
            dbs.push(DbService::start(&bus, name, config.store.clone())?);
        }

        if let (Some(path), Some(first)) = (&config.snapshot, dbs.first()) {
            let count = first.load_snapshot(path)?;
            info!(service = %first.name(), path = %path.display(), count, "Snapshot loaded");
        }

        info!(
            services = ?config.db_services,
            strict = config.bus.strict_unknown_services,
            "Simulator started"
        );
        Ok(Self { bus, dbs })
    }

    pub fn bus(&self) -> &Arc<LunaBus> {
        &self.bus
    }

    pub fn db_services(&self) -> &[DbService] {
        &self.dbs
    }

    /// Database service registered under `name`.
    pub fn db(&self, name: &str) -> Option<&DbService> {
        self.dbs.iter().find(|db| db.name() == name)
    }

    /// Unregister the database services. Calls in flight still get answers
    /// from handlers that already ran; new calls see unknown services.
    pub fn shutdown(self) {
        for db in &self.dbs {
            self.bus.unregister_service(db.name());
        }
        info!(deliveries = self.bus.deliveries(), "Simulator stopped");
    }
}
