//! # Database Service
//!
//! Puts a [`Database`] on the bus under a service name.
//!
//! ## Method Table
//!
//! | Path | Handler |
//! |------|---------|
//! | `/reserveIds`, `/get`, `/put`, `/merge`, `/mergePut`, `/del` | document operations |
//! | `/find` | query, paging, streaming watch with `watch: true` |
//! | `/watch` | one-shot watch |
//! | `/batch` | fan-out of `put`, `get`, `del`, `find`, `merge` |
//! | `/dump`, `/load`, `/compact`, `/purge`, `/purgeStatus` | whole-store operations |
//! | [`NOT_IMPLEMENTED`] | `{returnValue: false, message: "<path> not implemented"}` |

mod channel;
mod handlers;
mod params;

use crate::domain::database::Database;
use crate::domain::errors::DbError;
use crate::domain::value_objects::StoreConfig;
use parking_lot::Mutex;
use shared_bus::{BusError, LunaBus, Message, Service};
use shared_types::Response;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Methods registered as not implemented.
pub const NOT_IMPLEMENTED: [&str; 10] = [
    "/delKind",
    "/getProfile",
    "/profile",
    "/putKind",
    "/putPermissions",
    "/putQuotas",
    "/quotaStats",
    "/removeAppData",
    "/search",
    "/stats",
];

/// Methods a `/batch` operation may name.
pub const BATCH_METHODS: [&str; 5] = ["put", "get", "del", "find", "merge"];

type Handler = fn(&Mutex<Database>, &Message) -> Result<Response, DbError>;

/// A database registered on the bus.
pub struct DbService {
    service: Arc<Service>,
    db: Arc<Mutex<Database>>,
}

impl DbService {
    /// Create the service `name` on `bus` and register every method.
    pub fn start(bus: &Arc<LunaBus>, name: &str, config: StoreConfig) -> Result<Self, BusError> {
        let service = bus.create_service(name);
        let db = Arc::new(Mutex::new(Database::new(config)));
        register_methods(&service, &db)?;
        info!(service = %name, methods = service.methods().len(), "Database service started");
        Ok(Self { service, db })
    }

    pub fn name(&self) -> &str {
        self.service.name()
    }

    pub fn service(&self) -> &Arc<Service> {
        &self.service
    }

    pub fn database(&self) -> &Arc<Mutex<Database>> {
        &self.db
    }

    /// Replace the store contents with a snapshot file.
    pub fn load_snapshot(&self, path: &Path) -> Result<usize, DbError> {
        self.db.lock().load(path)
    }
}

impl std::fmt::Debug for DbService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbService")
            .field("name", &self.name())
            .field("documents", &self.db.lock().store().count())
            .finish()
    }
}

fn route(
    service: &Service,
    db: &Arc<Mutex<Database>>,
    path: &str,
    handler: Handler,
) -> Result<(), BusError> {
    let db = db.clone();
    service.register(path, move |msg| {
        let response = handler(&db, &msg).unwrap_or_else(|err| {
            debug!(origin = %msg.origin(), code = err.code(), error = %err, "Request failed");
            err.into()
        });
        msg.respond(response);
    })?;
    Ok(())
}

fn register_methods(service: &Arc<Service>, db: &Arc<Mutex<Database>>) -> Result<(), BusError> {
    for path in NOT_IMPLEMENTED {
        service.register_not_implemented(path)?;
    }

    route(service, db, "/reserveIds", handlers::reserve_ids)?;
    route(service, db, "/get", handlers::get)?;
    route(service, db, "/del", handlers::del)?;
    route(service, db, "/put", handlers::put)?;
    route(service, db, "/merge", handlers::merge)?;
    route(service, db, "/mergePut", handlers::merge_put)?;
    route(service, db, "/dump", handlers::dump)?;
    route(service, db, "/load", handlers::load)?;
    route(service, db, "/compact", handlers::compact)?;
    route(service, db, "/purge", handlers::purge)?;
    route(service, db, "/purgeStatus", handlers::purge_status)?;

    // Subscriptions that end remove their watch, keyed by message token.
    for (path, handler) in [
        ("/find", handlers::find as fn(&Mutex<Database>, Message)),
        ("/watch", handlers::watch),
    ] {
        let request_db = db.clone();
        let cancel_db = db.clone();
        service.register_with_cancel(
            path,
            move |msg| handler(&request_db, msg),
            move |msg| {
                cancel_db.lock().unwatch(&msg.unique_token);
            },
        )?;
    }

    let weak = Arc::downgrade(service);
    service.register("/batch", move |msg| handlers::batch(&weak, msg))?;
    Ok(())
}
