//! Shared application state for the API server.

use std::sync::Arc;

use atelier::Error;
use atelier::io::memory_store::MemoryStore;
use atelier::io::sqlite_store::SqliteStore;
use atelier::io::store::{Records, Store};
use atelier::lifecycle::Coordinator;

/// Store selected at startup: the SQLite database file, or memory only.
#[derive(Debug)]
pub enum ServerStore {
    Durable(SqliteStore),
    Ephemeral(MemoryStore),
}

impl Store for ServerStore {
    fn read<T>(&self, f: impl FnOnce(&dyn Records) -> Result<T, Error>) -> Result<T, Error> {
        match self {
            ServerStore::Durable(store) => store.read(f),
            ServerStore::Ephemeral(store) => store.read(f),
        }
    }

    fn transaction<T>(
        &self,
        f: impl FnOnce(&mut dyn Records) -> Result<T, Error>,
    ) -> Result<T, Error> {
        match self {
            ServerStore::Durable(store) => store.transaction(f),
            ServerStore::Ephemeral(store) => store.transaction(f),
        }
    }
}

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator<ServerStore>>,
}

impl AppState {
    pub fn new(coordinator: Coordinator<ServerStore>) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
        }
    }
}
