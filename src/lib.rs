pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(test)]
pub(crate) mod test_utils;

use config::Config;
use services::store::SheetStore;

// Application state
pub struct AppState {
    pub config: Config,
    pub store: SheetStore,
}

impl AppState {
    pub fn new(config: Config, store: SheetStore) -> Self {
        Self { config, store }
    }
}
