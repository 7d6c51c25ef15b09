pub mod backup;
pub mod bridge;
pub mod config;
pub mod error;
pub mod ledger;
pub mod migrate;
pub mod model;
pub mod repo;
pub mod service;
pub mod state;
pub mod store;
pub mod time;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use state::AppState;
pub use store::Store;

/// Install the global tracing subscriber. Safe to call more than once;
/// later calls are no-ops. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "consulta=info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
