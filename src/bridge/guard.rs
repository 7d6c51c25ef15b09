//! Readiness guard for bridge operations.
//!
//! Every operation checks this before touching a service; until
//! `AppState::initialize` has run migrations and wired the services, calls
//! are rejected with [`APP_NOT_READY`]. The CLI uses [`BLOCKED_EXIT_CODE`]
//! for any refused operation so automation can detect it uniformly.

use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::model::APP_NOT_READY;
use crate::state::AppState;

/// User-facing message presented while startup is still in flight.
pub const NOT_READY_MESSAGE: &str = "The application is still starting. Try again in a moment.";
/// Exit status used by CLI subcommands when an operation is refused rather
/// than failed.
pub const BLOCKED_EXIT_CODE: i32 = 2;

#[must_use = "Readiness must be checked before running an operation"]
#[derive(Debug)]
pub struct ReadyGuard {
    _private: (),
}

impl ReadyGuard {
    fn new() -> Self {
        Self { _private: () }
    }
}

pub fn ensure_ready(state: &AppState) -> AppResult<ReadyGuard> {
    if !state.is_ready() {
        warn!(target: "consulta", event = "bridge_blocked_not_ready");
        return Err(AppError::new(APP_NOT_READY, NOT_READY_MESSAGE));
    }
    Ok(ReadyGuard::new())
}
