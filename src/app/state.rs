//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{RefereeController, RefereeHandle};
use crate::util::rate_limit::ControlRateLimiter;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub referee: RefereeHandle,
    pub control_limiter: ControlRateLimiter,
}

impl AppState {
    /// Build the state and start the referee controller on the current runtime
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let referee = RefereeController::spawn(config.match_settings.clone());

        // Floods from a team are dropped before they reach the controller
        let control_limiter = ControlRateLimiter::new(config.control_rate_limit);

        Self {
            config,
            referee,
            control_limiter,
        }
    }
}
