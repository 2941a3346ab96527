//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::game::TeamColor;

/// Rate limiter keyed by team
pub type TeamLimiter = RateLimiter<TeamColor, DefaultKeyedStateStore<TeamColor>, DefaultClock>;

/// Per-team control packet limiter
#[derive(Clone)]
pub struct ControlRateLimiter {
    limiter: Arc<TeamLimiter>,
}

impl ControlRateLimiter {
    pub fn new(packets_per_second: u32) -> Self {
        let quota =
            Quota::per_second(NonZeroU32::new(packets_per_second).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Check if a packet from `team` is allowed (returns true if allowed)
    pub fn check(&self, team: TeamColor) -> bool {
        self.limiter.check_key(&team).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teams_are_limited_independently() {
        let limiter = ControlRateLimiter::new(1);
        assert!(limiter.check(TeamColor::Green));
        assert!(!limiter.check(TeamColor::Green));
        assert!(limiter.check(TeamColor::Blue));
    }
}
