use std::sync::Arc;

use quad_db::Database;
use quad_policy::feed::FeedLimits;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub settings: Settings,
}

/// Runtime knobs read from configuration at startup.
#[derive(Debug, Clone, Copy, Default)]
pub struct Settings {
    /// Refuse `going` once an event's `max_slots` is reached. Advisory otherwise.
    pub enforce_capacity: bool,
    pub feed_limits: FeedLimits,
}
