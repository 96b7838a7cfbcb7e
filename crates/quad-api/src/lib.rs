pub mod error;
pub mod feed;
pub mod middleware;
pub mod moderation;
pub mod posts;
pub mod routes;
pub mod rsvps;
pub mod state;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, AppStateInner, Settings};

use anyhow::anyhow;
use tracing::error;

/// Runs blocking SQLite work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> quad_policy::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError(quad_policy::Error::Storage(anyhow!("worker task failed: {}", e)))
        })?
        .map_err(ApiError)
}
