pub mod conversations;
pub mod error;
pub mod extract;
pub mod groups;
pub mod messages;
pub mod reactions;
pub mod session;
pub mod users;

use parley_core::CoreResult;
use tracing::error;

use crate::error::ApiError;

/// Run a core operation off the async runtime. rusqlite work is blocking,
/// so every handler funnels through here.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {e}");
            ApiError::internal(e)
        })?
        .map_err(ApiError::from)
}
