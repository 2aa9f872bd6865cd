//! Cancellation-aware remote calls

use crate::error::{RebalanceError, Result};
use quiver_client::ClientError;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Await a remote call unless `cancel` fires first
///
/// A cancelled call is abandoned mid-flight; whatever it did on the server
/// side has an unknown outcome.
pub(crate) async fn guarded<T, F>(cancel: &CancellationToken, call: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, ClientError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RebalanceError::Cancelled),
        result = call => result.map_err(RebalanceError::from),
    }
}
