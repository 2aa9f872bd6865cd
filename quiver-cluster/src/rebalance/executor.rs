//! Sequential, fail-fast transfer execution

use super::{RebalanceOutcome, RebalancePlan, ShardTransfer};
use crate::error::RebalanceError;
use crate::metrics;
use crate::remote::guarded;
use futures::stream::{self, TryStreamExt};
use quiver_client::{ClientError, ClusterApi};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Issues planned transfers one at a time against the cluster-update endpoint
///
/// At most one transfer is in flight. The first transfer that fails, is
/// rejected, or is cancelled stops execution; nothing after it is sent.
pub struct RebalanceExecutor<'a, A: ClusterApi + ?Sized> {
    api: &'a A,
}

/// Why a transfer did not go through
enum TransferError {
    /// The cluster answered, but did not acknowledge the operation
    Rejected { status: String },
    /// `sent` is set once the request may have reached the cluster
    Cancelled { sent: bool },
    Failed(RebalanceError),
}

impl TransferError {
    fn status(&self) -> String {
        match self {
            TransferError::Rejected { status } => status.clone(),
            TransferError::Cancelled { .. } => failure_status(&RebalanceError::Cancelled),
            TransferError::Failed(err) => failure_status(err),
        }
    }

    fn detail(&self, transfer: &ShardTransfer) -> String {
        match self {
            TransferError::Rejected { status } => {
                format!("Cluster did not acknowledge {}: {}", transfer, status)
            }
            TransferError::Cancelled { sent: true } => {
                format!("Cancelled while waiting for {}; its outcome is unknown", transfer)
            }
            TransferError::Cancelled { sent: false } => {
                format!("Cancelled before {}", transfer)
            }
            TransferError::Failed(err) => format!("Failed to {}: {}", transfer, err),
        }
    }
}

struct TransferFailure {
    issued: usize,
    transfer: ShardTransfer,
    error: TransferError,
}

impl<'a, A: ClusterApi + ?Sized> RebalanceExecutor<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Execute `plan`, timing the outcome from `started`
    ///
    /// With `dry_run`, every transfer is only logged and the outcome is
    /// always successful.
    pub async fn execute(
        &self,
        plan: &RebalancePlan,
        dry_run: bool,
        started: Instant,
        cancel: &CancellationToken,
    ) -> RebalanceOutcome {
        let planned = plan.len();

        if dry_run {
            for transfer in &plan.transfers {
                info!("[dry run] Would {}", transfer);
            }
            return RebalanceOutcome::succeeded(
                format!("Dry run: {} transfers planned", planned),
                started.elapsed(),
            )
            .with_counts(planned, 0);
        }

        if plan.is_empty() {
            info!("Nothing to {}", plan.kind.as_str());
            return RebalanceOutcome::succeeded("No transfers needed", started.elapsed())
                .with_counts(0, 0);
        }

        let result = stream::iter(plan.transfers.iter().map(Ok))
            .try_fold(0usize, |issued, transfer| async move {
                self.issue(transfer, cancel)
                    .await
                    .map(|()| issued + 1)
                    .map_err(|error| TransferFailure {
                        issued: match &error {
                            TransferError::Cancelled { sent: false } => issued,
                            _ => issued + 1,
                        },
                        transfer: transfer.clone(),
                        error,
                    })
            })
            .await;

        match result {
            Ok(issued) => {
                info!("Executed {} transfers", issued);
                RebalanceOutcome::succeeded(
                    format!("Executed {} transfers", issued),
                    started.elapsed(),
                )
                .with_counts(planned, issued)
            }
            Err(failure) => {
                let status = failure.error.status();
                let detail = failure.error.detail(&failure.transfer);
                error!(
                    "{} ({} of {} transfers issued)",
                    detail, failure.issued, planned
                );
                RebalanceOutcome::failed(status, detail, started.elapsed())
                    .with_counts(planned, failure.issued)
            }
        }
    }

    async fn issue(
        &self,
        transfer: &ShardTransfer,
        cancel: &CancellationToken,
    ) -> Result<(), TransferError> {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled { sent: false });
        }

        debug!("Issuing {}", transfer);
        let operation = transfer.to_operation();
        let request_start = Instant::now();

        let result = guarded(
            cancel,
            self.api
                .update_collection_cluster_setup(&transfer.collection, &operation),
        )
        .await;
        metrics::record_transfer_duration(request_start.elapsed());

        match result {
            Ok(ack) if ack.accepted => {
                metrics::record_transfer_issued(&transfer.collection, transfer.is_move);
                info!("Issued {}", transfer);
                Ok(())
            }
            Ok(ack) => {
                metrics::record_transfer_failed(&transfer.collection, "rejected");
                Err(TransferError::Rejected { status: ack.status })
            }
            Err(RebalanceError::Cancelled) => {
                metrics::record_transfer_failed(&transfer.collection, "cancelled");
                Err(TransferError::Cancelled { sent: true })
            }
            Err(err) => {
                metrics::record_transfer_failed(&transfer.collection, err.error_type());
                Err(TransferError::Failed(err))
            }
        }
    }
}

/// Status line for an error folded into a failed outcome
///
/// Errors reported by the cluster keep their message verbatim.
pub(crate) fn failure_status(err: &RebalanceError) -> String {
    match err {
        RebalanceError::Client(ClientError::Api { message, .. }) => message.clone(),
        RebalanceError::Cancelled => "cancelled".to_string(),
        other => other.to_string(),
    }
}
