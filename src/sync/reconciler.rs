use std::{future::Future, pin::Pin, time::Duration};

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    error::SessionError,
    timer::{controller::ControllerHandle, store::ReconcileReport, TimerController},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

pub(crate) type SyncDriver = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Fetch the authoritative sessions covering everything tracked locally and
/// overwrite the local projection with them.
///
/// On a failed fetch the local projection is left exactly as it was.
pub async fn reconcile_once(controller: &TimerController) -> Result<ReconcileReport, SessionError> {
    let Some(query) = controller.read(|store| store.reconcile_query()).await else {
        return Ok(ReconcileReport::default());
    };

    let records = controller.service().list_sessions(&query).await?;
    let report = controller
        .update(|store, now| store.reconcile(&records, now))
        .await;
    controller.resolve_targets().await;

    for user in &report.dropped {
        log_warn!("no server session matches the timer tracked for {user}; dropping it");
    }
    for user in &report.clamped {
        log_warn!("server state for {user} gives negative elapsed time; clamped to zero");
    }
    if report.changed_anything() {
        log_debug!(
            "reconciled: {} updated, {} restored, {} finished, {} dropped",
            report.updated.len(),
            report.restored.len(),
            report.finished.len(),
            report.dropped.len()
        );
    }

    Ok(report)
}

/// Periodic reconciliation. The first fetch happens at `first_fetch`, then
/// every `period`; the loop ends on cancellation or once the controller is
/// gone.
///
/// Boxed because the loop re-arms itself through the controller.
pub(crate) fn sync_loop(
    handle: ControllerHandle,
    first_fetch: Instant,
    period: Duration,
    cancel_token: CancellationToken,
) -> SyncDriver {
    Box::pin(async move {
        let mut ticker = time::interval_at(first_fetch, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(controller) = handle.upgrade() else {
                        break;
                    };
                    if let Err(err) = reconcile_once(&controller).await {
                        log_warn!("reconciliation failed, keeping local state: {err}");
                    }
                }
                _ = cancel_token.cancelled() => {
                    log_debug!("sync driver stopped");
                    break;
                }
            }
        }
    })
}
