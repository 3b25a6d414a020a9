//! Periodic store-to-backend reconciliation.
//!
//! A create whose backend write failed leaves a stored grant the backend does
//! not know about. The sweep re-propagates every stored grant on a fixed
//! interval until shutdown.
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::relation::RelationService;

/// Run [`RelationService::reconcile`] every `interval` until `shutdown` fires.
///
/// The first sweep runs immediately. Failed sweeps are logged and retried on
/// the next tick.
pub async fn run_reconciler(
    relations: Arc<RelationService>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match relations.reconcile().await {
            Ok(report) if report.failed > 0 => {
                tracing::warn!(
                    scanned = report.scanned,
                    failed = report.failed,
                    "reconciliation left relations unpropagated"
                );
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "reconciliation sweep failed"),
        }
    }
    tracing::debug!("reconciler stopped");
}
