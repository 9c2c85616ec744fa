use innkeep_approval::ApprovalService;
use innkeep_core::booking::BookingStatus;
use innkeep_shared::models::events::DecisionOutcome;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// What one poll of the worker did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickReport {
    /// The automation switch was off (or could not be evaluated).
    Disabled,
    Processed {
        attempted: usize,
        approved: usize,
        rejected: usize,
        failed: usize,
    },
}

impl TickReport {
    fn empty() -> Self {
        TickReport::Processed {
            attempted: 0,
            approved: 0,
            rejected: 0,
            failed: 0,
        }
    }
}

/// Periodically decides every pending booking while the `auto-approval`
/// switch is on.
pub struct AutoApprovalWorker {
    approvals: Arc<ApprovalService>,
    poll_interval: Duration,
    shutdown_grace: Duration,
}

impl AutoApprovalWorker {
    pub fn new(approvals: Arc<ApprovalService>, poll_interval: Duration, shutdown_grace: Duration) -> Self {
        Self {
            approvals,
            poll_interval,
            shutdown_grace,
        }
    }

    /// Runs until `shutdown` flips to `true` (or its sender is dropped).
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(poll_interval = ?self.poll_interval, "Starting auto-approval worker");

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }
            if *shutdown.borrow() {
                break;
            }

            let tick = self.tick(shutdown.clone());
            tokio::pin!(tick);
            tokio::select! {
                report = &mut tick => {
                    debug!(?report, "Auto-approval tick finished");
                }
                _ = shutdown.changed() => {
                    if tokio::time::timeout(self.shutdown_grace, &mut tick).await.is_err() {
                        warn!(grace = ?self.shutdown_grace, "Auto-approval tick abandoned at shutdown");
                    }
                    break;
                }
            }
        }

        info!("Auto-approval worker stopped");
    }

    /// One poll: check the switch, then decide each pending booking on its
    /// own. A failing booking is logged and skipped. Shutdown is observed
    /// between bookings.
    pub async fn tick(&self, shutdown: watch::Receiver<bool>) -> TickReport {
        if !self.approvals.automation_enabled().await {
            return TickReport::Disabled;
        }
        debug!("Auto-approval worker check - enabled");

        let bookings = match self.approvals.list_bookings(Some(BookingStatus::Pending)).await {
            Ok(bookings) => bookings,
            Err(e) => {
                error!(error = %e, "Error fetching pending bookings");
                return TickReport::empty();
            }
        };
        if bookings.is_empty() {
            return TickReport::empty();
        }

        info!(count = bookings.len(), "Processing pending bookings");
        let (mut attempted, mut approved, mut rejected, mut failed) = (0, 0, 0, 0);

        for booking in &bookings {
            if *shutdown.borrow() {
                info!(remaining = bookings.len() - attempted, "Shutdown requested, leaving bookings for the next run");
                break;
            }
            attempted += 1;
            match self.approvals.process_pending(booking).await {
                Ok(event) => match event.outcome {
                    DecisionOutcome::Approved => approved += 1,
                    DecisionOutcome::Rejected => rejected += 1,
                },
                Err(e) => {
                    failed += 1;
                    error!(booking_id = %booking.id, error = %e, "Error processing booking");
                }
            }
        }

        TickReport::Processed {
            attempted,
            approved,
            rejected,
            failed,
        }
    }
}
