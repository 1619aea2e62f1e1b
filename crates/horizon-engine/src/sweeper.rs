//! # Reservation Sweeper
//!
//! Reclaims seats whose hold ran out before the payment resolved.
//!
//! ## Sweep Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Reservation Sweeper                                │
//! │                                                                         │
//! │  every interval_secs:                                                  │
//! │                                                                         │
//! │  1. ledger.expired_holds(now, batch_size)                              │
//! │        held reservations with expires_at <= now, oldest first          │
//! │                                                                         │
//! │  2. for each hold:                                                     │
//! │     ├── has an order ──► cancel_payment(order.payment_id)              │
//! │     │                    (payment, order and hold change in one tx,    │
//! │     │                     the buyer is told the order was cancelled)   │
//! │     └── no order     ──► ledger.release(hold)                          │
//! │                          (checkout died before recording anything)     │
//! │                                                                         │
//! │  3. one hold failing (e.g. the payment completed meanwhile) is logged  │
//! │     and skipped; the rest of the batch still runs                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::box_office::BoxOffice;
use crate::error::{EngineError, EngineResult};
use horizon_core::Reservation;

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub payments_cancelled: usize,
    pub holds_released: usize,
    pub failed: usize,
}

pub struct ReservationSweeper {
    office: BoxOffice,
    interval: Duration,
    batch_size: i64,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping a running sweeper.
#[derive(Clone)]
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SweeperHandle {
    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> EngineResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| EngineError::ChannelError("Shutdown channel closed".into()))
    }
}

impl ReservationSweeper {
    pub fn new(office: BoxOffice) -> (Self, SweeperHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let sweeper = ReservationSweeper {
            interval: office.config().sweep_interval(),
            batch_size: office.config().sweeper.batch_size,
            office,
            shutdown_rx,
        };

        (sweeper, SweeperHandle { shutdown_tx })
    }

    /// Runs until [`SweeperHandle::shutdown`]. Spawn it as a background task.
    pub async fn run(mut self) {
        info!(interval = ?self.interval, batch_size = self.batch_size, "Reservation sweeper starting");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!(?e, "Reservation sweep failed");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Reservation sweeper shutting down");
                    break;
                }
            }
        }

        info!("Reservation sweeper stopped");
    }

    /// Handles one batch of expired holds.
    pub async fn sweep_once(&self) -> EngineResult<SweepReport> {
        let now = self.office.now();
        let holds = self
            .office
            .db()
            .ledger()
            .expired_holds(now, self.batch_size)
            .await?;

        let mut report = SweepReport {
            expired: holds.len(),
            ..SweepReport::default()
        };

        if holds.is_empty() {
            debug!("No expired holds");
            return Ok(report);
        }

        for hold in &holds {
            match self.reclaim(hold).await {
                Ok(Reclaimed::PaymentCancelled) => report.payments_cancelled += 1,
                Ok(Reclaimed::HoldReleased) => report.holds_released += 1,
                Ok(Reclaimed::Nothing) => {}
                Err(e) => {
                    report.failed += 1;
                    warn!(reservation_id = %hold.id, error = %e, "Could not reclaim expired hold");
                }
            }
        }

        info!(
            expired = report.expired,
            payments_cancelled = report.payments_cancelled,
            holds_released = report.holds_released,
            failed = report.failed,
            "Sweep complete"
        );
        Ok(report)
    }

    async fn reclaim(&self, hold: &Reservation) -> EngineResult<Reclaimed> {
        let db = self.office.db();

        match db.orders().get_by_reservation(&hold.id).await? {
            Some(order) => {
                let outcome = self.office.cancel_payment(&order.payment_id).await?;
                Ok(if outcome.is_applied() {
                    Reclaimed::PaymentCancelled
                } else {
                    Reclaimed::Nothing
                })
            }
            None => {
                let outcome = db.ledger().release(&hold.id, self.office.now()).await?;
                Ok(if outcome.is_applied() {
                    Reclaimed::HoldReleased
                } else {
                    Reclaimed::Nothing
                })
            }
        }
    }
}

enum Reclaimed {
    PaymentCancelled,
    HoldReleased,
    Nothing,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{buy, setup, ts};
    use chrono::Duration as ChronoDuration;
    use horizon_core::{GatewayPayload, GatewayStatus, PaymentStatus};

    #[tokio::test]
    async fn test_expired_purchase_is_cancelled() {
        let mut fx = setup(10).await;
        let receipt = buy(&fx, 4).await;
        let (sweeper, _handle) = ReservationSweeper::new(fx.office.clone());

        // Still inside the hold window
        fx.clock.advance(ChronoDuration::seconds(899));
        assert_eq!(sweeper.sweep_once().await.unwrap().expired, 0);

        fx.clock.advance(ChronoDuration::seconds(1));
        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report.payments_cancelled, 1);
        assert_eq!(fx.office.available_seats(&fx.event.id).await.unwrap(), 10);

        let payment = fx.office.db().payments().require(&receipt.payment.id).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Cancelled);
        assert_eq!(fx.inbox.next().await.subject, "Payment Cancelled - Summer Concert");

        // A late success is refused and changes nothing
        let err = fx
            .office
            .confirm_payment(&receipt.payment.id, GatewayStatus::Completed, GatewayPayload::default())
            .await
            .unwrap_err();
        assert!(err.as_domain().is_some());
        assert_eq!(sweeper.sweep_once().await.unwrap(), SweepReport::default());
    }

    #[tokio::test]
    async fn test_orphan_hold_is_released() {
        let fx = setup(10).await;
        fx.office
            .db()
            .ledger()
            .reserve(&fx.event.id, 5, None, ts(30), ts(0))
            .await
            .unwrap();
        assert_eq!(fx.office.available_seats(&fx.event.id).await.unwrap(), 5);

        fx.clock.set(ts(31));
        let (sweeper, _handle) = ReservationSweeper::new(fx.office.clone());
        let report = sweeper.sweep_once().await.unwrap();

        assert_eq!(report.holds_released, 1);
        assert_eq!(report.payments_cancelled, 0);
        assert_eq!(fx.office.available_seats(&fx.event.id).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_confirmed_purchase_is_left_alone() {
        let mut fx = setup(10).await;
        let receipt = buy(&fx, 2).await;
        fx.office
            .confirm_payment(&receipt.payment.id, GatewayStatus::Completed, GatewayPayload::default())
            .await
            .unwrap();
        fx.inbox.next().await;

        fx.clock.advance(ChronoDuration::hours(2));
        let (sweeper, _handle) = ReservationSweeper::new(fx.office.clone());
        assert_eq!(sweeper.sweep_once().await.unwrap().expired, 0);
        assert_eq!(fx.office.available_seats(&fx.event.id).await.unwrap(), 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_loop_sweeps_and_shuts_down() {
        let fx = setup(10).await;
        buy(&fx, 3).await;
        fx.clock.advance(ChronoDuration::hours(1));

        let (sweeper, handle) = ReservationSweeper::new(fx.office.clone());
        let task = tokio::spawn(sweeper.run());

        // The first interval tick fires immediately
        let mut restored = false;
        for _ in 0..100 {
            if fx.office.available_seats(&fx.event.id).await.unwrap() == 10 {
                restored = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(restored);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }
}
