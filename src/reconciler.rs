//! The reconciliation loop.
//!
//! On a fixed cadence the reconciler loads every pending invoice and
//! classifies it: past its expiry window it becomes `expired`; with a
//! satisfying on-chain payment it becomes `paid`, delegation is requested,
//! and the user is told; otherwise it waits for the next tick. Expiry is
//! checked before payment, so a late transfer to an expired invoice never
//! resurrects it.
//!
//! The loop is the sole writer of invoice status. Invoices are processed
//! sequentially and fault-isolated: one invoice's store, network, or
//! notification failure never aborts the tick for the rest. Ticks cannot
//! overlap (the next sleep starts only after a tick completes), and
//! shutdown lets an in-flight tick finish.

use crate::chain::PaymentVerifier;
use crate::event::{BrokerEvent, BrokerEventsSender};
use crate::invoice::Invoice;
use crate::market::ResourceMarket;
use crate::notify::Notifier;
use crate::store::InvoiceStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Per-invoice classification for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    StillPending,
    ExpiredNow,
    PaidNow,
}

/// Drives invoice status from pending to a terminal state.
pub struct Reconciler {
    store: Arc<dyn InvoiceStore>,
    verifier: Arc<dyn PaymentVerifier>,
    market: Arc<dyn ResourceMarket>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    events_tx: BrokerEventsSender,
}

impl Reconciler {
    /// Assemble a reconciler from its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn InvoiceStore>,
        verifier: Arc<dyn PaymentVerifier>,
        market: Arc<dyn ResourceMarket>,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
        events_tx: BrokerEventsSender,
    ) -> Self {
        Self {
            store,
            verifier,
            market,
            notifier,
            interval,
            events_tx,
        }
    }

    /// Process the entire pending set once.
    pub async fn tick(&self) {
        let pending = match self.store.list_pending().await {
            Ok(pending) => pending,
            Err(e) => {
                error!("Failed to load pending invoices: {e}");
                self.emit(BrokerEvent::Error {
                    message: format!("pending invoice load failed: {e}"),
                });
                return;
            }
        };

        if pending.is_empty() {
            debug!("No pending invoices");
            return;
        }

        debug!("Reconciling {} pending invoices", pending.len());
        let mut paid = 0usize;
        let mut expired = 0usize;
        for invoice in &pending {
            match self.process_invoice(invoice).await {
                Outcome::PaidNow => paid += 1,
                Outcome::ExpiredNow => expired += 1,
                Outcome::StillPending => {}
            }
        }
        debug!(
            "Tick complete: {paid} paid, {expired} expired, {} still pending",
            pending.len() - paid - expired
        );
    }

    /// Run ticks forever at the configured interval until shutdown.
    ///
    /// An in-flight tick always completes; the shutdown signal is only
    /// observed between ticks.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            "Reconciler running with a {}s interval",
            self.interval.as_secs()
        );

        loop {
            self.tick().await;

            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Reconciler stopped");
    }

    async fn process_invoice(&self, invoice: &Invoice) -> Outcome {
        if invoice.is_expired_at(Utc::now()) {
            return self.expire(invoice).await;
        }

        if !self.verifier.is_paid(invoice).await {
            return Outcome::StillPending;
        }

        self.settle(invoice).await
    }

    async fn expire(&self, invoice: &Invoice) -> Outcome {
        info!("Invoice {} expired", invoice.id);

        if let Err(e) = self.store.mark_expired(invoice.id).await {
            error!("Failed to persist expiry of invoice {}: {e}", invoice.id);
            self.emit(BrokerEvent::Error {
                message: format!("expiry of invoice {} not persisted: {e}", invoice.id),
            });
            return Outcome::StillPending;
        }

        self.emit(BrokerEvent::InvoiceExpired {
            invoice_id: invoice.id,
        });
        self.notifier
            .notify(
                invoice.user_id,
                "This invoice has expired.\nPlease create a new one.",
            )
            .await;
        Outcome::ExpiredNow
    }

    async fn settle(&self, invoice: &Invoice) -> Outcome {
        info!("Invoice {} paid", invoice.id);

        // Persist first: a paid invoice must never be offered to the
        // verifier again, even if delegation below fails.
        if let Err(e) = self.store.mark_paid(invoice.id).await {
            error!("Failed to persist payment of invoice {}: {e}", invoice.id);
            self.emit(BrokerEvent::Error {
                message: format!("payment of invoice {} not persisted: {e}", invoice.id),
            });
            return Outcome::StillPending;
        }
        self.emit(BrokerEvent::InvoicePaid {
            invoice_id: invoice.id,
        });

        self.market
            .delegate(&invoice.wallet_address, invoice.energy_amount)
            .await;
        self.emit(BrokerEvent::DelegationRequested {
            invoice_id: invoice.id,
            wallet: invoice.wallet_address.clone(),
            amount: invoice.energy_amount,
        });

        self.notifier
            .notify(
                invoice.user_id,
                &format!(
                    "Payment received!\n\n{} energy has been delegated to:\n{}",
                    invoice.energy_amount, invoice.wallet_address
                ),
            )
            .await;
        Outcome::PaidNow
    }

    fn emit(&self, event: BrokerEvent) {
        let _ = self.events_tx.send(event);
    }
}
