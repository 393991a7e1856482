//! End-to-end reconciliation scenarios over the component seams.
//!
//! These tests drive the real reconciler and, where possible, the real
//! matching logic, with the store and external collaborators replaced by
//! in-memory doubles.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use energy_broker::chain::{satisfies, ChainObserver, PaymentVerifier, Transfer, TronAddress};
use energy_broker::config::ChainConfig;
use energy_broker::event::create_event_channel;
use energy_broker::invoice::{Invoice, InvoiceStatus, NewInvoice};
use energy_broker::market::{ResourceMarket, ResourcePackage};
use energy_broker::notify::Notifier;
use energy_broker::store::{InvoiceStore, MemoryInvoiceStore};
use energy_broker::Reconciler;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// Well-known receiving address used across the scenarios (the USDT
// contract, convenient because its hex form is a fixed point).
const RECEIVER_BASE58: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
const RECEIVER_HEX: &str = "41a614f803b6fd780986a42c78ec9c7f77e6ded13c";

/// Verifier that replays a fixed transfer ledger through the real
/// `satisfies` matching, as the chain observer would.
struct LedgerVerifier {
    receiver: TronAddress,
    transfers: Vec<Transfer>,
}

impl LedgerVerifier {
    fn new(transfers: Vec<Transfer>) -> Self {
        Self {
            receiver: TronAddress::parse(RECEIVER_BASE58).expect("should decode"),
            transfers,
        }
    }
}

#[async_trait]
impl PaymentVerifier for LedgerVerifier {
    async fn is_paid(&self, invoice: &Invoice) -> bool {
        satisfies(&self.transfers, &self.receiver, invoice.final_price_trx)
    }
}

#[derive(Default)]
struct RecordingMarket {
    delegations: Mutex<Vec<(String, u64)>>,
}

#[async_trait]
impl ResourceMarket for RecordingMarket {
    async fn packages(&self, _receiver: &str) -> Vec<ResourcePackage> {
        Vec::new()
    }

    async fn delegate(&self, wallet: &str, amount: u64) {
        self.delegations
            .lock()
            .expect("lock should not be poisoned")
            .push((wallet.to_string(), amount));
    }
}

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: i64, text: &str) {
        self.messages
            .lock()
            .expect("lock should not be poisoned")
            .push((user_id, text.to_string()));
    }
}

struct Harness {
    store: Arc<MemoryInvoiceStore>,
    market: Arc<RecordingMarket>,
    notifier: Arc<RecordingNotifier>,
    reconciler: Reconciler,
}

fn harness(verifier: Arc<dyn PaymentVerifier>) -> Harness {
    let store = Arc::new(MemoryInvoiceStore::new());
    let market = Arc::new(RecordingMarket::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let (events_tx, _events_rx) = create_event_channel();
    let reconciler = Reconciler::new(
        Arc::clone(&store) as Arc<dyn InvoiceStore>,
        verifier,
        Arc::clone(&market) as Arc<dyn ResourceMarket>,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        Duration::from_secs(30),
        events_tx,
    );
    Harness {
        store,
        market,
        notifier,
        reconciler,
    }
}

/// Build an invoice with `final_price_trx` of exactly `base * 1.0` and the
/// given age, and seed it into the store.
async fn seed_invoice(
    store: &MemoryInvoiceStore,
    id: u64,
    final_price_trx: f64,
    age: ChronoDuration,
) -> Invoice {
    // Zero commission keeps the threshold equal to the base price, which
    // keeps the transfer amounts in the scenarios easy to read.
    let mut invoice = NewInvoice::priced(
        i64::try_from(id).expect("small id"),
        "TDestinationWallet",
        131_000,
        final_price_trx,
        0.0,
        "TRX-scenario",
    )
    .into_invoice(id);
    invoice.created_at = Utc::now() - age;
    invoice.expires_at = invoice.created_at + ChronoDuration::minutes(20);
    store.insert_raw(invoice.clone()).await;
    invoice
}

fn transfer(amount_sun: u64) -> Transfer {
    Transfer {
        to_address: RECEIVER_HEX.to_string(),
        amount_sun,
    }
}

/// Scenario A: a satisfying transfer arrives mid-window; the invoice is
/// paid and delegation is invoked exactly once with its wallet and amount.
#[tokio::test]
async fn satisfying_transfer_settles_the_invoice() {
    let h = harness(Arc::new(LedgerVerifier::new(vec![transfer(10_000_000)])));
    let invoice = seed_invoice(&h.store, 1, 10.0, ChronoDuration::minutes(5)).await;

    h.reconciler.tick().await;

    let stored = h.store.get(invoice.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InvoiceStatus::Paid);

    let delegations = h.market.delegations.lock().unwrap().clone();
    assert_eq!(
        delegations,
        vec![("TDestinationWallet".to_string(), 131_000)]
    );

    let messages = h.notifier.messages.lock().unwrap().clone();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, 1);
    assert!(messages[0].1.contains("Payment received"));
}

/// Scenario B: no satisfying transfer ever arrives; past the validity
/// window the invoice expires and no delegation is made.
#[tokio::test]
async fn unpaid_invoice_expires_without_delegation() {
    let h = harness(Arc::new(LedgerVerifier::new(Vec::new())));
    let invoice = seed_invoice(&h.store, 1, 10.0, ChronoDuration::minutes(21)).await;

    h.reconciler.tick().await;

    let stored = h.store.get(invoice.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InvoiceStatus::Expired);
    assert!(h.market.delegations.lock().unwrap().is_empty());

    let messages = h.notifier.messages.lock().unwrap().clone();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].1.contains("expired"));
}

/// A transfer short of the threshold keeps the invoice pending, and the
/// next tick picks it up again once a satisfying transfer exists.
#[tokio::test]
async fn short_transfer_waits_for_a_satisfying_one() {
    let h = harness(Arc::new(LedgerVerifier::new(vec![transfer(9_999_999)])));
    let invoice = seed_invoice(&h.store, 1, 10.0, ChronoDuration::minutes(5)).await;

    h.reconciler.tick().await;
    let stored = h.store.get(invoice.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InvoiceStatus::Pending);
    assert!(h.market.delegations.lock().unwrap().is_empty());
}

/// Scenario C: simulation mode reports payment one minute after creation
/// with no real transfer anywhere.
#[tokio::test]
async fn simulated_payment_settles_after_the_delay() {
    let observer = Arc::new(ChainObserver::new(&ChainConfig {
        simulate_payments: true,
        simulated_delay_secs: 60,
        ..ChainConfig::default()
    }));
    let h = harness(observer);
    let invoice = seed_invoice(&h.store, 1, 10.0, ChronoDuration::seconds(61)).await;

    h.reconciler.tick().await;

    let stored = h.store.get(invoice.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InvoiceStatus::Paid);
    assert_eq!(h.market.delegations.lock().unwrap().len(), 1);
}

/// Simulation mode respects the delay: a younger invoice stays pending.
#[tokio::test]
async fn simulated_payment_waits_for_the_delay() {
    let observer = Arc::new(ChainObserver::new(&ChainConfig {
        simulate_payments: true,
        simulated_delay_secs: 60,
        ..ChainConfig::default()
    }));
    let h = harness(observer);
    let invoice = seed_invoice(&h.store, 1, 10.0, ChronoDuration::seconds(10)).await;

    h.reconciler.tick().await;

    let stored = h.store.get(invoice.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InvoiceStatus::Pending);
}

/// Scenario D: transfers are not consumed, so one transfer can satisfy two
/// pending invoices to the shared receiving address. Both settle and both
/// trigger a delegation. This is documented behavior, not a bug being
/// hidden: a reservation scheme would need per-invoice payment references.
#[tokio::test]
async fn one_transfer_can_settle_two_invoices() {
    let h = harness(Arc::new(LedgerVerifier::new(vec![transfer(10_000_000)])));
    let first = seed_invoice(&h.store, 1, 10.0, ChronoDuration::minutes(3)).await;
    let second = seed_invoice(&h.store, 2, 10.0, ChronoDuration::minutes(2)).await;

    h.reconciler.tick().await;

    let first = h.store.get(first.id).await.unwrap().unwrap();
    let second = h.store.get(second.id).await.unwrap().unwrap();
    assert_eq!(first.status, InvoiceStatus::Paid);
    assert_eq!(second.status, InvoiceStatus::Paid);
    assert_eq!(h.market.delegations.lock().unwrap().len(), 2);
}

/// Terminal states are sticky across ticks: re-running the loop over a
/// settled ledger performs no further transitions or delegations.
#[tokio::test]
async fn repeated_ticks_are_idempotent() {
    let h = harness(Arc::new(LedgerVerifier::new(vec![transfer(10_000_000)])));
    seed_invoice(&h.store, 1, 10.0, ChronoDuration::minutes(5)).await;

    h.reconciler.tick().await;
    h.reconciler.tick().await;
    h.reconciler.tick().await;

    assert_eq!(h.market.delegations.lock().unwrap().len(), 1);
    assert_eq!(h.notifier.messages.lock().unwrap().len(), 1);
}
