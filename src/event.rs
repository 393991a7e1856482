//! Broker event system.

use tokio::sync::broadcast;

/// Events emitted by the broker.
#[derive(Debug, Clone)]
pub enum BrokerEvent {
    /// Service has started successfully.
    Started,

    /// Service is shutting down.
    ShuttingDown,

    /// An invoice was paid and marked as such.
    InvoicePaid {
        /// Invoice identifier.
        invoice_id: u64,
    },

    /// An invoice passed its expiry without payment.
    InvoiceExpired {
        /// Invoice identifier.
        invoice_id: u64,
    },

    /// A delegation order was submitted to the resource market. Order
    /// failures are logged by the market client, not reported here.
    DelegationRequested {
        /// Invoice identifier.
        invoice_id: u64,
        /// Target wallet address.
        wallet: String,
        /// Delegated energy amount.
        amount: u64,
    },

    /// Error occurred.
    Error {
        /// Error message.
        message: String,
    },
}

/// Channel for receiving broker events.
pub type BrokerEventsChannel = broadcast::Receiver<BrokerEvent>;

/// Sender for broker events.
pub type BrokerEventsSender = broadcast::Sender<BrokerEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (BrokerEventsSender, BrokerEventsChannel) {
    broadcast::channel(256)
}
