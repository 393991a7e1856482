//! Invoice persistence.
//!
//! The reconciler is the sole writer of invoice status; the front end only
//! creates invoices and reads state. [`InvoiceStore`] captures that contract,
//! and the `mark_*` operations enforce the one-way `pending -> paid|expired`
//! transition at the store boundary so no caller can resurrect a settled
//! invoice.

mod memory;
mod sled;

pub use self::memory::MemoryInvoiceStore;
pub use self::sled::SledInvoiceStore;

use crate::invoice::{Invoice, NewInvoice};
use crate::Result;
use async_trait::async_trait;

/// Durable record of invoices and their status.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Persist a new pending invoice and return it with its assigned id.
    async fn create(&self, new: NewInvoice) -> Result<Invoice>;

    /// Fetch a single invoice.
    async fn get(&self, id: u64) -> Result<Option<Invoice>>;

    /// All invoices still awaiting payment, in id order.
    async fn list_pending(&self) -> Result<Vec<Invoice>>;

    /// Transition a pending invoice to paid.
    ///
    /// Fails if the invoice does not exist or is no longer pending.
    async fn mark_paid(&self, id: u64) -> Result<()>;

    /// Transition a pending invoice to expired.
    ///
    /// Fails if the invoice does not exist or is no longer pending.
    async fn mark_expired(&self, id: u64) -> Result<()>;
}
