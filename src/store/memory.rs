//! In-memory invoice store for tests and ephemeral runs.

use crate::invoice::{Invoice, InvoiceStatus, NewInvoice};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::InvoiceStore;

/// Invoice store held entirely in memory.
///
/// Same contract as the sled store, without durability. Used by the test
/// suite and by `--ephemeral` runs where losing invoices on restart is
/// acceptable.
#[derive(Default)]
pub struct MemoryInvoiceStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    invoices: BTreeMap<u64, Invoice>,
}

impl MemoryInvoiceStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pre-built invoice, keeping the id it carries. Test helper
    /// for scenarios that need control over timestamps.
    pub async fn insert_raw(&self, invoice: Invoice) {
        let mut inner = self.inner.write().await;
        inner.next_id = inner.next_id.max(invoice.id + 1);
        inner.invoices.insert(invoice.id, invoice);
    }
}

#[async_trait]
impl InvoiceStore for MemoryInvoiceStore {
    async fn create(&self, new: NewInvoice) -> Result<Invoice> {
        let mut inner = self.inner.write().await;
        let id = inner.next_id;
        inner.next_id += 1;
        let invoice = new.into_invoice(id);
        inner.invoices.insert(id, invoice.clone());
        Ok(invoice)
    }

    async fn get(&self, id: u64) -> Result<Option<Invoice>> {
        Ok(self.inner.read().await.invoices.get(&id).cloned())
    }

    async fn list_pending(&self) -> Result<Vec<Invoice>> {
        Ok(self
            .inner
            .read()
            .await
            .invoices
            .values()
            .filter(|i| i.status == InvoiceStatus::Pending)
            .cloned()
            .collect())
    }

    async fn mark_paid(&self, id: u64) -> Result<()> {
        transition(&mut *self.inner.write().await, id, InvoiceStatus::Paid)
    }

    async fn mark_expired(&self, id: u64) -> Result<()> {
        transition(&mut *self.inner.write().await, id, InvoiceStatus::Expired)
    }
}

fn transition(inner: &mut Inner, id: u64, status: InvoiceStatus) -> Result<()> {
    let invoice = inner
        .invoices
        .get_mut(&id)
        .ok_or_else(|| Error::Store(format!("invoice {id} not found")))?;

    if invoice.status != InvoiceStatus::Pending {
        return Err(Error::Store(format!(
            "invoice {id} is already {:?} and cannot change state",
            invoice.status
        )));
    }

    invoice.status = status;
    Ok(())
}
