//! Sled-backed invoice store.

use crate::invoice::{Invoice, InvoiceStatus, NewInvoice};
use crate::{Error, Result};
use async_trait::async_trait;
use sled::{Db, Tree};
use std::path::Path;
use tracing::info;

use super::InvoiceStore;

const INVOICES_TREE: &str = "invoices";

/// Invoice store persisted in a local sled database.
///
/// Values are serde_json-encoded [`Invoice`] records keyed by big-endian id,
/// so iteration yields invoices in creation order.
pub struct SledInvoiceStore {
    db: Db,
}

impl SledInvoiceStore {
    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path)?;
        info!("Invoice store opened at {}", path.display());
        Ok(Self { db })
    }

    fn invoices(&self) -> Result<Tree> {
        Ok(self.db.open_tree(INVOICES_TREE)?)
    }

    /// Transition `id` from pending to `status`, rejecting every other move.
    fn transition(&self, id: u64, status: InvoiceStatus) -> Result<()> {
        let tree = self.invoices()?;
        let key = id.to_be_bytes();
        let existing = tree
            .get(key)?
            .ok_or_else(|| Error::Store(format!("invoice {id} not found")))?;
        let mut invoice: Invoice = serde_json::from_slice(&existing)?;

        if invoice.status != InvoiceStatus::Pending {
            return Err(Error::Store(format!(
                "invoice {id} is already {:?} and cannot change state",
                invoice.status
            )));
        }

        invoice.status = status;
        tree.insert(key, serde_json::to_vec(&invoice)?)?;
        tree.flush()?;
        Ok(())
    }
}

#[async_trait]
impl InvoiceStore for SledInvoiceStore {
    async fn create(&self, new: NewInvoice) -> Result<Invoice> {
        let tree = self.invoices()?;
        let id = self.db.generate_id()?;
        let invoice = new.into_invoice(id);
        tree.insert(id.to_be_bytes(), serde_json::to_vec(&invoice)?)?;
        tree.flush()?;
        Ok(invoice)
    }

    async fn get(&self, id: u64) -> Result<Option<Invoice>> {
        let tree = self.invoices()?;
        match tree.get(id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list_pending(&self) -> Result<Vec<Invoice>> {
        let tree = self.invoices()?;
        let mut pending = Vec::new();
        for item in tree.iter() {
            let (_key, value) = item?;
            let invoice: Invoice = serde_json::from_slice(&value)?;
            if invoice.status == InvoiceStatus::Pending {
                pending.push(invoice);
            }
        }
        Ok(pending)
    }

    async fn mark_paid(&self, id: u64) -> Result<()> {
        self.transition(id, InvoiceStatus::Paid)
    }

    async fn mark_expired(&self, id: u64) -> Result<()> {
        self.transition(id, InvoiceStatus::Expired)
    }
}
