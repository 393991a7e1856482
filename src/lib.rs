//! Payment reconciliation and energy delegation engine for the TRON network.
//!
//! `energy-broker` watches a set of pending invoices, verifies incoming TRX
//! payments against a block-explorer API, and places energy delegation orders
//! on a resource market once an invoice is paid. The front end that creates
//! invoices (a chat bot, a web form) lives elsewhere; this crate owns the
//! money-adjacent part:
//!
//! 1. **Invoice store** ([`store`]): durable record of invoices with a
//!    monotonic `pending -> paid | expired` status machine.
//! 2. **Chain observer** ([`chain`]): queries TronGrid for inbound transfers
//!    to the receiving address and tests them against an invoice's price.
//! 3. **Resource market client** ([`market`]): prices energy packages and
//!    submits buy-resource orders to tronsave.io.
//! 4. **Reconciler** ([`reconciler`]): the periodic loop that drives the
//!    other three and notifies users of the outcome.
//!
//! All components take an explicit [`BrokerConfig`]; there is no global
//! state. The [`service`] module wires everything together for the binary.

pub mod chain;
pub mod config;
mod error;
pub mod event;
pub mod invoice;
pub mod market;
pub mod notify;
pub mod reconciler;
pub mod service;
pub mod store;

pub use config::BrokerConfig;
pub use error::{Error, Result};
pub use event::{BrokerEvent, BrokerEventsChannel, BrokerEventsSender};
pub use invoice::{Invoice, InvoiceStatus, NewInvoice};
pub use reconciler::Reconciler;
pub use service::{RunningService, ServiceBuilder};
