//! Service wiring - builds the broker's components and runs them.

use crate::chain::ChainObserver;
use crate::config::BrokerConfig;
use crate::event::{create_event_channel, BrokerEvent, BrokerEventsChannel, BrokerEventsSender};
use crate::market::MarketClient;
use crate::notify::{Notifier, NullNotifier, TelegramNotifier};
use crate::reconciler::Reconciler;
use crate::store::{InvoiceStore, MemoryInvoiceStore, SledInvoiceStore};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Builder for constructing a running broker service.
pub struct ServiceBuilder {
    config: BrokerConfig,
}

impl ServiceBuilder {
    /// Create a new service builder with the given configuration.
    #[must_use]
    pub fn new(config: BrokerConfig) -> Self {
        Self { config }
    }

    /// Build the service.
    ///
    /// # Errors
    ///
    /// Returns an error if the bot credential is missing while payment
    /// simulation is off, or if the invoice store cannot be opened.
    pub async fn build(self) -> Result<RunningService> {
        info!("Building energy-broker service");

        // The one startup-fatal configuration error: without a bot token we
        // cannot tell users about real payment outcomes.
        if self.config.notify.bot_token.is_none() && !self.config.chain.simulate_payments {
            return Err(Error::Config(
                "a bot token is required unless payment simulation is enabled".to_string(),
            ));
        }

        let store: Arc<dyn InvoiceStore> = if self.config.ephemeral {
            info!("Using in-memory invoice store (ephemeral mode)");
            Arc::new(MemoryInvoiceStore::new())
        } else {
            if let Some(parent) = self.config.store_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Arc::new(SledInvoiceStore::open(&self.config.store_path)?)
        };

        let observer = Arc::new(ChainObserver::new(&self.config.chain));
        if !observer.can_verify() {
            warn!("Payment verification is disabled until the receiving address is fixed");
        }

        let market = Arc::new(MarketClient::new(&self.config.market));
        let market_reads = Arc::clone(&market);

        let notifier: Arc<dyn Notifier> = match &self.config.notify.bot_token {
            Some(_) => Arc::new(TelegramNotifier::from_config(&self.config.notify)?),
            None => Arc::new(NullNotifier),
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events_tx, events_rx) = create_event_channel();

        let reconciler = Arc::new(Reconciler::new(
            store,
            Arc::clone(&observer) as Arc<dyn crate::chain::PaymentVerifier>,
            market,
            notifier,
            self.config.reconciler.interval(),
            events_tx.clone(),
        ));

        Ok(RunningService {
            config: self.config,
            shutdown_tx,
            shutdown_rx,
            events_tx,
            events_rx: Some(events_rx),
            reconciler,
            observer,
            market: market_reads,
        })
    }
}

/// A running broker service.
pub struct RunningService {
    config: BrokerConfig,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    events_tx: BrokerEventsSender,
    events_rx: Option<BrokerEventsChannel>,
    reconciler: Arc<Reconciler>,
    observer: Arc<ChainObserver>,
    market: Arc<MarketClient>,
}

impl RunningService {
    /// Get a receiver for broker events.
    ///
    /// Note: Can only be called once. Subsequent calls return None.
    pub fn events(&mut self) -> Option<BrokerEventsChannel> {
        self.events_rx.take()
    }

    /// Subscribe to broker events.
    #[must_use]
    pub fn subscribe_events(&self) -> BrokerEventsChannel {
        self.events_tx.subscribe()
    }

    /// Run the service until shutdown is requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the service encounters a fatal error.
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting energy-broker");
        let _ = self.events_tx.send(BrokerEvent::Started);

        self.log_receiving_balances().await;
        self.log_market_account().await;

        // Run the reconciliation loop in the background; it observes the
        // same shutdown channel and finishes its in-flight tick first.
        let reconciler = Arc::clone(&self.reconciler);
        let loop_shutdown_rx = self.shutdown_rx.clone();
        let loop_handle = tokio::spawn(async move {
            reconciler.run(loop_shutdown_rx).await;
        });

        info!("Service running, waiting for shutdown signal");
        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("Shutdown signal received");
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, initiating shutdown");
                    self.shutdown();
                    break;
                }
            }
        }

        let _ = self.events_tx.send(BrokerEvent::ShuttingDown);
        let _ = loop_handle.await;
        info!("Service shutdown complete");
        Ok(())
    }

    /// Request the service to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Log a balance snapshot of the receiving address. Informational;
    /// failures only warn.
    async fn log_receiving_balances(&self) {
        let address = &self.config.chain.receiving_address;
        if address.is_empty() || self.config.chain.simulate_payments {
            return;
        }

        match self.observer.balances(address).await {
            Ok(balances) => {
                info!(
                    "Receiving address {address}: {:.4} TRX, {:.2} USDT, {} bandwidth, {} energy",
                    balances.trx, balances.usdt, balances.bandwidth, balances.energy
                );
            }
            Err(e) => {
                warn!("Could not fetch balances for {address}: {e}");
            }
        }
    }

    /// Log the market account the configured API key belongs to.
    /// Informational; silently skipped without a key.
    async fn log_market_account(&self) {
        if self.config.market.api_key.is_none() {
            return;
        }
        if let Some(account) = self.market.account_info().await {
            info!("Market account: {account}");
        }
    }
}
