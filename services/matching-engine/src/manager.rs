//! Processor lifecycle management
//!
//! One processor task per registered symbol. A crashing processor is logged
//! and left down so corrupt state stays visible; siblings keep running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use store::{keys, Store, StoreError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use types::ids::Symbol;

use crate::processor::OrderProcessor;

/// Starts and stops the per-symbol processor fleet.
pub struct ProcessorManager {
    store: Arc<dyn Store>,
    running: Arc<AtomicBool>,
    handles: Vec<(Symbol, JoinHandle<()>)>,
}

impl ProcessorManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            running: Arc::new(AtomicBool::new(true)),
            handles: Vec::new(),
        }
    }

    /// Start one processor per member of the symbol registry.
    pub async fn start(&mut self) -> Result<(), StoreError> {
        let mut tags = self.store.set_members(keys::TRADING_PAIRS).await?;
        tags.sort();
        for tag in tags {
            match Symbol::try_new(&tag) {
                Some(symbol) => self.spawn(symbol),
                None => warn!(tag = %tag, "skipping invalid symbol in registry"),
            }
        }
        info!(processors = self.handles.len(), "processor manager started");
        Ok(())
    }

    /// Spawn the processor task for one symbol.
    ///
    /// The watcher wrapper logs a panic as soon as it happens; the processor
    /// is not restarted.
    pub fn spawn(&mut self, symbol: Symbol) {
        self.running.store(true, Ordering::Relaxed);
        let processor = OrderProcessor::new(
            symbol.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.running),
        );
        let watched_symbol = symbol.clone();
        let handle = tokio::spawn(async move {
            let inner = tokio::spawn(processor.run());
            match inner.await {
                Ok(()) => {}
                Err(err) if err.is_panic() => {
                    error!(
                        symbol = %watched_symbol,
                        "order processor panicked; leaving it down"
                    );
                }
                Err(err) => {
                    error!(symbol = %watched_symbol, error = %err, "order processor aborted");
                }
            }
        });
        self.handles.push((symbol, handle));
    }

    /// Signal all processors to drain and wait for them to exit.
    pub async fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        for (symbol, handle) in self.handles.drain(..) {
            if let Err(err) = handle.await {
                error!(symbol = %symbol, error = %err, "processor join failed");
            }
        }
        info!("processor manager stopped");
    }

    /// Number of processors spawned since the last stop.
    pub fn processor_count(&self) -> usize {
        self.handles.len()
    }
}
