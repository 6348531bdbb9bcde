//! The queue of idle workers.
//!
//! A worker's address sits in the queue while it is idle. The scheduler pops
//! it for the duration of one task and pushes it back when the task
//! succeeded, so an address is never handed to two tasks at once.

use anyhow::{anyhow, Result};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// Cloneable push side of a [`WorkerRegistry`], handed to the `Register`
/// RPC handler.
#[derive(Clone, Debug)]
pub struct Registrar {
    tx: UnboundedSender<String>,
}

impl Registrar {
    /// Announces `address` as available. Fails once the job has finished
    /// and the registry was closed.
    pub fn register(&self, address: impl Into<String>) -> Result<()> {
        let address = address.into();
        debug!(worker = %address, "worker available");
        self.tx
            .send(address)
            .map_err(|e| anyhow!("registry closed, dropping worker {}", e.0))
    }
}

/// Unbounded FIFO of idle worker addresses owned by one job.
#[derive(Debug)]
pub struct WorkerRegistry {
    registrar: Registrar,
    rx: UnboundedReceiver<String>,
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerRegistry {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            registrar: Registrar { tx },
            rx,
        }
    }

    pub fn registrar(&self) -> Registrar {
        self.registrar.clone()
    }

    pub fn register(&self, address: impl Into<String>) -> Result<()> {
        self.registrar.register(address)
    }

    /// Pops the next idle worker, waiting until one registers.
    ///
    /// Returns [`None`] only after [`close`](Self::close).
    pub async fn next(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Stops accepting registrations and returns the workers still queued.
    pub fn close(&mut self) -> Vec<String> {
        self.rx.close();
        let mut idle = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(address) => idle.push(address),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        idle
    }
}
