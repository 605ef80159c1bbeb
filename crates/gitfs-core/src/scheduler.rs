//! Periodic sync on a background thread

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::{Result, SyncEngine};

/// Runs `synchronize()` every `interval` until stopped.
///
/// The engine is shared with the mount lifecycle, so a periodic pass and the
/// shutdown flush never overlap.
pub struct SyncScheduler {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl SyncScheduler {
    pub fn start(engine: Arc<Mutex<SyncEngine>>, interval: Duration) -> Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("gitfs-sync".into())
            .spawn(move || {
                tracing::debug!(?interval, "periodic sync started");
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        // Stop requested or scheduler dropped
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    let mut engine = match engine.lock() {
                        Ok(engine) => engine,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    let report = engine.synchronize();
                    if !report.is_success() {
                        tracing::warn!(outcome = ?report.outcome, "periodic sync did not complete");
                    }
                }
                tracing::debug!("periodic sync stopped");
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop the thread and wait for an in-flight pass to finish.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::warn!("periodic sync thread panicked");
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
