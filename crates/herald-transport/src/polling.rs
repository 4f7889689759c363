//! Long-polling update loop.

use herald_core::{
    config::PollingConfig, cursor::Cursor, error::HeraldError, traits::RequestGateway,
    update::Update,
};
use herald_dispatch::Dispatcher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Pulls update batches with `getUpdates` and hands them to the dispatcher
/// one at a time, in id order.
///
/// The platform allows a single poller per token, so one transport runs
/// one background task.
pub struct PollingTransport {
    gateway: Arc<dyn RequestGateway>,
    dispatcher: Arc<Dispatcher>,
    cursor: Arc<Cursor>,
    config: PollingConfig,
    allowed_updates: Vec<String>,
    running: AtomicBool,
    stop_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollingTransport {
    pub fn new(
        gateway: Arc<dyn RequestGateway>,
        dispatcher: Arc<Dispatcher>,
        config: PollingConfig,
        allowed_updates: Vec<String>,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            gateway,
            dispatcher,
            cursor: Arc::new(Cursor::default()),
            config,
            allowed_updates,
            running: AtomicBool::new(false),
            stop_tx,
            task: Mutex::new(None),
        }
    }

    /// The acknowledging cursor. Survives `stop()`/`start()` cycles.
    pub fn cursor(&self) -> &Arc<Cursor> {
        &self.cursor
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the polling loop. Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), HeraldError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HeraldError::AlreadyRunning);
        }
        self.stop_tx.send_replace(false);

        let poller = Poller {
            gateway: self.gateway.clone(),
            dispatcher: self.dispatcher.clone(),
            cursor: self.cursor.clone(),
            limit: self.config.limit,
            timeout: self.config.timeout,
            retry_delay: Duration::from_millis(self.config.retry_delay_ms),
            allowed_updates: self.allowed_updates.clone(),
        };
        let stop_rx = self.stop_tx.subscribe();

        info!(
            "Starting long polling (timeout {}s, limit {}, retry {}ms)...",
            self.config.timeout, self.config.limit, self.config.retry_delay_ms
        );
        let handle = tokio::spawn(poller.run(stop_rx));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    /// Stop before the next fetch and wait for the loop to exit.
    ///
    /// An in-flight long-poll is not interrupted; a retry backoff is.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.stop_tx.send_replace(true);

        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("polling task ended abnormally: {e}");
            }
        }
        info!("Long polling stopped at offset {}", self.cursor.get());
    }
}

/// State moved into the background task.
struct Poller {
    gateway: Arc<dyn RequestGateway>,
    dispatcher: Arc<Dispatcher>,
    cursor: Arc<Cursor>,
    limit: u32,
    timeout: u64,
    retry_delay: Duration,
    allowed_updates: Vec<String>,
}

impl Poller {
    async fn run(self, mut stop_rx: watch::Receiver<bool>) {
        loop {
            if stop_requested(&stop_rx) {
                break;
            }

            let offset = self.cursor.get();
            let fetched = self
                .gateway
                .get_updates(offset, self.limit, self.timeout, &self.allowed_updates)
                .await;

            match fetched {
                Ok(updates) => self.deliver(updates),
                Err(e) => {
                    if e.is_retryable() {
                        warn!(
                            "polling error at offset {offset} (retry in {}ms): {e}",
                            self.retry_delay.as_millis()
                        );
                    } else {
                        error!(
                            "unexpected polling error at offset {offset} (retry in {}ms): {e}",
                            self.retry_delay.as_millis()
                        );
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(self.retry_delay) => {}
                        _ = stop_rx.changed() => {}
                    }
                }
            }
        }
        debug!("polling loop exited");
    }

    /// Advance past each update, then dispatch it, strictly in order.
    fn deliver(&self, updates: Vec<Update>) {
        for update in updates {
            let id = update.update_id;
            if self.cursor.is_acknowledged(id) {
                debug!("skipping already acknowledged update {id}");
                continue;
            }
            let expected = self.cursor.get();
            if expected > 0 && id > expected {
                debug!("update gap: expected {expected}, got {id}");
            }

            self.cursor.advance(id);
            let report = self.dispatcher.dispatch(&update);
            if report.failed() > 0 {
                warn!(
                    "update {id}: {} of {} handlers failed",
                    report.failed(),
                    report.fired
                );
            }
        }
    }
}

/// Stop when asked to, or when the owning transport is gone.
fn stop_requested(stop_rx: &watch::Receiver<bool>) -> bool {
    let stopped = *stop_rx.borrow();
    stopped || stop_rx.has_changed().is_err()
}
