//! Asynchronous delivery through a single background worker.
//!
//! Requests name the bot that should send them. The worker hands each message
//! to the dispatcher with that bot in front of the failover order, so a broken
//! bot still falls back to the others. Per-bot depth counters cover messages
//! that are queued or in flight.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use empire_common::types::OutboundMessage;

use crate::dispatcher::AlertDispatcher;
use crate::store::DeliveryRecorder;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("unknown bot '{0}'")]
    UnknownBot(String),

    #[error("dispatch queue is closed")]
    Closed,
}

struct Job {
    id: Uuid,
    bot: String,
    message: OutboundMessage,
}

type Depths = Arc<BTreeMap<String, AtomicUsize>>;

pub struct DispatchQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    depths: Depths,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DispatchQueue {
    /// Spawn the worker. Must be called inside a tokio runtime.
    pub fn start(dispatcher: Arc<AlertDispatcher>, recorder: Option<DeliveryRecorder>) -> Self {
        let depths: Depths = Arc::new(
            dispatcher
                .bot_names()
                .into_iter()
                .map(|name| (name, AtomicUsize::new(0)))
                .collect(),
        );
        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn(run_worker(
            rx,
            dispatcher,
            recorder,
            depths.clone(),
            running.clone(),
        ));

        tracing::info!(bots = depths.len(), "Dispatch worker started");

        Self {
            sender: Mutex::new(Some(tx)),
            depths,
            running,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queue `message` for delivery through `bot`. Returns the delivery id.
    pub fn enqueue(&self, bot: &str, message: OutboundMessage) -> Result<Uuid, QueueError> {
        let depth = self
            .depths
            .get(bot)
            .ok_or_else(|| QueueError::UnknownBot(bot.to_string()))?;

        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        let sender = sender.as_ref().ok_or(QueueError::Closed)?;

        let id = Uuid::new_v4();
        depth.fetch_add(1, Ordering::SeqCst);
        let job = Job {
            id,
            bot: bot.to_string(),
            message,
        };
        if sender.send(job).is_err() {
            depth.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueError::Closed);
        }

        tracing::debug!(delivery_id = %id, bot, "Message queued");
        Ok(id)
    }

    /// Pending (queued or in-flight) messages per bot.
    pub fn depths(&self) -> BTreeMap<String, usize> {
        self.depths
            .iter()
            .map(|(bot, depth)| (bot.clone(), depth.load(Ordering::SeqCst)))
            .collect()
    }

    /// Total pending messages across all bots.
    pub fn pending(&self) -> usize {
        self.depths.values().map(|d| d.load(Ordering::SeqCst)).sum()
    }

    pub fn is_running(&self) -> bool {
        let finished = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_none_or(|handle| handle.is_finished());
        self.running.load(Ordering::SeqCst) && !finished
    }

    /// Stop accepting messages and wait until everything already queued is handled.
    pub async fn shutdown(&self) {
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::error!(error = %e, "Dispatch worker panicked");
        }
        tracing::info!("Dispatch worker stopped");
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<Job>,
    dispatcher: Arc<AlertDispatcher>,
    recorder: Option<DeliveryRecorder>,
    depths: Depths,
    running: Arc<AtomicBool>,
) {
    while let Some(job) = rx.recv().await {
        let report = dispatcher.dispatch_preferring(&job.bot, &job.message).await;

        if !report.delivered {
            tracing::error!(
                delivery_id = %job.id,
                bot = %job.bot,
                error = %report.error_summary().unwrap_or_default(),
                "Queued message could not be delivered"
            );
        }

        if let Some(recorder) = &recorder
            && let Err(e) = recorder
                .record(job.id, &job.bot, &job.message, &report)
                .await
        {
            tracing::error!(delivery_id = %job.id, error = %e, "Failed to record delivery");
        }

        if let Some(depth) = depths.get(&job.bot) {
            depth.fetch_sub(1, Ordering::SeqCst);
        }
    }

    running.store(false, Ordering::SeqCst);
}
