//! Telegram alert delivery.
//!
//! Messages go out through an ordered list of bot tokens. Each request is
//! retried with exponential backoff; when a bot keeps failing the next one in
//! the failover order takes over. Asynchronous sends go through a single
//! background worker that records every outcome in the delivery log.

pub mod dispatcher;
pub mod http;
pub mod queue;
pub mod store;
pub mod telegram;

pub use dispatcher::{AlertDispatcher, BotAttempt, DispatchReport};
pub use queue::{DispatchQueue, QueueError};
pub use store::DeliveryRecorder;
pub use telegram::TelegramClient;
