//! EmpireBot HTTP API.
//!
//! Endpoints:
//! - GET  /                  service status and queue depths
//! - GET  /health            liveness probe
//! - POST /admin/login       admin credentials → JWT
//! - GET  /admin/orders      recent orders
//! - GET  /admin/deliveries  delivery log / dead letters
//! - POST /shopify/webhook   signed order webhook
//! - POST /bot/send          queue a Telegram message
//! - POST /alerts/test       synchronous failover test alert
//! - GET  /alerts/status     `getMe` for every bot

pub mod middleware;
pub mod rate_limit;
pub mod routes;
pub mod state;
