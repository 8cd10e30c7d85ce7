//! Send one alert through the failover dispatcher and print the report.
//!
//! ```bash
//! empire-alert "Disk almost full on worker-2"
//! ```

use empire_common::config::AppConfig;
use empire_common::types::OutboundMessage;
use empire_notifier::AlertDispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "empire_notifier=info".into()),
        )
        .compact()
        .with_writer(std::io::stderr)
        .init();

    let text = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if text.trim().is_empty() {
        anyhow::bail!("usage: empire-alert <message>");
    }

    let config = AppConfig::from_env()?;
    let chat_id = config
        .admin_chat_id
        .clone()
        .ok_or_else(|| anyhow::anyhow!("ADMIN_CHAT_ID environment variable is required"))?;

    let dispatcher = AlertDispatcher::from_config(&config)?;
    let report = dispatcher
        .dispatch(&OutboundMessage::new(chat_id, text).html())
        .await;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.delivered {
        std::process::exit(1);
    }
    Ok(())
}
