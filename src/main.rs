//! AI Bot - Entry Point
//!
//! Modes:
//! - Default: Telegram bot (plus status server when STATUS_PORT is set)
//! - --status-only / -s: status server without Telegram

use aibot::{Config, Dispatcher, RemoteAiClient};
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let status_only = args.iter().any(|a| a == "--status-only" || a == "-s");
    let json_logs = args.iter().any(|a| a == "--json-logs");
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");

    if help_mode {
        println!("AI Bot v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: aibot [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --status-only, -s  Run only the HTTP status server");
        println!("  --json-logs        Log JSON to stderr");
        println!("  --help, -h         Show this help");
        println!();
        println!("Default: Run as Telegram bot");
        println!();
        println!("Environment variables:");
        println!("  TELEGRAM_TOKEN     Telegram bot token (or TELOXIDE_TOKEN)");
        println!("  AI_API_URL         AI backend base URL");
        println!("  AI_MODEL           Model name for chat (default: claude-3)");
        println!("  ADMIN_ID           Telegram user allowed to /reset");
        println!("  LOG_LEVEL          trace, debug, info, warn, error");
        println!("  RATE_STANDARD      calls/seconds (default: 20/60)");
        println!("  RATE_THINKING      calls/seconds (default: 5/120)");
        println!("  RATE_GENERATION    calls/seconds (default: 3/300)");
        println!("  MEMORY_CAPACITY    messages kept per user (default: 10)");
        println!("  INTENTS_PATH       TOML intent table");
        println!("  STATUS_PORT        HTTP status server port");
        return Ok(());
    }

    let config = Config::from_env()?;

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    if json_logs {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("AI Bot v{}", env!("CARGO_PKG_VERSION"));
    info!("AI backend: {}", config.ai_api_url);
    info!(
        "Rate limits: standard {}, thinking {}, generation {}",
        config.tier_budgets.standard, config.tier_budgets.thinking, config.tier_budgets.generation
    );

    let ai = Arc::new(RemoteAiClient::from_config(&config));
    let dispatcher = Arc::new(Dispatcher::from_config(&config, ai)?);

    if status_only {
        let port = config.status_port.unwrap_or(8080);
        return aibot::status::serve(port, dispatcher).await;
    }

    let token = config.require_token()?;

    if let Some(port) = config.status_port {
        let status_dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            if let Err(e) = aibot::status::serve(port, status_dispatcher).await {
                error!("Status server failed: {}", e);
            }
        });
    }

    aibot::telegram::run_telegram_bot(token, dispatcher).await
}
