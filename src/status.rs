//! Status API
//!
//! Health snapshot shared by the `/status` command and the optional HTTP
//! status server (`/health`, `/healthz`).

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::ai_client::AiBackend;
use crate::dispatch::Dispatcher;
use crate::memory::{ConversationMemory, MemoryStats};
use crate::rate_limit::{RateLimitStats, RateLimiter};

/// Point-in-time service status
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// "ok" when the AI backend answers its health probe, else "degraded"
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub api_healthy: bool,
    pub rate_limits: RateLimitStats,
    pub memory: MemoryStats,
    /// Timestamp (ISO 8601)
    pub timestamp: String,
}

impl StatusReport {
    pub async fn collect(
        limiter: &RateLimiter,
        memory: &ConversationMemory,
        ai: &dyn AiBackend,
        uptime_secs: u64,
    ) -> Self {
        let api_healthy = ai.health().await;
        Self {
            status: if api_healthy { "ok" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs,
            api_healthy,
            rate_limits: limiter.stats(),
            memory: memory.get_stats(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Chat rendering for the `/status` command
    pub fn to_text(&self) -> String {
        let budgets = &self.rate_limits.budgets;
        format!(
            "🤖 Bot Status\n\n\
            {} AI API: {}\n\
            👥 Users with history: {}\n\
            💬 Stored messages: {}\n\
            🚦 Tracked users: {} ({} recent calls)\n\
            📏 Limits: standard {}, thinking {}, generation {}\n\
            ⏱ Uptime: {}s\n\
            ⏰ {}",
            if self.api_healthy { "✅" } else { "❌" },
            if self.api_healthy { "Online" } else { "Offline" },
            self.memory.users,
            self.memory.entries,
            self.rate_limits.tracked_users,
            self.rate_limits.live_calls,
            budgets.standard,
            budgets.thinking,
            budgets.generation,
            self.uptime_secs,
            self.timestamp,
        )
    }
}

/// Full status snapshot; 503 while the AI backend is unreachable
pub async fn health_check(
    State(dispatcher): State<Arc<Dispatcher>>,
) -> (StatusCode, Json<StatusReport>) {
    let report = dispatcher.status_report().await;
    let code = if report.api_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report))
}

/// Liveness probe
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Create status router
pub fn status_router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .layer(TraceLayer::new_for_http())
        .with_state(dispatcher)
}

/// Serve the status router on `0.0.0.0:port` until Ctrl+C or SIGTERM
pub async fn serve(port: u16, dispatcher: Arc<Dispatcher>) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Status server listening on {}", addr);

    axum::serve(listener, status_router(dispatcher))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Status server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, stopping status server"),
        _ = terminate => info!("Received SIGTERM, stopping status server"),
    }
}
