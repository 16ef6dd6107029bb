// TxPulse Exporter - Alert scheduler and Prometheus exporter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # TxPulse Exporter
//!
//! Runs the alert engine on a timer and exposes KPIs to Prometheus, plus a
//! small JSON API for dashboards.
//!
//! ## Usage
//!
//! ```bash
//! # Load a ledger and run with default thresholds
//! txpulse-exporter --transactions tx.csv --users users.csv
//!
//! # Custom config and port
//! txpulse-exporter --config txpulse.json --transactions tx.csv --port 9200
//! ```

mod ledger;
mod metrics;
mod scheduler;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use ledger::LedgerSummary;
use metrics::{encode_metrics, update_cache_metrics, update_ledger_rows};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;
use txpulse::{
    Alert, AlertEngine, CacheStats, CycleState, EngineStats, InMemoryAlertStore, KpiQueryService,
    Period, PulseConfig, PulseError, MAX_WINDOW_HOURS,
};

/// TxPulse alert scheduler and Prometheus exporter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "9100")]
    port: u16,

    /// JSON configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Transactions CSV file
    #[arg(short, long)]
    transactions: Option<PathBuf>,

    /// Users CSV file
    #[arg(short, long)]
    users: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Application state shared across handlers.
struct AppState {
    engine: Arc<AlertEngine>,
    queries: KpiQueryService,
    alerts: Arc<InMemoryAlertStore>,
    ledger: LedgerSummary,
    window: Duration,
    start_time: std::time::Instant,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("TxPulse Exporter v{}", env!("CARGO_PKG_VERSION"));

    let config = match args.config.as_deref() {
        Some(path) => PulseConfig::from_file(path)?,
        None => PulseConfig::default(),
    };
    config.validate()?;

    let (store, ledger) = ledger::load_store(args.transactions.as_deref(), args.users.as_deref())?;
    update_ledger_rows(ledger.transactions, ledger.users);
    let store = Arc::new(store);

    let alerts = Arc::new(InMemoryAlertStore::new());
    let engine = Arc::new(AlertEngine::new(
        config.clone(),
        store.clone(),
        alerts.clone(),
        alerts.clone(),
    )?);
    let scheduler = scheduler::spawn(Arc::clone(&engine), &config.schedule);

    let state = Arc::new(AppState {
        engine,
        queries: KpiQueryService::new(store, config.cache.clone()),
        alerts,
        ledger,
        window: config.engine.window(),
        start_time: std::time::Instant::now(),
    });

    // Build router
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/kpi", get(kpi_handler))
        .route("/kpi/compare", get(compare_handler))
        .route("/kpi/series", get(series_handler))
        .route("/alerts", get(alerts_handler))
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting server on http://{}", addr);
    info!("Metrics endpoint: http://{}/metrics", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown requested");
}

/// Root handler - shows a simple HTML page.
async fn root_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>TxPulse Exporter</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 800px; margin: 50px auto; padding: 20px; }
        h1 { color: #2c3e50; }
        a { color: #3498db; text-decoration: none; }
        .endpoints { background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0; }
        .endpoint { margin: 10px 0; }
        code { background: #e9ecef; padding: 2px 6px; border-radius: 4px; }
    </style>
</head>
<body>
    <h1>TxPulse Exporter</h1>
    <p>Transaction KPI monitoring and threshold alerting.</p>

    <div class="endpoints">
        <h2>Endpoints</h2>
        <div class="endpoint"><a href="/metrics">/metrics</a> - Prometheus metrics</div>
        <div class="endpoint"><a href="/health">/health</a> - Health check</div>
        <div class="endpoint"><a href="/status">/status</a> - Engine status (JSON)</div>
        <div class="endpoint"><a href="/kpi">/kpi</a> - KPI snapshot (JSON)</div>
        <div class="endpoint"><a href="/kpi/compare">/kpi/compare</a> - Comparison with the previous window (JSON)</div>
        <div class="endpoint"><a href="/kpi/series">/kpi/series</a> - Daily series (JSON)</div>
        <div class="endpoint"><a href="/alerts">/alerts</a> - Recent alerts (JSON)</div>
    </div>

    <h2>Metrics</h2>
    <ul>
        <li><code>txpulse_kpi_value</code> - KPI values by metric and window</li>
        <li><code>txpulse_kpi_change</code> - Change against the previous window</li>
        <li><code>txpulse_alerts_total</code> - Alerts by type and severity</li>
        <li><code>txpulse_alerts_suppressed_total</code> - Duplicates suppressed</li>
        <li><code>txpulse_cycles_total</code> - Alert cycles by outcome</li>
    </ul>
</body>
</html>"#,
    )
}

/// Metrics handler - returns Prometheus text format.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    update_cache_metrics(&state.queries.cache_stats());
    match encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Status information response.
#[derive(Serialize)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    cycle_state: CycleState,
    engine: EngineStats,
    cache: CacheStats,
    ledger: LedgerSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_cycle: Option<LastCycle>,
}

/// Summary of the most recent completed cycle.
#[derive(Serialize)]
struct LastCycle {
    evaluated_at: DateTime<Utc>,
    current: Period,
    previous: Period,
    candidates: usize,
    suppressed: usize,
    persisted: usize,
}

/// Status handler - returns JSON status information.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let last_cycle = state.engine.last_report().map(|report| LastCycle {
        evaluated_at: report.evaluated_at,
        current: report.current,
        previous: report.previous,
        candidates: report.candidates.len(),
        suppressed: report.suppressed,
        persisted: report.persisted.len(),
    });

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        cycle_state: state.engine.state(),
        engine: state.engine.stats(),
        cache: state.queries.cache_stats(),
        ledger: state.ledger,
        last_cycle,
    })
}

/// Window selection. Defaults to the engine window ending now.
#[derive(Debug, Default, Deserialize)]
struct WindowParams {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    hours: Option<i64>,
}

impl WindowParams {
    /// The requested window. Its preceding window must be representable too,
    /// since comparisons read both.
    fn resolve(&self, default_length: Duration) -> Result<Period, ApiError> {
        let end = self.end.unwrap_or_else(Utc::now);
        let period = match (self.start, self.hours) {
            (Some(start), _) => Some(Period::new(start, end)),
            (None, Some(hours)) if (1..=MAX_WINDOW_HOURS).contains(&hours) => {
                Duration::try_hours(hours)
                    .and_then(|length| Period::checked_ending_at(end, length))
            }
            (None, Some(_)) => {
                return Err(ApiError::BadRequest(format!(
                    "hours must be between 1 and {}",
                    MAX_WINDOW_HOURS
                )))
            }
            (None, None) => Period::checked_ending_at(end, default_length),
        }
        .filter(|period| period.checked_preceding().is_some())
        .ok_or_else(|| ApiError::BadRequest("window is out of range".into()))?;

        if period.is_empty() {
            return Err(ApiError::BadRequest("start must be before end".into()));
        }
        Ok(period)
    }
}

/// Series selection: `days` whole days ending now.
#[derive(Debug, Deserialize)]
struct SeriesParams {
    #[serde(default = "default_series_days")]
    days: i64,
}

fn default_series_days() -> i64 {
    7
}

#[derive(Debug, Deserialize)]
struct AlertParams {
    #[serde(default = "default_alert_limit")]
    limit: usize,
}

fn default_alert_limit() -> usize {
    50
}

/// KPI snapshot handler.
async fn kpi_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WindowParams>,
) -> Result<Response, ApiError> {
    let period = params.resolve(state.window)?;
    let snapshot = state.queries.snapshot(&period)?;
    Ok(Json(json!({ "period": period, "kpis": snapshot })).into_response())
}

/// Comparison against the preceding window.
async fn compare_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WindowParams>,
) -> Result<Response, ApiError> {
    let period = params.resolve(state.window)?;
    let comparison = state.queries.compare_previous(&period)?;
    Ok(Json(json!({
        "current": period,
        "previous": period.preceding(),
        "comparison": comparison,
    }))
    .into_response())
}

/// Daily chart series.
async fn series_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SeriesParams>,
) -> Result<Response, ApiError> {
    if !(1..=366).contains(&params.days) {
        return Err(ApiError::BadRequest("days must be between 1 and 366".into()));
    }
    let period = Period::ending_at(Utc::now(), Duration::days(params.days));
    let series = state.queries.daily_series(&period)?;
    Ok(Json(series).into_response())
}

/// Most recent alerts, newest first.
async fn alerts_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AlertParams>,
) -> Json<Vec<Alert>> {
    Json(state.alerts.recent(params.limit))
}

/// API errors mapped to HTTP responses.
#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Pulse(PulseError),
}

impl From<PulseError> for ApiError {
    fn from(e: PulseError) -> Self {
        ApiError::Pulse(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Pulse(e) if e.is_data_unavailable() => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            ApiError::Pulse(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
