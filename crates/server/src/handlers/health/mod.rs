use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{Extension, Json};
use common::config::Config;
use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Process start time, shared through request extensions.
#[derive(Clone, Copy)]
pub(crate) struct Uptime(Instant);

impl Uptime {
    pub(crate) fn start() -> Self {
        Self(Instant::now())
    }

    fn elapsed(&self) -> Duration {
        Duration::from_secs(self.0.elapsed().as_secs())
    }
}

/// Health check response.
#[derive(Serialize)]
pub(crate) struct HealthResponse {
    /// Always `ok` while the process serves requests.
    status: &'static str,

    /// Current time in RFC 3339 format.
    timestamp: String,

    uptime_seconds: u64,

    /// Uptime in `1h 2m 3s` form.
    uptime_readable: String,

    /// Resident set size, in megabytes, if the platform reports one.
    memory_usage_mb: Option<f64>,

    /// Environment this instance serves.
    node_env: String,
}

/// Read the resident set size from procfs.
async fn resident_memory_mb() -> Option<f64> {
    let status = tokio::fs::read_to_string("/proc/self/status").await.ok()?;

    let kib: f64 = status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))?
        .trim()
        .trim_end_matches("kB")
        .trim()
        .parse()
        .ok()?;

    Some((kib / 1024.0 * 100.0).round() / 100.0)
}

/// Health check handler.
pub(crate) async fn health(
    Extension(uptime): Extension<Uptime>,
    Extension(config): Extension<Arc<Config>>,
) -> Json<HealthResponse> {
    let elapsed = uptime.elapsed();

    Json(HealthResponse {
        status: "ok",
        timestamp: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default(),
        uptime_seconds: elapsed.as_secs(),
        uptime_readable: humantime::format_duration(elapsed).to_string(),
        memory_usage_mb: resident_memory_mb().await,
        node_env: config.updates.environment.to_string(),
    })
}
