// Metrics collection and tracking

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Latency samples kept per endpoint for percentiles.
const MAX_LATENCY_SAMPLES: usize = 1000;

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Pin the uptime origin. Later calls keep the first value.
pub fn mark_start() {
    let _ = START_TIME.get_or_init(Instant::now);
}

pub fn uptime_seconds() -> u64 {
    START_TIME.get().map(|start| start.elapsed().as_secs()).unwrap_or(0)
}

/// Per-endpoint metrics
#[derive(Debug, Clone)]
pub struct EndpointMetrics {
    pub request_count: Arc<AtomicU64>,
    pub error_count: Arc<AtomicU64>,
    pub total_latency_ms: Arc<AtomicU64>,
    pub min_latency_ms: Arc<AtomicU64>,
    pub max_latency_ms: Arc<AtomicU64>,
    pub latency_samples: Arc<std::sync::Mutex<Vec<u64>>>,
}

impl EndpointMetrics {
    pub fn new() -> Self {
        Self {
            request_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
            total_latency_ms: Arc::new(AtomicU64::new(0)),
            min_latency_ms: Arc::new(AtomicU64::new(u64::MAX)),
            max_latency_ms: Arc::new(AtomicU64::new(0)),
            latency_samples: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn record_request(&self, latency_ms: u64) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.min_latency_ms.fetch_min(latency_ms, Ordering::Relaxed);
        self.max_latency_ms.fetch_max(latency_ms, Ordering::Relaxed);

        if let Ok(mut samples) = self.latency_samples.lock() {
            samples.push(latency_ms);
            if samples.len() > MAX_LATENCY_SAMPLES {
                samples.remove(0);
            }
        }
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_latency_ms(&self) -> f64 {
        let count = self.request_count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        total as f64 / count as f64
    }

    fn percentile(&self, p: u8) -> u64 {
        if let Ok(samples) = self.latency_samples.lock() {
            if samples.is_empty() {
                return 0;
            }
            let mut sorted = samples.clone();
            sorted.sort_unstable();
            let index = (sorted.len() * p as usize / 100).min(sorted.len() - 1);
            sorted[index]
        } else {
            0
        }
    }

    pub fn stats(&self) -> EndpointStats {
        let min = self.min_latency_ms.load(Ordering::Relaxed);
        EndpointStats {
            request_count: self.request_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            avg_latency_ms: self.avg_latency_ms(),
            min_latency_ms: if min == u64::MAX { 0 } else { min },
            max_latency_ms: self.max_latency_ms.load(Ordering::Relaxed),
            p50_latency_ms: self.percentile(50),
            p95_latency_ms: self.percentile(95),
            p99_latency_ms: self.percentile(99),
        }
    }
}

impl Default for EndpointMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Pipeline-specific metrics
#[derive(Debug, Clone)]
pub struct RenderMetrics {
    pub render_count: Arc<AtomicU64>,
    pub total_render_time_ms: Arc<AtomicU64>,
    pub decode_failures: Arc<AtomicU64>,
    pub total_samples: Arc<AtomicU64>,
    pub total_png_bytes: Arc<AtomicU64>,
}

impl RenderMetrics {
    pub fn new() -> Self {
        Self {
            render_count: Arc::new(AtomicU64::new(0)),
            total_render_time_ms: Arc::new(AtomicU64::new(0)),
            decode_failures: Arc::new(AtomicU64::new(0)),
            total_samples: Arc::new(AtomicU64::new(0)),
            total_png_bytes: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_render(&self, time_ms: u64, samples: usize, png_bytes: usize) {
        self.render_count.fetch_add(1, Ordering::Relaxed);
        self.total_render_time_ms.fetch_add(time_ms, Ordering::Relaxed);
        self.total_samples.fetch_add(samples as u64, Ordering::Relaxed);
        self.total_png_bytes.fetch_add(png_bytes as u64, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_render_time_ms(&self) -> f64 {
        let count = self.render_count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let total = self.total_render_time_ms.load(Ordering::Relaxed);
        total as f64 / count as f64
    }

    pub fn stats(&self) -> RenderMetricsResponse {
        RenderMetricsResponse {
            render_count: self.render_count.load(Ordering::Relaxed),
            avg_render_time_ms: self.avg_render_time_ms(),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            total_samples: self.total_samples.load(Ordering::Relaxed),
            total_png_bytes: self.total_png_bytes.load(Ordering::Relaxed),
        }
    }
}

impl Default for RenderMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Comprehensive metrics structure
#[derive(Debug, Clone)]
pub struct AppMetrics {
    pub spectrogram: EndpointMetrics,
    pub player: EndpointMetrics,
    pub render: RenderMetrics,
}

impl AppMetrics {
    pub fn new() -> Self {
        Self {
            spectrogram: EndpointMetrics::new(),
            player: EndpointMetrics::new(),
            render: RenderMetrics::new(),
        }
    }

    pub fn snapshot(&self, request_count: u64) -> DetailedMetricsResponse {
        DetailedMetricsResponse {
            timestamp: Utc::now(),
            system: SystemMetrics::collect(request_count),
            endpoints: EndpointMetricsResponse {
                spectrogram: self.spectrogram.stats(),
                player: self.player.stats(),
            },
            render: self.render.stats(),
        }
    }
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct DetailedMetricsResponse {
    pub timestamp: DateTime<Utc>,
    pub system: SystemMetrics,
    pub endpoints: EndpointMetricsResponse,
    pub render: RenderMetricsResponse,
}

#[derive(Serialize)]
pub struct SystemMetrics {
    pub cpu_usage_percent: f32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub memory_usage_percent: f32,
    pub request_count: u64,
    pub uptime_seconds: u64,
    pub system_load: Option<f64>,
}

impl SystemMetrics {
    fn collect(request_count: u64) -> Self {
        let mut system = sysinfo::System::new();
        system.refresh_cpu();
        system.refresh_memory();

        // Average across all cores
        let cpu_usage = system.global_cpu_info().cpu_usage();

        let memory_used = system.used_memory();
        let memory_total = system.total_memory();
        let memory_usage_percent = if memory_total > 0 {
            (memory_used as f64 / memory_total as f64 * 100.0) as f32
        } else {
            0.0
        };

        Self {
            cpu_usage_percent: cpu_usage,
            memory_used_mb: memory_used / 1024 / 1024,
            memory_total_mb: memory_total / 1024 / 1024,
            memory_usage_percent,
            request_count,
            uptime_seconds: uptime_seconds(),
            system_load: load_average(),
        }
    }
}

// Unix-like systems only
#[cfg(unix)]
fn load_average() -> Option<f64> {
    std::fs::read_to_string("/proc/loadavg")
        .ok()?
        .split_whitespace()
        .next()
        .and_then(|s| s.parse::<f64>().ok())
}

#[cfg(not(unix))]
fn load_average() -> Option<f64> {
    None
}

#[derive(Serialize)]
pub struct EndpointMetricsResponse {
    pub spectrogram: EndpointStats,
    pub player: EndpointStats,
}

#[derive(Serialize)]
pub struct EndpointStats {
    pub request_count: u64,
    pub error_count: u64,
    pub avg_latency_ms: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
    pub p99_latency_ms: u64,
}

#[derive(Serialize)]
pub struct RenderMetricsResponse {
    pub render_count: u64,
    pub avg_render_time_ms: f64,
    pub decode_failures: u64,
    pub total_samples: u64,
    pub total_png_bytes: u64,
}
