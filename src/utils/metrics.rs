use crate::core::types::RecognitionOutcome;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Global metrics collector for the application.
///
/// Tracks OCR engine usage, font cache performance, decode run outcomes,
/// and more. Thread-safe and can be shared across the application.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Engine metrics
    engine_calls_total: AtomicUsize,
    engine_calls_success: AtomicUsize,
    engine_calls_mismatch: AtomicUsize,
    engine_calls_failed: AtomicUsize,
    engine_latency_ms: RwLock<Vec<u64>>,

    // Font cache metrics
    font_cache_hits: AtomicUsize,
    font_cache_misses: AtomicUsize,

    // Run metrics
    runs_total: AtomicUsize,
    runs_noop: AtomicUsize,
    groups_dispatched: AtomicUsize,
    glyphs_resolved: AtomicUsize,
    overrides_applied: AtomicUsize,

    // Rendering metrics
    render_duration_ms: RwLock<Vec<u64>>,

    // Per-endpoint request counters
    endpoint_counters: DashMap<String, AtomicUsize>,

    // Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                engine_calls_total: AtomicUsize::new(0),
                engine_calls_success: AtomicUsize::new(0),
                engine_calls_mismatch: AtomicUsize::new(0),
                engine_calls_failed: AtomicUsize::new(0),
                engine_latency_ms: RwLock::new(Vec::new()),
                font_cache_hits: AtomicUsize::new(0),
                font_cache_misses: AtomicUsize::new(0),
                runs_total: AtomicUsize::new(0),
                runs_noop: AtomicUsize::new(0),
                groups_dispatched: AtomicUsize::new(0),
                glyphs_resolved: AtomicUsize::new(0),
                overrides_applied: AtomicUsize::new(0),
                render_duration_ms: RwLock::new(Vec::new()),
                endpoint_counters: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    // Engine metrics
    pub fn record_engine_call(&self, outcome: &RecognitionOutcome, duration: Duration) {
        self.inner.engine_calls_total.fetch_add(1, Ordering::Relaxed);
        match outcome {
            RecognitionOutcome::Success(pairs) => {
                self.inner.engine_calls_success.fetch_add(1, Ordering::Relaxed);
                self.inner.glyphs_resolved.fetch_add(pairs.len(), Ordering::Relaxed);
            }
            RecognitionOutcome::Mismatch { .. } => {
                self.inner.engine_calls_mismatch.fetch_add(1, Ordering::Relaxed);
            }
            RecognitionOutcome::Failed { .. } => {
                self.inner.engine_calls_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.inner.engine_latency_ms.write().push(duration.as_millis() as u64);
    }

    // Font cache metrics
    pub fn record_font_cache_hit(&self) {
        self.inner.font_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_font_cache_miss(&self) {
        self.inner.font_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    // Run metrics
    pub fn record_run_dispatched(&self, num_groups: usize) {
        self.inner.runs_total.fetch_add(1, Ordering::Relaxed);
        self.inner.groups_dispatched.fetch_add(num_groups, Ordering::Relaxed);
    }

    pub fn record_run_noop(&self) {
        self.inner.runs_total.fetch_add(1, Ordering::Relaxed);
        self.inner.runs_noop.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_override(&self) {
        self.inner.overrides_applied.fetch_add(1, Ordering::Relaxed);
    }

    // Rendering metrics
    pub fn record_render_duration(&self, duration: Duration) {
        self.inner.render_duration_ms.write().push(duration.as_millis() as u64);
    }

    // Endpoint metrics
    pub fn record_endpoint_request(&self, endpoint: &str) {
        self.inner.endpoint_counters
            .entry(endpoint.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    // Get snapshot for reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        let engine_latency = self.inner.engine_latency_ms.read();
        let engine_latency_avg = avg(&engine_latency);
        let engine_latency_p50 = percentile(&engine_latency, 0.5);
        let engine_latency_p95 = percentile(&engine_latency, 0.95);
        let engine_latency_p99 = percentile(&engine_latency, 0.99);
        drop(engine_latency);

        let render_durations = self.inner.render_duration_ms.read();
        let render_avg = avg(&render_durations);
        drop(render_durations);

        let font_cache_hits = self.inner.font_cache_hits.load(Ordering::Relaxed);
        let font_cache_misses = self.inner.font_cache_misses.load(Ordering::Relaxed);
        let font_cache_total = font_cache_hits + font_cache_misses;
        let font_cache_hit_rate = if font_cache_total > 0 {
            font_cache_hits as f64 / font_cache_total as f64
        } else {
            0.0
        };

        MetricsSnapshot {
            engine_calls_total: self.inner.engine_calls_total.load(Ordering::Relaxed),
            engine_calls_success: self.inner.engine_calls_success.load(Ordering::Relaxed),
            engine_calls_mismatch: self.inner.engine_calls_mismatch.load(Ordering::Relaxed),
            engine_calls_failed: self.inner.engine_calls_failed.load(Ordering::Relaxed),
            engine_latency_avg_ms: engine_latency_avg,
            engine_latency_p50_ms: engine_latency_p50,
            engine_latency_p95_ms: engine_latency_p95,
            engine_latency_p99_ms: engine_latency_p99,
            font_cache_hits,
            font_cache_misses,
            font_cache_hit_rate,
            runs_total: self.inner.runs_total.load(Ordering::Relaxed),
            runs_noop: self.inner.runs_noop.load(Ordering::Relaxed),
            groups_dispatched: self.inner.groups_dispatched.load(Ordering::Relaxed),
            glyphs_resolved: self.inner.glyphs_resolved.load(Ordering::Relaxed),
            overrides_applied: self.inner.overrides_applied.load(Ordering::Relaxed),
            render_avg_ms: render_avg,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = format!(
            r#"# HELP ocr_engine_calls_total Total number of OCR engine calls made
# TYPE ocr_engine_calls_total counter
ocr_engine_calls_total {{}} {}

# HELP ocr_engine_calls_success Number of engine calls that resolved a full group
# TYPE ocr_engine_calls_success counter
ocr_engine_calls_success {{}} {}

# HELP ocr_engine_calls_mismatch Number of engine calls that came back short
# TYPE ocr_engine_calls_mismatch counter
ocr_engine_calls_mismatch {{}} {}

# HELP ocr_engine_calls_failed Number of engine calls that errored
# TYPE ocr_engine_calls_failed counter
ocr_engine_calls_failed {{}} {}

# HELP ocr_engine_latency_avg_ms Average engine latency in milliseconds
# TYPE ocr_engine_latency_avg_ms gauge
ocr_engine_latency_avg_ms {{}} {}

# HELP font_cache_hit_rate Font cache hit rate (0.0 to 1.0)
# TYPE font_cache_hit_rate gauge
font_cache_hit_rate {{}} {}

# HELP decode_runs_total Total number of decode runs started
# TYPE decode_runs_total counter
decode_runs_total {{}} {}

# HELP decode_runs_noop Runs whose input held no placeholder glyphs
# TYPE decode_runs_noop counter
decode_runs_noop {{}} {}

# HELP groups_dispatched_total Total glyph groups dispatched to the engine
# TYPE groups_dispatched_total counter
groups_dispatched_total {{}} {}

# HELP glyphs_resolved_total Total glyph mappings written by recognition
# TYPE glyphs_resolved_total counter
glyphs_resolved_total {{}} {}

# HELP overrides_applied_total Total manual glyph corrections applied
# TYPE overrides_applied_total counter
overrides_applied_total {{}} {}

# HELP render_avg_duration_ms Average canvas render pass duration in milliseconds
# TYPE render_avg_duration_ms gauge
render_avg_duration_ms {{}} {}

# HELP uptime_seconds Application uptime in seconds
# TYPE uptime_seconds counter
uptime_seconds {{}} {}

# HELP http_requests_total Requests per endpoint
# TYPE http_requests_total counter
"#,
            snapshot.engine_calls_total,
            snapshot.engine_calls_success,
            snapshot.engine_calls_mismatch,
            snapshot.engine_calls_failed,
            snapshot.engine_latency_avg_ms,
            snapshot.font_cache_hit_rate,
            snapshot.runs_total,
            snapshot.runs_noop,
            snapshot.groups_dispatched,
            snapshot.glyphs_resolved,
            snapshot.overrides_applied,
            snapshot.render_avg_ms,
            snapshot.uptime_seconds,
        );

        for entry in self.inner.endpoint_counters.iter() {
            out.push_str(&format!(
                "http_requests_total {{endpoint=\"{}\"}} {}\n",
                entry.key(),
                entry.value().load(Ordering::Relaxed)
            ));
        }

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub engine_calls_total: usize,
    pub engine_calls_success: usize,
    pub engine_calls_mismatch: usize,
    pub engine_calls_failed: usize,
    pub engine_latency_avg_ms: u64,
    pub engine_latency_p50_ms: u64,
    pub engine_latency_p95_ms: u64,
    pub engine_latency_p99_ms: u64,
    pub font_cache_hits: usize,
    pub font_cache_misses: usize,
    pub font_cache_hit_rate: f64,
    pub runs_total: usize,
    pub runs_noop: usize,
    pub groups_dispatched: usize,
    pub glyphs_resolved: usize,
    pub overrides_applied: usize,
    pub render_avg_ms: u64,
    pub uptime_seconds: u64,
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success_outcome(n: usize) -> RecognitionOutcome {
        let pairs = (0..n)
            .map(|i| (char::from_u32(0xE000 + i as u32).unwrap(), "字".to_string()))
            .collect();
        RecognitionOutcome::Success(pairs)
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = Metrics::new();

        metrics.record_engine_call(&success_outcome(3), Duration::from_millis(100));
        metrics.record_engine_call(
            &RecognitionOutcome::Mismatch { partial: "好".to_string() },
            Duration::from_millis(80),
        );
        metrics.record_engine_call(
            &RecognitionOutcome::Failed { error: "engine offline".to_string() },
            Duration::from_millis(50),
        );
        metrics.record_font_cache_hit();
        metrics.record_font_cache_miss();
        metrics.record_run_dispatched(2);
        metrics.record_run_noop();
        metrics.record_override();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.engine_calls_total, 3);
        assert_eq!(snapshot.engine_calls_success, 1);
        assert_eq!(snapshot.engine_calls_mismatch, 1);
        assert_eq!(snapshot.engine_calls_failed, 1);
        assert_eq!(snapshot.glyphs_resolved, 3);
        assert_eq!(snapshot.font_cache_hits, 1);
        assert_eq!(snapshot.font_cache_misses, 1);
        assert_eq!(snapshot.font_cache_hit_rate, 0.5);
        assert_eq!(snapshot.runs_total, 2);
        assert_eq!(snapshot.runs_noop, 1);
        assert_eq!(snapshot.groups_dispatched, 2);
        assert_eq!(snapshot.overrides_applied, 1);
    }

    #[test]
    fn test_latency_percentiles() {
        let metrics = Metrics::new();
        for ms in 1..=100u64 {
            metrics.record_engine_call(&success_outcome(1), Duration::from_millis(ms));
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.engine_latency_avg_ms, 50);
        assert_eq!(snapshot.engine_latency_p50_ms, 50);
        assert_eq!(snapshot.engine_latency_p95_ms, 95);
        assert_eq!(snapshot.engine_latency_p99_ms, 99);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.record_engine_call(&success_outcome(2), Duration::from_millis(100));
        metrics.record_endpoint_request("/decode");

        let prometheus = metrics.to_prometheus();
        assert!(prometheus.contains("ocr_engine_calls_total {} 1"));
        assert!(prometheus.contains("glyphs_resolved_total {} 2"));
        assert!(prometheus.contains("http_requests_total {endpoint=\"/decode\"} 1"));
    }

    #[test]
    fn test_empty_snapshot_is_all_zero() {
        let snapshot = Metrics::new().snapshot();
        assert_eq!(snapshot.engine_calls_total, 0);
        assert_eq!(snapshot.engine_latency_p95_ms, 0);
        assert_eq!(snapshot.font_cache_hit_rate, 0.0);
    }
}
