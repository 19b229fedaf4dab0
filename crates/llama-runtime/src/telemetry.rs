//! Telemetry hooks for streamed generation.
//!
//! Provides:
//! - [`GenerationMetrics`]: time to first fragment, total time, fragment count
//! - [`TelemetryHook`] trait: callback interface for real-time reporting
//! - [`GenerationTimer`]: records timestamps and computes metrics
//! - [`NoopTelemetry`] / [`LogTelemetry`]: built-in hook implementations

use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Aggregate metrics from one streamed generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationMetrics {
    /// Time from start to the first fragment, in milliseconds.
    pub time_to_first_fragment_ms: Option<f64>,
    /// Number of fragments delivered.
    pub fragments: usize,
    /// Characters delivered across all fragments.
    pub chars: usize,
    /// Total wall-clock time in milliseconds.
    pub total_time_ms: f64,
}

impl GenerationMetrics {
    pub fn total_secs(&self) -> f64 {
        self.total_time_ms / 1000.0
    }
}

/// Callback trait for generation telemetry.
///
/// All methods have default no-op implementations so hooks can be selective.
pub trait TelemetryHook: Send + Sync {
    fn on_first_fragment(&self, _elapsed_ms: f64) {}

    fn on_generation_complete(&self, _metrics: &GenerationMetrics) {}
}

#[derive(Debug, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetryHook for NoopTelemetry {}

/// Logs completion through `tracing` and keeps the last report.
#[derive(Debug, Clone, Default)]
pub struct LogTelemetry {
    last_report: Arc<Mutex<Option<GenerationMetrics>>>,
}

impl LogTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve the last completed generation's metrics.
    pub fn last_metrics(&self) -> Option<GenerationMetrics> {
        self.last_report.lock().ok().and_then(|m| m.clone())
    }
}

impl TelemetryHook for LogTelemetry {
    fn on_generation_complete(&self, metrics: &GenerationMetrics) {
        tracing::info!(
            fragments = metrics.fragments,
            chars = metrics.chars,
            "generation took {:.3}s",
            metrics.total_secs()
        );
        if let Ok(mut last) = self.last_report.lock() {
            *last = Some(metrics.clone());
        }
    }
}

/// Records timestamps while fragments arrive.
///
/// Usage:
/// 1. [`GenerationTimer::new`] at generation start
/// 2. [`GenerationTimer::mark_fragment`] for each fragment
/// 3. [`GenerationTimer::finish`] to compute metrics and fire the hook
pub struct GenerationTimer {
    start: Instant,
    first_fragment: Option<Instant>,
    fragments: usize,
    chars: usize,
    hook: Arc<dyn TelemetryHook>,
}

impl GenerationTimer {
    pub fn new(hook: Arc<dyn TelemetryHook>) -> Self {
        Self {
            start: Instant::now(),
            first_fragment: None,
            fragments: 0,
            chars: 0,
            hook,
        }
    }

    pub fn mark_fragment(&mut self, fragment: &str) {
        if self.first_fragment.is_none() {
            let now = Instant::now();
            self.first_fragment = Some(now);
            self.hook
                .on_first_fragment(now.duration_since(self.start).as_secs_f64() * 1000.0);
        }
        self.fragments += 1;
        self.chars += fragment.chars().count();
    }

    pub fn finish(self) -> GenerationMetrics {
        let metrics = GenerationMetrics {
            time_to_first_fragment_ms: self
                .first_fragment
                .map(|t| t.duration_since(self.start).as_secs_f64() * 1000.0),
            fragments: self.fragments,
            chars: self.chars,
            total_time_ms: self.start.elapsed().as_secs_f64() * 1000.0,
        };
        self.hook.on_generation_complete(&metrics);
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHook {
        first: AtomicUsize,
        complete: AtomicUsize,
    }

    impl TelemetryHook for CountingHook {
        fn on_first_fragment(&self, _elapsed_ms: f64) {
            self.first.fetch_add(1, Ordering::SeqCst);
        }

        fn on_generation_complete(&self, _metrics: &GenerationMetrics) {
            self.complete.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn timer_counts_fragments_and_chars() {
        let hook = Arc::new(CountingHook::default());
        let mut timer = GenerationTimer::new(hook.clone());
        timer.mark_fragment("Hi");
        timer.mark_fragment(" thére");
        let metrics = timer.finish();
        assert_eq!(metrics.fragments, 2);
        assert_eq!(metrics.chars, 8);
        assert!(metrics.time_to_first_fragment_ms.is_some());
        assert!(metrics.total_time_ms >= metrics.time_to_first_fragment_ms.unwrap());
        assert_eq!(hook.first.load(Ordering::SeqCst), 1);
        assert_eq!(hook.complete.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn timer_without_fragments() {
        let metrics = GenerationTimer::new(Arc::new(NoopTelemetry)).finish();
        assert_eq!(metrics.fragments, 0);
        assert_eq!(metrics.time_to_first_fragment_ms, None);
    }

    #[test]
    fn log_telemetry_keeps_last_report() {
        let log = LogTelemetry::new();
        assert!(log.last_metrics().is_none());
        let metrics = GenerationTimer::new(Arc::new(log.clone())).finish();
        assert_eq!(log.last_metrics(), Some(metrics));
    }
}
