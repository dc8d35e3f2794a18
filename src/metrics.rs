use crate::{ArtifactKind, RenderError};
use metrics::{Counter, Gauge, Histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Per-artifact-kind render instruments
struct KindMetrics {
    renders: Counter,
    failures: Counter,
    duration: Histogram,
}

impl KindMetrics {
    fn register(kind: ArtifactKind) -> Self {
        let label = kind.label();
        Self {
            renders: metrics::register_counter!("renders_total", "kind" => label),
            failures: metrics::register_counter!("render_failures_total", "kind" => label),
            duration: metrics::register_histogram!("render_duration_seconds", "kind" => label),
        }
    }
}

/// Render instruments shared by a backend.
///
/// Handles bind to whatever recorder is installed when `new` runs, so install
/// the exporter first; without one every instrument is a no-op.
pub struct Metrics {
    pdf: KindMetrics,
    image: KindMetrics,
    active_sessions: Gauge,
    active: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            pdf: KindMetrics::register(ArtifactKind::Pdf),
            image: KindMetrics::register(ArtifactKind::Png),
            active_sessions: metrics::register_gauge!("active_sessions"),
            active: AtomicUsize::new(0),
        }
    }

    fn for_kind(&self, kind: ArtifactKind) -> &KindMetrics {
        match kind {
            ArtifactKind::Pdf => &self.pdf,
            ArtifactKind::Png => &self.image,
        }
    }

    pub fn record_render(&self, kind: ArtifactKind, duration: Duration, outcome: Result<(), &RenderError>) {
        let instruments = self.for_kind(kind);
        instruments.duration.record(duration.as_secs_f64());

        match outcome {
            Ok(()) => instruments.renders.increment(1),
            Err(error) => {
                instruments.failures.increment(1);
                metrics::increment_counter!(
                    "render_errors_total",
                    "kind" => kind.label(),
                    "error" => error.kind()
                );
            }
        }
    }

    /// Count a browser session as live until the returned guard drops.
    pub fn session_started(self: &Arc<Self>) -> ActiveSession {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.active_sessions.increment(1.0);
        ActiveSession {
            metrics: Arc::clone(self),
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ActiveSession {
    metrics: Arc<Metrics>,
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.metrics.active.fetch_sub(1, Ordering::SeqCst);
        self.metrics.active_sessions.decrement(1.0);
    }
}

/// Install the process-wide Prometheus recorder and return the scrape handle.
pub fn install_prometheus() -> Result<PrometheusHandle, RenderError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| RenderError::ConfigurationError(format!("failed to install metrics recorder: {e}")))?;
    info!("Prometheus recorder installed");
    Ok(handle)
}
