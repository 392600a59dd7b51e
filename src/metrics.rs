use crate::PdfError;
use metrics::{register_counter, register_histogram, Counter, Histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use tracing::info;

pub const PDFS_GENERATED: &str = "visual_pdf_generated_total";
pub const PDFS_FAILED: &str = "visual_pdf_failed_total";
pub const PAGES_RENDERED: &str = "visual_pdf_pages_total";
pub const LOGOS_SKIPPED: &str = "visual_pdf_logo_skipped_total";
pub const GENERATION_DURATION: &str = "visual_pdf_duration_seconds";

/// Handles onto the pipeline's metrics
///
/// Without an installed recorder every handle is a no-op.
pub struct Metrics {
    pub pdfs_generated: Counter,
    pub pages_rendered: Counter,
    pub logos_skipped: Counter,
    pub generation_duration: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            pdfs_generated: register_counter!(PDFS_GENERATED),
            pages_rendered: register_counter!(PAGES_RENDERED),
            logos_skipped: register_counter!(LOGOS_SKIPPED),
            generation_duration: register_histogram!(GENERATION_DURATION),
        }
    }

    pub fn record_generation(&self, duration: Duration, pages: usize) {
        self.pdfs_generated.increment(1);
        self.pages_rendered.increment(pages as u64);
        self.generation_duration.record(duration.as_secs_f64());
    }

    pub fn record_failure(&self, error: &PdfError) {
        metrics::increment_counter!(PDFS_FAILED, "kind" => error.kind());
    }

    pub fn record_logos_skipped(&self, count: usize) {
        if count > 0 {
            self.logos_skipped.increment(count as u64);
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs a process-wide Prometheus recorder; the handle renders the text exposition.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, PdfError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| PdfError::ConfigurationError(format!("metrics recorder: {e}")))?;
    info!("Prometheus metrics recorder installed");
    Ok(handle)
}
