//! Element rasterization
//!
//! Turns a document subtree into one bitmap at a pixel-density multiplier.

use crate::{CaptureRequest, CaptureTarget, ElementMetrics, HostPage, PdfError};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Owned pixel grid: a whole capture or one page slice of it.
pub type RasterBitmap = image::RgbaImage;

#[derive(Debug, Clone)]
pub struct RasterOptions {
    /// Pixel-density multiplier (default: 2.0)
    pub scale: f64,
    /// Maximum wait for pending image loads inside the target
    pub image_load_timeout: Duration,
    /// Upper bound for the rasterization call itself
    pub capture_timeout: Duration,
    /// Element ids left out of the capture
    pub ignore_element_ids: Vec<String>,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            scale: 2.0,
            image_load_timeout: Duration::from_secs(15),
            capture_timeout: Duration::from_secs(60),
            ignore_element_ids: Vec::new(),
        }
    }
}

pub struct ElementRasterizer {
    options: RasterOptions,
}

impl ElementRasterizer {
    pub fn new(options: RasterOptions) -> Self {
        Self { options }
    }

    /// Resolves the target's document rectangle.
    ///
    /// Runs before any style mutation so a missing target aborts cleanly.
    pub async fn locate(
        &self,
        host: &dyn HostPage,
        target: &CaptureTarget,
    ) -> Result<ElementMetrics, PdfError> {
        let metrics = host
            .element_metrics(target)
            .await?
            .ok_or_else(|| PdfError::ElementNotFound(target.to_string()))?;

        if metrics.is_empty() {
            return Err(PdfError::CaptureError(format!(
                "{} has zero size ({}x{})",
                target, metrics.width, metrics.height
            )));
        }

        debug!(
            "Located {} at ({}, {}) size {}x{}",
            target, metrics.x, metrics.y, metrics.width, metrics.height
        );
        Ok(metrics)
    }

    /// Captures the located target into a bitmap of `metrics × scale` pixels.
    pub async fn capture(
        &self,
        host: &dyn HostPage,
        target: &CaptureTarget,
        metrics: ElementMetrics,
    ) -> Result<RasterBitmap, PdfError> {
        host.wait_for_images(target, self.options.image_load_timeout)
            .await
            .map_err(|e| PdfError::CaptureError(format!("waiting for images failed: {e}")))?;

        let request = CaptureRequest {
            target: target.clone(),
            metrics,
            scale: self.options.scale,
        };

        let ignored = &self.options.ignore_element_ids;
        if let Err(e) = host.set_hidden(ignored, true).await {
            warn!("Failed to hide {:?} before capture: {}", ignored, e);
        }

        // Restore outside the timed future, which a timeout drops mid-capture.
        let captured = timeout(self.options.capture_timeout, host.capture_png(&request)).await;
        if let Err(e) = host.set_hidden(ignored, false).await {
            warn!("Failed to restore {:?} after capture: {}", ignored, e);
        }

        let png = match captured {
            Ok(result) => result.map_err(|e| match e {
                PdfError::CaptureError(_) => e,
                other => PdfError::CaptureError(other.to_string()),
            })?,
            Err(_) => {
                return Err(PdfError::CaptureError(format!(
                    "rasterization timed out after {:?}",
                    self.options.capture_timeout
                )))
            }
        };

        let bitmap = image::load_from_memory(&png)
            .map_err(|e| PdfError::CaptureError(format!("undecodable capture: {e}")))?
            .to_rgba8();

        if bitmap.width() == 0 || bitmap.height() == 0 {
            return Err(PdfError::CaptureError(format!("{target} rendered empty")));
        }

        let expected = self.expected_size(&metrics);
        if bitmap.dimensions() != expected {
            warn!(
                "Capture of {} is {:?}, expected {:?}",
                target,
                bitmap.dimensions(),
                expected
            );
        }

        info!(
            "Rasterized {} at {}x into {}x{} pixels",
            target,
            self.options.scale,
            bitmap.width(),
            bitmap.height()
        );
        Ok(bitmap)
    }

    /// Expected output size for a capture of `metrics`.
    pub fn expected_size(&self, metrics: &ElementMetrics) -> (u32, u32) {
        (
            (metrics.width * self.options.scale).round() as u32,
            (metrics.height * self.options.scale).round() as u32,
        )
    }
}
