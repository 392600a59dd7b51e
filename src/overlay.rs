use crate::HostPage;
use tracing::{debug, warn};

/// Element id of the overlay in the live document
pub const OVERLAY_ELEMENT_ID: &str = "visual-pdf-progress-overlay";

pub const DEFAULT_OVERLAY_MESSAGE: &str = "Generating PDF...";

/// Blocking progress indicator shown while a PDF is generated
///
/// Failures only ever cost the visual cue, so both calls log and carry on.
pub struct ProgressOverlay {
    message: String,
}

impl ProgressOverlay {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn element_id(&self) -> &'static str {
        OVERLAY_ELEMENT_ID
    }

    pub async fn show(&self, host: &dyn HostPage) {
        match host.show_overlay(OVERLAY_ELEMENT_ID, &self.message).await {
            Ok(()) => debug!("Progress overlay shown"),
            Err(e) => warn!("Failed to show progress overlay: {}", e),
        }
    }

    pub async fn hide(&self, host: &dyn HostPage) {
        match host.hide_overlay(OVERLAY_ELEMENT_ID).await {
            Ok(()) => debug!("Progress overlay hidden"),
            Err(e) => warn!("Failed to hide progress overlay: {}", e),
        }
    }
}

impl Default for ProgressOverlay {
    fn default() -> Self {
        Self::new(DEFAULT_OVERLAY_MESSAGE)
    }
}
