//! Temporary legacy-color stylesheet for the duration of a capture
//!
//! The site's Tailwind build emits modern color functions (`oklch()`,
//! `oklab()`, `color-mix()`) in its color custom properties. The patch forces
//! legacy `rgb()`/hex values on those properties inside the captured scope and
//! pins the palette classes to literal colors, so the rasterized output does
//! not depend on modern color support.

use crate::{CaptureTarget, HostPage, PdfError};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::{debug, warn};

const STYLE_ID_PREFIX: &str = "visual-pdf-color-fallback";

/// Custom properties Tailwind resolves through modern color functions.
const COLOR_VARIABLE_FALLBACKS: &[(&str, &str)] = &[
    ("--tw-ring-color", "rgba(59, 130, 246, 0.5)"),
    ("--tw-ring-offset-color", "#ffffff"),
    ("--tw-shadow-color", "rgba(0, 0, 0, 0.1)"),
    ("--tw-inset-shadow-color", "rgba(0, 0, 0, 0.05)"),
    ("--tw-outline-color", "currentColor"),
    ("--tw-gradient-from", "rgba(255, 255, 255, 0)"),
    ("--tw-gradient-via", "rgba(255, 255, 255, 0)"),
    ("--tw-gradient-to", "rgba(255, 255, 255, 0)"),
];

/// Handle to an inserted override node
///
/// Not `Clone`: each `apply` yields exactly one handle and `remove` consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct OverrideHandle {
    node_id: String,
}

impl OverrideHandle {
    pub fn node_id(&self) -> &str {
        &self.node_id
    }
}

pub struct StylePatcher {
    scope: String,
    palette: BTreeMap<String, String>,
}

impl StylePatcher {
    pub fn new(target: &CaptureTarget, palette: BTreeMap<String, String>) -> Self {
        Self {
            scope: target.css_scope(),
            palette,
        }
    }

    /// The override stylesheet for this scope and palette.
    pub fn stylesheet(&self) -> String {
        let scope = &self.scope;
        let mut css = String::new();

        let _ = writeln!(
            css,
            "{scope}, {scope} *, {scope} *::before, {scope} *::after {{"
        );
        for (property, value) in COLOR_VARIABLE_FALLBACKS {
            let _ = writeln!(css, "  {property}: {value} !important;");
        }
        css.push_str("  outline-color: currentColor !important;\n");
        css.push_str("  text-decoration-color: currentColor !important;\n");
        css.push_str("  caret-color: currentColor !important;\n");
        css.push_str("}\n");

        for (name, value) in &self.palette {
            let _ = writeln!(css, "{scope} .text-{name} {{ color: {value} !important; }}");
            let _ = writeln!(
                css,
                "{scope} .bg-{name} {{ background-color: {value} !important; }}"
            );
            let _ = writeln!(
                css,
                "{scope} .border-{name} {{ border-color: {value} !important; }}"
            );
        }

        css
    }

    /// Inserts a fresh override node and returns its handle.
    pub async fn apply(&self, host: &dyn HostPage) -> Result<OverrideHandle, PdfError> {
        let node_id = format!("{STYLE_ID_PREFIX}-{}", uuid::Uuid::new_v4().simple());

        host.insert_style(&node_id, &self.stylesheet())
            .await
            .map_err(|e| PdfError::CaptureError(format!("could not insert color overrides: {e}")))?;

        debug!("Applied color overrides {} to {}", node_id, self.scope);
        Ok(OverrideHandle { node_id })
    }

    /// Removes the override node; never fails.
    pub async fn remove(&self, host: &dyn HostPage, handle: OverrideHandle) {
        match host.remove_style(&handle.node_id).await {
            Ok(true) => debug!("Removed color overrides {}", handle.node_id),
            Ok(false) => debug!("Color overrides {} already detached", handle.node_id),
            Err(e) => warn!("Failed to remove color overrides {}: {}", handle.node_id, e),
        }
    }
}
