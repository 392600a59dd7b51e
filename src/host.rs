//! The live document the generator works against
//!
//! [`HostPage`] is the seam between the PDF pipeline and the browser tab
//! holding the page: it inserts and removes style nodes, drives the progress
//! overlay, measures the capture target and rasterizes it. [`ChromeHost`]
//! implements it over the Chrome DevTools Protocol.

use crate::PdfError;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, Viewport as ClipRect};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::{Page, ScreenshotParams};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// What part of the document to capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureTarget {
    /// The node with this `id` attribute
    Element(String),
    /// The whole document body
    WholeDocument,
}

impl CaptureTarget {
    /// CSS selector scoping rules to this target.
    pub fn css_scope(&self) -> String {
        match self {
            CaptureTarget::Element(id) => format!("#{}", css_escape_ident(id)),
            CaptureTarget::WholeDocument => "body".to_string(),
        }
    }

    /// JS expression evaluating to the target node, or `null`.
    fn js_lookup(&self) -> String {
        match self {
            CaptureTarget::Element(id) => format!(
                "document.getElementById({})",
                serde_json::Value::String(id.clone())
            ),
            CaptureTarget::WholeDocument => "document.body".to_string(),
        }
    }
}

impl std::fmt::Display for CaptureTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureTarget::Element(id) => write!(f, "#{id}"),
            CaptureTarget::WholeDocument => write!(f, "document body"),
        }
    }
}

/// Document-space rectangle of the capture target, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ElementMetrics {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementMetrics {
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Script-side lookup result; a `null` return would not survive by-value evaluation.
#[derive(Debug, Deserialize)]
struct Located {
    found: bool,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
}

impl Located {
    fn into_metrics(self) -> Option<ElementMetrics> {
        self.found.then_some(ElementMetrics {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        })
    }
}

/// One rasterization call
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub target: CaptureTarget,
    pub metrics: ElementMetrics,
    pub scale: f64,
}

#[async_trait]
pub trait HostPage: Send + Sync {
    /// Target rectangle, or `None` when the target does not exist.
    async fn element_metrics(
        &self,
        target: &CaptureTarget,
    ) -> Result<Option<ElementMetrics>, PdfError>;

    /// Appends a `<style>` node with the given id to the document head.
    async fn insert_style(&self, node_id: &str, css: &str) -> Result<(), PdfError>;

    /// Removes the style node; returns whether it was still attached.
    async fn remove_style(&self, node_id: &str) -> Result<bool, PdfError>;

    /// Creates the overlay if missing, otherwise makes it visible again.
    async fn show_overlay(&self, overlay_id: &str, message: &str) -> Result<(), PdfError>;

    async fn hide_overlay(&self, overlay_id: &str) -> Result<(), PdfError>;

    /// Toggles `visibility: hidden` on the elements with these ids; unknown ids are skipped.
    async fn set_hidden(&self, element_ids: &[String], hidden: bool) -> Result<(), PdfError>;

    /// Resolves once every image inside the target settled or `max_wait` passed.
    async fn wait_for_images(
        &self,
        target: &CaptureTarget,
        max_wait: Duration,
    ) -> Result<(), PdfError>;

    /// PNG bytes of the requested rectangle at the requested scale.
    async fn capture_png(&self, request: &CaptureRequest) -> Result<Vec<u8>, PdfError>;
}

/// [`HostPage`] backed by a Chrome tab
pub struct ChromeHost {
    page: Page,
}

impl ChromeHost {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T, PdfError> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(PdfError::PageError)?;

        let result = self.page.evaluate_expression(params).await?;
        result
            .into_value::<T>()
            .map_err(|e| PdfError::PageError(format!("unexpected script result: {e}")))
    }
}

#[async_trait]
impl HostPage for ChromeHost {
    async fn element_metrics(
        &self,
        target: &CaptureTarget,
    ) -> Result<Option<ElementMetrics>, PdfError> {
        let script = format!(
            r#"(() => {{
                const el = {lookup};
                if (!el) return {{ found: false }};
                if (el === document.body) {{
                    const root = document.documentElement;
                    return {{
                        found: true,
                        x: 0,
                        y: 0,
                        width: Math.max(root.scrollWidth, document.body.scrollWidth),
                        height: Math.max(root.scrollHeight, document.body.scrollHeight)
                    }};
                }}
                const rect = el.getBoundingClientRect();
                return {{
                    found: true,
                    x: rect.left + window.scrollX,
                    y: rect.top + window.scrollY,
                    width: rect.width,
                    height: Math.max(rect.height, el.scrollHeight)
                }};
            }})()"#,
            lookup = target.js_lookup()
        );
        let located: Located = self.eval(script).await?;
        Ok(located.into_metrics())
    }

    async fn insert_style(&self, node_id: &str, css: &str) -> Result<(), PdfError> {
        let script = format!(
            r#"(() => {{
                const style = document.createElement("style");
                style.id = {id};
                style.textContent = {css};
                document.head.appendChild(style);
                return true;
            }})()"#,
            id = serde_json::to_string(node_id)?,
            css = serde_json::to_string(css)?
        );
        self.eval::<bool>(script).await.map(|_| ())
    }

    async fn remove_style(&self, node_id: &str) -> Result<bool, PdfError> {
        let script = format!(
            r#"(() => {{
                const style = document.getElementById({id});
                if (!style) return false;
                style.remove();
                return true;
            }})()"#,
            id = serde_json::to_string(node_id)?
        );
        self.eval(script).await
    }

    async fn show_overlay(&self, overlay_id: &str, message: &str) -> Result<(), PdfError> {
        let script = format!(
            r#"(() => {{
                let overlay = document.getElementById({id});
                if (!overlay) {{
                    overlay = document.createElement("div");
                    overlay.id = {id};
                    overlay.style.cssText = "position:fixed;inset:0;z-index:2147483647;display:flex;flex-direction:column;align-items:center;justify-content:center;background:rgba(11,31,58,0.85);color:#ffffff;font:600 16px sans-serif";
                    const spinner = document.createElement("div");
                    spinner.style.cssText = "width:48px;height:48px;margin-bottom:16px;border:4px solid rgba(255,255,255,0.3);border-top-color:#0fb5ba;border-radius:50%;animation:visual-pdf-spin 1s linear infinite";
                    const keyframes = document.createElement("style");
                    keyframes.textContent = "@keyframes visual-pdf-spin {{ to {{ transform: rotate(360deg); }} }}";
                    const label = document.createElement("div");
                    label.className = "visual-pdf-overlay-label";
                    overlay.append(keyframes, spinner, label);
                    document.body.appendChild(overlay);
                }}
                overlay.querySelector(".visual-pdf-overlay-label").textContent = {message};
                overlay.style.display = "flex";
                overlay.style.visibility = "";
                return true;
            }})()"#,
            id = serde_json::to_string(overlay_id)?,
            message = serde_json::to_string(message)?
        );
        self.eval::<bool>(script).await.map(|_| ())
    }

    async fn hide_overlay(&self, overlay_id: &str) -> Result<(), PdfError> {
        let script = format!(
            r#"(() => {{
                const overlay = document.getElementById({id});
                if (overlay) overlay.style.display = "none";
                return true;
            }})()"#,
            id = serde_json::to_string(overlay_id)?
        );
        self.eval::<bool>(script).await.map(|_| ())
    }

    async fn set_hidden(&self, element_ids: &[String], hidden: bool) -> Result<(), PdfError> {
        if element_ids.is_empty() {
            return Ok(());
        }
        let visibility = if hidden { "hidden" } else { "" };
        let script = format!(
            r#"(() => {{
                for (const id of {ids}) {{
                    const el = document.getElementById(id);
                    if (el) el.style.visibility = "{visibility}";
                }}
                return true;
            }})()"#,
            ids = serde_json::to_string(element_ids)?
        );
        self.eval::<bool>(script).await.map(|_| ())
    }

    async fn wait_for_images(
        &self,
        target: &CaptureTarget,
        max_wait: Duration,
    ) -> Result<(), PdfError> {
        let script = format!(
            r#"(() => {{
                const root = {lookup};
                if (!root) return Promise.resolve(0);
                const pending = Array.from(root.querySelectorAll("img"))
                    .filter((img) => !img.complete)
                    .map((img) => new Promise((resolve) => {{
                        img.addEventListener("load", resolve, {{ once: true }});
                        img.addEventListener("error", resolve, {{ once: true }});
                    }}));
                const deadline = new Promise((resolve) => setTimeout(resolve, {ms}));
                return Promise.race([Promise.all(pending), deadline]).then(() => pending.length);
            }})()"#,
            lookup = target.js_lookup(),
            ms = max_wait.as_millis()
        );
        let pending: u64 = self.eval(script).await?;
        debug!("Waited on {} pending images in {}", pending, target);
        Ok(())
    }

    async fn capture_png(&self, request: &CaptureRequest) -> Result<Vec<u8>, PdfError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .clip(ClipRect {
                x: request.metrics.x,
                y: request.metrics.y,
                width: request.metrics.width,
                height: request.metrics.height,
                scale: request.scale,
            })
            .capture_beyond_viewport(true)
            .build();

        self.page
            .screenshot(params)
            .await
            .map_err(|e| PdfError::CaptureError(e.to_string()))
    }
}

/// Escapes an id for use in a CSS `#id` selector.
pub fn css_escape_ident(ident: &str) -> String {
    if ident == "-" {
        return "\\-".to_string();
    }
    let mut escaped = String::with_capacity(ident.len());
    let leading_dash = ident.starts_with('-');
    for (i, c) in ident.chars().enumerate() {
        match c {
            'a'..='z' | 'A'..='Z' | '_' | '-' => escaped.push(c),
            // An identifier cannot start with a digit, nor with `-` and a digit.
            '0'..='9' if i > 1 || (i == 1 && !leading_dash) => escaped.push(c),
            c if !c.is_ascii() => escaped.push(c),
            c => escaped.push_str(&format!("\\{:x} ", c as u32)),
        }
    }
    escaped
}
