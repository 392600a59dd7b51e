//! Configuration management with serde serialization/deserialization
//!
//! This module provides the service configuration (browser, capture timing,
//! output location, branding) and the per-invocation capture options with
//! their defaults and override merging.

use crate::PdfError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Logo used when the caller does not name one.
pub const DEFAULT_LOGO_PATH: &str = "https://www.kitesafaris.com/images/kitesafaris-logo.png";

/// Branding string printed bottom-right on every page.
pub const DEFAULT_BRANDING: &str = "KiteSafaris.com";

/// Main configuration structure for the visual PDF service
///
/// Controls the headless browser, capture timing and where generated
/// documents are written.
///
/// # Examples
///
/// ```rust
/// use visual_pdf::Config;
/// use std::time::Duration;
///
/// let config = Config {
///     logo_timeout: Duration::from_secs(2),
///     ..Default::default()
/// };
/// assert_eq!(config.viewport.width, 1440);
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<String>,

    /// Browser viewport used while the page is loaded
    pub viewport: Viewport,

    /// Maximum time to wait for the page to finish navigating (default: 30 seconds)
    pub navigation_timeout: Duration,

    /// Maximum time to wait for pending image loads inside the target (default: 15 seconds)
    pub image_load_timeout: Duration,

    /// Upper bound for a single rasterization call (default: 60 seconds)
    pub capture_timeout: Duration,

    /// Per-page logo load budget (default: 5 seconds)
    ///
    /// A logo that does not arrive in time is skipped for that page only.
    pub logo_timeout: Duration,

    /// Directory generated PDFs are written to (default: current directory)
    pub output_dir: PathBuf,

    /// Branding text printed in the bottom-right footer of every page
    pub branding: String,

    /// Site palette: class suffix to literal color
    ///
    /// Each entry produces `.text-{name}`, `.bg-{name}` and `.border-{name}`
    /// overrides while a capture is running.
    pub palette: BTreeMap<String, String>,

    /// Capture overrides applied on top of the built-in defaults for every run
    pub defaults: CaptureOverrides,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chrome_path: None,
            viewport: Viewport::default(),
            navigation_timeout: Duration::from_secs(30),
            image_load_timeout: Duration::from_secs(15),
            capture_timeout: Duration::from_secs(60),
            logo_timeout: Duration::from_secs(5),
            output_dir: PathBuf::from("."),
            branding: DEFAULT_BRANDING.to_string(),
            palette: default_palette(),
            defaults: CaptureOverrides::default(),
        }
    }
}

/// The site's Tailwind palette, in legacy hex notation.
pub fn default_palette() -> BTreeMap<String, String> {
    [
        ("deep-navy", "#0b1f3a"),
        ("navy", "#1b3a5c"),
        ("ocean", "#1e6091"),
        ("turquoise", "#0fb5ba"),
        ("coral", "#ff6b5a"),
        ("sand", "#f4e9d8"),
        ("gold", "#f2b134"),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value.to_string()))
    .collect()
}

/// Browser viewport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Viewport {
    /// Viewport width in pixels (default: 1440)
    pub width: u32,

    /// Viewport height in pixels (default: 900)
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1440,
            height: 900,
        }
    }
}

/// Physical page sizes supported for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum PageFormat {
    #[default]
    A4,
    A3,
    Letter,
    Legal,
}

impl PageFormat {
    /// Portrait width and height in millimetres.
    pub fn dimensions_mm(self) -> (f64, f64) {
        match self {
            PageFormat::A4 => (210.0, 297.0),
            PageFormat::A3 => (297.0, 420.0),
            PageFormat::Letter => (215.9, 279.4),
            PageFormat::Legal => (215.9, 355.6),
        }
    }
}

impl std::str::FromStr for PageFormat {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a4" => Ok(PageFormat::A4),
            "a3" => Ok(PageFormat::A3),
            "letter" => Ok(PageFormat::Letter),
            "legal" => Ok(PageFormat::Legal),
            other => Err(PdfError::ConfigurationError(format!(
                "unknown page format '{other}' (expected a4, a3, letter, legal)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl std::str::FromStr for Orientation {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            other => Err(PdfError::ConfigurationError(format!(
                "unknown orientation '{other}' (expected portrait, landscape)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum LogoPosition {
    #[default]
    TopRight,
    TopLeft,
    BottomRight,
    BottomLeft,
}

impl std::str::FromStr for LogoPosition {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "top-right" => Ok(LogoPosition::TopRight),
            "top-left" => Ok(LogoPosition::TopLeft),
            "bottom-right" => Ok(LogoPosition::BottomRight),
            "bottom-left" => Ok(LogoPosition::BottomLeft),
            other => Err(PdfError::ConfigurationError(format!(
                "unknown logo position '{other}' (expected top-right, top-left, bottom-right, bottom-left)"
            ))),
        }
    }
}

/// Four-sided page margin in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Margin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Margin {
    pub fn uniform(value: f64) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }
}

impl Default for Margin {
    fn default() -> Self {
        Self::uniform(20.0)
    }
}

impl std::str::FromStr for Margin {
    type Err = PdfError;

    /// Parses `"20"` (uniform) or `"top,right,bottom,left"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PdfError::ConfigurationError(format!("invalid margin '{s}': {e}")))?;

        match values.as_slice() {
            [all] => Ok(Margin::uniform(*all)),
            [top, right, bottom, left] => Ok(Margin {
                top: *top,
                right: *right,
                bottom: *bottom,
                left: *left,
            }),
            _ => Err(PdfError::ConfigurationError(format!(
                "invalid margin '{s}': expected 1 or 4 values"
            ))),
        }
    }
}

/// Effective options for one PDF generation run
///
/// Built from [`CaptureOptions::default`] with [`CaptureOverrides`] merged
/// on top; never mutated once a run starts.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CaptureOptions {
    pub filename: String,
    /// JPEG fidelity for embedded bitmaps, 0.0 to 1.0
    pub quality: f64,
    /// Pixel-density multiplier for rasterization
    pub scale: f64,
    pub format: PageFormat,
    pub orientation: Orientation,
    pub margin: Margin,
    pub include_logo: bool,
    pub logo_path: String,
    pub logo_position: LogoPosition,
    /// Nominal logo width in millimetres
    pub logo_size: f64,
    pub show_page_numbers: bool,
    pub show_timestamp: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            filename: default_filename(),
            quality: 0.98,
            scale: 2.0,
            format: PageFormat::A4,
            orientation: Orientation::Portrait,
            margin: Margin::default(),
            include_logo: true,
            logo_path: DEFAULT_LOGO_PATH.to_string(),
            logo_position: LogoPosition::TopRight,
            logo_size: 40.0,
            show_page_numbers: true,
            show_timestamp: true,
        }
    }
}

/// `kitesafaris-content-<ISO date>.pdf` for today.
pub fn default_filename() -> String {
    format!(
        "kitesafaris-content-{}.pdf",
        chrono::Local::now().format("%Y-%m-%d")
    )
}

impl CaptureOptions {
    pub fn validate(&self) -> Result<(), PdfError> {
        if self.filename.trim().is_empty() {
            return Err(PdfError::ConfigurationError(
                "filename must not be empty".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.quality) {
            return Err(PdfError::ConfigurationError(format!(
                "quality must be between 0 and 1, got {}",
                self.quality
            )));
        }

        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(PdfError::ConfigurationError(format!(
                "scale must be greater than 0, got {}",
                self.scale
            )));
        }

        if !self.logo_size.is_finite() || self.logo_size <= 0.0 {
            return Err(PdfError::ConfigurationError(format!(
                "logo size must be greater than 0, got {}",
                self.logo_size
            )));
        }

        let m = &self.margin;
        if [m.top, m.right, m.bottom, m.left]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(PdfError::ConfigurationError(
                "margins must be non-negative".to_string(),
            ));
        }

        // Content area is checked by PageGeometry, which owns the page sizes.
        crate::PageGeometry::from_options(self).map(|_| ())
    }
}

/// Caller-supplied partial options
///
/// Every field is optional; unset fields keep the value underneath.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureOverrides {
    pub filename: Option<String>,
    pub quality: Option<f64>,
    pub scale: Option<f64>,
    pub format: Option<PageFormat>,
    pub orientation: Option<Orientation>,
    pub margin: Option<Margin>,
    pub include_logo: Option<bool>,
    pub logo_path: Option<String>,
    pub logo_position: Option<LogoPosition>,
    pub logo_size: Option<f64>,
    pub show_page_numbers: Option<bool>,
    pub show_timestamp: Option<bool>,
}

impl CaptureOverrides {
    /// Layers `self` over `base`, returning the merged options.
    pub fn apply_to(&self, base: CaptureOptions) -> CaptureOptions {
        CaptureOptions {
            filename: self.filename.clone().unwrap_or(base.filename),
            quality: self.quality.unwrap_or(base.quality),
            scale: self.scale.unwrap_or(base.scale),
            format: self.format.unwrap_or(base.format),
            orientation: self.orientation.unwrap_or(base.orientation),
            margin: self.margin.unwrap_or(base.margin),
            include_logo: self.include_logo.unwrap_or(base.include_logo),
            logo_path: self.logo_path.clone().unwrap_or(base.logo_path),
            logo_position: self.logo_position.unwrap_or(base.logo_position),
            logo_size: self.logo_size.unwrap_or(base.logo_size),
            show_page_numbers: self.show_page_numbers.unwrap_or(base.show_page_numbers),
            show_timestamp: self.show_timestamp.unwrap_or(base.show_timestamp),
        }
    }

    /// Defaults, then the configured defaults, then these overrides.
    pub fn resolve(&self, config: &Config) -> Result<CaptureOptions, PdfError> {
        let options = self.apply_to(config.defaults.apply_to(CaptureOptions::default()));
        options.validate()?;
        Ok(options)
    }
}

pub fn validate_config(config: &Config) -> Result<(), PdfError> {
    if config.viewport.width == 0 || config.viewport.height == 0 {
        return Err(PdfError::ConfigurationError(
            "viewport dimensions must be greater than 0".to_string(),
        ));
    }

    for (name, timeout) in [
        ("navigation timeout", config.navigation_timeout),
        ("capture timeout", config.capture_timeout),
        ("logo timeout", config.logo_timeout),
    ] {
        if timeout.is_zero() {
            return Err(PdfError::ConfigurationError(format!(
                "{name} must be greater than 0"
            )));
        }
    }

    for (name, value) in &config.palette {
        if name.is_empty() || value.is_empty() {
            return Err(PdfError::ConfigurationError(format!(
                "invalid palette entry '{name}' = '{value}'"
            )));
        }
    }

    config.defaults.resolve(config).map(|_| ())
}

/// Generate Chrome command-line arguments based on configuration
///
/// Each launch gets its own user data directory so concurrent processes do
/// not trip Chrome's singleton lock.
pub fn get_chrome_args(config: &Config) -> Vec<String> {
    let unique_id = format!("{}-{}", std::process::id(), uuid::Uuid::new_v4());

    vec![
        "--headless".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-background-timer-throttling".to_string(),
        "--disable-renderer-backgrounding".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--hide-scrollbars".to_string(),
        // Cross-origin images must stay capturable.
        "--disable-web-security".to_string(),
        format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        ),
        format!("--user-data-dir=/tmp/visual-pdf-{unique_id}"),
    ]
}

pub fn create_browser_config(
    config: &Config,
) -> Result<chromiumoxide::browser::BrowserConfig, PdfError> {
    use chromiumoxide::browser::BrowserConfig;

    let mut builder = BrowserConfig::builder()
        .window_size(config.viewport.width, config.viewport.height)
        .args(get_chrome_args(config));

    if let Some(chrome_path) = &config.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder.build().map_err(PdfError::BrowserLaunchFailed)
}
