use crate::PipelineStage;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PdfError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Capture failed: {0}")]
    CaptureError(String),

    #[error("Logo load failed: {0}")]
    LogoLoadError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Browser launch failed: {0}")]
    BrowserLaunchFailed(String),

    #[error("Page error: {0}")]
    PageError(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Failed to generate visual PDF during {stage}: {source}")]
    GenerationFailed {
        stage: PipelineStage,
        source: Box<PdfError>,
    },
}

impl PdfError {
    /// Wraps a stage failure with the orchestrator's message prefix.
    pub fn generation_failed(stage: PipelineStage, source: PdfError) -> Self {
        PdfError::GenerationFailed {
            stage,
            source: Box::new(source),
        }
    }

    /// The innermost error, looking through `GenerationFailed` wrappers.
    pub fn root_cause(&self) -> &PdfError {
        match self {
            PdfError::GenerationFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Errors the pipeline tolerates without aborting the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PdfError::LogoLoadError(_))
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.root_cause() {
            PdfError::LogoLoadError(_) => ErrorSeverity::Low,
            PdfError::ElementNotFound(_) => ErrorSeverity::Low,
            PdfError::ConfigurationError(_) => ErrorSeverity::High,
            PdfError::BrowserLaunchFailed(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Medium,
        }
    }

    /// Short label used for the failure metric.
    pub fn kind(&self) -> &'static str {
        match self.root_cause() {
            PdfError::ElementNotFound(_) => "element_not_found",
            PdfError::CaptureError(_) => "capture",
            PdfError::LogoLoadError(_) => "logo",
            PdfError::SerializationError(_) => "serialization",
            PdfError::ConfigurationError(_) => "configuration",
            PdfError::BrowserLaunchFailed(_) => "browser_launch",
            PdfError::PageError(_) => "page",
            PdfError::Timeout(_) => "timeout",
            PdfError::IoError(_) => "io",
            PdfError::GenerationFailed { .. } => "generation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl From<std::io::Error> for PdfError {
    fn from(err: std::io::Error) -> Self {
        PdfError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for PdfError {
    fn from(err: serde_json::Error) -> Self {
        PdfError::SerializationError(err.to_string())
    }
}

impl From<image::ImageError> for PdfError {
    fn from(err: image::ImageError) -> Self {
        PdfError::CaptureError(err.to_string())
    }
}

impl From<chromiumoxide::error::CdpError> for PdfError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        PdfError::PageError(err.to_string())
    }
}
