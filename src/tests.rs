#[cfg(test)]
mod integration_tests {
    use crate::{
        CaptureOverrides, CaptureRequest, CaptureTarget, Config, ElementMetrics, HostPage,
        LogoLoader, PdfError, PipelineStage, VisualPdfService, OVERLAY_ELEMENT_ID,
    };
    use async_trait::async_trait;
    use image::{ImageOutputFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let bitmap = RgbaImage::from_pixel(width, height, Rgba([11, 31, 58, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(bitmap)
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    #[derive(Default)]
    struct HostState {
        style_inserts: usize,
        style_removals: usize,
        attached_styles: Vec<String>,
        overlay_shows: usize,
        overlay_visible: bool,
        captures: usize,
        styles_seen_by_capture: usize,
        hidden_ids: Vec<String>,
        hidden_during_capture: Vec<String>,
    }

    /// In-memory page with one element per known id and switchable faults.
    struct FakeHost {
        element_ids: Vec<String>,
        /// CSS pixel size of every element, body included
        size: (f64, f64),
        fail_capture: bool,
        fail_overlay: bool,
        capture_delay: Option<Duration>,
        /// Pixel size returned by the capture instead of `size × scale`
        capture_size: Option<(u32, u32)>,
        state: Mutex<HostState>,
    }

    impl FakeHost {
        fn new(element_ids: &[&str], size: (f64, f64)) -> Self {
            Self {
                element_ids: element_ids.iter().map(|id| id.to_string()).collect(),
                size,
                fail_capture: false,
                fail_overlay: false,
                capture_delay: None,
                capture_size: None,
                state: Mutex::new(HostState::default()),
            }
        }

        fn with_failing_capture(mut self) -> Self {
            self.fail_capture = true;
            self
        }

        fn with_failing_overlay(mut self) -> Self {
            self.fail_overlay = true;
            self
        }

        fn with_slow_capture(mut self, delay: Duration) -> Self {
            self.capture_delay = Some(delay);
            self
        }

        fn with_capture_size(mut self, width: u32, height: u32) -> Self {
            self.capture_size = Some((width, height));
            self
        }

        fn state(&self) -> std::sync::MutexGuard<'_, HostState> {
            self.state.lock().unwrap()
        }
    }

    #[async_trait]
    impl HostPage for FakeHost {
        async fn element_metrics(
            &self,
            target: &CaptureTarget,
        ) -> Result<Option<ElementMetrics>, PdfError> {
            let found = match target {
                CaptureTarget::Element(id) => self.element_ids.contains(id),
                CaptureTarget::WholeDocument => true,
            };
            Ok(found.then_some(ElementMetrics {
                x: 0.0,
                y: 120.0,
                width: self.size.0,
                height: self.size.1,
            }))
        }

        async fn insert_style(&self, node_id: &str, _css: &str) -> Result<(), PdfError> {
            let mut state = self.state();
            state.style_inserts += 1;
            state.attached_styles.push(node_id.to_string());
            Ok(())
        }

        async fn remove_style(&self, node_id: &str) -> Result<bool, PdfError> {
            let mut state = self.state();
            state.style_removals += 1;
            let before = state.attached_styles.len();
            state.attached_styles.retain(|id| id != node_id);
            Ok(state.attached_styles.len() < before)
        }

        async fn show_overlay(&self, _overlay_id: &str, _message: &str) -> Result<(), PdfError> {
            if self.fail_overlay {
                return Err(PdfError::PageError("document body is gone".to_string()));
            }
            let mut state = self.state();
            state.overlay_shows += 1;
            state.overlay_visible = true;
            Ok(())
        }

        async fn hide_overlay(&self, _overlay_id: &str) -> Result<(), PdfError> {
            if self.fail_overlay {
                return Err(PdfError::PageError("document body is gone".to_string()));
            }
            self.state().overlay_visible = false;
            Ok(())
        }

        async fn set_hidden(&self, element_ids: &[String], hidden: bool) -> Result<(), PdfError> {
            let mut state = self.state();
            if hidden {
                state.hidden_ids.extend(element_ids.iter().cloned());
            } else {
                state.hidden_ids.retain(|id| !element_ids.contains(id));
            }
            Ok(())
        }

        async fn wait_for_images(
            &self,
            _target: &CaptureTarget,
            _max_wait: Duration,
        ) -> Result<(), PdfError> {
            Ok(())
        }

        async fn capture_png(&self, request: &CaptureRequest) -> Result<Vec<u8>, PdfError> {
            {
                let mut state = self.state();
                state.captures += 1;
                state.styles_seen_by_capture = state.attached_styles.len();
                state.hidden_during_capture = state.hidden_ids.clone();
            }
            if let Some(delay) = self.capture_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_capture {
                return Err(PdfError::CaptureError("canvas is tainted".to_string()));
            }
            let (width, height) = self.capture_size.unwrap_or((
                (request.metrics.width * request.scale).round() as u32,
                (request.metrics.height * request.scale).round() as u32,
            ));
            Ok(png_bytes(width, height))
        }
    }

    struct StaticLogoLoader;

    #[async_trait]
    impl LogoLoader for StaticLogoLoader {
        async fn load(&self, _source: &str) -> Result<Vec<u8>, PdfError> {
            Ok(png_bytes(200, 80))
        }
    }

    struct SlowLogoLoader(Duration);

    #[async_trait]
    impl LogoLoader for SlowLogoLoader {
        async fn load(&self, _source: &str) -> Result<Vec<u8>, PdfError> {
            tokio::time::sleep(self.0).await;
            Ok(png_bytes(200, 80))
        }
    }

    fn temp_output_dir() -> PathBuf {
        std::env::temp_dir().join(format!("visual-pdf-test-{}", uuid::Uuid::new_v4()))
    }

    fn test_config() -> Config {
        Config {
            output_dir: temp_output_dir(),
            logo_timeout: Duration::from_millis(500),
            ..Default::default()
        }
    }

    /// 500x1500 CSS px at scale 2 is 1000x3000 px, two A4 pages with default margins.
    fn two_page_host() -> FakeHost {
        FakeHost::new(&["trip-details"], (500.0, 1500.0))
    }

    fn service(host: Arc<FakeHost>, config: Config) -> VisualPdfService {
        VisualPdfService::new(host, config).with_logo_loader(Arc::new(StaticLogoLoader))
    }

    fn overrides(filename: &str) -> CaptureOverrides {
        CaptureOverrides {
            filename: Some(filename.to_string()),
            ..Default::default()
        }
    }

    fn assert_page_restored(host: &FakeHost) {
        let state = host.state();
        assert!(!state.overlay_visible, "overlay left visible");
        assert!(state.attached_styles.is_empty(), "color fallbacks left attached");
        assert_eq!(state.style_inserts, state.style_removals);
        assert!(state.hidden_ids.is_empty(), "elements left hidden: {:?}", state.hidden_ids);
    }

    fn assert_capture_stage_failure(err: &PdfError) {
        match err {
            PdfError::GenerationFailed { stage, source } => {
                assert_eq!(*stage, PipelineStage::Capture);
                assert!(matches!(**source, PdfError::CaptureError(_)), "got {source:?}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_successful_run_writes_pdf_and_restores_page() {
        let host = Arc::new(two_page_host());
        let config = test_config();
        let output_dir = config.output_dir.clone();

        let report = assert_ok!(
            service(host.clone(), config)
                .generate_visual_pdf("trip-details", &overrides("kenya-trip.pdf"))
                .await
        );

        assert_eq!(report.page_count, 2);
        assert_eq!(report.logo_count, 2);
        assert_eq!(report.output_path, output_dir.join("kenya-trip.pdf"));
        assert_eq!(
            report.stages,
            vec![
                PipelineStage::ShowOverlay,
                PipelineStage::Capture,
                PipelineStage::Slice,
                PipelineStage::Compose,
                PipelineStage::Save,
                PipelineStage::HideOverlay,
            ]
        );

        let bytes = std::fs::read(&report.output_path).unwrap();
        assert_eq!(bytes.len(), report.file_size);
        assert!(bytes.starts_with(b"%PDF-"));

        {
            let state = host.state();
            assert_eq!(state.style_inserts, 1);
            assert_eq!(state.overlay_shows, 1);
            assert_eq!(state.styles_seen_by_capture, 1);
            assert_eq!(state.hidden_during_capture, vec![OVERLAY_ELEMENT_ID.to_string()]);
        }
        assert_page_restored(&host);

        let _ = std::fs::remove_dir_all(output_dir);
    }

    #[tokio::test]
    async fn test_capture_failure_cleans_up_before_returning() {
        let host = Arc::new(two_page_host().with_failing_capture());
        let config = test_config();
        let output_dir = config.output_dir.clone();

        let err = assert_err!(
            service(host.clone(), config)
                .generate_visual_pdf("trip-details", &overrides("broken.pdf"))
                .await
        );

        assert_capture_stage_failure(&err);
        assert!(err.to_string().starts_with("Failed to generate visual PDF"));

        assert_eq!(host.state().style_inserts, 1);
        assert_page_restored(&host);
        assert!(!output_dir.join("broken.pdf").exists());
    }

    #[tokio::test]
    async fn test_capture_timeout_restores_hidden_overlay() {
        let host = Arc::new(two_page_host().with_slow_capture(Duration::from_millis(500)));
        let config = Config {
            capture_timeout: Duration::from_millis(50),
            ..test_config()
        };
        let output_dir = config.output_dir.clone();

        let err = assert_err!(
            service(host.clone(), config)
                .generate_visual_pdf("trip-details", &overrides("timeout.pdf"))
                .await
        );

        assert_capture_stage_failure(&err);
        assert!(err.root_cause().to_string().contains("timed out"));
        {
            let state = host.state();
            assert_eq!(state.captures, 1);
            assert_eq!(state.hidden_during_capture, vec![OVERLAY_ELEMENT_ID.to_string()]);
        }
        assert_page_restored(&host);
        assert!(!output_dir.join("timeout.pdf").exists());
    }

    #[tokio::test]
    async fn test_capture_size_mismatch_is_not_fatal() {
        // Expected 1000x3000 at scale 2; the host hands back a single page worth.
        let host = Arc::new(two_page_host().with_capture_size(1000, 1200));
        let config = test_config();
        let output_dir = config.output_dir.clone();

        let report = assert_ok!(
            service(host.clone(), config)
                .generate_visual_pdf("trip-details", &overrides("mismatch.pdf"))
                .await
        );

        assert_eq!(report.page_count, 1);
        assert_page_restored(&host);

        let _ = std::fs::remove_dir_all(output_dir);
    }

    #[tokio::test]
    async fn test_zero_sized_target_is_a_capture_error() {
        let host = Arc::new(FakeHost::new(&["collapsed"], (0.0, 0.0)));

        let err = assert_err!(
            service(host.clone(), test_config())
                .generate_visual_pdf("collapsed", &CaptureOverrides::default())
                .await
        );

        assert_capture_stage_failure(&err);
        {
            let state = host.state();
            assert_eq!(state.style_inserts, 0);
            assert_eq!(state.captures, 0);
        }
        assert_page_restored(&host);
    }

    #[tokio::test]
    async fn test_missing_element_never_touches_styles() {
        let host = Arc::new(two_page_host());

        let err = service(host.clone(), test_config())
            .generate_visual_pdf("no-such-section", &CaptureOverrides::default())
            .await
            .unwrap_err();

        assert!(matches!(err.root_cause(), PdfError::ElementNotFound(id) if id.contains("no-such-section")));
        let state = host.state();
        assert_eq!(state.style_inserts, 0);
        assert_eq!(state.captures, 0);
        assert!(!state.overlay_visible);
    }

    #[tokio::test]
    async fn test_empty_element_id_is_rejected_up_front() {
        let host = Arc::new(two_page_host());

        let err = service(host.clone(), test_config())
            .generate_visual_pdf("  ", &CaptureOverrides::default())
            .await
            .unwrap_err();

        assert!(matches!(err.root_cause(), PdfError::ElementNotFound(_)));
        assert_eq!(host.state().overlay_shows, 0);
    }

    #[tokio::test]
    async fn test_invalid_options_fail_before_page_is_touched() {
        let host = Arc::new(two_page_host());
        let bad = CaptureOverrides {
            quality: Some(1.5),
            ..Default::default()
        };

        let err = service(host.clone(), test_config())
            .generate_visual_pdf("trip-details", &bad)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PdfError::GenerationFailed {
                stage: PipelineStage::Idle,
                ..
            }
        ));
        let state = host.state();
        assert_eq!(state.overlay_shows, 0);
        assert_eq!(state.style_inserts, 0);
    }

    #[tokio::test]
    async fn test_without_logo_pages_still_have_footers() {
        let host = Arc::new(two_page_host());
        let config = test_config();
        let output_dir = config.output_dir.clone();
        let no_logo = CaptureOverrides {
            include_logo: Some(false),
            ..overrides("plain.pdf")
        };

        let report = service(host, config)
            .generate_visual_pdf("trip-details", &no_logo)
            .await
            .unwrap();

        assert_eq!(report.page_count, 2);
        assert_eq!(report.logo_count, 0);

        let _ = std::fs::remove_dir_all(output_dir);
    }

    #[tokio::test]
    async fn test_slow_logo_is_skipped_not_fatal() {
        let host = Arc::new(two_page_host());
        let config = Config {
            logo_timeout: Duration::from_millis(50),
            ..test_config()
        };
        let output_dir = config.output_dir.clone();

        let report = VisualPdfService::new(host.clone(), config)
            .with_logo_loader(Arc::new(SlowLogoLoader(Duration::from_millis(400))))
            .generate_visual_pdf("trip-details", &overrides("slow-logo.pdf"))
            .await
            .unwrap();

        assert_eq!(report.page_count, 2);
        assert_eq!(report.logo_count, 0);
        assert!(report.output_path.exists());
        assert_page_restored(&host);

        let _ = std::fs::remove_dir_all(output_dir);
    }

    #[tokio::test]
    async fn test_full_page_capture_with_single_page() {
        let host = Arc::new(FakeHost::new(&[], (400.0, 300.0)));
        let config = test_config();
        let output_dir = config.output_dir.clone();

        let report = service(host.clone(), config)
            .generate_full_page_visual_pdf(&overrides("home.pdf"))
            .await
            .unwrap();

        assert_eq!(report.page_count, 1);
        assert_eq!(host.state().captures, 1);
        assert_page_restored(&host);

        let _ = std::fs::remove_dir_all(output_dir);
    }

    #[tokio::test]
    async fn test_overlay_failures_do_not_abort_the_run() {
        let host = Arc::new(two_page_host().with_failing_overlay());
        let config = test_config();
        let output_dir = config.output_dir.clone();

        let report = service(host.clone(), config)
            .generate_visual_pdf("trip-details", &overrides("no-overlay.pdf"))
            .await
            .unwrap();

        assert_eq!(report.page_count, 2);
        assert_page_restored(&host);

        let _ = std::fs::remove_dir_all(output_dir);
    }

    #[tokio::test]
    async fn test_unwritable_output_is_a_serialization_error() {
        let blocker = std::env::temp_dir().join(format!("visual-pdf-file-{}", uuid::Uuid::new_v4()));
        std::fs::write(&blocker, b"not a directory").unwrap();
        let config = Config {
            output_dir: blocker.join("exports"),
            ..test_config()
        };
        let host = Arc::new(two_page_host());

        let err = service(host.clone(), config)
            .generate_visual_pdf("trip-details", &overrides("guide.pdf"))
            .await
            .unwrap_err();

        assert!(matches!(
            &err,
            PdfError::GenerationFailed {
                stage: PipelineStage::Save,
                ..
            }
        ));
        assert!(matches!(err.root_cause(), PdfError::SerializationError(_)));
        assert_page_restored(&host);

        let _ = std::fs::remove_file(blocker);
    }

    #[tokio::test]
    async fn test_filename_is_sanitized_into_output_dir() {
        let host = Arc::new(two_page_host());
        let config = test_config();
        let output_dir = config.output_dir.clone();

        let report = service(host, config)
            .generate_visual_pdf("trip-details", &overrides("../trips/kenya"))
            .await
            .unwrap();

        assert_eq!(report.output_path.parent(), Some(output_dir.as_path()));
        assert_eq!(
            report.output_path.file_name().and_then(|n| n.to_str()),
            Some("_trips_kenya.pdf")
        );

        let _ = std::fs::remove_dir_all(output_dir);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PipelineStage::Capture.to_string(), "capture");
        assert_eq!(PipelineStage::HideOverlay.to_string(), "hide overlay");
    }
}
