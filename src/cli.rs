use crate::{
    format_bytes, format_duration, validate_config, validate_url, BrowserSession,
    CaptureOverrides, Config, GenerationReport, LogoPosition, Margin, Orientation, PageFormat,
    VisualPdfService,
};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "visual-pdf")]
#[command(about = "Export rendered web page sections to paginated, branded PDFs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Chrome executable path")]
    pub chrome_path: Option<String>,

    #[arg(long, global = true, help = "Directory PDFs are written to")]
    pub output_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Print Prometheus metrics on exit")]
    pub print_metrics: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export one element of a page
    Element {
        #[arg(short, long, help = "Page to load")]
        url: String,

        #[arg(short, long, help = "Id of the element to capture")]
        target: String,

        #[command(flatten)]
        capture: CaptureArgs,
    },

    /// Export the whole document body of a page
    FullPage {
        #[arg(short, long, help = "Page to load")]
        url: String,

        #[command(flatten)]
        capture: CaptureArgs,
    },

    /// Validate configuration
    Validate {
        #[arg(short, long, help = "Configuration file to validate")]
        config: PathBuf,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct CaptureArgs {
    #[arg(long, help = "Output file name")]
    pub filename: Option<String>,

    #[arg(long, help = "Image quality between 0 and 1")]
    pub quality: Option<f64>,

    #[arg(long, help = "Rasterization scale factor")]
    pub scale: Option<f64>,

    #[arg(long, help = "Page format (a4, a3, letter, legal)")]
    pub format: Option<PageFormat>,

    #[arg(long, help = "Page orientation (portrait, landscape)")]
    pub orientation: Option<Orientation>,

    #[arg(long, help = "Margin in mm, either one value or top,right,bottom,left")]
    pub margin: Option<Margin>,

    #[arg(long, help = "Do not stamp the logo on pages")]
    pub no_logo: bool,

    #[arg(long, help = "Logo image path or URL")]
    pub logo_path: Option<String>,

    #[arg(long, help = "Logo corner (top-right, top-left, bottom-right, bottom-left)")]
    pub logo_position: Option<LogoPosition>,

    #[arg(long, help = "Logo width in mm")]
    pub logo_size: Option<f64>,

    #[arg(long, help = "Omit the page number footer")]
    pub no_page_numbers: bool,

    #[arg(long, help = "Omit the generation timestamp")]
    pub no_timestamp: bool,

    #[arg(long, help = "Wait time in milliseconds after page load before capturing")]
    pub wait: Option<u64>,
}

impl CaptureArgs {
    pub fn overrides(&self) -> CaptureOverrides {
        CaptureOverrides {
            filename: self.filename.clone(),
            quality: self.quality,
            scale: self.scale,
            format: self.format,
            orientation: self.orientation,
            margin: self.margin,
            include_logo: self.no_logo.then_some(false),
            logo_path: self.logo_path.clone(),
            logo_position: self.logo_position,
            logo_size: self.logo_size,
            show_page_numbers: self.no_page_numbers.then_some(false),
            show_timestamp: self.no_timestamp.then_some(false),
        }
    }
}

pub struct CliRunner {
    pub config: Config,
}

impl CliRunner {
    pub fn new(mut config: Config, args: &Cli) -> Self {
        if let Some(chrome_path) = &args.chrome_path {
            config.chrome_path = Some(chrome_path.clone());
        }
        if let Some(output_dir) = &args.output_dir {
            config.output_dir = output_dir.clone();
        }

        Self { config }
    }

    pub async fn run(&self, command: Commands) -> anyhow::Result<()> {
        match command {
            Commands::Element {
                url,
                target,
                capture,
            } => {
                let report = self.export(&url, Some(&target), &capture).await?;
                print_report(&report);
                Ok(())
            }
            Commands::FullPage { url, capture } => {
                let report = self.export(&url, None, &capture).await?;
                print_report(&report);
                Ok(())
            }
            Commands::Validate { config } => self.validate_config(config).await,
        }
    }

    /// Loads `url`, exports `target` (or the whole body) and closes the browser.
    pub async fn export(
        &self,
        url: &str,
        target: Option<&str>,
        capture: &CaptureArgs,
    ) -> anyhow::Result<GenerationReport> {
        let url = validate_url(url)?;
        let overrides = capture.overrides();
        // Reject bad options before a browser is started.
        overrides.resolve(&self.config)?;

        let session = BrowserSession::launch(self.config.clone())
            .await
            .context("could not start Chrome")?;

        let result = async {
            let host = session
                .open(url.as_str())
                .await
                .with_context(|| format!("could not load {url}"))?;

            if let Some(wait) = capture.wait {
                info!("Waiting {}ms before capture", wait);
                tokio::time::sleep(Duration::from_millis(wait)).await;
            }

            let service = VisualPdfService::new(Arc::new(host), self.config.clone());
            let report = match target {
                Some(id) => service.generate_visual_pdf(id, &overrides).await?,
                None => service.generate_full_page_visual_pdf(&overrides).await?,
            };
            Ok::<_, anyhow::Error>(report)
        }
        .await;

        session.shutdown().await;
        result
    }

    pub async fn validate_config(&self, config_path: PathBuf) -> anyhow::Result<()> {
        println!("Validating configuration: {}", config_path.display());

        let config_content = fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("could not read {}", config_path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("could not parse {}", config_path.display()))?;
        validate_config(&config)?;

        let defaults = config.defaults.resolve(&config)?;
        if config.palette.is_empty() {
            warn!("Palette is empty; unresolved colors will not be patched");
        }

        println!("Configuration is valid:");
        println!(
            "  Viewport: {}x{}",
            config.viewport.width, config.viewport.height
        );
        println!("  Navigation timeout: {:?}", config.navigation_timeout);
        println!("  Capture timeout: {:?}", config.capture_timeout);
        println!("  Logo timeout: {:?}", config.logo_timeout);
        println!("  Output directory: {}", config.output_dir.display());
        println!("  Branding: {}", config.branding);
        println!("  Palette entries: {}", config.palette.len());
        println!(
            "  Default page: {:?} {:?}, quality {}, scale {}",
            defaults.format, defaults.orientation, defaults.quality, defaults.scale
        );

        Ok(())
    }
}

fn print_report(report: &GenerationReport) {
    println!("PDF generated successfully:");
    println!("  Output: {}", report.output_path.display());
    println!("  Pages: {}", report.page_count);
    println!("  Logos: {}", report.logo_count);
    println!("  Size: {}", format_bytes(report.file_size));
    println!("  Duration: {}", format_duration(report.duration));
}

pub fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("could not install log subscriber: {e}"))?;

    Ok(())
}
