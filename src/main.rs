use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tokio::signal;
use tracing::{error, info};
use visual_pdf::{
    install_prometheus_recorder, setup_logging, validate_config, Cli, CliRunner, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Cli::parse();

    setup_logging(args.verbose)?;

    info!("Starting visual-pdf v{}", env!("CARGO_PKG_VERSION"));

    let metrics_handle = if args.print_metrics {
        Some(install_prometheus_recorder()?)
    } else {
        None
    };

    let config = load_config(&args).await?;
    let cli_runner = CliRunner::new(config, &args);

    // An interrupted run drops the browser session, which kills Chrome.
    let result = tokio::select! {
        result = cli_runner.run(args.command) => result,
        _ = shutdown_signal() => {
            info!("Received shutdown signal");
            Err(anyhow::anyhow!("interrupted"))
        }
    };

    if let Some(handle) = metrics_handle {
        println!("{}", handle.render());
    }

    match result {
        Ok(()) => {
            info!("visual-pdf finished");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("Application error: {:#}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn load_config(args: &Cli) -> anyhow::Result<Config> {
    let config = if let Some(config_path) = &args.config {
        let config_content = tokio::fs::read_to_string(config_path)
            .await
            .with_context(|| format!("could not read {}", config_path.display()))?;
        serde_json::from_str(&config_content)
            .with_context(|| format!("could not parse {}", config_path.display()))?
    } else {
        Config::default()
    };

    validate_config(&config)?;

    info!("Configuration loaded successfully");
    info!("Output directory: {}", config.output_dir.display());
    info!("Capture timeout: {:?}", config.capture_timeout);

    Ok(config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to create SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
