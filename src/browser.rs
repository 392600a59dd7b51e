//! Headless Chrome session hosting the page being exported
//!
//! Owns the browser process and the background task that pumps Chrome
//! DevTools Protocol events. One session serves one generator run.

use crate::{create_browser_config, ChromeHost, Config, PdfError};
use chromiumoxide::browser::Browser;
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info};

pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<Result<(), CdpError>>,
    config: Config,
    created_at: Instant,
}

impl BrowserSession {
    pub async fn launch(config: Config) -> Result<Self, PdfError> {
        let browser_config = create_browser_config(&config)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| PdfError::BrowserLaunchFailed(e.to_string()))?;

        // The handler implements Stream and must be polled for the browser to make progress
        let handler = tokio::spawn(async move {
            loop {
                match handler.next().await {
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        error!("Handler error: {}", e);
                        return Err(e);
                    }
                    None => {
                        info!("Handler stream ended");
                        break;
                    }
                }
            }
            Ok(())
        });

        info!("Browser session started");

        Ok(Self {
            browser,
            handler,
            config,
            created_at: Instant::now(),
        })
    }

    /// Opens `url` in a new tab and waits for navigation to settle.
    pub async fn open(&self, url: &str) -> Result<ChromeHost, PdfError> {
        if self.handler.is_finished() {
            return Err(PdfError::BrowserLaunchFailed(
                "browser handler is no longer running".to_string(),
            ));
        }

        let navigation = async {
            let page = self.browser.new_page(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, CdpError>(page)
        };

        let page = timeout(self.config.navigation_timeout, navigation)
            .await
            .map_err(|_| PdfError::Timeout(self.config.navigation_timeout))??;

        info!("Loaded {} after {:?}", url, self.created_at.elapsed());
        Ok(ChromeHost::new(page))
    }

    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            error!("Failed to close browser: {}", e);
        }
        self.handler.abort();
        info!("Browser session closed");
    }
}
