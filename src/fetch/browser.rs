//! Headless Chromium fetcher for pages that render their content with JavaScript.

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{sleep, timeout, Instant},
};

use super::{FetchError, PageFetcher};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Chromium binary, auto detected when `None`.
    pub chrome_executable: Option<PathBuf>,
    pub user_agent: Option<String>,
    /// How long to wait for `wait_for_selector` after navigation.
    pub wait: Duration,
    pub wait_for_selector: Option<String>,
    /// Upper bound for a whole fetch.
    pub timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            user_agent: None,
            wait: Duration::from_secs(5),
            wait_for_selector: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Chromium switches on top of chromiumoxide's defaults. Headless mode is set on the builder.
fn launch_args(options: &BrowserOptions) -> Vec<String> {
    let mut args: Vec<String> = [
        "--disable-gpu",
        "--no-sandbox",
        "--disable-dev-shm-usage",
        "--disable-extensions",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    if let Some(user_agent) = &options.user_agent {
        args.push(format!("--user-agent={user_agent}"));
    }
    args
}

/// Renders pages in a single headless Chromium, one tab per fetch.
pub struct BrowserFetcher {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    options: BrowserOptions,
}

impl BrowserFetcher {
    pub async fn launch(options: BrowserOptions) -> Result<Self, FetchError> {
        let mut builder = BrowserConfig::builder()
            .new_headless_mode()
            .args(launch_args(&options))
            .request_timeout(options.timeout);
        if let Some(chrome_executable) = &options.chrome_executable {
            builder = builder.chrome_executable(chrome_executable);
        }
        let config = builder
            .build()
            .map_err(|err| FetchError::Browser(err.to_string()))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| FetchError::Browser(format!("failed to launch Chromium: {err}")))?;
        tracing::info!("browser: launched headless Chromium");

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    tracing::debug!("browser: handler stopped: {}", err);
                    break;
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            options,
        })
    }

    async fn render(&self, page: &Page, url: &str) -> Result<String, FetchError> {
        page.wait_for_navigation().await.map_err(browser_error)?;

        if let Some(selector) = &self.options.wait_for_selector {
            let deadline = Instant::now() + self.options.wait;
            while page.find_element(selector.as_str()).await.is_err() {
                if Instant::now() >= deadline {
                    tracing::debug!(url, selector, "browser: selector never appeared");
                    break;
                }
                sleep(POLL_INTERVAL).await;
            }
        }

        page.content().await.map_err(browser_error)
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!(url, "rendering");
        let fetch_timeout = self.options.timeout;
        let page = {
            let browser = self.browser.lock().await;
            timeout(fetch_timeout, browser.new_page(url))
                .await
                .map_err(|_| FetchError::Timeout(fetch_timeout, url.to_string()))?
                .map_err(browser_error)?
        };

        let result = timeout(fetch_timeout, self.render(&page, url))
            .await
            .map_err(|_| FetchError::Timeout(fetch_timeout, url.to_string()))
            .and_then(|rendered| rendered);

        if let Err(err) = page.close().await {
            tracing::debug!(url, "browser: failed to close tab: {}", err);
        }
        result
    }

    async fn shutdown(&self) -> Result<(), FetchError> {
        let mut browser = self.browser.lock().await;
        browser.close().await.map_err(browser_error)?;
        if let Err(err) = browser.wait().await {
            tracing::debug!("browser: failed waiting for exit: {}", err);
        }
        self.handler.abort();
        tracing::info!("browser: closed");
        Ok(())
    }
}

fn browser_error(err: chromiumoxide::error::CdpError) -> FetchError {
    FetchError::Browser(err.to_string())
}
