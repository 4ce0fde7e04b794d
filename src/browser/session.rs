//! Browser session management
//!
//! Handles launching and controlling one Chrome instance over the DevTools
//! protocol. Proxy settings can only be applied at launch, so every proxy
//! rotation tears the session down and opens a fresh one.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig, HeadlessMode};
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use tracing::{debug, info, warn};

use super::BrowserError;

/// Poll interval while waiting for an element to appear.
const ELEMENT_POLL_MS: u64 = 250;

/// Find a Chrome/Chromium executable on the system.
fn find_chrome() -> Option<PathBuf> {
    let candidates: Vec<PathBuf> = if cfg!(target_os = "windows") {
        let mut paths = vec![
            PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
            PathBuf::from(r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe"),
        ];
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            paths.push(PathBuf::from(format!(
                r"{}\Google\Chrome\Application\chrome.exe",
                local
            )));
        }
        paths
    } else if cfg!(target_os = "macos") {
        vec![PathBuf::from(
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        )]
    } else {
        vec![
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/chromium"),
            PathBuf::from("/usr/bin/chromium-browser"),
        ]
    };

    candidates.into_iter().find(|p| p.exists())
}

/// Configuration for a browser session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Path to Chrome/Chromium executable; auto-detected when None
    pub chrome_path: Option<String>,
    /// Run in headless mode
    pub headless: bool,
    /// Outbound proxy as `address:port`, applied via --proxy-server
    pub proxy: Option<String>,
    /// Navigation timeout in seconds
    pub nav_timeout_secs: u64,
    /// Window width
    pub window_width: u32,
    /// Window height
    pub window_height: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            proxy: None,
            nav_timeout_secs: 60,
            window_width: 1920,
            window_height: 1080,
        }
    }
}

impl SessionConfig {
    /// Set headless mode
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set proxy
    pub fn proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Set Chrome path
    pub fn chrome_path(mut self, path: Option<String>) -> Self {
        self.chrome_path = path;
        self
    }
}

/// One exclusive browser session.
///
/// Owned by the run controller for the duration of a run; closed and
/// recreated whenever the proxy configuration changes.
pub struct Session {
    browser: Option<Browser>,
    page: Option<Page>,
    alive: Arc<AtomicBool>,
    config: SessionConfig,
}

impl Session {
    /// Launch Chrome and take its first page.
    pub async fn open(config: SessionConfig) -> Result<Self, BrowserError> {
        info!(
            "Launching browser session (headless: {}, proxy: {})",
            config.headless,
            config.proxy.as_deref().unwrap_or("none")
        );

        let chrome_path = match &config.chrome_path {
            Some(path) => PathBuf::from(path),
            None => find_chrome().ok_or_else(|| {
                BrowserError::LaunchFailed(
                    "Chrome not found. Install it from https://www.google.com/chrome/ or pass an explicit path.".to_string(),
                )
            })?,
        };
        debug!("Using Chrome at {}", chrome_path.display());

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&chrome_path)
            .window_size(config.window_width, config.window_height)
            .headless_mode(if config.headless {
                HeadlessMode::New
            } else {
                HeadlessMode::False
            })
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .arg("--log-level=3")
            .arg("--no-sandbox");

        if let Some(ref proxy) = config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        let browser_config = builder.build().map_err(BrowserError::LaunchFailed)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        // Drain CDP events in the background; when the handler ends, Chrome
        // has disconnected or crashed.
        let alive = Arc::new(AtomicBool::new(true));
        let alive_for_handler = alive.clone();
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser event error: {}", e);
                }
            }
            warn!("Chrome disconnected (event handler ended)");
            alive_for_handler.store(false, Ordering::Relaxed);
        });

        // Chrome opens with a blank tab; take it as our page and drop extras.
        let page = {
            let mut pages = browser
                .pages()
                .await
                .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

            let main_page = if !pages.is_empty() {
                pages.remove(0)
            } else {
                browser
                    .new_page("about:blank")
                    .await
                    .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?
            };

            for extra in pages {
                debug!("Closing extra blank tab");
                let _ = extra.close().await;
            }

            main_page
        };

        info!("Browser session ready");

        Ok(Self {
            browser: Some(browser),
            page: Some(page),
            alive,
            config,
        })
    }

    /// Whether Chrome is still connected.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Proxy this session was launched with, if any.
    pub fn proxy(&self) -> Option<&str> {
        self.config.proxy.as_deref()
    }

    fn page(&self) -> Result<&Page, BrowserError> {
        self.page
            .as_ref()
            .ok_or_else(|| BrowserError::ConnectionLost("No active page".into()))
    }

    /// Navigate to a URL and wait for the navigation to settle.
    pub async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let page = self.page()?;

        debug!("Navigating to: {}", url);
        page.goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;

        tokio::time::timeout(
            Duration::from_secs(self.config.nav_timeout_secs),
            page.wait_for_navigation(),
        )
        .await
        .map_err(|_| BrowserError::Timeout("Navigation timeout".into()))?
        .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;

        Ok(())
    }

    /// Reload the current page
    pub async fn reload(&self) -> Result<(), BrowserError> {
        self.page()?
            .reload()
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
        Ok(())
    }

    async fn find(&self, selector: &str) -> Result<Element, BrowserError> {
        self.page()?
            .find_element(selector)
            .await
            .map_err(|e| BrowserError::ElementNotFound(format!("{}: {}", selector, e)))
    }

    /// Poll for an element until it appears or the timeout elapses.
    pub async fn wait_for_element(
        &self,
        selector: &str,
        timeout_secs: u64,
    ) -> Result<Element, BrowserError> {
        let page = self.page()?;

        tokio::time::timeout(Duration::from_secs(timeout_secs), async {
            loop {
                if let Ok(element) = page.find_element(selector).await {
                    return element;
                }
                tokio::time::sleep(Duration::from_millis(ELEMENT_POLL_MS)).await;
            }
        })
        .await
        .map_err(|_| {
            BrowserError::Timeout(format!(
                "element {} not present within {}s",
                selector, timeout_secs
            ))
        })
    }

    /// Wait for an element and return its inner text.
    pub async fn wait_for_text(
        &self,
        selector: &str,
        timeout_secs: u64,
    ) -> Result<String, BrowserError> {
        let element = self.wait_for_element(selector, timeout_secs).await?;
        let text = element
            .inner_text()
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;
        Ok(text.unwrap_or_default())
    }

    /// Clear an input and type a value into it.
    pub async fn clear_and_type(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        let element = self.find(selector).await?;

        element
            .call_js_fn("function() { this.value = ''; }", false)
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

        let element = element
            .click()
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;
        element
            .type_str(text)
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

        Ok(())
    }

    /// Type a value into an input.
    pub async fn type_into(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        let element = self.find(selector).await?;
        let element = element
            .click()
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;
        element
            .type_str(text)
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;
        Ok(())
    }

    /// Click on an element by selector
    pub async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let element = self.find(selector).await?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;
        Ok(())
    }

    /// Close the browser session. Errors during teardown are ignored; the
    /// force kill guarantees no orphaned Chrome processes.
    pub async fn close(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
        self.page = None;

        if let Some(mut browser) = self.browser.take() {
            // Graceful close first, brief grace period, then force kill.
            let _ = browser.close().await;
            tokio::time::sleep(Duration::from_millis(500)).await;
            let _ = browser.kill().await;
        }

        info!("Browser session closed");
    }
}
