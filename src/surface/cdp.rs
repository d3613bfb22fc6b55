//! Chromium-backed rendering surface over CDP.
//!
//! This is the concrete [`Surface`] used when relic-gate hosts the browser
//! itself (rather than being embedded next to one). One browser, one page;
//! the chromiumoxide handler stream is pumped on a background task, and
//! page-lifecycle events are forwarded to the login driver's serial stream.

use super::{PageEvent, ProbeReceiver, Surface, SurfaceError};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::page::{EventFrameStartedLoading, EventLoadEventFired};
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use std::path::Path;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Find a usable Chromium-family executable.
///
/// Resolution order: `CHROME_EXECUTABLE` env override, then a PATH scan over
/// the common binary names.
pub fn find_browser_executable() -> Option<String> {
    if let Ok(p) = std::env::var("CHROME_EXECUTABLE") {
        if Path::new(&p).exists() {
            return Some(p);
        }
    }
    for name in [
        "chromium",
        "chromium-browser",
        "google-chrome",
        "chrome",
        "brave-browser",
        "brave",
    ] {
        if let Ok(found) = which::which(name) {
            return Some(found.to_string_lossy().to_string());
        }
    }
    None
}

fn build_browser_config(exe: &str, proxy_url: Option<&str>) -> Result<BrowserConfig> {
    let mut builder = BrowserConfig::builder()
        .chrome_executable(exe)
        .window_size(1024, 768)
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions")
        .arg("--disable-background-networking")
        .arg("--disable-sync")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--mute-audio");

    if let Some(proxy) = proxy_url {
        builder = builder.arg(format!("--proxy-server={}", proxy));
    }

    builder
        .build()
        .map_err(|e| anyhow!("failed to build browser config: {}", e))
}

pub struct CdpSurface {
    page: Page,
    _browser: Browser,
    _handler_task: JoinHandle<()>,
}

impl CdpSurface {
    /// Launch a browser and open one page. Returns the surface plus the
    /// serial page-event stream the login driver consumes. The stream closes
    /// when the surface is dropped or the browser dies.
    pub async fn launch(
        proxy_url: Option<&str>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<PageEvent>)> {
        let exe = find_browser_executable()
            .ok_or_else(|| anyhow!("no Chromium-family browser found (set CHROME_EXECUTABLE)"))?;
        info!("launching surface browser: {}", exe);

        let config = build_browser_config(&exe, proxy_url)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| anyhow!("browser launch failed ({}): {}", exe, e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    error!("CDP handler error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("failed to create page: {}", e))?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self::pump_page_events(&page, events_tx).await?;

        Ok((
            Self {
                page,
                _browser: browser,
                _handler_task: handler_task,
            },
            events_rx,
        ))
    }

    /// Forward frame-start and load-fired CDP events as [`PageEvent`]s.
    async fn pump_page_events(page: &Page, tx: mpsc::UnboundedSender<PageEvent>) -> Result<()> {
        let mut started = page
            .event_listener::<EventFrameStartedLoading>()
            .await
            .map_err(|e| anyhow!("frame-start listener failed: {}", e))?;
        let started_tx = tx.clone();
        tokio::spawn(async move {
            while let Some(_ev) = started.next().await {
                if started_tx.send(PageEvent::LoadStarted).is_err() {
                    break;
                }
            }
        });

        let mut finished = page
            .event_listener::<EventLoadEventFired>()
            .await
            .map_err(|e| anyhow!("load-fired listener failed: {}", e))?;
        tokio::spawn(async move {
            while let Some(_ev) = finished.next().await {
                if tx.send(PageEvent::LoadFinished).is_err() {
                    break;
                }
            }
        });

        Ok(())
    }
}

impl Drop for CdpSurface {
    fn drop(&mut self) {
        self._handler_task.abort();
    }
}

#[async_trait]
impl Surface for CdpSurface {
    fn evaluate(&self, js: String) -> ProbeReceiver {
        let (tx, rx) = oneshot::channel();
        let page = self.page.clone();
        tokio::spawn(async move {
            let result = match page.evaluate(js).await {
                Ok(eval) => Ok(eval
                    .value()
                    .cloned()
                    .unwrap_or(serde_json::Value::Null)),
                Err(e) => Err(SurfaceError::Evaluation(e.to_string())),
            };
            // Receiver may already be gone (stale probe); that is fine.
            let _ = tx.send(result);
        });
        rx
    }

    async fn load_html(&self, html: String) -> Result<()> {
        self.page
            .set_content(html)
            .await
            .map_err(|e| anyhow!("set_content failed: {}", e))?;
        Ok(())
    }

    async fn navigate(&self, url: String) -> Result<()> {
        if let Err(e) = self.page.goto(url.clone()).await {
            warn!("navigation to {} failed: {}", url, e);
            return Err(anyhow!("goto failed: {}", e));
        }
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.page
            .reload()
            .await
            .map_err(|e| anyhow!("reload failed: {}", e))?;
        Ok(())
    }
}
