//! CDP driver implementation
//!
//! Implements the [`Driver`] traits on top of chromiumoxide. Element handles
//! are indices into a per-document registry (`window.__pilotRefs`) populated
//! by the most recent query; all element reads and actions run as JavaScript
//! against the registered node, so staleness shows up as a scripted error
//! rather than a dangling protocol object. The registry is rebuilt by every
//! `find_elements` call, which matches the single-flight operation model.

use crate::driver::{ConsoleEntry, Driver, DriverConfig, DriverElement, Locator, Rect, WindowHandle};
use crate::error::{DriverError, Result, SessionError};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    CloseParams, EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Driver for one Chromium process controlled over CDP
pub struct CdpDriver {
    browser: Mutex<Browser>,
    handler: Mutex<Option<JoinHandle<()>>>,
    current: RwLock<Page>,
    console: Arc<Mutex<Vec<ConsoleEntry>>>,
    dialog: Arc<Mutex<Option<String>>>,
    watched: Mutex<HashSet<String>>,
    watchers: Mutex<Vec<JoinHandle<()>>>,
}

impl CdpDriver {
    /// Launch a browser process with the given configuration
    #[instrument(skip(config))]
    pub async fn launch(config: &DriverConfig) -> Result<Self> {
        info!(headless = config.headless, "Launching browser");

        let mut builder = CdpBrowserConfig::builder().viewport(
            chromiumoxide::handler::viewport::Viewport {
                width: config.width,
                height: config.height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            },
        );

        if !config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--window-size={},{}", config.width, config.height));

        if let Some(ref ua) = config.user_agent {
            builder = builder.arg(format!("--user-agent={ua}"));
        }
        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        for arg in &config.extra_args {
            builder = builder.arg(arg);
        }

        let cdp_config = builder
            .build()
            .map_err(|e| SessionError::ConfigError(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| SessionError::LaunchFailed(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    warn!("Browser handler event error");
                    break;
                }
            }
            debug!("Browser handler finished");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SessionError::LaunchFailed(e.to_string()))?;

        let driver = Self {
            browser: Mutex::new(browser),
            handler: Mutex::new(Some(handler_task)),
            current: RwLock::new(page.clone()),
            console: Arc::new(Mutex::new(Vec::new())),
            dialog: Arc::new(Mutex::new(None)),
            watched: Mutex::new(HashSet::new()),
            watchers: Mutex::new(Vec::new()),
        };
        driver.watch_page(&page).await;

        info!("Browser launched");
        Ok(driver)
    }

    /// Subscribe to console and dialog events on a page, once per target
    async fn watch_page(&self, page: &Page) {
        let id = page.target_id().inner().clone();
        if !self.watched.lock().await.insert(id) {
            return;
        }

        let mut handles = self.watchers.lock().await;

        if let Ok(mut console_events) = page.event_listener::<EventConsoleApiCalled>().await {
            let sink = Arc::clone(&self.console);
            handles.push(tokio::spawn(async move {
                while let Some(event) = console_events.next().await {
                    let message = event
                        .args
                        .iter()
                        .map(|arg| match &arg.value {
                            Some(Value::String(s)) => s.clone(),
                            Some(v) => v.to_string(),
                            None => arg.description.clone().unwrap_or_default(),
                        })
                        .collect::<Vec<_>>()
                        .join(" ");
                    sink.lock().await.push(ConsoleEntry {
                        level: format!("{:?}", event.r#type).to_lowercase(),
                        message,
                        timestamp: chrono::Utc::now(),
                    });
                }
            }));
        }

        if let Ok(mut dialog_events) = page.event_listener::<EventJavascriptDialogOpening>().await {
            let slot = Arc::clone(&self.dialog);
            handles.push(tokio::spawn(async move {
                while let Some(event) = dialog_events.next().await {
                    debug!(message = %event.message, "Dialog opened");
                    *slot.lock().await = Some(event.message.clone());
                }
            }));
        }
    }

    async fn current_page(&self) -> Page {
        self.current.read().await.clone()
    }

    /// Find the open page with the given target id
    async fn page_for(&self, handle: &WindowHandle) -> Result<Page> {
        let pages = self
            .browser
            .lock()
            .await
            .pages()
            .await
            .map_err(|e| DriverError::operation("window_handles", e.to_string()))?;
        pages
            .into_iter()
            .find(|p| p.target_id().inner() == &handle.0)
            .ok_or_else(|| DriverError::UnknownWindow(handle.0.clone()).into())
    }

    /// Evaluate a script on the focused page, surfacing CDP failures
    async fn eval(&self, op: &str, src: &str) -> Result<Value> {
        let page = self.current_page().await;
        let result = page
            .evaluate(src)
            .await
            .map_err(|e| DriverError::operation(op, e.to_string()))?;
        Ok(result.into_value().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl Driver for CdpDriver {
    type Element = CdpElement;

    #[instrument(skip(self))]
    async fn navigate(&self, url: &str) -> Result<()> {
        url::Url::parse(url).map_err(|e| DriverError::operation("navigate", e.to_string()))?;
        let page = self.current_page().await;
        page.goto(url)
            .await
            .map_err(|e| DriverError::operation("navigate", e.to_string()))?;
        // Best-effort settle; a page without further loads resolves immediately.
        let _ = tokio::time::timeout(Duration::from_secs(30), page.wait_for_navigation()).await;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let page = self.current_page().await;
        let url = page
            .url()
            .await
            .map_err(|e| DriverError::operation("current_url", e.to_string()))?;
        Ok(url.unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn title(&self) -> Result<String> {
        let page = self.current_page().await;
        let title = page
            .get_title()
            .await
            .map_err(|e| DriverError::operation("title", e.to_string()))?;
        Ok(title.unwrap_or_default())
    }

    async fn back(&self) -> Result<()> {
        self.eval("back", "window.history.back()").await?;
        let _ = self.current_page().await.wait_for_navigation().await;
        Ok(())
    }

    async fn forward(&self) -> Result<()> {
        self.eval("forward", "window.history.forward()").await?;
        let _ = self.current_page().await.wait_for_navigation().await;
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        let page = self.current_page().await;
        page.reload()
            .await
            .map_err(|e| DriverError::operation("refresh", e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_elements(&self, locator: &Locator) -> Result<Vec<CdpElement>> {
        let selector = serde_json::to_string(&locator.to_css())?;
        let src = format!(
            "(() => {{ window.__pilotRefs = Array.from(document.querySelectorAll({selector})); \
             return window.__pilotRefs.length; }})()"
        );
        let count = self
            .eval("find_elements", &src)
            .await?
            .as_u64()
            .unwrap_or(0) as usize;
        let page = self.current_page().await;
        Ok((0..count)
            .map(|index| CdpElement {
                page: page.clone(),
                index,
            })
            .collect())
    }

    async fn window_handles(&self) -> Result<Vec<WindowHandle>> {
        let pages = self
            .browser
            .lock()
            .await
            .pages()
            .await
            .map_err(|e| DriverError::operation("window_handles", e.to_string()))?;
        Ok(pages
            .iter()
            .map(|p| WindowHandle(p.target_id().inner().clone()))
            .collect())
    }

    async fn current_window(&self) -> Result<WindowHandle> {
        let page = self.current_page().await;
        Ok(WindowHandle(page.target_id().inner().clone()))
    }

    #[instrument(skip(self))]
    async fn switch_to_window(&self, handle: &WindowHandle) -> Result<()> {
        let page = self.page_for(handle).await?;
        page.bring_to_front()
            .await
            .map_err(|e| DriverError::operation("switch_to_window", e.to_string()))?;
        self.watch_page(&page).await;
        *self.current.write().await = page;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn open_window(&self, url: Option<&str>) -> Result<WindowHandle> {
        let page = self
            .browser
            .lock()
            .await
            .new_page(url.unwrap_or("about:blank"))
            .await
            .map_err(|e| DriverError::operation("open_window", e.to_string()))?;
        let handle = WindowHandle(page.target_id().inner().clone());
        self.watch_page(&page).await;
        *self.current.write().await = page;
        Ok(handle)
    }

    #[instrument(skip(self))]
    async fn close_window(&self, handle: &WindowHandle) -> Result<()> {
        let page = self.page_for(handle).await?;
        page.execute(CloseParams {})
            .await
            .map_err(|e| DriverError::operation("close_window", e.to_string()))?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
        use chromiumoxide::page::ScreenshotParams;

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .from_surface(true)
            .build();
        let page = self.current_page().await;
        page.screenshot(params)
            .await
            .map_err(|e| DriverError::operation("screenshot", e.to_string()).into())
    }

    async fn execute_script(&self, src: &str) -> Result<Value> {
        self.eval("execute_script", src).await
    }

    async fn accept_alert(&self) -> Result<()> {
        let params = HandleJavaScriptDialogParams::builder()
            .accept(true)
            .build()
            .map_err(|e| DriverError::operation("accept_alert", e))?;
        let page = self.current_page().await;
        page.execute(params)
            .await
            .map_err(|e| DriverError::operation("accept_alert", e.to_string()))?;
        *self.dialog.lock().await = None;
        Ok(())
    }

    async fn dismiss_alert(&self) -> Result<()> {
        let params = HandleJavaScriptDialogParams::builder()
            .accept(false)
            .build()
            .map_err(|e| DriverError::operation("dismiss_alert", e))?;
        let page = self.current_page().await;
        page.execute(params)
            .await
            .map_err(|e| DriverError::operation("dismiss_alert", e.to_string()))?;
        *self.dialog.lock().await = None;
        Ok(())
    }

    async fn alert_text(&self) -> Result<String> {
        self.dialog
            .lock()
            .await
            .clone()
            .ok_or_else(|| DriverError::NoAlertPresent.into())
    }

    async fn console_logs(&self) -> Result<Vec<ConsoleEntry>> {
        Ok(std::mem::take(&mut *self.console.lock().await))
    }

    #[instrument(skip(self))]
    async fn quit(&self) -> Result<()> {
        info!("Closing browser");

        for watcher in self.watchers.lock().await.drain(..) {
            watcher.abort();
        }

        self.browser
            .lock()
            .await
            .close()
            .await
            .map_err(|e| DriverError::operation("quit", e.to_string()))?;

        if let Some(handler) = self.handler.lock().await.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handler).await;
        }

        info!("Browser closed");
        Ok(())
    }
}

/// Live element handle: an index into the page's query registry
pub struct CdpElement {
    page: Page,
    index: usize,
}

impl CdpElement {
    /// Run a script body with `el` bound to the registered node
    async fn eval_on(&self, op: &str, body: &str) -> Result<Value> {
        let src = format!(
            "(() => {{ const el = window.__pilotRefs && window.__pilotRefs[{}]; \
             if (!el) throw new Error('stale element handle'); {body} }})()",
            self.index
        );
        let result = self
            .page
            .evaluate(src)
            .await
            .map_err(|e| DriverError::operation(op, e.to_string()))?;
        Ok(result.into_value().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl DriverElement for CdpElement {
    async fn is_displayed(&self) -> Result<bool> {
        let value = self
            .eval_on(
                "is_displayed",
                "const r = el.getBoundingClientRect(); \
                 const s = window.getComputedStyle(el); \
                 return !!(r.width || r.height) && s.display !== 'none' && s.visibility !== 'hidden';",
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn tag_name(&self) -> Result<String> {
        let value = self
            .eval_on("tag_name", "return el.tagName.toLowerCase();")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn text(&self) -> Result<String> {
        let value = self
            .eval_on("text", "return (el.innerText || el.textContent || '').trim();")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        let name_js = serde_json::to_string(name)?;
        let value = self
            .eval_on("attribute", &format!("return el.getAttribute({name_js});"))
            .await?;
        Ok(value.as_str().map(|s| s.to_string()))
    }

    async fn rect(&self) -> Result<Rect> {
        let value = self
            .eval_on(
                "rect",
                "const r = el.getBoundingClientRect(); \
                 return {x: r.x, y: r.y, width: r.width, height: r.height};",
            )
            .await?;
        serde_json::from_value(value).map_err(Into::into)
    }

    async fn click(&self) -> Result<()> {
        self.eval_on(
            "click",
            "el.scrollIntoView({block: 'center'}); el.click(); return true;",
        )
        .await?;
        Ok(())
    }

    async fn send_keys(&self, text: &str) -> Result<()> {
        let text_js = serde_json::to_string(text)?;
        // Native value setter keeps framework-managed inputs (React et al.)
        // in sync with the dispatched input event.
        self.eval_on(
            "send_keys",
            &format!(
                "el.focus(); \
                 const proto = el instanceof HTMLTextAreaElement \
                     ? window.HTMLTextAreaElement.prototype \
                     : window.HTMLInputElement.prototype; \
                 const setter = Object.getOwnPropertyDescriptor(proto, 'value')?.set; \
                 const next = (el.value || '') + {text_js}; \
                 if (setter) {{ setter.call(el, next); }} else {{ el.value = next; }} \
                 el.dispatchEvent(new Event('input', {{bubbles: true}})); \
                 el.dispatchEvent(new Event('change', {{bubbles: true}})); \
                 return true;"
            ),
        )
        .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.eval_on(
            "clear",
            "el.focus(); el.value = ''; \
             el.dispatchEvent(new Event('input', {bubbles: true})); \
             el.dispatchEvent(new Event('change', {bubbles: true})); \
             return true;",
        )
        .await?;
        Ok(())
    }
}
