//! Session management
//!
//! One [`Session`] owns at most one live browser at a time, the element
//! catalog captured from it, and the action journal. The browser is
//! launched lazily on first use and torn down fail-open: `close` never
//! errors, it clears state regardless of what the browser process does.
//!
//! There is no global session. Callers construct one and thread it through
//! their dispatch layer; the MCP server keeps it behind a mutex and runs
//! one request to completion at a time, so the session itself carries no
//! internal locks.

use crate::driver::{Driver, DriverConfig, WindowHandle};
use crate::error::{ResolveError, Result, SessionError};
use crate::recorder::Recorder;
use crate::snapshot::{resolve, Catalog, CaptureLimits, ResolveOptions};
use crate::tabs::{self, TabInfo};
use futures::future::BoxFuture;
use tracing::{debug, info, instrument, warn};

/// Factory invoked to launch a driver on demand
pub type DriverFactory<D> =
    Box<dyn Fn(DriverConfig) -> BoxFuture<'static, Result<D>> + Send + Sync>;

/// Browser session: lazy driver, element catalog, action journal
pub struct Session<D: Driver> {
    config: DriverConfig,
    factory: DriverFactory<D>,
    driver: Option<D>,
    catalog: Option<Catalog>,
    recorder: Recorder,
    limits: CaptureLimits,
    resolve_options: ResolveOptions,
}

impl<D: Driver> Session<D> {
    /// New session with a launch factory; no browser is started yet
    pub fn new(config: DriverConfig, factory: DriverFactory<D>) -> Self {
        Self {
            config,
            factory,
            driver: None,
            catalog: None,
            recorder: Recorder::new(),
            limits: CaptureLimits::default(),
            resolve_options: ResolveOptions::default(),
        }
    }

    /// Override capture limits
    pub fn with_limits(mut self, limits: CaptureLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Override resolver tunables
    pub fn with_resolve_options(mut self, options: ResolveOptions) -> Self {
        self.resolve_options = options;
        self
    }

    /// Launch configuration this session was constructed with
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Whether a browser is currently live
    pub fn is_active(&self) -> bool {
        self.driver.is_some()
    }

    /// The live driver, launching one with the stored config if absent.
    /// A launch failure leaves the session driver-less.
    #[instrument(skip(self))]
    pub async fn ensure_driver(&mut self) -> Result<&D> {
        if self.driver.is_none() {
            info!("Launching browser for session");
            let driver = (self.factory)(self.config.clone())
                .await
                .map_err(|e| SessionError::LaunchFailed(e.to_string()))?;
            self.driver = Some(driver);
        }
        // Just populated above when absent.
        self.driver
            .as_ref()
            .ok_or_else(|| SessionError::NoActiveSession.into())
    }

    /// The live driver, or [`SessionError::NoActiveSession`]; never launches
    pub fn driver(&self) -> Result<&D> {
        self.driver
            .as_ref()
            .ok_or_else(|| SessionError::NoActiveSession.into())
    }

    /// Best-effort shutdown: quit the browser if one is live, then clear
    /// driver and catalog. Never fails; safe to call repeatedly. The
    /// recorder journal survives.
    pub async fn close(&mut self) {
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.quit().await {
                warn!("Browser quit reported an error: {e}");
            }
            info!("Session closed");
        }
        self.catalog = None;
    }

    /// Tear down and relaunch with the same configuration
    pub async fn reset(&mut self) -> Result<()> {
        self.close().await;
        self.ensure_driver().await?;
        Ok(())
    }

    /// Mutable access to the action journal
    pub fn recorder(&mut self) -> &mut Recorder {
        &mut self.recorder
    }

    /// Read-only access to the action journal
    pub fn recorder_ref(&self) -> &Recorder {
        &self.recorder
    }

    /// Current catalog, capturing one lazily when none is held
    pub async fn snapshot(&mut self) -> Result<&Catalog> {
        if self.catalog.is_none() {
            return self.capture_snapshot().await;
        }
        // Populated: close/invalidate are the only paths that clear it.
        Ok(self.catalog.as_ref().ok_or(ResolveError::NoCatalog)?)
    }

    /// Capture a fresh catalog, replacing any held one
    #[instrument(skip(self))]
    pub async fn capture_snapshot(&mut self) -> Result<&Catalog> {
        let catalog = {
            let driver = self.driver()?;
            Catalog::capture(driver, &self.limits).await?
        };
        debug!(entries = catalog.len(), "Snapshot captured");
        Ok(self.catalog.insert(catalog))
    }

    /// Drop the held catalog; references minted from it become invalid
    pub fn invalidate_catalog(&mut self) {
        self.catalog = None;
    }

    /// Whether a catalog is currently held
    pub fn has_catalog(&self) -> bool {
        self.catalog.is_some()
    }

    /// Resolve a catalog reference to a live element
    pub async fn resolve(&self, reference: &str) -> Result<D::Element> {
        let driver = self.driver()?;
        let catalog = self
            .catalog
            .as_ref()
            .ok_or(crate::error::ResolveError::NoCatalog)?;
        resolve(driver, catalog, reference, &self.resolve_options).await
    }

    /// List open tabs without changing focus
    pub async fn list_tabs(&self) -> Result<Vec<TabInfo>> {
        tabs::list_tabs(self.driver()?).await
    }

    /// Focus another tab; the catalog belongs to the old tab and is dropped
    pub async fn switch_tab(&mut self, handle: &WindowHandle) -> Result<()> {
        self.driver()?.switch_to_window(handle).await?;
        self.invalidate_catalog();
        Ok(())
    }

    /// Open a new tab, optionally navigating it, and focus it
    pub async fn open_tab(&mut self, url: Option<&str>) -> Result<WindowHandle> {
        let handle = self.ensure_driver().await?.open_window(url).await?;
        self.invalidate_catalog();
        Ok(handle)
    }

    /// Close a tab. When the focused tab dies, focus moves to a surviving
    /// handle so the session stays usable.
    pub async fn close_tab(&mut self, handle: &WindowHandle) -> Result<()> {
        let driver = self.driver()?;
        let was_focused = driver.current_window().await? == *handle;
        driver.close_window(handle).await?;

        if was_focused {
            if let Some(survivor) = driver.window_handles().await?.into_iter().next() {
                driver.switch_to_window(&survivor).await?;
            }
        }
        self.invalidate_catalog();
        Ok(())
    }
}
