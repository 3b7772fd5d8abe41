//! Browser driver abstraction
//!
//! The session core is written against the [`Driver`] and [`DriverElement`]
//! traits rather than a concrete automation client. The production
//! implementation ([`CdpDriver`]) drives Chromium over CDP; tests run the
//! same core against a scripted in-memory driver.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod cdp;
#[cfg(test)]
pub(crate) mod fake;

pub use cdp::CdpDriver;

/// CSS selector matching the interactive element set captured in snapshots:
/// anchors, buttons, form controls, ARIA widget roles, and elements with a
/// native click handler or explicit tab index.
pub const INTERACTIVE_SELECTOR: &str = "a, button, input, select, textarea, \
     [role=\"button\"], [role=\"link\"], [role=\"checkbox\"], [role=\"radio\"], \
     [onclick], [tabindex]";

/// Locator for element queries against a live document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Match by `id` attribute (exact)
    Id(String),
    /// Match by `name` attribute (exact)
    Name(String),
    /// Match by tag name
    Tag(String),
    /// Match by `aria-label` attribute (exact)
    AriaLabel(String),
    /// Raw CSS selector
    Css(String),
}

impl Locator {
    /// Locator for the interactive element set used by snapshot capture
    pub fn interactive() -> Self {
        Locator::Css(INTERACTIVE_SELECTOR.to_string())
    }

    /// Render this locator as a CSS selector
    pub fn to_css(&self) -> String {
        match self {
            Locator::Id(id) => format!("[id=\"{}\"]", css_escape(id)),
            Locator::Name(name) => format!("[name=\"{}\"]", css_escape(name)),
            Locator::Tag(tag) => tag.clone(),
            Locator::AriaLabel(label) => format!("[aria-label=\"{}\"]", css_escape(label)),
            Locator::Css(css) => css.clone(),
        }
    }
}

/// Escape a string for embedding inside a double-quoted CSS attribute value
fn css_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Opaque handle identifying one browser window/tab
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(pub String);

impl std::fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bounding box of an element at a point in time, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// X origin relative to the viewport
    pub x: f64,
    /// Y origin relative to the viewport
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

/// One console log entry read from the browser
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleEntry {
    /// Log level/channel as reported by the browser (log, warn, error, ...)
    pub level: String,
    /// Rendered message text
    pub message: String,
    /// Capture timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Configuration for launching a browser session
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Run without a visible UI (default: true)
    pub headless: bool,
    /// Browser window width (default: 1920)
    pub width: u32,
    /// Browser window height (default: 1080)
    pub height: u32,
    /// User agent string (None = use default)
    pub user_agent: Option<String>,
    /// Path to Chrome/Chromium executable (None = auto-detect)
    pub chrome_path: Option<String>,
    /// Additional browser arguments
    pub extra_args: Vec<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            headless: true,
            width: 1920,
            height: 1080,
            user_agent: None,
            chrome_path: None,
            extra_args: Vec::new(),
        }
    }
}

impl DriverConfig {
    /// Create a new config builder
    pub fn builder() -> DriverConfigBuilder {
        DriverConfigBuilder::default()
    }
}

/// Builder for [`DriverConfig`]
#[derive(Default)]
pub struct DriverConfigBuilder {
    config: DriverConfig,
}

impl DriverConfigBuilder {
    /// Set headless mode
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    /// Set window dimensions
    pub fn window_size(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    /// Set user agent
    pub fn user_agent<S: Into<String>>(mut self, ua: S) -> Self {
        self.config.user_agent = Some(ua.into());
        self
    }

    /// Set Chrome path
    pub fn chrome_path<S: Into<String>>(mut self, path: S) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Add an extra browser argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.config.extra_args.push(arg.into());
        self
    }

    /// Build the config
    pub fn build(self) -> DriverConfig {
        self.config
    }
}

/// One live browser session: navigation, element query, window management,
/// and page introspection primitives.
///
/// All methods issue blocking commands against the browser process; the
/// caller is responsible for serializing overlapping operations.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Live element handle type produced by element queries
    type Element: DriverElement;

    /// Navigate the focused window to a URL
    async fn navigate(&self, url: &str) -> Result<()>;
    /// Current URL of the focused window
    async fn current_url(&self) -> Result<String>;
    /// Title of the focused window
    async fn title(&self) -> Result<String>;
    /// Navigate back in history
    async fn back(&self) -> Result<()>;
    /// Navigate forward in history
    async fn forward(&self) -> Result<()>;
    /// Reload the focused window
    async fn refresh(&self) -> Result<()>;

    /// Find all elements matching a locator, in document order
    async fn find_elements(&self, locator: &Locator) -> Result<Vec<Self::Element>>;

    /// Handles of all open windows/tabs
    async fn window_handles(&self) -> Result<Vec<WindowHandle>>;
    /// Handle of the currently focused window
    async fn current_window(&self) -> Result<WindowHandle>;
    /// Move focus to the given window
    async fn switch_to_window(&self, handle: &WindowHandle) -> Result<()>;
    /// Open a new window, optionally navigating it, and focus it
    async fn open_window(&self, url: Option<&str>) -> Result<WindowHandle>;
    /// Close the given window; focus is left on the closed handle if it was
    /// focused (callers refocus explicitly)
    async fn close_window(&self, handle: &WindowHandle) -> Result<()>;

    /// Screenshot of the focused window as PNG bytes
    async fn screenshot(&self) -> Result<Vec<u8>>;
    /// Execute a JavaScript expression in the focused window and return its
    /// JSON-serializable result
    async fn execute_script(&self, src: &str) -> Result<serde_json::Value>;

    /// Accept the currently open alert/confirm/prompt
    async fn accept_alert(&self) -> Result<()>;
    /// Dismiss the currently open alert/confirm/prompt
    async fn dismiss_alert(&self) -> Result<()>;
    /// Message text of the currently open dialog
    async fn alert_text(&self) -> Result<String>;

    /// Drain console log entries collected since the last call
    async fn console_logs(&self) -> Result<Vec<ConsoleEntry>>;

    /// Shut down the browser process
    async fn quit(&self) -> Result<()>;
}

/// A live element handle obtained from [`Driver::find_elements`]
#[async_trait]
pub trait DriverElement: Send + Sync {
    /// Whether the element is currently rendered and visible
    async fn is_displayed(&self) -> Result<bool>;
    /// Lowercase tag name
    async fn tag_name(&self) -> Result<String>;
    /// Visible text content
    async fn text(&self) -> Result<String>;
    /// Attribute value, None when absent
    async fn attribute(&self, name: &str) -> Result<Option<String>>;
    /// Current bounding box
    async fn rect(&self) -> Result<Rect>;
    /// Click the element
    async fn click(&self) -> Result<()>;
    /// Type text into the element
    async fn send_keys(&self, text: &str) -> Result<()>;
    /// Clear the element's value
    async fn clear(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_locator_to_css() {
        assert_eq!(Locator::Id("main".into()).to_css(), "[id=\"main\"]");
        assert_eq!(Locator::Name("q".into()).to_css(), "[name=\"q\"]");
        assert_eq!(Locator::Tag("button".into()).to_css(), "button");
        assert_eq!(
            Locator::AriaLabel("Close dialog".into()).to_css(),
            "[aria-label=\"Close dialog\"]"
        );
    }

    #[test]
    fn test_locator_css_escaping() {
        let css = Locator::Id("we\"ird\\id".into()).to_css();
        assert_eq!(css, "[id=\"we\\\"ird\\\\id\"]");
    }

    #[test]
    fn test_interactive_selector_covers_roles() {
        let css = Locator::interactive().to_css();
        for needle in ["a", "button", "[role=\"checkbox\"]", "[onclick]", "[tabindex]"] {
            assert!(css.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn test_driver_config_default() {
        let config = DriverConfig::default();
        assert!(config.headless);
        assert_eq!(config.width, 1920);
        assert_eq!(config.height, 1080);
        assert!(config.user_agent.is_none());
    }

    #[test]
    fn test_driver_config_builder() {
        let config = DriverConfig::builder()
            .headless(false)
            .window_size(1280, 720)
            .user_agent("PilotBot/1.0")
            .arg("--disable-gpu")
            .build();

        assert!(!config.headless);
        assert_eq!(config.width, 1280);
        assert_eq!(config.height, 720);
        assert_eq!(config.user_agent.as_deref(), Some("PilotBot/1.0"));
        assert_eq!(config.extra_args, vec!["--disable-gpu"]);
    }
}
