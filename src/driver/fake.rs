//! Scripted in-memory driver for core tests
//!
//! Models a browser as a set of pages holding element records. Tests mutate
//! the shared state between operations to simulate DOM churn, staleness,
//! and tab changes.

use crate::driver::{ConsoleEntry, Driver, DriverElement, Locator, Rect, WindowHandle};
use crate::error::{DriverError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One scripted element record
#[derive(Debug, Clone, Default)]
pub struct FakeNode {
    pub tag: String,
    pub text: String,
    pub displayed: bool,
    pub attributes: HashMap<String, String>,
    pub rect: Rect,
    /// When set, text/rect reads fail as if the node detached between the
    /// visibility check and the read
    pub fail_reads: bool,
}

impl FakeNode {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            displayed: true,
            ..Default::default()
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.rect = Rect {
            x,
            y,
            width: 80.0,
            height: 24.0,
        };
        self
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn flaky_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }
}

/// One scripted page/tab
#[derive(Debug, Clone)]
pub struct FakePage {
    pub handle: WindowHandle,
    pub title: String,
    pub url: String,
    pub nodes: Vec<FakeNode>,
}

#[derive(Debug, Default)]
struct FakeState {
    pages: Vec<FakePage>,
    focused: usize,
    console: Vec<ConsoleEntry>,
    dialog: Option<String>,
    scripts: Vec<String>,
    quit: bool,
}

/// Scripted driver shared across clones
#[derive(Debug, Clone, Default)]
pub struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
    launches: Arc<AtomicUsize>,
    fail_launch: Arc<Mutex<bool>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        let driver = Self::default();
        driver.state.lock().unwrap().pages.push(FakePage {
            handle: WindowHandle("tab-0".to_string()),
            title: "blank".to_string(),
            url: "about:blank".to_string(),
            nodes: Vec::new(),
        });
        driver
    }

    /// Build a driver whose focused page holds the given nodes
    pub fn with_nodes(nodes: Vec<FakeNode>) -> Self {
        let driver = Self::new();
        driver.set_nodes(nodes);
        driver
    }

    /// Launch counter used by session idempotence tests; bumping happens in
    /// the session test harness, not here.
    pub fn launches(&self) -> &Arc<AtomicUsize> {
        &self.launches
    }

    pub fn mark_launched(&self) {
        self.launches.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_fail_launch(&self, fail: bool) {
        *self.fail_launch.lock().unwrap() = fail;
    }

    pub fn should_fail_launch(&self) -> bool {
        *self.fail_launch.lock().unwrap()
    }

    /// Replace the focused page's nodes
    pub fn set_nodes(&self, nodes: Vec<FakeNode>) {
        let mut state = self.state.lock().unwrap();
        let focused = state.focused;
        state.pages[focused].nodes = nodes;
    }

    /// Add a page, without changing focus
    pub fn add_page(&self, handle: &str, title: &str, url: &str, nodes: Vec<FakeNode>) {
        self.state.lock().unwrap().pages.push(FakePage {
            handle: WindowHandle(handle.to_string()),
            title: title.to_string(),
            url: url.to_string(),
            nodes,
        });
    }

    pub fn focus_index(&self) -> usize {
        self.state.lock().unwrap().focused
    }

    pub fn push_console(&self, level: &str, message: &str) {
        self.state.lock().unwrap().console.push(ConsoleEntry {
            level: level.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now(),
        });
    }

    pub fn open_dialog(&self, message: &str) {
        self.state.lock().unwrap().dialog = Some(message.to_string());
    }

    pub fn executed_scripts(&self) -> Vec<String> {
        self.state.lock().unwrap().scripts.clone()
    }

    pub fn is_quit(&self) -> bool {
        self.state.lock().unwrap().quit
    }

    fn focused_nodes(&self) -> Vec<(usize, FakeNode)> {
        let state = self.state.lock().unwrap();
        state.pages[state.focused]
            .nodes
            .iter()
            .cloned()
            .enumerate()
            .collect()
    }

    fn matches(node: &FakeNode, locator: &Locator) -> bool {
        match locator {
            Locator::Id(id) => node.attributes.get("id") == Some(id),
            Locator::Name(name) => node.attributes.get("name") == Some(name),
            Locator::Tag(tag) => node.tag == *tag,
            Locator::AriaLabel(label) => node.attributes.get("aria-label") == Some(label),
            // The fake has no CSS engine; a CSS locator is only ever the
            // interactive-set query, which every scripted node satisfies.
            Locator::Css(_) => true,
        }
    }
}

#[async_trait]
impl Driver for FakeDriver {
    type Element = FakeElement;

    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let focused = state.focused;
        state.pages[focused].url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let state = self.state.lock().unwrap();
        Ok(state.pages[state.focused].url.clone())
    }

    async fn title(&self) -> Result<String> {
        let state = self.state.lock().unwrap();
        Ok(state.pages[state.focused].title.clone())
    }

    async fn back(&self) -> Result<()> {
        Ok(())
    }

    async fn forward(&self) -> Result<()> {
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        Ok(())
    }

    async fn find_elements(&self, locator: &Locator) -> Result<Vec<FakeElement>> {
        Ok(self
            .focused_nodes()
            .into_iter()
            .filter(|(_, node)| Self::matches(node, locator))
            .map(|(index, _)| FakeElement {
                driver: self.clone(),
                page: self.focus_index(),
                index,
            })
            .collect())
    }

    async fn window_handles(&self) -> Result<Vec<WindowHandle>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .pages
            .iter()
            .map(|p| p.handle.clone())
            .collect())
    }

    async fn current_window(&self) -> Result<WindowHandle> {
        let state = self.state.lock().unwrap();
        Ok(state.pages[state.focused].handle.clone())
    }

    async fn switch_to_window(&self, handle: &WindowHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.pages.iter().position(|p| &p.handle == handle) {
            Some(index) => {
                state.focused = index;
                Ok(())
            }
            None => Err(DriverError::UnknownWindow(handle.0.clone()).into()),
        }
    }

    async fn open_window(&self, url: Option<&str>) -> Result<WindowHandle> {
        let mut state = self.state.lock().unwrap();
        let handle = WindowHandle(format!("tab-{}", state.pages.len()));
        state.pages.push(FakePage {
            handle: handle.clone(),
            title: String::new(),
            url: url.unwrap_or("about:blank").to_string(),
            nodes: Vec::new(),
        });
        state.focused = state.pages.len() - 1;
        Ok(handle)
    }

    async fn close_window(&self, handle: &WindowHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.pages.iter().position(|p| &p.handle == handle) {
            Some(index) => {
                state.pages.remove(index);
                if state.focused >= state.pages.len() {
                    state.focused = 0;
                }
                Ok(())
            }
            None => Err(DriverError::UnknownWindow(handle.0.clone()).into()),
        }
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn execute_script(&self, src: &str) -> Result<Value> {
        self.state.lock().unwrap().scripts.push(src.to_string());
        Ok(Value::Null)
    }

    async fn accept_alert(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.dialog.take().is_none() {
            return Err(DriverError::NoAlertPresent.into());
        }
        Ok(())
    }

    async fn dismiss_alert(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.dialog.take().is_none() {
            return Err(DriverError::NoAlertPresent.into());
        }
        Ok(())
    }

    async fn alert_text(&self) -> Result<String> {
        self.state
            .lock()
            .unwrap()
            .dialog
            .clone()
            .ok_or_else(|| DriverError::NoAlertPresent.into())
    }

    async fn console_logs(&self) -> Result<Vec<ConsoleEntry>> {
        Ok(std::mem::take(&mut self.state.lock().unwrap().console))
    }

    async fn quit(&self) -> Result<()> {
        self.state.lock().unwrap().quit = true;
        Ok(())
    }
}

/// Handle into a scripted page's node list
#[derive(Debug)]
pub struct FakeElement {
    driver: FakeDriver,
    page: usize,
    index: usize,
}

impl FakeElement {
    fn node(&self) -> Result<FakeNode> {
        let state = self.driver.state.lock().unwrap();
        state
            .pages
            .get(self.page)
            .and_then(|p| p.nodes.get(self.index))
            .cloned()
            .ok_or_else(|| DriverError::operation("element", "stale element handle").into())
    }
}

#[async_trait]
impl DriverElement for FakeElement {
    async fn is_displayed(&self) -> Result<bool> {
        Ok(self.node()?.displayed)
    }

    async fn tag_name(&self) -> Result<String> {
        Ok(self.node()?.tag)
    }

    async fn text(&self) -> Result<String> {
        let node = self.node()?;
        if node.fail_reads {
            return Err(DriverError::operation("text", "node detached").into());
        }
        Ok(node.text)
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self.node()?.attributes.get(name).cloned())
    }

    async fn rect(&self) -> Result<Rect> {
        let node = self.node()?;
        if node.fail_reads {
            return Err(DriverError::operation("rect", "node detached").into());
        }
        Ok(node.rect)
    }

    async fn click(&self) -> Result<()> {
        let node = self.node()?;
        let mut state = self.driver.state.lock().unwrap();
        state.scripts.push(format!("click:{}:{}", node.tag, node.text));
        Ok(())
    }

    async fn send_keys(&self, text: &str) -> Result<()> {
        self.node()?;
        let mut state = self.driver.state.lock().unwrap();
        let page = &mut state.pages[self.page];
        let entry = page.nodes[self.index]
            .attributes
            .entry("value".to_string())
            .or_default();
        entry.push_str(text);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.node()?;
        let mut state = self.driver.state.lock().unwrap();
        state.pages[self.page].nodes[self.index]
            .attributes
            .remove("value");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Session and resolver tests call unwrap_err on results carrying these
    // handles, which needs Debug on both.
    #[tokio::test]
    async fn test_handles_are_debuggable() {
        let driver = FakeDriver::with_nodes(vec![FakeNode::new("button").text("A")]);
        assert!(format!("{:?}", driver).contains("FakeDriver"));

        let elements = driver
            .find_elements(&Locator::Tag("button".to_string()))
            .await
            .unwrap();
        assert!(format!("{:?}", elements[0]).contains("FakeElement"));
    }

    #[tokio::test]
    async fn test_flaky_node_fails_reads_but_stays_visible() {
        let driver = FakeDriver::with_nodes(vec![FakeNode::new("button").text("A").flaky_reads()]);
        let elements = driver
            .find_elements(&Locator::Tag("button".to_string()))
            .await
            .unwrap();

        assert!(elements[0].is_displayed().await.unwrap());
        assert!(elements[0].text().await.is_err());
        assert!(elements[0].rect().await.is_err());
    }
}
