//! MCP tool definitions and registry
//!
//! This module defines the available MCP tools and executes them against
//! the shared browser session. The registry serializes tool calls: one
//! call runs to completion before the next acquires the session, so the
//! core never sees overlapping operations.
//!
//! Tool failures are reported as results with `isError` set, never as
//! JSON-RPC protocol errors; the protocol layer only fails on malformed
//! requests.

use crate::driver::{Driver, DriverElement, WindowHandle};
use crate::error::{Error, Result};
use crate::mcp::types::{McpToolDefinition, ToolCallResult};
use crate::session::Session;
use base64::Engine;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

/// Upper bound on the `wait_for` tool's sleep, in milliseconds
const MAX_WAIT_MS: u64 = 30_000;

/// Tools that control the recorder itself; these are never journaled
const RECORDER_TOOLS: &[&str] = &[
    "start_recording",
    "stop_recording",
    "recording_status",
    "clear_recording",
];

/// List of all available tools (for documentation)
pub const AVAILABLE_TOOLS: &[&str] = &[
    "navigate",
    "go_back",
    "go_forward",
    "refresh_page",
    "capture_page",
    "click_element",
    "type_text",
    "select_option",
    "screenshot",
    "execute_js",
    "wait_for",
    "tab_list",
    "tab_select",
    "tab_new",
    "tab_close",
    "handle_dialog",
    "console_logs",
    "start_recording",
    "stop_recording",
    "recording_status",
    "clear_recording",
    "close_session",
    "reset_session",
];

/// Tool registry holding the shared session and all tool definitions
pub struct ToolRegistry<D: Driver> {
    session: Mutex<Session<D>>,
    definitions: Vec<McpToolDefinition>,
}

impl<D: Driver> ToolRegistry<D> {
    /// Create a registry around a session
    pub fn new(session: Session<D>) -> Self {
        Self {
            session: Mutex::new(session),
            definitions: build_definitions(),
        }
    }

    /// Get all tool definitions
    pub fn definitions(&self) -> Vec<McpToolDefinition> {
        self.definitions.clone()
    }

    /// Execute a tool by name
    #[instrument(skip(self, args))]
    pub async fn execute(&self, name: &str, args: Value) -> ToolCallResult {
        info!("Executing tool: {}", name);

        if !self.definitions.iter().any(|d| d.name == name) {
            return ToolCallResult::error(format!("Tool not found: {}", name));
        }

        let mut session = self.session.lock().await;
        if !RECORDER_TOOLS.contains(&name) {
            session.recorder().record(name, args.clone());
        }

        match run_tool(&mut session, name, &args).await {
            Ok(result) => result,
            Err(e) => {
                error!("Tool {} failed: {}", name, e);
                ToolCallResult::error(e.to_string())
            }
        }
    }
}

/// Dispatch one tool call against the session
async fn run_tool<D: Driver>(
    session: &mut Session<D>,
    name: &str,
    args: &Value,
) -> Result<ToolCallResult> {
    match name {
        "navigate" => {
            let url = required_str(args, "url")?;
            session.ensure_driver().await?.navigate(url).await?;
            session.invalidate_catalog();
            page_state(session).await
        }
        "go_back" => {
            session.driver()?.back().await?;
            session.invalidate_catalog();
            page_state(session).await
        }
        "go_forward" => {
            session.driver()?.forward().await?;
            session.invalidate_catalog();
            page_state(session).await
        }
        "refresh_page" => {
            session.driver()?.refresh().await?;
            session.invalidate_catalog();
            page_state(session).await
        }
        "capture_page" => {
            session.ensure_driver().await?;
            page_state(session).await
        }
        "click_element" => {
            let reference = required_str(args, "ref")?;
            session.resolve(reference).await?.click().await?;
            let state = session.capture_snapshot().await?.format_text();
            Ok(ToolCallResult::text(format!(
                "Clicked {}\n\n{}",
                reference, state
            )))
        }
        "type_text" => {
            let reference = required_str(args, "ref")?;
            let text = required_str(args, "text")?;
            let clear = args.get("clear").and_then(|v| v.as_bool()).unwrap_or(true);

            let element = session.resolve(reference).await?;
            if clear {
                element.clear().await?;
            }
            element.send_keys(text).await?;
            let state = session.capture_snapshot().await?.format_text();
            Ok(ToolCallResult::text(format!(
                "Typed into {}\n\n{}",
                reference, state
            )))
        }
        "select_option" => {
            let reference = required_str(args, "ref")?;
            let value = required_str(args, "value")?;

            let element = session.resolve(reference).await?;
            element.click().await?;
            element.send_keys(value).await?;
            let state = session.capture_snapshot().await?.format_text();
            Ok(ToolCallResult::text(format!(
                "Selected '{}' in {}\n\n{}",
                value, reference, state
            )))
        }
        "screenshot" => {
            let png = session.driver()?.screenshot().await?;
            let data = base64::engine::general_purpose::STANDARD.encode(png);
            Ok(ToolCallResult::image(data, "image/png"))
        }
        "execute_js" => {
            let script = required_str(args, "script")?;
            let value = session.driver()?.execute_script(script).await?;
            Ok(ToolCallResult::text(
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| "null".to_string()),
            ))
        }
        "wait_for" => {
            let ms = args
                .get("ms")
                .and_then(|v| v.as_u64())
                .ok_or_else(|| Error::generic("Missing required parameter: ms"))?
                .min(MAX_WAIT_MS);
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
            Ok(ToolCallResult::text(format!("Waited {}ms", ms)))
        }
        "tab_list" => {
            let tabs = session.list_tabs().await?;
            let mut lines = Vec::with_capacity(tabs.len() + 1);
            lines.push(format!("{} open tab(s):", tabs.len()));
            for (i, tab) in tabs.iter().enumerate() {
                let marker = if tab.active { " (active)" } else { "" };
                lines.push(format!("{}. {} — {}{}", i + 1, tab.title, tab.url, marker));
            }
            Ok(ToolCallResult::text(lines.join("\n")))
        }
        "tab_select" => {
            let handle = tab_handle(session, args, "index").await?;
            session.switch_tab(&handle).await?;
            page_state(session).await
        }
        "tab_new" => {
            let url = args.get("url").and_then(|v| v.as_str());
            let handle = session.open_tab(url).await?;
            Ok(ToolCallResult::text(format!("Opened tab {}", handle)))
        }
        "tab_close" => {
            let handle = match args.get("index") {
                Some(_) => tab_handle(session, args, "index").await?,
                None => session.driver()?.current_window().await?,
            };
            session.close_tab(&handle).await?;
            Ok(ToolCallResult::text(format!("Closed tab {}", handle)))
        }
        "handle_dialog" => {
            let accept = args
                .get("accept")
                .and_then(|v| v.as_bool())
                .ok_or_else(|| Error::generic("Missing required parameter: accept"))?;
            let driver = session.driver()?;
            let message = driver.alert_text().await?;
            if accept {
                driver.accept_alert().await?;
            } else {
                driver.dismiss_alert().await?;
            }
            let verb = if accept { "Accepted" } else { "Dismissed" };
            Ok(ToolCallResult::text(format!("{} dialog: {}", verb, message)))
        }
        "console_logs" => {
            let entries = session.driver()?.console_logs().await?;
            if entries.is_empty() {
                return Ok(ToolCallResult::text("(no console output)"));
            }
            let lines: Vec<String> = entries
                .iter()
                .map(|e| format!("[{}] {}", e.level, e.message))
                .collect();
            Ok(ToolCallResult::text(lines.join("\n")))
        }
        "start_recording" => {
            session.recorder().start();
            Ok(ToolCallResult::text("Recording started"))
        }
        "stop_recording" => {
            session.recorder().stop();
            let actions = session.recorder_ref().actions();
            let rendered = serde_json::to_string_pretty(actions)?;
            Ok(ToolCallResult::text(format!(
                "Recording stopped; {} action(s) captured\n{}",
                actions.len(),
                rendered
            )))
        }
        "recording_status" => {
            let status = session.recorder_ref().status();
            Ok(ToolCallResult::text(serde_json::to_string_pretty(&status)?))
        }
        "clear_recording" => {
            session.recorder().clear();
            Ok(ToolCallResult::text("Recording buffer cleared"))
        }
        "close_session" => {
            session.close().await;
            Ok(ToolCallResult::text("Browser session closed"))
        }
        "reset_session" => {
            session.reset().await?;
            Ok(ToolCallResult::text("Browser session reset"))
        }
        _ => Ok(ToolCallResult::error(format!("Unknown tool: {}", name))),
    }
}

/// Fresh page state rendering used after navigation/mutation tools
async fn page_state<D: Driver>(session: &mut Session<D>) -> Result<ToolCallResult> {
    Ok(ToolCallResult::text(
        session.capture_snapshot().await?.format_text(),
    ))
}

/// Read a required string argument
fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::generic(format!("Missing required parameter: {}", key)))
}

/// Translate a 1-based tab index argument into a window handle
async fn tab_handle<D: Driver>(
    session: &mut Session<D>,
    args: &Value,
    key: &str,
) -> Result<WindowHandle> {
    let index = args
        .get(key)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| Error::generic(format!("Missing required parameter: {}", key)))?;
    let handles = session.driver()?.window_handles().await?;
    if index == 0 || index as usize > handles.len() {
        return Err(Error::generic(format!(
            "Tab index {} out of range (1..={})",
            index,
            handles.len()
        )));
    }
    Ok(handles[index as usize - 1].clone())
}

fn tool(name: &str, description: &str, schema: Value) -> McpToolDefinition {
    McpToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: schema,
    }
}

fn no_params() -> Value {
    json!({ "type": "object", "properties": {} })
}

fn build_definitions() -> Vec<McpToolDefinition> {
    vec![
        tool(
            "navigate",
            "Navigate the browser to a URL and return the page snapshot",
            json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "The URL to navigate to" }
                },
                "required": ["url"]
            }),
        ),
        tool(
            "go_back",
            "Navigate back in browser history and return the page snapshot",
            no_params(),
        ),
        tool(
            "go_forward",
            "Navigate forward in browser history and return the page snapshot",
            no_params(),
        ),
        tool(
            "refresh_page",
            "Reload the current page and return the page snapshot",
            no_params(),
        ),
        tool(
            "capture_page",
            "Capture a fresh snapshot of interactive elements on the current page",
            no_params(),
        ),
        tool(
            "click_element",
            "Click an element identified by its snapshot reference",
            json!({
                "type": "object",
                "properties": {
                    "ref": {
                        "type": "string",
                        "description": "Element reference from the page snapshot (e.g. e3)"
                    }
                },
                "required": ["ref"]
            }),
        ),
        tool(
            "type_text",
            "Type text into an element identified by its snapshot reference",
            json!({
                "type": "object",
                "properties": {
                    "ref": {
                        "type": "string",
                        "description": "Element reference from the page snapshot (e.g. e3)"
                    },
                    "text": { "type": "string", "description": "Text to type" },
                    "clear": {
                        "type": "boolean",
                        "description": "Clear the field first (default: true)",
                        "default": true
                    }
                },
                "required": ["ref", "text"]
            }),
        ),
        tool(
            "select_option",
            "Select an option in a form control identified by its snapshot reference",
            json!({
                "type": "object",
                "properties": {
                    "ref": {
                        "type": "string",
                        "description": "Element reference from the page snapshot (e.g. e3)"
                    },
                    "value": { "type": "string", "description": "Visible option text or value" }
                },
                "required": ["ref", "value"]
            }),
        ),
        tool(
            "screenshot",
            "Capture a PNG screenshot of the current page",
            no_params(),
        ),
        tool(
            "execute_js",
            "Execute a JavaScript expression in the page and return its JSON result",
            json!({
                "type": "object",
                "properties": {
                    "script": { "type": "string", "description": "JavaScript to execute" }
                },
                "required": ["script"]
            }),
        ),
        tool(
            "wait_for",
            "Pause for a bounded number of milliseconds",
            json!({
                "type": "object",
                "properties": {
                    "ms": {
                        "type": "integer",
                        "description": "Milliseconds to wait (capped at 30000)"
                    }
                },
                "required": ["ms"]
            }),
        ),
        tool(
            "tab_list",
            "List open tabs with their titles and URLs",
            no_params(),
        ),
        tool(
            "tab_select",
            "Switch focus to a tab by its 1-based index from tab_list",
            json!({
                "type": "object",
                "properties": {
                    "index": { "type": "integer", "description": "1-based tab index" }
                },
                "required": ["index"]
            }),
        ),
        tool(
            "tab_new",
            "Open a new tab, optionally navigating it to a URL",
            json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "URL to open (optional)" }
                }
            }),
        ),
        tool(
            "tab_close",
            "Close a tab by 1-based index, or the current tab when omitted",
            json!({
                "type": "object",
                "properties": {
                    "index": { "type": "integer", "description": "1-based tab index (optional)" }
                }
            }),
        ),
        tool(
            "handle_dialog",
            "Accept or dismiss the currently open alert/confirm/prompt dialog",
            json!({
                "type": "object",
                "properties": {
                    "accept": { "type": "boolean", "description": "true to accept, false to dismiss" }
                },
                "required": ["accept"]
            }),
        ),
        tool(
            "console_logs",
            "Read and drain browser console output collected since the last call",
            no_params(),
        ),
        tool(
            "start_recording",
            "Start recording browser actions; clears any previous recording",
            no_params(),
        ),
        tool(
            "stop_recording",
            "Stop recording and return the captured actions",
            no_params(),
        ),
        tool(
            "recording_status",
            "Report whether recording is active and how many actions are captured",
            no_params(),
        ),
        tool(
            "clear_recording",
            "Discard all recorded actions",
            no_params(),
        ),
        tool(
            "close_session",
            "Close the browser session; a later tool call starts a fresh one",
            no_params(),
        ),
        tool(
            "reset_session",
            "Close and relaunch the browser session",
            no_params(),
        ),
    ]
}
