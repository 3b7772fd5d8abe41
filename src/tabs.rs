//! Tab registry
//!
//! Enumerates open windows/tabs with their titles and URLs. Reading a
//! tab's metadata requires focusing it, so listing walks every handle and
//! then restores the original focus. Callers see the list as a read-only
//! observation; focus changes are an implementation detail that is always
//! undone.

use crate::driver::{Driver, WindowHandle};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

/// Metadata for one open tab
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabInfo {
    /// Driver window handle
    pub handle: WindowHandle,
    /// Document title, empty when the read failed
    pub title: String,
    /// Document URL, empty when the read failed
    pub url: String,
    /// Whether this tab held focus when the listing started
    pub active: bool,
}

/// List all open tabs, in handle order, preserving the focused tab
#[instrument(skip(driver))]
pub async fn list_tabs<D: Driver>(driver: &D) -> Result<Vec<TabInfo>> {
    let current = driver.current_window().await?;
    let handles = driver.window_handles().await?;

    let mut tabs = Vec::with_capacity(handles.len());
    for handle in handles {
        let (title, url) = match inspect(driver, &handle).await {
            Ok(pair) => pair,
            // A tab that closed mid-walk still gets a row; its metadata
            // is just unavailable.
            Err(e) => {
                warn!(%handle, "Could not read tab metadata: {e}");
                (String::new(), String::new())
            }
        };
        tabs.push(TabInfo {
            active: handle == current,
            handle,
            title,
            url,
        });
    }

    driver.switch_to_window(&current).await?;
    Ok(tabs)
}

async fn inspect<D: Driver>(driver: &D, handle: &WindowHandle) -> Result<(String, String)> {
    driver.switch_to_window(handle).await?;
    Ok((driver.title().await?, driver.current_url().await?))
}
