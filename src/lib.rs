//! Browser Pilot - Browser Automation MCP Server
//!
//! This crate provides an MCP (Model Context Protocol) server that lets AI
//! agents drive a real browser through snapshot-based element references.
//!
//! # Features
//!
//! - **MCP Server**: JSON-RPC 2.0 stdio server for AI agent integration
//! - **Browser Automation**: Headless browser control via ChromiumOxide (CDP)
//! - **Element Snapshots**: Stable `e1`, `e2`, ... references over the
//!   interactive elements of a page
//! - **Reference Resolution**: Ordered fallback strategies that survive DOM
//!   churn between snapshot and action
//! - **Action Recording**: Opt-in journal of the operations an agent performs
//!
//! # Architecture
//!
//! ```text
//! AI Agent ──▶ MCP Server ──▶ Session ──▶ Driver (CDP)
//!                                │
//!                     ┌──────────┼──────────┐
//!                     ▼          ▼          ▼
//!                 Snapshot    Resolver   Recorder
//!                 (catalog)   (ref→elem) (journal)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use browser_pilot::driver::{CdpDriver, DriverConfig};
//! use browser_pilot::session::Session;
//! use browser_pilot::mcp::McpServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DriverConfig::default();
//!     let session = Session::new(
//!         config,
//!         Box::new(|config| Box::pin(async move { CdpDriver::launch(&config).await })),
//!     );
//!     McpServer::new(session).run().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod driver;
pub mod error;
pub mod mcp;
pub mod recorder;
pub mod session;
pub mod snapshot;
pub mod tabs;

// Re-exports for convenience
pub use driver::{CdpDriver, Driver, DriverConfig, DriverElement};
pub use error::{Error, Result};
pub use mcp::McpServer;
pub use recorder::Recorder;
pub use session::Session;
pub use snapshot::{Catalog, ElementDescriptor};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
