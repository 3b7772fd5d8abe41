//! Browser Pilot MCP Server
//!
//! Browser automation server speaking MCP over stdio.

use browser_pilot::driver::{CdpDriver, DriverConfig};
use browser_pilot::mcp::McpServer;
use browser_pilot::session::Session;
use clap::Parser;

/// Browser Pilot MCP Server
#[derive(Parser, Debug)]
#[command(name = "browser-pilot")]
#[command(version)]
#[command(about = "MCP server for snapshot-based browser automation")]
struct Args {
    /// Run the browser in headless mode
    #[arg(long, default_value = "true")]
    headless: bool,

    /// Browser window size as WIDTHxHEIGHT
    #[arg(long, default_value = "1920x1080")]
    window_size: String,

    /// User agent override
    #[arg(long)]
    user_agent: Option<String>,

    /// Path to Chrome/Chromium executable
    #[arg(long)]
    chrome_path: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_window_size(spec: &str) -> anyhow::Result<(u32, u32)> {
    let (w, h) = spec
        .split_once('x')
        .ok_or_else(|| anyhow::anyhow!("window size must look like 1920x1080"))?;
    Ok((w.trim().parse()?, h.trim().parse()?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries MCP frames; all logging goes to stderr.
    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let (width, height) = parse_window_size(&args.window_size)?;

    let mut builder = DriverConfig::builder()
        .headless(args.headless)
        .window_size(width, height);
    if let Some(ua) = args.user_agent {
        builder = builder.user_agent(ua);
    }
    if let Some(path) = args.chrome_path {
        builder = builder.chrome_path(path);
    }
    let config = builder.build();

    let session = Session::new(
        config,
        Box::new(|config| Box::pin(async move { CdpDriver::launch(&config).await })),
    );

    tracing::info!("Browser Pilot MCP server starting on stdio");
    McpServer::new(session).run().await?;
    Ok(())
}
