mod app;
mod catalog;
mod command;
mod config;
mod downloader;
mod error;
mod paths;
mod player;
mod resolver;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use app::App;
use downloader::CliMediaTools;
use paths::Paths;
use resolver::YtDlpResolver;

const REQUIRED_TOOLS: &[&str] = &["yt-dlp", "ffplay", "ffmpeg"];

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr and stay silent unless RUST_LOG asks;
    // stdout belongs to the prompt.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let paths = Paths::resolve()?;

    for tool in REQUIRED_TOOLS {
        if which::which(tool).is_err() {
            println!("[missing]: {} is not installed or in your PATH", tool);
        }
    }

    let app = App::new(
        &paths,
        Box::new(YtDlpResolver::new()),
        Box::new(CliMediaTools),
    );
    app.run().await?;
    Ok(())
}
