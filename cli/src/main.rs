//! OpenBridge binary: loads configuration, initializes logging, and runs the
//! axum server.

mod log_format;
mod logging;

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "openbridge")]
#[command(about = "OpenBridge — Responses API to Chat Completions translation proxy")]
struct Args {
    /// Directory to look for a `.env` file in (default: current directory)
    #[arg(long, value_name = "DIR")]
    env_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    config::apply_dotenv(args.env_dir.as_deref()).ok();
    let settings = config::Settings::from_env()?;

    logging::init(&settings.log_level)?;
    tracing::info!(host = %settings.host, port = settings.port, "starting openbridge");

    serve::run(settings).await?;
    Ok(())
}
