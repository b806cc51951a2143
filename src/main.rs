use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use serieshub::config::{has_flag, ServerConfig, USAGE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        print!("{USAGE}");
        return Ok(());
    }

    // Init logging
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env_and_args(&args);
    info!(target: "serieshub", "SeriesHub {} starting", env!("CARGO_PKG_VERSION"));
    serieshub::server::run_with_config(config).await
}
