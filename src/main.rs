use clap::Parser;
use sapgate::{config, server};

/// Sapgate - SAP Business One SQL gateway
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// HTTP server host address
    #[arg(long)]
    http_host: Option<String>,

    /// HTTP server port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Defaults to INFO level, can be overridden with RUST_LOG
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = config::ServerConfig::from_env()?;
    if let Some(host) = cli.http_host {
        config.http_host = host;
    }
    if let Some(port) = cli.http_port {
        config.http_port = port;
    }

    log::info!(
        "Sapgate v{} starting ({} dialect)",
        env!("CARGO_PKG_VERSION"),
        config.database.dialect.as_str()
    );

    server::run_with_config(config).await
}
