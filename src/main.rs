use clap::Parser;
use sp_metadata_shim::{config::AppConfig, server};
use tracing_subscriber::EnvFilter;

/// Serves Splunk SP metadata, optionally rewritten for the externally visible host.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Log at debug level regardless of LOG_LEVEL.
    #[arg(long)]
    debug: bool,

    #[command(flatten)]
    config: AppConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let level = if cli.debug {
        "debug"
    } else {
        cli.config.log_level.as_str()
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let listener = tokio::net::TcpListener::bind((cli.host.as_str(), cli.port)).await?;
    tracing::info!(
        "listening on {} (backend {}, root path {})",
        listener.local_addr()?,
        cli.config.base_url(),
        cli.config.root_path
    );

    axum::serve(listener, server::router(cli.config))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
