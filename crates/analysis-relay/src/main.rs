use analysis_relay::{router, RelayConfig, RELAY_PATH};
use anyhow::Context;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = RelayConfig::from_env().context("Invalid relay configuration")?;
    let addr = config.bind_addr;
    tracing::info!("Forwarding {} to {}", RELAY_PATH, config.target_url);

    let app = router(config).context("Failed to build relay")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
