use service_core::observability::init_tracing;
use vision_proxy::config::ProxyConfig;
use vision_proxy::startup::Application;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ProxyConfig::load().map_err(|e| {
        eprintln!("ERROR: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing("vision-proxy", "info", config.otlp_endpoint.as_deref())?;

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        anyhow::anyhow!("Startup error: {}", e)
    })?;

    app.run_until_stopped().await?;

    Ok(())
}
