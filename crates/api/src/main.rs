use catalogsync_api::config::AppConfig;
use catalogsync_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    catalogsync_observability::init(LogFormat::from_env());

    let config = AppConfig::from_env()?;
    let app = catalogsync_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
