#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dealbrief_observability::init();

    let config = dealbrief_api::config::Config::from_env()?;
    let app = dealbrief_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
