use anyhow::Result;
use llm_interceptor::config::Settings;
use llm_interceptor::Application;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting LLM Interceptor application");

    let app = Application::with_settings(settings).await?;
    app.run().await?;

    Ok(())
}
