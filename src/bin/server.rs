use multi_agent_chat::{
    api::{start_server, AppState},
    config::Settings,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let port = settings.port;

    info!("🚀 AI Multi-Agent System - Chat Server");
    info!("📍 Port: {}", port);
    info!("🧠 Model: {}", settings.model);

    let state = AppState::from_settings(settings)?;

    info!("✅ Agents configured");
    info!("📡 Starting chat server...");

    start_server(state, port).await?;

    Ok(())
}
