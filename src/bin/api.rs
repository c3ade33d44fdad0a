use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trip_planner_orchestrator::{
    api::{start_server, ApiState},
    config::PlannerConfig,
    model::GeminiClient,
    planner::{PlannerSettings, TripPlanner},
    state::InMemoryTripStore,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = PlannerConfig::from_env().map_err(|e| {
        eprintln!("⚠️  {}", e);
        eprintln!("📌 Set GEMINI_API_KEY in .env or the environment");
        e
    })?;

    info!("🚀 Trip Planner - API Server");
    info!("📍 Port: {}", config.port);
    info!("🤖 Model: {}", config.model);

    // Create components
    let model = Arc::new(GeminiClient::new(&config)?);
    let planner = Arc::new(TripPlanner::new(model, PlannerSettings::from(&config)));
    let store = Arc::new(InMemoryTripStore::new());

    info!("✅ Planner initialized");
    info!("📡 Starting API server...");

    // Start API server
    start_server(ApiState::new(planner, store), config.port).await?;

    Ok(())
}
