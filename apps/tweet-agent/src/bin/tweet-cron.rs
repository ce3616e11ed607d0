use std::net::SocketAddr;
use std::sync::Arc;

use gemini_engine::init_logging;
use tracing::info;
use tweet_agent::server::{router, CronState};
use tweet_agent::{AgentConfig, Pipeline, TopicChoice};
use x_client::XClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AgentConfig::from_env()?;
    let publisher = XClient::with_base(config.x_credentials()?, &config.x_api_base)?;
    let state = CronState {
        pipeline: Pipeline::from_config(&config)?,
        publisher: Arc::new(publisher),
        cron_secret: config.cron_secret.clone(),
        topic: TopicChoice::Random,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Cron endpoint listening");

    axum::serve(listener, router(Arc::new(state))).await?;
    Ok(())
}
