use std::sync::Arc;

use gemini_engine::init_logging_to_stderr;
use tokio::io::BufReader;
use tweet_agent::mcp::McpServer;
use tweet_agent::AgentConfig;
use x_client::XClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    // stdout carries the protocol
    init_logging_to_stderr();

    let config = AgentConfig::from_env()?;
    let publisher = XClient::with_base(config.x_credentials()?, &config.x_api_base)?;
    let server = McpServer::new(Arc::new(publisher));

    server
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;
    Ok(())
}
