use clap::Parser;
use gemini_engine::init_logging;
use tracing::{error, info};
use tweet_agent::{AgentConfig, Pipeline, TopicChoice};
use x_client::XClient;

/// Compose one post and publish it to X.
#[derive(Debug, Parser)]
#[command(name = "tweet-agent", version)]
struct Args {
    /// news, trivia, awareness or random
    #[arg(long, default_value = "news")]
    topic: TopicChoice,

    /// Print the composed post instead of publishing it
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    init_logging();

    let args = Args::parse();
    let config = AgentConfig::from_env()?;
    let pipeline = Pipeline::from_config(&config)?;
    let topic = args.topic.resolve(pipeline.selector());

    info!(topic = %topic, dry_run = args.dry_run, "Starting tweet agent");

    if args.dry_run {
        let post = pipeline.compose(topic).await?;
        println!("{}", post.text);
        return Ok(());
    }

    let publisher = XClient::with_base(config.x_credentials()?, &config.x_api_base)?;
    match pipeline.run(topic, &publisher).await {
        Ok(published) => {
            info!(id = %published.id, url = %published.url(), "Tweet posted");
            println!("{}", published.url());
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Tweet agent run failed");
            Err(e.into())
        }
    }
}
