use clap::{Parser, Subcommand};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use gemini_engine::init_logging;
use tracing::{info, warn};
use tweet_agent::{AgentConfig, Pipeline, Post};
use x_client::{PublishedPost, Publisher, XClient};

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Post to X by hand or with a generated draft.
#[derive(Debug, Parser)]
#[command(name = "tweet-cli", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Post a tweet
    Post { text: String },
    /// Reply to an existing tweet
    Reply { id: String, text: String },
    /// Generate a tweet with Gemini, review it, then post
    Ai {
        /// What to write about; a random topic when omitted
        subject: Option<String>,
        /// Post without asking for confirmation
        #[arg(long)]
        yes: bool,
    },
    /// List the models the API key can use
    Models,
}

#[tokio::main]
async fn main() -> CliResult<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let config = AgentConfig::from_env()?;

    match cli.command {
        Some(Command::Post { text }) => {
            let post = publisher(&config)?.post(&text, None).await?;
            print_published(&post);
        }
        Some(Command::Reply { id, text }) => {
            let post = publisher(&config)?.post(&text, Some(&id)).await?;
            print_published(&post);
        }
        Some(Command::Ai { subject, yes }) => {
            let pipeline = Pipeline::from_config(&config)?;
            let draft = draft(&pipeline, subject.as_deref()).await?;
            publish_draft(&config, &draft, yes).await?;
        }
        Some(Command::Models) => {
            let pipeline = Pipeline::from_config(&config)?;
            for model in pipeline.gateway().list_models().await? {
                println!("{model}");
            }
        }
        None => interactive(&config).await?,
    }
    Ok(())
}

fn publisher(config: &AgentConfig) -> CliResult<XClient> {
    Ok(XClient::with_base(config.x_credentials()?, &config.x_api_base)?)
}

async fn draft(pipeline: &Pipeline, subject: Option<&str>) -> CliResult<Post> {
    let post = match subject.map(str::trim).filter(|s| !s.is_empty()) {
        Some(subject) => pipeline.compose_about(subject).await?,
        None => {
            let topic = pipeline.selector().pick();
            info!(topic = %topic, "No subject given, drafting a random topic");
            pipeline.compose(topic).await?
        }
    };
    Ok(post)
}

async fn publish_draft(config: &AgentConfig, draft: &Post, skip_confirm: bool) -> CliResult<()> {
    println!("\n{}\n({} chars)\n", draft.text, draft.char_count());

    if !skip_confirm {
        let proceed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Post this tweet?")
            .default(false)
            .interact()?;
        if !proceed {
            println!("Tweet discarded.");
            return Ok(());
        }
    }

    let post = publisher(config)?.post(&draft.text, None).await?;
    print_published(&post);
    Ok(())
}

async fn interactive(config: &AgentConfig) -> CliResult<()> {
    let theme = ColorfulTheme::default();
    let options = ["Post a tweet", "Reply to a tweet", "Generate a tweet with AI", "Exit"];

    loop {
        let choice = Select::with_theme(&theme)
            .with_prompt("What would you like to do?")
            .default(0)
            .items(&options)
            .interact()?;

        let outcome = match choice {
            0 => {
                let text: String = Input::with_theme(&theme)
                    .with_prompt("Tweet text")
                    .interact_text()?;
                confirm_and_post(config, &theme, &text, None).await
            }
            1 => {
                let id: String = Input::with_theme(&theme)
                    .with_prompt("Tweet ID to reply to")
                    .interact_text()?;
                let text: String = Input::with_theme(&theme)
                    .with_prompt("Reply text")
                    .interact_text()?;
                confirm_and_post(config, &theme, &text, Some(&id)).await
            }
            2 => {
                let subject: String = Input::with_theme(&theme)
                    .with_prompt("Subject (leave empty for a random topic)")
                    .allow_empty(true)
                    .interact_text()?;
                match Pipeline::from_config(config) {
                    Ok(pipeline) => match draft(&pipeline, Some(&subject)).await {
                        Ok(draft) => publish_draft(config, &draft, false).await,
                        Err(e) => Err(e),
                    },
                    Err(e) => Err(e.into()),
                }
            }
            _ => return Ok(()),
        };

        // Keep the menu alive after a failed action.
        if let Err(e) = outcome {
            warn!(error = %e, "Action failed");
            eprintln!("Error: {e}");
        }
        println!();
    }
}

async fn confirm_and_post(
    config: &AgentConfig,
    theme: &ColorfulTheme,
    text: &str,
    reply_to: Option<&str>,
) -> CliResult<()> {
    let proceed = Confirm::with_theme(theme)
        .with_prompt(format!("Post \"{text}\"?"))
        .default(true)
        .interact()?;
    if !proceed {
        println!("Cancelled.");
        return Ok(());
    }
    let post = publisher(config)?.post(text, reply_to).await?;
    print_published(&post);
    Ok(())
}

fn print_published(post: &PublishedPost) {
    info!(id = %post.id, "Tweet posted");
    println!("Tweet posted: {}", post.url());
}
