//! Topic → prompt → Gemini → normalized post → publisher.

use gemini_engine::ModelGateway;
use tracing::{info, instrument};
use x_client::{PublishedPost, Publisher};

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::fetcher::FeedReader;
use crate::normalize::{normalize, Post};
use crate::topics::{awareness_prompt, news_prompt, subject_prompt, trivia_prompt, Prompt, Topic, TopicSelector};

pub struct Pipeline {
    gateway: ModelGateway,
    feeds: FeedReader,
    selector: TopicSelector,
}

impl Pipeline {
    pub fn new(gateway: ModelGateway, feeds: FeedReader, selector: TopicSelector) -> Self {
        Self { gateway, feeds, selector }
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let gateway = ModelGateway::new(config.gemini()?)?;
        let feeds = FeedReader::new(config.feeds.clone())?;
        let selector = TopicSelector::from_seed(config.topic_seed);
        Ok(Self::new(gateway, feeds, selector))
    }

    pub fn gateway(&self) -> &ModelGateway {
        &self.gateway
    }

    pub fn selector(&self) -> &TopicSelector {
        &self.selector
    }

    /// Build the prompt for `topic`, reading the feeds only for the news digest.
    pub async fn prompt_for(&self, topic: Topic) -> Result<Prompt, AgentError> {
        let prompt = match topic {
            Topic::NewsDigest => {
                let item = self.feeds.latest().await?;
                info!(title = %item.title, link = %item.link, "Selected latest feed item");
                news_prompt(&item)
            }
            Topic::ProgrammingTrivia => trivia_prompt(),
            Topic::AwarenessMessage => awareness_prompt(),
        };
        Ok(prompt)
    }

    #[instrument(skip(self))]
    pub async fn compose(&self, topic: Topic) -> Result<Post, AgentError> {
        let prompt = self.prompt_for(topic).await?;
        self.generate(&prompt).await
    }

    /// The CLI flow: a user-supplied subject, no link.
    #[instrument(skip(self))]
    pub async fn compose_about(&self, subject: &str) -> Result<Post, AgentError> {
        self.generate(&subject_prompt(subject)).await
    }

    async fn generate(&self, prompt: &Prompt) -> Result<Post, AgentError> {
        let raw = self.gateway.generate(&prompt.text).await?;
        let post = normalize(&raw, prompt.link.as_deref());
        if post.is_empty() {
            return Err(AgentError::EmptyPost);
        }
        info!(chars = post.char_count(), has_link = post.source_link.is_some(), "Post composed");
        Ok(post)
    }

    /// Compose and publish. Nothing is published when composing fails.
    pub async fn run(&self, topic: Topic, publisher: &dyn Publisher) -> Result<PublishedPost, AgentError> {
        let post = self.compose(topic).await?;
        let published = publisher.post(&post.text, None).await?;
        info!(id = %published.id, topic = %topic, "Post published");
        Ok(published)
    }
}
