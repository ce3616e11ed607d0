//! Generation strategies and the prompts they produce.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;

use crate::fetcher::FeedItem;

/// Voice shared by every generated post.
pub const STYLE_GUIDE: &str = "\
Your writing style: Casual, direct, authentic. You share personal opinions and insights, not generic advice.
Use \"I\" naturally when sharing your view. Ask questions to engage. Keep it conversational.
1-2 emojis max, only if natural. Use 1-2 relevant hashtags. Avoid corporate buzzwords. Mix insight with personality.
Example tone: \"Just tried this new approach. Results? Better than expected. Here's why it matters:\"";

const FALLBACK_TITLE: &str = "Interesting tech update";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    NewsDigest,
    ProgrammingTrivia,
    AwarenessMessage,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::NewsDigest, Topic::ProgrammingTrivia, Topic::AwarenessMessage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::NewsDigest => "news",
            Topic::ProgrammingTrivia => "trivia",
            Topic::AwarenessMessage => "awareness",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown topic '{0}' (expected news, trivia, awareness or random)")]
pub struct ParseTopicError(String);

impl FromStr for Topic {
    type Err = ParseTopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "news" | "news-digest" | "dev_news" => Ok(Topic::NewsDigest),
            "trivia" | "programming-trivia" | "programming_fact" => Ok(Topic::ProgrammingTrivia),
            "awareness" | "awareness-message" | "world_problem" => Ok(Topic::AwarenessMessage),
            _ => Err(ParseTopicError(s.to_string())),
        }
    }
}

/// A fixed topic, or a uniform draw at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicChoice {
    Random,
    Fixed(Topic),
}

impl TopicChoice {
    pub fn resolve(self, selector: &TopicSelector) -> Topic {
        match self {
            TopicChoice::Random => selector.pick(),
            TopicChoice::Fixed(topic) => topic,
        }
    }
}

impl FromStr for TopicChoice {
    type Err = ParseTopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("random") {
            Ok(TopicChoice::Random)
        } else {
            s.parse().map(TopicChoice::Fixed)
        }
    }
}

/// Stateless uniform choice between the strategies; each draw is independent.
pub struct TopicSelector {
    rng: Mutex<StdRng>,
}

impl TopicSelector {
    pub fn new() -> Self {
        Self { rng: Mutex::new(StdRng::from_os_rng()) }
    }

    /// Seeded selectors repeat the same sequence of draws.
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) },
            None => Self::new(),
        }
    }

    pub fn pick(&self) -> Topic {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Topic::ALL[rng.random_range(0..Topic::ALL.len())]
    }
}

impl Default for TopicSelector {
    fn default() -> Self {
        Self::new()
    }
}

/// Prompt text plus the link that must end up in the post, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub link: Option<String>,
}

pub fn news_prompt(item: &FeedItem) -> Prompt {
    let title = match item.title.trim() {
        "" => FALLBACK_TITLE,
        title => title,
    };
    let link = item.link.trim();

    let text = format!(
        "You are writing a tweet for a developer who has a casual, authentic voice.\n\n\
{STYLE_GUIDE}\n\n\
Write a tweet (max 270 chars) about this article. Share YOUR take on why it matters or what caught your attention. \
Make it feel personal and conversational, not like a news headline. \
Use 1-2 hashtags naturally (pick from: #webdev #devops #cloud). End with the link.\n\n\
Article: {title}\nLink: {link}\n\nTweet:"
    );

    Prompt {
        text,
        link: (!link.is_empty()).then(|| link.to_string()),
    }
}

pub fn trivia_prompt() -> Prompt {
    Prompt {
        text: format!(
            "You are writing a tweet for a developer who has a casual, authentic voice.\n\n\
{STYLE_GUIDE}\n\n\
Share a lesser-known programming fact, tip, or concept. Make it engaging, concise (max 270 chars), \
and relevant for developers. Use a conversational tone and add 1-2 hashtags if natural.\n\nTweet:"
        ),
        link: None,
    }
}

pub fn awareness_prompt() -> Prompt {
    Prompt {
        text: format!(
            "You are writing a tweet for a developer who has a casual, authentic voice.\n\n\
{STYLE_GUIDE}\n\n\
Write a tweet (max 270 chars) highlighting a current world problem (e.g., climate change, digital privacy, AI ethics). \
Make it insightful, relatable for developers, and encourage positive action or awareness. \
Use a conversational tone and add 1-2 hashtags if natural.\n\nTweet:"
        ),
        link: None,
    }
}

/// Free-form prompt for a user-supplied subject.
pub fn subject_prompt(subject: &str) -> Prompt {
    Prompt {
        text: format!("Write a concise, engaging tweet (max 280 chars) about: {}", subject.trim()),
        link: None,
    }
}
