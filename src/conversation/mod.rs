//! Conversation types and state management

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wellness topic a message is tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Fitness,
    Nutrition,
    Mental,
}

impl Category {
    /// All categories in classifier priority order
    pub const ALL: [Category; 3] = [Category::Fitness, Category::Nutrition, Category::Mental];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Fitness => "fitness",
            Category::Nutrition => "nutrition",
            Category::Mental => "mental",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fitness" => Ok(Category::Fitness),
            "nutrition" => Ok(Category::Nutrition),
            "mental" | "mental_health" | "mental-health" => Ok(Category::Mental),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

/// Display colour of a message bubble
pub fn display_color(author: Author, category: Option<Category>) -> &'static str {
    if author == Author::User {
        return "blue";
    }
    match category {
        Some(Category::Fitness) => "blue",
        Some(Category::Nutrition) => "green",
        Some(Category::Mental) => "purple",
        None => "gray",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Bot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Liked,
    Disliked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub content: String,
    pub author: Author,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub feedback: Option<Feedback>,
}

impl Message {
    fn new(content: String, author: Author, category: Option<Category>) -> Self {
        Self {
            content,
            author,
            timestamp: Utc::now(),
            category,
            feedback: None,
        }
    }

    pub fn is_bot(&self) -> bool {
        self.author == Author::Bot
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedbackError {
    #[error("No message at index {0}")]
    NotFound(usize),

    #[error("Message {0} was written by the user")]
    NotBotMessage(usize),
}

/// Append-only message log. Only `feedback` may change after a push.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user message, returning its index
    pub fn add_user(&mut self, content: &str, category: Option<Category>) -> usize {
        self.push(Message::new(content.to_string(), Author::User, category))
    }

    /// Append a bot message, returning its index
    pub fn add_bot(&mut self, content: &str, category: Option<Category>) -> usize {
        self.push(Message::new(content.to_string(), Author::Bot, category))
    }

    fn push(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    /// Overwrite the feedback of a bot message. Last write wins.
    pub fn set_feedback(&mut self, index: usize, feedback: Feedback) -> Result<(), FeedbackError> {
        let message = self
            .messages
            .get_mut(index)
            .ok_or(FeedbackError::NotFound(index))?;

        if !message.is_bot() {
            return Err(FeedbackError::NotBotMessage(index));
        }

        message.feedback = Some(feedback);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
