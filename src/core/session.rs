//! Chat session and turn controller
//!
//! A turn moves the session from idle to awaiting a response and back:
//! 1. A submit (or quick-select) appends the user message and sets busy/typing
//! 2. The response provider is awaited exactly once, with the state unlocked
//! 3. The bot reply is appended with the user message's category and the
//!    flags are cleared
//!
//! `ChatSession` holds the synchronous state machine. `SessionHandle` wraps it
//! for concurrent callers and publishes a `SessionEvent` for every change.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::conversation::{display_color, Category, Conversation, Feedback, FeedbackError, Message};
use crate::providers::{Credential, ResponseProvider, TipRequest};

use super::classifier::detect_category;

pub const WELCOME_MESSAGE: &str = "Hey bro! 💪 I'm here to help you with fitness, nutrition, and mental wellness. What's on your mind?";

pub const CREDENTIAL_PROMPT: &str = "Please provide your Perplexity API key to get started!";

const EVENT_CAPACITY: usize = 64;

/// Transient notification shown after a feedback action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub title: String,
    pub duration_ms: u64,
}

impl Acknowledgement {
    fn for_feedback(feedback: Feedback) -> Self {
        let title = match feedback {
            Feedback::Liked => "Glad this was helpful! 💪",
            Feedback::Disliked => "Thanks for the feedback! 🙏",
        };
        Self {
            title: title.to_string(),
            duration_ms: 2000,
        }
    }
}

/// Change notifications for the presentation layer
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    MessageAppended { index: usize, message: Message },
    FeedbackUpdated { index: usize, feedback: Feedback },
    StatusChanged { busy: bool, typing: bool },
    Acknowledgement { title: String, duration_ms: u64 },
    /// The view should scroll to the message at `index`
    ScrollToLatest { index: usize },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::MessageAppended { .. } => "message_appended",
            SessionEvent::FeedbackUpdated { .. } => "feedback_updated",
            SessionEvent::StatusChanged { .. } => "status_changed",
            SessionEvent::Acknowledgement { .. } => "acknowledgement",
            SessionEvent::ScrollToLatest { .. } => "scroll_to_latest",
        }
    }
}

/// A turn that has been started and is waiting for its reply
#[derive(Debug)]
pub struct PendingTurn {
    user_index: usize,
    request: TipRequest,
}

impl PendingTurn {
    pub fn user_index(&self) -> usize {
        self.user_index
    }

    pub fn category(&self) -> Option<Category> {
        self.request.category
    }

    pub fn request(&self) -> &TipRequest {
        &self.request
    }
}

/// Result of a submit or quick-select
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Empty input, or a turn was already in flight
    Ignored,
    Completed { user_index: usize, bot_index: usize },
}

/// Session state machine
#[derive(Debug, Default)]
pub struct ChatSession {
    conversation: Conversation,
    busy: bool,
    typing: bool,
    draft: String,
    credential: Option<Credential>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// Replace the credential; blank input clears it
    pub fn set_credential(&mut self, value: Option<&str>) {
        self.credential = value.and_then(Credential::new);
    }

    /// Start a turn from free text. Returns `None` for blank input or while busy.
    pub fn begin_submit(&mut self, text: &str) -> Option<PendingTurn> {
        let text = text.trim();
        if text.is_empty() || self.busy {
            return None;
        }

        let category = detect_category(text);
        self.draft.clear();
        Some(self.begin_turn(text.to_string(), category))
    }

    /// Submit whatever is in the composer
    pub fn begin_submit_draft(&mut self) -> Option<PendingTurn> {
        let draft = self.draft.clone();
        self.begin_submit(&draft)
    }

    /// Start a turn from a category shortcut. The draft is left alone.
    pub fn begin_quick_select(&mut self, category: Category) -> Option<PendingTurn> {
        if self.busy {
            return None;
        }

        Some(self.begin_turn(format!("Give me a {} tip", category), Some(category)))
    }

    fn begin_turn(&mut self, text: String, category: Option<Category>) -> PendingTurn {
        let user_index = self.conversation.add_user(&text, category);
        self.busy = true;
        self.typing = true;

        PendingTurn {
            user_index,
            request: TipRequest {
                text,
                category,
                credential: self.credential.clone(),
            },
        }
    }

    /// Append the bot reply for a turn and return to idle
    pub fn complete_turn(&mut self, turn: PendingTurn, reply: &str) -> usize {
        let index = self.conversation.add_bot(reply, turn.category());
        self.busy = false;
        self.typing = false;
        index
    }

    pub fn begin_welcome(&mut self) {
        self.typing = true;
    }

    /// Append the welcome message. A turn started meanwhile keeps its typing flag.
    pub fn complete_welcome(&mut self, text: &str) -> usize {
        let index = self.conversation.add_bot(text, None);
        if !self.busy {
            self.typing = false;
        }
        index
    }

    pub fn set_feedback(
        &mut self,
        index: usize,
        feedback: Feedback,
    ) -> Result<Acknowledgement, FeedbackError> {
        self.conversation.set_feedback(index, feedback)?;
        Ok(Acknowledgement::for_feedback(feedback))
    }
}

/// A message as shown to clients
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub index: usize,
    #[serde(flatten)]
    pub message: Message,
    pub color: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub busy: bool,
    pub typing: bool,
    pub draft: String,
    pub has_credential: bool,
    pub messages: Vec<MessageView>,
}

/// Shared handle to one live session
pub struct SessionHandle {
    id: Uuid,
    state: Mutex<ChatSession>,
    provider: Arc<dyn ResponseProvider>,
    events: broadcast::Sender<SessionEvent>,
    last_active: StdMutex<Instant>,
}

impl SessionHandle {
    pub fn new(provider: Arc<dyn ResponseProvider>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            id: Uuid::new_v4(),
            state: Mutex::new(ChatSession::new()),
            provider,
            events,
            last_active: StdMutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Record client activity
    pub fn touch(&self) {
        if let Ok(mut last_active) = self.last_active.lock() {
            *last_active = Instant::now();
        }
    }

    /// Time since the last client activity
    pub fn idle_for(&self) -> Duration {
        self.last_active
            .lock()
            .map(|last_active| last_active.elapsed())
            .unwrap_or_default()
    }

    /// A session with a turn in flight or a live event stream is never idle
    pub async fn is_idle(&self, max_idle: Duration) -> bool {
        if self.events.receiver_count() > 0 || self.state.lock().await.is_busy() {
            return false;
        }
        self.idle_for() >= max_idle
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn emit_status(&self, state: &ChatSession) {
        self.emit(SessionEvent::StatusChanged {
            busy: state.is_busy(),
            typing: state.is_typing(),
        });
    }

    fn emit_appended(&self, state: &ChatSession, index: usize) {
        if let Some(message) = state.conversation().get(index) {
            self.emit(SessionEvent::MessageAppended {
                index,
                message: message.clone(),
            });
        }
        self.emit_scroll(state);
    }

    fn emit_scroll(&self, state: &ChatSession) {
        if let Some(index) = state.conversation().len().checked_sub(1) {
            self.emit(SessionEvent::ScrollToLatest { index });
        }
    }

    /// The first bot message of a session
    pub fn welcome_text(&self) -> String {
        if self.provider.wants_credential() {
            format!("{} {}", WELCOME_MESSAGE, CREDENTIAL_PROMPT)
        } else {
            WELCOME_MESSAGE.to_string()
        }
    }

    /// Show the typing indicator ahead of the welcome message
    pub async fn begin_welcome(&self) {
        let mut state = self.state.lock().await;
        state.begin_welcome();
        self.emit_status(&state);
    }

    pub async fn post_welcome(&self) -> usize {
        let mut state = self.state.lock().await;
        let index = state.complete_welcome(&self.welcome_text());
        self.emit_appended(&state, index);
        self.emit_status(&state);
        tracing::debug!(session = %self.id, "Posted welcome message");
        index
    }

    fn started(&self, turn: Option<PendingTurn>, state: &ChatSession) -> Option<PendingTurn> {
        let turn = turn?;
        self.emit_appended(state, turn.user_index());
        self.emit_status(state);
        tracing::debug!(
            session = %self.id,
            category = ?turn.category(),
            provider = self.provider.name(),
            "Turn started"
        );
        Some(turn)
    }

    pub async fn begin_submit(&self, text: &str) -> Option<PendingTurn> {
        let mut state = self.state.lock().await;
        let turn = state.begin_submit(text);
        self.started(turn, &state)
    }

    pub async fn begin_submit_draft(&self) -> Option<PendingTurn> {
        let mut state = self.state.lock().await;
        let turn = state.begin_submit_draft();
        self.started(turn, &state)
    }

    pub async fn begin_quick_select(&self, category: Category) -> Option<PendingTurn> {
        let mut state = self.state.lock().await;
        let turn = state.begin_quick_select(category);
        self.started(turn, &state)
    }

    /// Await the provider for a started turn and append the reply.
    /// Returns the index of the bot message.
    pub async fn finish(&self, turn: PendingTurn) -> usize {
        let reply = self.provider.respond(turn.request()).await;

        let mut state = self.state.lock().await;
        let bot_index = state.complete_turn(turn, &reply);
        self.emit_appended(&state, bot_index);
        self.emit_status(&state);
        tracing::debug!(session = %self.id, bot_index, "Turn completed");
        bot_index
    }

    pub async fn set_draft(&self, text: &str) {
        self.state.lock().await.set_draft(text);
    }

    pub async fn set_credential(&self, value: Option<&str>) {
        self.state.lock().await.set_credential(value);
    }

    pub async fn set_feedback(
        &self,
        index: usize,
        feedback: Feedback,
    ) -> Result<Acknowledgement, FeedbackError> {
        let mut state = self.state.lock().await;
        let ack = state.set_feedback(index, feedback)?;

        self.emit(SessionEvent::FeedbackUpdated { index, feedback });
        self.emit(SessionEvent::Acknowledgement {
            title: ack.title.clone(),
            duration_ms: ack.duration_ms,
        });
        self.emit_scroll(&state);
        Ok(ack)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot {
            id: self.id,
            busy: state.is_busy(),
            typing: state.is_typing(),
            draft: state.draft().to_string(),
            has_credential: state.has_credential(),
            messages: state
                .conversation()
                .messages()
                .iter()
                .enumerate()
                .map(|(index, message)| MessageView {
                    index,
                    message: message.clone(),
                    color: display_color(message.author, message.category),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
impl SessionHandle {
    async fn run(&self, turn: Option<PendingTurn>) -> TurnOutcome {
        match turn {
            Some(turn) => {
                let user_index = turn.user_index();
                let bot_index = self.finish(turn).await;
                TurnOutcome::Completed {
                    user_index,
                    bot_index,
                }
            }
            None => TurnOutcome::Ignored,
        }
    }

    /// Run a full turn for free text
    pub async fn submit(&self, text: &str) -> TurnOutcome {
        let turn = self.begin_submit(text).await;
        self.run(turn).await
    }

    /// Run a full turn for a category shortcut
    pub async fn quick_select(&self, category: Category) -> TurnOutcome {
        let turn = self.begin_quick_select(category).await;
        self.run(turn).await
    }
}
