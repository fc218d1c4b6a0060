//! Response providers
//!
//! A provider turns one user message into one bot reply. Every provider
//! resolves to a non-empty string; failures are turned into fallback text
//! inside the provider and never reach the turn controller.

mod local;
mod remote;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{Config, ResponseMode, TipBook};
use crate::conversation::Category;

pub use local::LocalTipProvider;
pub use remote::{RemoteConfig, RemoteProvider};

/// Reply when the remote strategy has no credential to call with
pub const MISSING_CREDENTIAL: &str =
    "Please provide your Perplexity API key to get personalized responses.";

/// Reply when the remote call fails for any reason
pub const APOLOGY: &str = "I apologize, but I'm having trouble connecting to my knowledge base. Please try again in a moment.";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// User-supplied bearer token. Held in memory only and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for blank input
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Everything a provider needs to answer one turn
#[derive(Debug, Clone)]
pub struct TipRequest {
    pub text: String,
    pub category: Option<Category>,
    pub credential: Option<Credential>,
}

#[async_trait]
pub trait ResponseProvider: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Whether the user should be asked for a credential
    fn wants_credential(&self) -> bool {
        false
    }

    /// Produce the bot reply for a turn
    async fn respond(&self, request: &TipRequest) -> String;
}

/// Remote when the session holds a credential, local tips otherwise
pub struct AutoProvider {
    local: LocalTipProvider,
    remote: RemoteProvider,
}

impl AutoProvider {
    pub fn new(local: LocalTipProvider, remote: RemoteProvider) -> Self {
        Self { local, remote }
    }
}

#[async_trait]
impl ResponseProvider for AutoProvider {
    fn name(&self) -> &'static str {
        "auto"
    }

    fn wants_credential(&self) -> bool {
        true
    }

    async fn respond(&self, request: &TipRequest) -> String {
        if request.credential.is_some() {
            self.remote.respond(request).await
        } else {
            self.local.respond(request).await
        }
    }
}

/// Build the provider selected by `BROBOT_MODE`
pub fn from_config(
    config: &Config,
    tips: TipBook,
) -> Result<Arc<dyn ResponseProvider>, ProviderError> {
    let local = || LocalTipProvider::new(tips.clone(), config.typing_delay());
    let remote = || RemoteProvider::new(RemoteConfig::from(config));

    let provider: Arc<dyn ResponseProvider> = match config.mode {
        ResponseMode::Local => Arc::new(local()),
        ResponseMode::Remote => Arc::new(remote()?),
        ResponseMode::Auto => Arc::new(AutoProvider::new(local(), remote()?)),
    };

    Ok(provider)
}
