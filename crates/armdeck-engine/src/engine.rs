//! [`ChatEngine`] trait, provider stubs, and the logged fallback decorator.

use armdeck_types::ArmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{LlmConfig, Provider};

// ─────────────────────────────────────────────────────────────────────────────
// Message types
// ─────────────────────────────────────────────────────────────────────────────

/// The role of a participant in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ChatEngine trait
// ─────────────────────────────────────────────────────────────────────────────

/// A chat backend with exactly one capability: turn a message list into a
/// reply string.
#[async_trait]
pub trait ChatEngine: Send + Sync {
    /// Backend identifier, e.g. `"gemini"` or `"stub"`.
    fn id(&self) -> &str;

    /// Produce a reply to the conversation.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::ChatUnavailable`] when the backend is an
    /// unimplemented provider stub.
    async fn reply(&self, messages: &[ChatMessage]) -> Result<String, ArmError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider stubs (unimplemented by design)
// ─────────────────────────────────────────────────────────────────────────────

macro_rules! provider_stub {
    ($name:ident, $id:literal, $doc:literal) => {
        #[doc = $doc]
        pub struct $name {
            pub model_name: String,
            pub api_key_env: String,
        }

        impl $name {
            pub fn new(cfg: &LlmConfig) -> Self {
                Self {
                    model_name: cfg.model_name.clone(),
                    api_key_env: cfg.api_key_env.clone(),
                }
            }
        }

        #[async_trait]
        impl ChatEngine for $name {
            fn id(&self) -> &str {
                $id
            }

            async fn reply(&self, _messages: &[ChatMessage]) -> Result<String, ArmError> {
                Err(ArmError::ChatUnavailable(format!(
                    "{} ({}) is a placeholder; the HTTP client is not implemented",
                    $id, self.model_name
                )))
            }
        }
    };
}

provider_stub!(GeminiEngine, "gemini", "Placeholder Google Gemini client.");
provider_stub!(ClaudeEngine, "claude", "Placeholder Anthropic Claude client.");
provider_stub!(QwenEngine, "qwen", "Placeholder Qwen client.");

// ─────────────────────────────────────────────────────────────────────────────
// Stub engine
// ─────────────────────────────────────────────────────────────────────────────

/// Local echo responder used when no real provider is available.
#[derive(Default)]
pub struct StubEngine;

#[async_trait]
impl ChatEngine for StubEngine {
    fn id(&self) -> &str {
        "stub"
    }

    async fn reply(&self, messages: &[ChatMessage]) -> Result<String, ArmError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(format!(
            "[STUB LLM] I received: '{last_user}'. Configure a real LLM to get meaningful answers."
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fallback decorator
// ─────────────────────────────────────────────────────────────────────────────

/// Tries `primary` first; when it reports [`ArmError::ChatUnavailable`],
/// answers via `fallback` and logs the substitution. Any other error is
/// propagated untouched.
pub struct FallbackEngine {
    primary: Box<dyn ChatEngine>,
    fallback: Box<dyn ChatEngine>,
}

impl FallbackEngine {
    pub fn new(primary: Box<dyn ChatEngine>, fallback: Box<dyn ChatEngine>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl ChatEngine for FallbackEngine {
    fn id(&self) -> &str {
        self.primary.id()
    }

    async fn reply(&self, messages: &[ChatMessage]) -> Result<String, ArmError> {
        match self.primary.reply(messages).await {
            Ok(text) => Ok(text),
            Err(ArmError::ChatUnavailable(reason)) => {
                warn!(
                    primary = self.primary.id(),
                    fallback = self.fallback.id(),
                    %reason,
                    "chat provider unavailable; substituting fallback"
                );
                self.fallback.reply(messages).await
            }
            Err(e) => Err(e),
        }
    }
}

/// Build the configured engine, wrapped in a stub fallback unless the stub
/// itself was requested.
pub fn make_engine(cfg: &LlmConfig) -> Box<dyn ChatEngine> {
    let primary: Box<dyn ChatEngine> = match cfg.provider {
        Provider::Gemini => Box::new(GeminiEngine::new(cfg)),
        Provider::Claude => Box::new(ClaudeEngine::new(cfg)),
        Provider::Qwen => Box::new(QwenEngine::new(cfg)),
        Provider::Stub => return Box::new(StubEngine),
    };
    Box::new(FallbackEngine::new(primary, Box::new(StubEngine)))
}
