//! `armdeck-engine` – the pluggable chat assistant.
//!
//! The demo answers free-text chat through a [`ChatEngine`]: a single
//! capability method, `reply(messages) -> text`. Real providers (Gemini,
//! Claude, Qwen) are unimplemented stubs by design; the working path is the
//! local [`StubEngine`] echo. A configured-but-unimplemented provider is
//! substituted by the stub through [`FallbackEngine`], which logs every
//! substitution instead of hiding it in exception handling.

pub mod config;
pub mod engine;

pub use config::{LlmConfig, Provider};
pub use engine::{
    ChatEngine, ChatMessage, ClaudeEngine, FallbackEngine, GeminiEngine, QwenEngine, Role,
    StubEngine, make_engine,
};
