//! Chat-provider configuration.
//!
//! Load order: explicit toml file, then `LLM_*` environment variables, then
//! hard-coded defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Supported chat providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    Claude,
    Qwen,
    /// Local echo responder; never leaves the process.
    Stub,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Gemini => write!(f, "gemini"),
            Provider::Claude => write!(f, "claude"),
            Provider::Qwen => write!(f, "qwen"),
            Provider::Stub => write!(f, "stub"),
        }
    }
}

impl Provider {
    /// Case-insensitive name lookup, e.g. for environment overrides.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gemini" => Some(Provider::Gemini),
            "claude" => Some(Provider::Claude),
            "qwen" => Some(Provider::Qwen),
            "stub" => Some(Provider::Stub),
            _ => None,
        }
    }
}

/// Provider + model selection for the chat engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: Provider,

    /// Model name, e.g. `"gemini-1.5-flash"` or `"claude-3-5-sonnet"`.
    #[serde(default = "default_model")]
    pub model_name: String,

    /// Name of the environment variable holding the API key. The key itself
    /// is never written to config files.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model_name: default_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl LlmConfig {
    /// Load from `path` when it exists, otherwise from `LLM_PROVIDER`,
    /// `LLM_MODEL`, and `LLM_API_KEY_ENV`, otherwise defaults.
    pub fn load(path: Option<&Path>) -> Self {
        if let Some(path) = path
            && path.is_file()
            && let Ok(raw) = std::fs::read_to_string(path)
            && let Ok(cfg) = toml::from_str::<LlmConfig>(&raw)
        {
            return cfg;
        }

        let mut cfg = LlmConfig::default();
        if let Ok(v) = std::env::var("LLM_PROVIDER")
            && let Some(p) = Provider::parse(&v)
        {
            cfg.provider = p;
        }
        if let Ok(v) = std::env::var("LLM_MODEL") {
            cfg.model_name = v;
        }
        if let Ok(v) = std::env::var("LLM_API_KEY_ENV") {
            cfg.api_key_env = v;
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_point_at_gemini() {
        let cfg = LlmConfig::default();
        assert_eq!(cfg.provider, Provider::Gemini);
        assert_eq!(cfg.model_name, "gemini-1.5-flash");
        assert_eq!(cfg.api_key_env, "GEMINI_API_KEY");
    }

    #[test]
    fn toml_file_wins() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("llm.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "provider = \"claude\"\nmodel_name = \"claude-3-5-sonnet\"\napi_key_env = \"ANTHROPIC_API_KEY\""
        )
        .unwrap();

        let cfg = LlmConfig::load(Some(&path));
        assert_eq!(cfg.provider, Provider::Claude);
        assert_eq!(cfg.model_name, "claude-3-5-sonnet");
        assert_eq!(cfg.api_key_env, "ANTHROPIC_API_KEY");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let cfg = LlmConfig::load(Some(&dir.path().join("absent.toml")));
        assert_eq!(cfg.provider, Provider::Gemini);
    }

    #[test]
    fn provider_parse_accepts_known_names() {
        assert_eq!(Provider::parse("QWEN"), Some(Provider::Qwen));
        assert_eq!(Provider::parse("stub"), Some(Provider::Stub));
        assert_eq!(Provider::parse("gpt-x"), None);
    }

    #[test]
    fn provider_display_is_lowercase() {
        assert_eq!(Provider::Claude.to_string(), "claude");
    }
}
