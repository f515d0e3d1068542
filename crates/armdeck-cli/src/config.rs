//! Configuration Vault – reads/writes `~/.armdeck/config.toml`.

use armdeck_engine::LlmConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Persisted user configuration stored in `~/.armdeck/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP + WebSocket port for the demo console.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Camera stream rate in frames per second.
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Use the in-process mock arm instead of real hardware.
    #[serde(default = "default_use_mock")]
    pub use_mock: bool,

    /// Optional image file the mock serves instead of the synthetic scene.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_image_path: Option<PathBuf>,

    /// Policy checkpoint for the search skill, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_policy_path: Option<PathBuf>,

    /// Policy checkpoint for the grasp skill, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grasp_policy_path: Option<PathBuf>,

    /// Chat assistant selection. API keys live in the environment variable
    /// the config names, never in this file.
    #[serde(default)]
    pub llm: LlmConfig,
}

fn default_port() -> u16 {
    8000
}
fn default_fps() -> u32 {
    15
}
fn default_use_mock() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            fps: default_fps(),
            use_mock: default_use_mock(),
            static_image_path: None,
            search_policy_path: None,
            grasp_policy_path: None,
            llm: LlmConfig::default(),
        }
    }
}

/// Return the path to `~/.armdeck/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".armdeck").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `ARMDECK_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `ARMDECK_PORT` | `port` |
/// | `ARMDECK_FPS` | `fps` |
/// | `ARMDECK_USE_MOCK` | `use_mock` |
/// | `ARMDECK_STATIC_IMAGE` | `static_image_path` |
/// | `ARMDECK_LLM_PROVIDER` | `llm.provider` |
/// | `ARMDECK_LLM_MODEL` | `llm.model_name` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ARMDECK_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.port = port;
    }
    if let Ok(v) = std::env::var("ARMDECK_FPS")
        && let Ok(fps) = v.parse::<u32>()
    {
        cfg.fps = fps;
    }
    if let Ok(v) = std::env::var("ARMDECK_USE_MOCK")
        && let Ok(flag) = v.parse::<bool>()
    {
        cfg.use_mock = flag;
    }
    if let Ok(v) = std::env::var("ARMDECK_STATIC_IMAGE") {
        cfg.static_image_path = Some(PathBuf::from(v));
    }
    if let Ok(v) = std::env::var("ARMDECK_LLM_PROVIDER")
        && let Some(p) = armdeck_engine::Provider::parse(&v)
    {
        cfg.llm.provider = p;
    }
    if let Ok(v) = std::env::var("ARMDECK_LLM_MODEL") {
        cfg.llm.model_name = v;
    }
}

/// Save the config to disk, creating `~/.armdeck/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Restrict the config directory to the owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    // Write the file with owner-only read/write (rw-------) on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
