//! Node configuration – reads/writes `~/.linetrack/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use linetrack_control::FollowerConfig;
use linetrack_middleware::RosbridgeConfig;
use linetrack_types::LineError;
use serde::{Deserialize, Serialize};

/// Persisted node configuration.
///
/// Every field has a default, so an empty file (or no file at all) yields a
/// follower that behaves exactly like the stock line-follower script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Node identity used in logs and event sources.
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// WebSocket URL of the rosbridge server.
    #[serde(default = "default_rosbridge_url")]
    pub rosbridge_url: String,

    #[serde(default = "default_image_topic")]
    pub image_topic: String,

    #[serde(default = "default_cmd_vel_topic")]
    pub cmd_vel_topic: String,

    /// Prefix for the annotated-frame and mask topics. Unset disables them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_topic: Option<String>,

    /// Send a zero command before disconnecting.
    #[serde(default)]
    pub stop_on_shutdown: bool,

    #[serde(default)]
    pub follower: FollowerConfig,
}

fn default_node_name() -> String {
    "follower".to_string()
}
fn default_rosbridge_url() -> String {
    "ws://localhost:9090".to_string()
}
fn default_image_topic() -> String {
    "/camera/rgb/image_raw".to_string()
}
fn default_cmd_vel_topic() -> String {
    "/cmd_vel".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            rosbridge_url: default_rosbridge_url(),
            image_topic: default_image_topic(),
            cmd_vel_topic: default_cmd_vel_topic(),
            debug_topic: None,
            stop_on_shutdown: false,
            follower: FollowerConfig::default(),
        }
    }
}

impl Config {
    /// Transport settings for the rosbridge client.
    pub fn rosbridge(&self) -> RosbridgeConfig {
        RosbridgeConfig {
            url: self.rosbridge_url.clone(),
            image_topic: self.image_topic.clone(),
            cmd_vel_topic: self.cmd_vel_topic.clone(),
            debug_topic: self.debug_topic.clone(),
            image_queue_length: Some(1),
            stop_on_shutdown: self.stop_on_shutdown,
        }
    }
}

/// Return the path to `~/.linetrack/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".linetrack").join("config.toml")
}

/// Load the config from `path` and apply env overrides. Returns `None` if
/// the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, LineError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| LineError::Config(format!("failed to read {}: {e}", path.display())))?;
    let mut cfg: Config = toml::from_str(&raw)
        .map_err(|e| LineError::Config(format!("failed to parse {}: {e}", path.display())))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `LINETRACK_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `LINETRACK_ROSBRIDGE_URL` | `rosbridge_url` |
/// | `LINETRACK_IMAGE_TOPIC` | `image_topic` |
/// | `LINETRACK_CMD_VEL_TOPIC` | `cmd_vel_topic` |
/// | `LINETRACK_DEBUG_TOPIC` | `debug_topic` |
/// | `LINETRACK_SENSITIVITY` | `follower.sensitivity` |
///
/// Unparseable numeric values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("LINETRACK_ROSBRIDGE_URL") {
        cfg.rosbridge_url = v;
    }
    if let Ok(v) = std::env::var("LINETRACK_IMAGE_TOPIC") {
        cfg.image_topic = v;
    }
    if let Ok(v) = std::env::var("LINETRACK_CMD_VEL_TOPIC") {
        cfg.cmd_vel_topic = v;
    }
    if let Ok(v) = std::env::var("LINETRACK_DEBUG_TOPIC") {
        cfg.debug_topic = Some(v);
    }
    if let Ok(v) = std::env::var("LINETRACK_SENSITIVITY")
        && let Ok(s) = v.parse::<u8>()
    {
        cfg.follower.sensitivity = s;
    }
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), LineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| LineError::Config(format!("failed to create config directory: {e}")))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| LineError::Serialization(format!("failed to serialize config: {e}")))?;
    // Owner read/write only on Unix.
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| LineError::Config(format!("failed to write {}: {e}", path.display())))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| LineError::Config(format!("failed to write {}: {e}", path.display())))?;
    Ok(())
}
