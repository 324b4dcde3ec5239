//! Runtime configuration
//!
//! Values come from built-in defaults, an optional TOML file passed with
//! `--config`, and `DNW_`-prefixed environment variables (highest precedence),
//! e.g. `DNW_HEALTH__PING_TARGET=1.1.1.1`.
//!
//! The monitoring cadences are fixed and deliberately absent here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "DNW";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub bridge: BridgeSettings,
    pub health: HealthSettings,
    pub capture: CaptureSettings,
    pub keep_awake: KeepAwakeSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeSettings {
    /// Explicit path to the bridge executable; skips the search order when set
    pub tool_path: Option<PathBuf>,
    /// Upper bound for ordinary bridge commands. Bug report capture is unbounded.
    pub command_timeout_secs: u64,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            tool_path: None,
            command_timeout_secs: 15,
        }
    }
}

impl BridgeSettings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthSettings {
    /// Address pinged from the device to decide internet reachability
    pub ping_target: String,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            ping_target: "223.5.5.5".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureSettings {
    /// Case-insensitive substrings of `ro.product.brand` that enable capture
    pub brand_tokens: Vec<String>,
    /// Directory receiving capture folders; defaults to the executable's directory
    pub output_root: Option<PathBuf>,
    pub directory_suffix: String,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            brand_tokens: vec!["xiaomi".to_string(), "redmi".to_string()],
            output_root: None,
            directory_suffix: "NetworkError".to_string(),
        }
    }
}

/// Swipe gesture injected periodically to keep the screen on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KeepAwakeSettings {
    pub from_x: u32,
    pub from_y: u32,
    pub to_x: u32,
    pub to_y: u32,
    pub duration_ms: u32,
}

impl Default for KeepAwakeSettings {
    fn default() -> Self {
        Self {
            from_x: 500,
            from_y: 1500,
            to_x: 500,
            to_y: 500,
            duration_ms: 200,
        }
    }
}

impl KeepAwakeSettings {
    pub fn swipe_args(&self) -> Vec<String> {
        vec![
            "input".to_string(),
            "swipe".to_string(),
            self.from_x.to_string(),
            self.from_y.to_string(),
            self.to_x.to_string(),
            self.to_y.to_string(),
            self.duration_ms.to_string(),
        ]
    }
}

impl AppConfig {
    /// Loads configuration from the optional file and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::build(path, None)
    }

    /// Same as [`AppConfig::load`] but reads variables from `env` instead of the process
    pub fn load_with_env(
        path: Option<&Path>,
        env: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        Self::build(path, Some(env))
    }

    fn build(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("capture.brand_tokens")
            .source(env);

        builder.add_source(environment).build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_sources() {
        let config = AppConfig::load_with_env(None, HashMap::new()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.health.ping_target, "223.5.5.5");
        assert_eq!(config.bridge.command_timeout(), Duration::from_secs(15));
        assert_eq!(config.capture.brand_tokens, vec!["xiaomi", "redmi"]);
    }

    #[test]
    fn test_file_then_environment_precedence() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[health]\nping_target = \"8.8.8.8\"\n\n[bridge]\ncommand_timeout_secs = 30"
        )
        .unwrap();

        let mut env = HashMap::new();
        env.insert("DNW_HEALTH__PING_TARGET".to_string(), "1.1.1.1".to_string());
        env.insert(
            "DNW_CAPTURE__BRAND_TOKENS".to_string(),
            "xiaomi,poco".to_string(),
        );

        let config = AppConfig::load_with_env(Some(file.path()), env).unwrap();
        assert_eq!(config.health.ping_target, "1.1.1.1");
        assert_eq!(config.bridge.command_timeout_secs, 30);
        assert_eq!(config.capture.brand_tokens, vec!["xiaomi", "poco"]);
        assert_eq!(config.capture.directory_suffix, "NetworkError");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = AppConfig::load_with_env(
            Some(Path::new("/definitely/not/here/dnw.toml")),
            HashMap::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_swipe_args() {
        let args = KeepAwakeSettings::default().swipe_args();
        assert_eq!(args, ["input", "swipe", "500", "1500", "500", "500", "200"]);
    }
}
