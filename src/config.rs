//! Application configuration.
//!
//! Loaded from YAML by the CLI (see `cli::runtime::load_config`); every section has defaults so
//! an empty or missing file is a valid configuration. A handful of `PROMPTSMITH_*` environment
//! variables override the file afterwards.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use cdp_adapter::CdpConfig;
use context_bridge::config::BridgeConfig;
use promptsmith_core_types::Stage;
use serde::{Deserialize, Serialize};
use site_adapters::{AssistantProfile, GeneratorProfile};
use tracing::{info, warn};

pub const DATA_DIR_ENV: &str = "PROMPTSMITH_DATA_DIR";
pub const HISTORY_URL_ENV: &str = "PROMPTSMITH_HISTORY_URL";
pub const HEADLESS_ENV: &str = "PROMPTSMITH_HEADLESS";
pub const BROWSER_WS_ENV: &str = "PROMPTSMITH_BROWSER_WS";

pub const DEFAULT_PREFIX: &str =
    "请将以下内容转为英文绘画提示词，只返回提示词本身，不要包含其他解释：";

const STORE_FILE: &str = "tasks.json";
const HISTORY_FILE: &str = "history.jsonl";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the task store and the history log.
    pub data_dir: PathBuf,
    /// Prefix used until the operator saves one of their own.
    pub default_prefix: String,
    /// Lines kept in the activity log.
    pub activity_capacity: usize,
    pub history: HistoryConfig,
    pub server: ServerConfig,
    pub browser: CdpConfig,
    pub runner: RunnerConfig,
    pub bridge: BridgeConfig,
    pub sites: SitesConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_prefix: DEFAULT_PREFIX.to_string(),
            activity_capacity: 500,
            history: HistoryConfig::default(),
            server: ServerConfig::default(),
            browser: CdpConfig::default(),
            runner: RunnerConfig::default(),
            bridge: BridgeConfig::default(),
            sites: SitesConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Record every generated image with the history service.
    pub enabled: bool,
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://127.0.0.1:3000".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl HistoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// History log location; defaults to `<data_dir>/history.jsonl`.
    pub store_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            store_path: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub rewrite_delay_ms: u64,
    pub generate_delay_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            rewrite_delay_ms: Stage::Rewrite.default_delay().as_millis() as u64,
            generate_delay_ms: Stage::Generate.default_delay().as_millis() as u64,
        }
    }
}

impl RunnerConfig {
    pub fn delay_for(&self, stage: Stage) -> Duration {
        match stage {
            Stage::Rewrite => Duration::from_millis(self.rewrite_delay_ms),
            Stage::Generate => Duration::from_millis(self.generate_delay_ms),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SitesConfig {
    pub assistant: AssistantProfile,
    pub generator: GeneratorProfile,
}

impl AppConfig {
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.server
            .store_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(HISTORY_FILE))
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_from(|key| env::var(key).ok());
    }

    /// Applies `PROMPTSMITH_*` overrides read through `lookup`. Blank values are ignored.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(dir) = read(DATA_DIR_ENV) {
            info!(dir = %dir, "Using data directory from {}", DATA_DIR_ENV);
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = read(HISTORY_URL_ENV) {
            self.history.base_url = url.trim().to_string();
            self.history.enabled = true;
        }
        if let Some(raw) = read(HEADLESS_ENV) {
            match parse_flag(&raw) {
                Some(headless) => self.browser.headless = headless,
                None => warn!(value = %raw, "ignoring unrecognised {} value", HEADLESS_ENV),
            }
        }
        if let Some(url) = read(BROWSER_WS_ENV) {
            self.browser.websocket_url = Some(url.trim().to_string());
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("promptsmith"))
        .unwrap_or_else(|| PathBuf::from(".promptsmith"))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_yaml_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.default_prefix, DEFAULT_PREFIX);
        assert_eq!(config.runner.delay_for(Stage::Rewrite), Duration::from_secs(2));
        assert_eq!(config.runner.delay_for(Stage::Generate), Duration::from_secs(3));
        assert_eq!(config.bridge.channel_timeout(), None);
        assert!(!config.history.enabled);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let raw = r#"
data_dir: /tmp/ps
runner:
  generate_delay_ms: 10
sites:
  generator:
    url: https://example.test/gen
"#;
        let config: AppConfig = serde_yaml::from_str(raw).unwrap();
        assert_eq!(config.store_path(), PathBuf::from("/tmp/ps/tasks.json"));
        assert_eq!(config.history_path(), PathBuf::from("/tmp/ps/history.jsonl"));
        assert_eq!(config.runner.rewrite_delay_ms, 2_000);
        assert_eq!(config.runner.generate_delay_ms, 10);
        assert_eq!(config.sites.generator.url, "https://example.test/gen");
        assert_eq!(config.sites.assistant, AssistantProfile::default());
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (DATA_DIR_ENV, "/srv/promptsmith"),
            (HISTORY_URL_ENV, " http://history.local:3000 "),
            (HEADLESS_ENV, "yes"),
            (BROWSER_WS_ENV, "   "),
        ]);
        let mut config = AppConfig::default();
        config.apply_env_overrides_from(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.data_dir, PathBuf::from("/srv/promptsmith"));
        assert_eq!(config.history.base_url, "http://history.local:3000");
        assert!(config.history.enabled);
        assert!(config.browser.headless);
        assert_eq!(config.browser.websocket_url, None);
    }

    #[test]
    fn bad_headless_flag_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_env_overrides_from(|key| (key == HEADLESS_ENV).then(|| "maybe".to_string()));
        assert!(!config.browser.headless);
    }
}
