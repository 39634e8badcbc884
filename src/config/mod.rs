use crate::proposal::ProposalStatus;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "govwatch.toml";

/// Upper bound for `alerts.voting_window_hours` (one year).
pub const MAX_VOTING_WINDOW_HOURS: u64 = 24 * 366;

/// Config file location: `--config PATH`, else env CONFIG_FILE, else the default.
pub fn config_path(args: &[String]) -> PathBuf {
    if let Some(pos) = args.iter().position(|a| a == "--config") {
        if let Some(path) = args.get(pos + 1) {
            return PathBuf::from(path);
        }
    }
    std::env::var("CONFIG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base domain for generated proposal links when a chain has no explorer URL.
    #[serde(default = "default_detail_domain")]
    pub proposal_detail_domain: String,
    #[serde(default)]
    pub voting_alert_behavior_nearing: VotingAlertBehavior,
    #[serde(default)]
    pub discord: DiscordConfig,
    /// Monitored chains keyed by display name. Ordered so runs are deterministic.
    #[serde(default)]
    pub chains: BTreeMap<String, ChainConfig>,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// When to send the "voting period is nearing its end" reminder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingAlertBehavior {
    #[default]
    Always,
    /// Ask the chain whether the validator already voted and stay quiet if so.
    OnlyIfNotVoted,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Global webhook - overridden by env DISCORD_WEBHOOK
    #[serde(default)]
    pub webhook: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    #[serde(default)]
    pub chain_id: String,
    /// Voter address checked under `only_if_not_voted`.
    #[serde(default)]
    pub validator_address: String,
    /// Cosmos gov module version: "v1" or "v1beta1".
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// REST (LCD) base URL, without trailing slash.
    pub api_endpoint: String,
    /// Explorer proposal page prefix. "-" suppresses the link entirely.
    #[serde(default)]
    pub explorer_url: String,
    #[serde(default)]
    pub alerts: ChainAlerts,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainAlerts {
    #[serde(default)]
    pub discord: DiscordConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncateBy {
    #[default]
    Chars,
    Bytes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    /// Reminder window before voting ends, inclusive.
    #[serde(default = "default_voting_window_hours")]
    pub voting_window_hours: u64,
    /// Description limit; longer text keeps `max - 3` units plus "...".
    #[serde(default = "default_description_max_chars")]
    pub description_max_chars: usize,
    #[serde(default)]
    pub truncate_by: TruncateBy,
    /// Statuses that never alert.
    #[serde(
        default = "default_terminal_statuses",
        deserialize_with = "deserialize_statuses"
    )]
    pub terminal_statuses: Vec<ProposalStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Redis,
    File,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Redis/Valkey URL - overridden by env REDIS_URL
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Key namespace for the redis backend.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Directory for the file backend.
    #[serde(default = "default_state_dir")]
    pub dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleConfig {
    /// Run a pass every N seconds in addition to HTTP triggers. Unset = trigger-only.
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_detail_domain() -> String {
    "https://www.mintscan.io".to_string()
}
fn default_api_version() -> String {
    "v1".to_string()
}
fn default_voting_window_hours() -> u64 {
    24
}
fn default_description_max_chars() -> usize {
    120
}
fn default_terminal_statuses() -> Vec<ProposalStatus> {
    vec![
        ProposalStatus::Passed,
        ProposalStatus::Rejected,
        ProposalStatus::Failed,
    ]
}
/// Status names in config must be known; a typo is a parse error, not `Unspecified`.
fn deserialize_statuses<'de, D>(deserializer: D) -> Result<Vec<ProposalStatus>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let names = Vec::<String>::deserialize(deserializer)?;
    names
        .iter()
        .map(|name| {
            ProposalStatus::from_name(name).ok_or_else(|| {
                serde::de::Error::custom(format!("unknown proposal status {name:?}"))
            })
        })
        .collect()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_prefix() -> String {
    "govwatch".to_string()
}
fn default_state_dir() -> String {
    "state".to_string()
}
fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_http_timeout() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            voting_window_hours: default_voting_window_hours(),
            description_max_chars: default_description_max_chars(),
            truncate_by: TruncateBy::default(),
            terminal_statuses: default_terminal_statuses(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            url: default_redis_url(),
            prefix: default_prefix(),
            dir: default_state_dir(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AlertConfig {
    pub fn voting_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.voting_window_hours.min(MAX_VOTING_WINDOW_HOURS) as i64)
    }

    pub fn is_terminal(&self, status: ProposalStatus) -> bool {
        self.terminal_statuses.contains(&status)
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ChainConfig {
    /// Pick the webhook for this chain: its own when set, otherwise the
    /// enabled global one. `None` means alerts for this chain cannot be sent.
    pub fn webhook<'a>(&'a self, global: &'a DiscordConfig) -> Option<&'a str> {
        let own = &self.alerts.discord;
        if !own.enabled {
            return None;
        }
        if !own.webhook.is_empty() {
            return Some(&own.webhook);
        }
        if global.enabled && !global.webhook.is_empty() {
            return Some(&global.webhook);
        }
        None
    }
}

impl Config {
    /// Load config from a TOML file, then overlay environment variables for secrets.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&contents)?;

        // Secrets come from the environment, never the file
        if let Ok(webhook) = std::env::var("DISCORD_WEBHOOK") {
            config.discord.webhook = webhook;
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            config.storage.url = url;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.alerts.description_max_chars <= 3 {
            return Err(ConfigError::Invalid(format!(
                "alerts.description_max_chars must be greater than 3, got {}",
                self.alerts.description_max_chars
            )));
        }
        if self.alerts.voting_window_hours > MAX_VOTING_WINDOW_HOURS {
            return Err(ConfigError::Invalid(format!(
                "alerts.voting_window_hours must be at most {MAX_VOTING_WINDOW_HOURS}, got {}",
                self.alerts.voting_window_hours
            )));
        }

        for (name, chain) in &self.chains {
            if chain.api_endpoint.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "chain {name}: api_endpoint is required"
                )));
            }
            if !matches!(chain.api_version.as_str(), "v1" | "v1beta1") {
                return Err(ConfigError::Invalid(format!(
                    "chain {name}: unsupported api_version {:?}",
                    chain.api_version
                )));
            }
            if self.voting_alert_behavior_nearing == VotingAlertBehavior::OnlyIfNotVoted
                && chain.validator_address.is_empty()
            {
                return Err(ConfigError::Invalid(format!(
                    "chain {name}: validator_address is required for only_if_not_voted"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
proposal_detail_domain = "https://explorer.example"
voting_alert_behavior_nearing = "only_if_not_voted"

[discord]
enabled = true
webhook = "https://discord.example/global"

[chains.Cosmoshub]
chain_id = "cosmoshub-4"
validator_address = "cosmos1validator"
api_version = "v1beta1"
api_endpoint = "https://lcd.example"
alerts.discord.enabled = true

[chains.Osmosis]
validator_address = "osmo1validator"
api_endpoint = "https://osmo.example"
explorer_url = "-"
alerts.discord = { enabled = true, webhook = "https://discord.example/osmo" }
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_toml(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(
            config.voting_alert_behavior_nearing,
            VotingAlertBehavior::OnlyIfNotVoted
        );
        assert_eq!(config.chains.len(), 2);
        assert_eq!(config.chains["Osmosis"].api_version, "v1");
        assert_eq!(config.alerts.voting_window_hours, 24);
        assert_eq!(config.alerts.description_max_chars, 120);
        assert!(config.alerts.is_terminal(ProposalStatus::Failed));
        assert!(!config.alerts.is_terminal(ProposalStatus::Voting));
        assert_eq!(config.storage.backend, StorageBackend::Redis);
    }

    #[test]
    fn test_webhook_routing() {
        let config = Config::from_toml(SAMPLE).unwrap();

        // Chain without its own webhook falls back to the global one
        assert_eq!(
            config.chains["Cosmoshub"].webhook(&config.discord),
            Some("https://discord.example/global")
        );
        assert_eq!(
            config.chains["Osmosis"].webhook(&config.discord),
            Some("https://discord.example/osmo")
        );

        let mut disabled_global = config.discord.clone();
        disabled_global.enabled = false;
        assert_eq!(config.chains["Cosmoshub"].webhook(&disabled_global), None);

        let mut muted = config.chains["Osmosis"].clone();
        muted.alerts.discord.enabled = false;
        assert_eq!(muted.webhook(&config.discord), None);
    }

    #[test]
    fn test_validation_rejects_bad_chains() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.chains.get_mut("Osmosis").unwrap().validator_address.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.chains.get_mut("Osmosis").unwrap().api_version = "v2".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.alerts.description_max_chars = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_path_flag() {
        let args: Vec<String> = ["govwatch-once", "--mock", "--config", "/etc/gw.toml"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(config_path(&args), PathBuf::from("/etc/gw.toml"));
    }

    #[test]
    fn test_oversized_voting_window_is_rejected() {
        let config = Config::from_toml("[alerts]\nvoting_window_hours = 3000000000000000").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        // Never panics, even unvalidated
        assert_eq!(
            config.alerts.voting_window(),
            chrono::Duration::hours(MAX_VOTING_WINDOW_HOURS as i64)
        );

        let config = Config::from_toml("[alerts]\nvoting_window_hours = 8784").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_terminal_status_is_a_parse_error() {
        let err = Config::from_toml("[alerts]\nterminal_statuses = [\"PASED\", \"FAILED\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("PASED"));
    }

    #[test]
    fn test_custom_terminal_statuses() {
        let config = Config::from_toml(
            r#"
[alerts]
terminal_statuses = ["PASSED", "REJECTED"]
voting_window_hours = 48
"#,
        )
        .unwrap();
        assert!(!config.alerts.is_terminal(ProposalStatus::Failed));
        assert_eq!(config.alerts.voting_window(), chrono::Duration::hours(48));
    }
}
