//! # Chatsync Config
//!
//! Configuration system for the chatsync LiveChat connector.
//!
//! Provides TOML-based configuration parsing and validation for LiveChat API
//! credentials, sync tuning, and output locations.
//!
//! # Configuration Schema
//!
//! The configuration file (`chatsync.toml`) supports the following sections:
//! - `[livechat]` — API credentials and base URL
//! - `[sync]` — Backfill window, page size, table selection
//! - `[output]` — Row output directory and state file path
//!
//! # Environment Variable Overrides
//!
//! Every credential field can be overridden via environment variables using
//! the `CHATSYNC_` prefix and `_` as section separator:
//! - `CHATSYNC_LIVECHAT_EMAIL` → `livechat.email`
//! - `CHATSYNC_LIVECHAT_API_KEY` → `livechat.api_key`
//! - `CHATSYNC_LIVECHAT_ACCESS_TOKEN` → `livechat.access_token`
//! - `CHATSYNC_LIVECHAT_BASE_URL` → `livechat.base_url`
//! - `CHATSYNC_SYNC_BACKFILL_DAYS` → `sync.backfill_days`
//! - `CHATSYNC_SYNC_PAGE_LIMIT` → `sync.page_limit`
//! - `CHATSYNC_OUTPUT_DATA_DIR` → `output.data_dir`
//! - `CHATSYNC_OUTPUT_STATE_PATH` → `output.state_path`

use serde::{Deserialize, Serialize};

/// Top-level chatsync configuration.
///
/// Parsed from `chatsync.toml` or constructed programmatically.
/// Environment variables with the `CHATSYNC_` prefix override TOML values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatsyncConfig {
    /// LiveChat API credentials and endpoint settings.
    #[serde(default)]
    pub livechat: LiveChatConfig,
    /// Sync tuning.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Output locations for rows and checkpointed state.
    #[serde(default)]
    pub output: OutputConfig,
}

/// LiveChat API settings.
///
/// Two authentication schemes are supported. Basic auth uses the account
/// `email` plus a personal `api_key` (the v3.3 reporting API). Bearer auth
/// uses an `access_token` (the v3.5 agent API). Exactly one scheme must be
/// fully configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveChatConfig {
    /// Account email for basic auth.
    #[serde(default)]
    pub email: Option<String>,
    /// Personal API key for basic auth (paired with `email`).
    #[serde(default)]
    pub api_key: Option<String>,
    /// OAuth access token for bearer auth.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Base URL of the LiveChat API (override for testing).
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for LiveChatConfig {
    fn default() -> Self {
        Self {
            email: None,
            api_key: None,
            access_token: None,
            base_url: default_base_url(),
        }
    }
}

/// Sync tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Lookback window in days for the first run of a time-windowed table.
    #[serde(default = "default_backfill_days")]
    pub backfill_days: i64,
    /// Records requested per page (LiveChat caps at 100).
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    /// Tables to sync. Empty means all known tables.
    #[serde(default)]
    pub tables: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backfill_days: default_backfill_days(),
            page_limit: default_page_limit(),
            tables: Vec::new(),
        }
    }
}

/// Output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory where per-table row files are written.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Path of the JSON sync-state file.
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            state_path: default_state_path(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.livechatinc.com".to_string()
}
fn default_backfill_days() -> i64 {
    30
}
fn default_page_limit() -> u32 {
    100
}
fn default_data_dir() -> String {
    "data".to_string()
}
fn default_state_path() -> String {
    "data/state.json".to_string()
}

impl ChatsyncConfig {
    /// Load configuration from a TOML file, then apply environment variable overrides.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path, e))?;
        Self::parse_toml(&contents)
    }

    /// Parse configuration from a TOML string, apply env overrides, then validate.
    pub fn parse_toml(toml_str: &str) -> anyhow::Result<Self> {
        let mut config: ChatsyncConfig = toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML config: {}", e))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CHATSYNC_LIVECHAT_EMAIL") {
            self.livechat.email = Some(v);
        }
        if let Ok(v) = std::env::var("CHATSYNC_LIVECHAT_API_KEY") {
            self.livechat.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("CHATSYNC_LIVECHAT_ACCESS_TOKEN") {
            self.livechat.access_token = Some(v);
        }
        if let Ok(v) = std::env::var("CHATSYNC_LIVECHAT_BASE_URL") {
            self.livechat.base_url = v;
        }
        if let Ok(v) = std::env::var("CHATSYNC_SYNC_BACKFILL_DAYS") {
            if let Ok(days) = v.parse::<i64>() {
                self.sync.backfill_days = days;
            }
        }
        if let Ok(v) = std::env::var("CHATSYNC_SYNC_PAGE_LIMIT") {
            if let Ok(limit) = v.parse::<u32>() {
                self.sync.page_limit = limit;
            }
        }
        if let Ok(v) = std::env::var("CHATSYNC_OUTPUT_DATA_DIR") {
            self.output.data_dir = v;
        }
        if let Ok(v) = std::env::var("CHATSYNC_OUTPUT_STATE_PATH") {
            self.output.state_path = v;
        }
    }

    /// Validate the configuration.
    ///
    /// A missing or half-configured credential set is fatal here, before any
    /// network activity happens.
    pub fn validate(&self) -> anyhow::Result<()> {
        let lc = &self.livechat;
        let basic = lc.email.is_some() || lc.api_key.is_some();
        let bearer = lc.access_token.is_some();

        if !basic && !bearer {
            anyhow::bail!(
                "livechat credentials missing: set either livechat.email + livechat.api_key \
                 (basic auth) or livechat.access_token (bearer auth)."
            );
        }
        if basic && (lc.email.is_none() || lc.api_key.is_none()) {
            anyhow::bail!(
                "livechat basic auth requires both livechat.email and livechat.api_key."
            );
        }
        if lc.base_url.is_empty() {
            anyhow::bail!("livechat.base_url must not be empty.");
        }
        if self.sync.backfill_days <= 0 || self.sync.backfill_days > 3650 {
            anyhow::bail!(
                "sync.backfill_days must be between 1 and 3650 (got {}).",
                self.sync.backfill_days
            );
        }
        if self.sync.page_limit == 0 || self.sync.page_limit > 100 {
            anyhow::bail!(
                "sync.page_limit must be between 1 and 100 (got {}).",
                self.sync.page_limit
            );
        }
        if self.output.data_dir.is_empty() {
            anyhow::bail!("output.data_dir must not be empty.");
        }
        if self.output.state_path.is_empty() {
            anyhow::bail!("output.state_path must not be empty.");
        }
        Ok(())
    }

    /// Generate a fully commented example configuration file.
    ///
    /// This is suitable for `chatsync --init-config` output.
    pub fn example_toml_commented() -> String {
        r#"# =============================================================================
# Chatsync Configuration File
# =============================================================================
# This file configures the chatsync LiveChat connector.
# All values shown below are defaults — uncomment and modify as needed.
#
# Environment variables override TOML values. Use the CHATSYNC_ prefix:
#   CHATSYNC_LIVECHAT_ACCESS_TOKEN=... chatsync

# -----------------------------------------------------------------------------
# [livechat] — API credentials
# -----------------------------------------------------------------------------
[livechat]
# Base URL of the LiveChat API.
base_url = "https://api.livechatinc.com"
# Basic auth (v3.3 reporting API): account email + personal API key.
# email = "agent@example.com"
# api_key = "c14b85863755158d7aa5cc4ba17f61cb"
# Bearer auth (v3.5 agent API): OAuth access token.
# access_token = "dal:A5151EqcsRpYp7u9GoBifQ"

# -----------------------------------------------------------------------------
# [sync] — Sync tuning
# -----------------------------------------------------------------------------
[sync]
# Lookback window in days for the first run of a time-windowed table.
backfill_days = 30
# Records per page (LiveChat caps at 100).
page_limit = 100
# Tables to sync. Empty means all known tables (chats, threads, events).
tables = []

# -----------------------------------------------------------------------------
# [output] — Where rows and sync state land
# -----------------------------------------------------------------------------
[output]
# Directory for per-table row files (one JSON line per upserted row).
data_dir = "data"
# Path of the checkpointed sync-state file.
state_path = "data/state.json"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChatsyncConfig::default();
        assert_eq!(config.livechat.base_url, "https://api.livechatinc.com");
        assert_eq!(config.sync.backfill_days, 30);
        assert_eq!(config.sync.page_limit, 100);
        assert!(config.sync.tables.is_empty());
        assert_eq!(config.output.data_dir, "data");
    }

    #[test]
    fn test_parse_bearer_auth() {
        let toml = r#"
[livechat]
access_token = "dal:token"
"#;
        let config = ChatsyncConfig::parse_toml(toml).unwrap();
        assert_eq!(config.livechat.access_token.as_deref(), Some("dal:token"));
        assert!(config.livechat.email.is_none());
    }

    #[test]
    fn test_parse_basic_auth() {
        let toml = r#"
[livechat]
email = "agent@example.com"
api_key = "abc123"
"#;
        let config = ChatsyncConfig::parse_toml(toml).unwrap();
        assert_eq!(config.livechat.email.as_deref(), Some("agent@example.com"));
        assert_eq!(config.livechat.api_key.as_deref(), Some("abc123"));
    }

    // Validation tests call validate() directly rather than parse_toml() so
    // they stay independent of CHATSYNC_* vars set by concurrent env tests.
    #[test]
    fn test_missing_credentials_rejected() {
        let config = ChatsyncConfig::default();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("credentials missing"));
    }

    #[test]
    fn test_half_configured_basic_auth_rejected() {
        let mut config = ChatsyncConfig::default();
        config.livechat.email = Some("agent@example.com".to_string());
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("api_key"));
    }

    #[test]
    fn test_invalid_page_limit() {
        let toml = r#"
[livechat]
access_token = "t"

[sync]
page_limit = 500
"#;
        let result = ChatsyncConfig::parse_toml(toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("page_limit"));
    }

    #[test]
    fn test_invalid_backfill_days() {
        let toml = r#"
[livechat]
access_token = "t"

[sync]
backfill_days = 0
"#;
        let result = ChatsyncConfig::parse_toml(toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("backfill_days"));
    }

    #[test]
    fn test_oversized_backfill_days_rejected() {
        let mut config = ChatsyncConfig::default();
        config.livechat.access_token = Some("t".to_string());
        config.sync.backfill_days = i64::MAX;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("backfill_days"));
    }

    #[test]
    fn test_env_override_access_token() {
        std::env::set_var("CHATSYNC_LIVECHAT_ACCESS_TOKEN", "token-from-env");
        let mut config = ChatsyncConfig::default();
        config.apply_env_overrides();
        assert_eq!(
            config.livechat.access_token.as_deref(),
            Some("token-from-env")
        );
        std::env::remove_var("CHATSYNC_LIVECHAT_ACCESS_TOKEN");
    }

    #[test]
    fn test_env_override_backfill_days() {
        std::env::set_var("CHATSYNC_SYNC_BACKFILL_DAYS", "7");
        let mut config = ChatsyncConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.sync.backfill_days, 7);
        std::env::remove_var("CHATSYNC_SYNC_BACKFILL_DAYS");
    }

    #[test]
    fn test_example_toml_commented() {
        let commented = ChatsyncConfig::example_toml_commented();
        assert!(commented.contains("[livechat]"));
        assert!(commented.contains("[sync]"));
        assert!(commented.contains("[output]"));
        assert!(commented.contains("CHATSYNC_"));
        assert!(commented.contains("backfill_days = 30"));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = ChatsyncConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ChatsyncConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.sync.page_limit, config.sync.page_limit);
        assert_eq!(parsed.livechat.base_url, config.livechat.base_url);
    }
}
