//! Configuration types shared across crates.

use crate::sync::SyncKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// SECURITY: When enabled, ensure this endpoint is network-restricted
    /// to authorized Prometheus scraper IPs only at the infrastructure level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Query timeout in seconds (advisory only - SQLite cannot force-cancel queries).
        /// Used as the busy timeout for lock contention.
        #[serde(default = "default_sqlite_query_timeout_secs")]
        query_timeout_secs: Option<u64>,
    },
}

fn default_sqlite_query_timeout_secs() -> Option<u64> {
    Some(30)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/artstore.db"),
            query_timeout_secs: default_sqlite_query_timeout_secs(),
        }
    }
}

impl MetadataConfig {
    /// Validate metadata configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { path, .. } => {
                if path.as_os_str().is_empty() {
                    return Err("metadata.path cannot be empty".to_string());
                }
                Ok(())
            }
        }
    }
}

/// Cadence of one periodic sync kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncLoopConfig {
    /// Run this loop at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between passes.
    pub interval_secs: u64,
}

impl SyncLoopConfig {
    pub fn every(interval_secs: u64) -> Self {
        Self {
            enabled: true,
            interval_secs,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_true() -> bool {
    true
}

/// Reconciliation engine and scheduler configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Storage element capacity/status/mode sync.
    #[serde(default = "default_storage_info_loop")]
    pub storage_info: SyncLoopConfig,
    /// File registry reconciliation.
    #[serde(default = "default_file_registry_loop")]
    pub file_registry: SyncLoopConfig,
    /// Service account reconciliation with the identity provider.
    #[serde(default = "default_service_accounts_loop")]
    pub service_accounts: SyncLoopConfig,
    /// Deadline for one reconciliation of one target.
    /// A run that exceeds it is recorded as failed for that target only.
    #[serde(default = "default_target_timeout_secs")]
    pub target_timeout_secs: u64,
    /// Maximum targets reconciled concurrently within one pass.
    #[serde(default = "default_max_concurrent_targets")]
    pub max_concurrent_targets: usize,
    /// Default page size for run history listings.
    #[serde(default = "default_run_history_limit")]
    pub run_history_limit: u32,
}

fn default_storage_info_loop() -> SyncLoopConfig {
    SyncLoopConfig::every(60)
}

fn default_file_registry_loop() -> SyncLoopConfig {
    SyncLoopConfig::every(300) // 5 minutes
}

fn default_service_accounts_loop() -> SyncLoopConfig {
    SyncLoopConfig::every(600) // 10 minutes
}

fn default_target_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_targets() -> usize {
    8
}

fn default_run_history_limit() -> u32 {
    50
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            storage_info: default_storage_info_loop(),
            file_registry: default_file_registry_loop(),
            service_accounts: default_service_accounts_loop(),
            target_timeout_secs: default_target_timeout_secs(),
            max_concurrent_targets: default_max_concurrent_targets(),
            run_history_limit: default_run_history_limit(),
        }
    }
}

impl SyncConfig {
    /// Loop settings of one sync kind.
    pub fn loop_for(&self, kind: SyncKind) -> &SyncLoopConfig {
        match kind {
            SyncKind::StorageInfo => &self.storage_info,
            SyncKind::FileRegistry => &self.file_registry,
            SyncKind::ServiceAccounts => &self.service_accounts,
        }
    }

    pub fn target_timeout(&self) -> Duration {
        Duration::from_secs(self.target_timeout_secs)
    }

    /// Validate sync configuration.
    /// Zero intervals would make `tokio::time::interval` panic.
    pub fn validate(&self) -> Result<(), String> {
        for (name, cfg) in [
            ("storage_info", &self.storage_info),
            ("file_registry", &self.file_registry),
            ("service_accounts", &self.service_accounts),
        ] {
            if cfg.enabled && cfg.interval_secs == 0 {
                return Err(format!(
                    "sync.{name}.interval_secs cannot be 0 when the loop is enabled"
                ));
            }
        }
        if self.target_timeout_secs == 0 {
            return Err("sync.target_timeout_secs cannot be 0".to_string());
        }
        if self.max_concurrent_targets == 0 {
            return Err("sync.max_concurrent_targets must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Retry policy for outbound calls.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    250
}

fn default_max_backoff_ms() -> u64 {
    4000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryConfig {
    /// Disable retries entirely.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    fn validate(&self, section: &str) -> Result<(), String> {
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(format!(
                "{section}.retry.initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            ));
        }
        Ok(())
    }
}

/// Storage node client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageNodesConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Files requested per listing page.
    #[serde(default = "default_listing_page_size")]
    pub listing_page_size: u32,
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_listing_page_size() -> u32 {
    1000
}

impl Default for StorageNodesConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetryConfig::default(),
            listing_page_size: default_listing_page_size(),
        }
    }
}

impl StorageNodesConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.listing_page_size == 0 {
            return Err("storage_nodes.listing_page_size must be at least 1".to_string());
        }
        self.retry.validate("storage_nodes")
    }
}

/// Identity provider (Keycloak-style admin API) configuration.
///
/// When this section is absent, service account sync is disabled.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Base URL (e.g., "http://keycloak:8080").
    pub base_url: String,
    /// Realm holding the service account clients and users.
    pub realm: String,
    /// Client used for admin API access (client credentials grant).
    pub client_id: String,
    /// WARNING: Prefer ARTSTORE_IDENTITY__CLIENT_SECRET env var over storing in config.
    pub client_secret: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl IdentityConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        crate::storage_element::normalize_base_url(&self.base_url)
            .map_err(|e| format!("identity.base_url: {e}"))?;
        if self.realm.trim().is_empty() {
            return Err("identity.realm cannot be empty".to_string());
        }
        if self.client_id.trim().is_empty() {
            return Err("identity.client_id cannot be empty".to_string());
        }
        self.retry.validate("identity")
    }
}

/// Authorization configuration.
///
/// Authentication happens at the gateway in front of the server; this
/// section only controls how forwarded identities map to roles.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Identity provider groups granting `admin`.
    #[serde(default = "default_admin_groups")]
    pub admin_groups: Vec<String>,
    /// Identity provider groups granting `readonly`.
    #[serde(default = "default_readonly_groups")]
    pub readonly_groups: Vec<String>,
    /// SHA-256 hex of the shared secret the gateway sends in `X-Gateway-Token`.
    /// Generate with: `echo -n "your-secret" | sha256sum`
    #[serde(default)]
    pub gateway_token_hash: Option<String>,
    /// Subject ids granted an `admin` role override on startup.
    #[serde(default)]
    pub bootstrap_admins: Vec<String>,
}

fn default_admin_groups() -> Vec<String> {
    vec!["artstore-admins".to_string()]
}

fn default_readonly_groups() -> Vec<String> {
    vec!["artstore-viewers".to_string()]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_groups: default_admin_groups(),
            readonly_groups: default_readonly_groups(),
            gateway_token_hash: None,
            bootstrap_admins: Vec::new(),
        }
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(hash) = &self.gateway_token_hash
            && (hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()))
        {
            return Err(
                "auth.gateway_token_hash must be a SHA256 hex string (64 characters)".to_string(),
            );
        }
        if self.bootstrap_admins.iter().any(|s| s.trim().is_empty()) {
            return Err("auth.bootstrap_admins cannot contain empty subject ids".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub storage_nodes: StorageNodesConfig,
    /// Identity provider (optional).
    pub identity: Option<IdentityConfig>,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Retries are disabled and the sync timeout is short.
    pub fn for_testing() -> Self {
        Self {
            sync: SyncConfig {
                target_timeout_secs: 5,
                ..SyncConfig::default()
            },
            storage_nodes: StorageNodesConfig {
                retry: RetryConfig::none(),
                ..StorageNodesConfig::default()
            },
            ..Self::default()
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.metadata.validate()?;
        self.sync.validate()?;
        self.storage_nodes.validate()?;
        if let Some(identity) = &self.identity {
            identity.validate()?;
        }
        self.auth.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.storage_info.interval_secs, 60);
        assert_eq!(config.file_registry.interval_secs, 300);
        assert_eq!(config.service_accounts.interval_secs, 600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sync_config_rejects_zero_interval() {
        let json = r#"{"file_registry": {"interval_secs": 0}}"#;
        let config: SyncConfig = serde_json::from_str(json).unwrap();
        assert!(config.file_registry.enabled);
        assert!(config.validate().is_err());

        let json = r#"{"file_registry": {"enabled": false, "interval_secs": 0}}"#;
        let config: SyncConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_identity_section_is_optional() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert!(config.identity.is_none());
        assert_eq!(config.auth.admin_groups, vec!["artstore-admins"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_gateway_token_hash_must_be_sha256_hex() {
        let auth = AuthConfig {
            gateway_token_hash: Some("abc".to_string()),
            ..AuthConfig::default()
        };
        assert!(auth.validate().is_err());

        let auth = AuthConfig {
            gateway_token_hash: Some("a".repeat(64)),
            ..AuthConfig::default()
        };
        assert!(auth.validate().is_ok());
    }

    #[test]
    fn test_retry_backoff_bounds() {
        let config = StorageNodesConfig {
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 5000,
                max_backoff_ms: 100,
            },
            ..StorageNodesConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_identity_config_validates_base_url() {
        let identity = IdentityConfig {
            base_url: "keycloak:8080".to_string(),
            realm: "artstore".to_string(),
            client_id: "artstore-admin".to_string(),
            client_secret: "secret".to_string(),
            request_timeout_secs: 10,
            retry: RetryConfig::default(),
        };
        assert!(identity.validate().is_err());
    }
}
