use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: HttpConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default)]
    pub turns: TurnConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: HttpConfig::default(),
            storage: StorageConfig::default(),
            rate_limit: RateLimitConfig::default(),
            scope: ScopeConfig::default(),
            turns: TurnConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address the Axum HTTP/SSE server binds to.
    #[serde(default = "HttpConfig::default_bind")]
    pub bind: String,
}

impl HttpConfig {
    fn default_bind() -> String {
        "0.0.0.0:8080".into()
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: Self::default_bind(),
        }
    }
}

/// Which `StorageBackend` (C1) to construct, plus its connection details.
/// Mirrors `cognition_storage::factory::StorageConfig`; kept as a separate
/// serde-friendly shape here since the factory's variant carries no derives
/// for YAML (it is constructed from this after validation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "memory" | "sqlite" | "postgres" — unknown values are rejected at
    /// startup by `cognition_storage::factory::parse_kind`, never silently
    /// defaulted (§4.1 failure semantics).
    #[serde(default = "StorageConfig::default_kind")]
    pub kind: String,
    /// Sqlite file path, e.g. `./data/cognition.db`.
    #[serde(default = "StorageConfig::default_sqlite_path")]
    pub path: String,
    /// Postgres connection string. Read from `COGNITION_DATABASE_URL` when
    /// unset here — secrets stay out of the YAML file.
    #[serde(default)]
    pub connection_string: Option<String>,
    #[serde(default = "StorageConfig::default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "StorageConfig::default_max_connections")]
    pub max_connections: u32,
}

impl StorageConfig {
    fn default_kind() -> String {
        "sqlite".into()
    }
    fn default_sqlite_path() -> String {
        "./data/cognition.db".into()
    }
    fn default_min_connections() -> u32 {
        1
    }
    fn default_max_connections() -> u32 {
        10
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: Self::default_kind(),
            path: Self::default_sqlite_path(),
            connection_string: None,
            min_connections: Self::default_min_connections(),
            max_connections: Self::default_max_connections(),
        }
    }
}

/// Token-bucket defaults per §4.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "RateLimitConfig::default_rpm")]
    pub requests_per_minute: u32,
    #[serde(default = "RateLimitConfig::default_burst")]
    pub burst_size: u32,
    #[serde(default = "RateLimitConfig::default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "RateLimitConfig::default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl RateLimitConfig {
    fn default_rpm() -> u32 {
        60
    }
    fn default_burst() -> u32 {
        10
    }
    fn default_idle_timeout_secs() -> u64 {
        600
    }
    fn default_sweep_interval_secs() -> u64 {
        300
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: Self::default_rpm(),
            burst_size: Self::default_burst(),
            idle_timeout_secs: Self::default_idle_timeout_secs(),
            sweep_interval_secs: Self::default_sweep_interval_secs(),
        }
    }
}

/// §4.3. `scope_keys` is empty and `scoping_enabled` is false by default —
/// an operator must opt into multi-tenant isolation explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeConfig {
    #[serde(default)]
    pub scope_keys: Vec<String>,
    #[serde(default)]
    pub scoping_enabled: bool,
}

/// Concurrency bounds for C7 (§4.7, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    #[serde(default = "TurnConfig::default_max_sessions")]
    pub max_sessions: usize,
    #[serde(default)]
    pub strict_serial: bool,
    #[serde(default = "TurnConfig::default_event_buffer_capacity")]
    pub event_buffer_capacity: usize,
    #[serde(default = "TurnConfig::default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "TurnConfig::default_retry_ms")]
    pub retry_ms: u64,
}

impl TurnConfig {
    fn default_max_sessions() -> usize {
        100
    }
    fn default_event_buffer_capacity() -> usize {
        100
    }
    fn default_heartbeat_interval_secs() -> u64 {
        15
    }
    fn default_retry_ms() -> u64 {
        3000
    }
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            max_sessions: Self::default_max_sessions(),
            strict_serial: false,
            event_buffer_capacity: Self::default_event_buffer_capacity(),
            heartbeat_interval_secs: Self::default_heartbeat_interval_secs(),
            retry_ms: Self::default_retry_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_server_binds_all_interfaces_on_8080() {
        let c = Config::default();
        assert_eq!(c.server.bind, "0.0.0.0:8080");
    }

    #[test]
    fn config_default_storage_is_sqlite() {
        let c = Config::default();
        assert_eq!(c.storage.kind, "sqlite");
    }

    #[test]
    fn config_default_scoping_is_disabled() {
        let c = Config::default();
        assert!(!c.scope.scoping_enabled);
        assert!(c.scope.scope_keys.is_empty());
    }

    #[test]
    fn config_default_rate_limit_matches_spec_defaults() {
        let c = Config::default();
        assert_eq!(c.rate_limit.idle_timeout_secs, 600);
        assert_eq!(c.rate_limit.sweep_interval_secs, 300);
    }

    #[test]
    fn config_partial_yaml_fills_in_defaults() {
        let yaml = "storage:\n  kind: memory\n";
        let c: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(c.storage.kind, "memory");
        assert_eq!(c.server.bind, "0.0.0.0:8080");
        assert_eq!(c.turns.max_sessions, 100);
    }

    #[test]
    fn config_scope_keys_deserialise_from_yaml() {
        let yaml = "scope:\n  scope_keys: [user, project]\n  scoping_enabled: true\n";
        let c: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(c.scope.scope_keys, vec!["user", "project"]);
        assert!(c.scope.scoping_enabled);
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let c = Config::default();
        let yaml = serde_yaml::to_string(&c).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.server.bind, c.server.bind);
        assert_eq!(back.rate_limit.requests_per_minute, c.rate_limit.requests_per_minute);
    }
}
