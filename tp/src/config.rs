//! Tripdaemon configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main tripdaemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Orchestrator limits and deadlines
    pub orchestrator: OrchestratorConfig,

    /// External data-source configuration
    pub providers: ProvidersConfig,

    /// IPC socket configuration
    pub ipc: IpcConfig,

    /// Log level (trace|debug|info|warn|error); CLI flag wins over this
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// Explicit path, then project-local `.tripdaemon.yml`, then
    /// `~/.config/tripdaemon/tripdaemon.yml`, then built-in defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".tripdaemon.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tripdaemon").join("tripdaemon.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Orchestrator limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum concurrently running sessions
    #[serde(rename = "max-concurrent-sessions")]
    pub max_concurrent_sessions: usize,

    /// Wall-clock deadline for one session, in seconds
    #[serde(rename = "session-deadline-secs")]
    pub session_deadline_secs: u64,

    /// How often finished worker tasks are reaped, in seconds
    #[serde(rename = "reap-interval-secs")]
    pub reap_interval_secs: u64,

    /// Grace period for in-flight sessions on shutdown, in seconds
    #[serde(rename = "shutdown-timeout-secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 32,
            session_deadline_secs: 120,
            reap_interval_secs: 5,
            shutdown_timeout_secs: 30,
        }
    }
}

/// External data-source configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub flight: FlightApiConfig,
    pub places: PlacesApiConfig,
}

/// Flight-offers API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightApiConfig {
    /// Environment variable holding the API client id
    #[serde(rename = "client-id-env")]
    pub client_id_env: String,

    /// Environment variable holding the API client secret
    #[serde(rename = "client-secret-env")]
    pub client_secret_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Request timeout in milliseconds; a call that does not answer in
    /// time degrades to synthetic data rather than hanging the worker
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for FlightApiConfig {
    fn default() -> Self {
        Self {
            client_id_env: "AMADEUS_CLIENT_ID".to_string(),
            client_secret_env: "AMADEUS_CLIENT_SECRET".to_string(),
            base_url: "https://test.api.amadeus.com".to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// Places API configuration (hotel and recommendation search)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacesApiConfig {
    /// Environment variable holding the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for PlacesApiConfig {
    fn default() -> Self {
        Self {
            api_key_env: "GOOGLE_MAPS_API_KEY".to_string(),
            base_url: "https://maps.googleapis.com/maps/api/place".to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// IPC socket configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    /// Socket path override; defaults to the runtime dir when unset
    #[serde(rename = "socket-path")]
    pub socket_path: Option<PathBuf>,
}
