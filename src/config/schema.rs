/// Configuration schema and defaults for riskwatch.
///
/// Defines the TOML-serializable configuration structure with all sections:
/// `[client]`, `[auth]`, `[collector]`, `[server]` and `[logging]`.
///
/// Every field has a built-in default. Users only need to set the values
/// they want to override.
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level riskwatch configuration.
///
/// Maps directly to the `~/.riskwatch/config.toml` and `.riskwatch.toml`
/// file schemas. Missing sections fall back to built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskwatchConfig {
    pub client: ClientConfig,
    pub auth: AuthConfig,
    pub collector: CollectorConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// [client]
// ---------------------------------------------------------------------------

/// Dashboard client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket endpoint of the analysis backend.
    pub endpoint: String,
    /// User id sent in the handshake. Also the prompt default when
    /// `prompt_user_id` is set.
    pub user_id: String,
    /// Ask for the user id on stdin before connecting.
    pub prompt_user_id: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8765".to_string(),
            user_id: "test-user".to_string(),
            prompt_user_id: false,
        }
    }
}

// ---------------------------------------------------------------------------
// [auth]
// ---------------------------------------------------------------------------

/// Handshake token settings. When `token` is unset no token frame is sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

// ---------------------------------------------------------------------------
// [collector]
// ---------------------------------------------------------------------------

/// External data collector launched right after the handshake.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Program to spawn. No collector is started when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Extra arguments passed to `command`.
    pub args: Vec<String>,
}

// ---------------------------------------------------------------------------
// [server]
// ---------------------------------------------------------------------------

/// Static asset server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub bind: String,
    /// Directory served at `/`.
    pub dashboard_dir: String,
    /// Directory served under `/collector`.
    pub collector_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            dashboard_dir: "dashboard".to_string(),
            collector_dir: "collector".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Logging and session journal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is not set.
    pub level: String,
    /// Whether lifecycle events are appended to the session journal.
    pub journal: bool,
    /// Path to the journal file. `~` is expanded to the home directory.
    pub journal_path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            journal: true,
            journal_path: "~/.riskwatch/sessions.jsonl".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default TOML content
// ---------------------------------------------------------------------------

impl RiskwatchConfig {
    /// Generate the annotated default TOML config file content.
    ///
    /// Written by `riskwatch config init`. Parses back into the same values
    /// as [`RiskwatchConfig::default()`].
    pub fn default_toml() -> String {
        r#"# riskwatch Configuration
#
# Configuration hierarchy (highest precedence wins):
#   1. Environment variables (RISKWATCH_*)
#   2. Project config (.riskwatch.toml in current directory)
#   3. User global config (~/.riskwatch/config.toml)
#   4. Built-in defaults

[client]
endpoint = "ws://localhost:8765"
user_id = "test-user"
prompt_user_id = false   # Ask for the user id before connecting

[auth]
# token = "your-secret-auth-token"   # Sent as the first handshake frame when set

[collector]
# command = "collector"              # Spawned once after the handshake
args = []

[server]
bind = "127.0.0.1:3000"
dashboard_dir = "dashboard"
collector_dir = "collector"

[logging]
level = "info"           # Used when RUST_LOG is unset
journal = true
journal_path = "~/.riskwatch/sessions.jsonl"
"#
        .to_string()
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> std::path::PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    std::path::PathBuf::from(path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
