/// Configuration system for riskwatch.
///
/// Provides a layered configuration hierarchy:
///
/// 1. **Built-in defaults** — hardcoded in [`schema::RiskwatchConfig::default()`]
/// 2. **User global config** — `~/.riskwatch/config.toml`
/// 3. **Project local config** — `.riskwatch.toml` in the current working directory
/// 4. **Environment variables** — `RISKWATCH_*` overrides (highest precedence)
///
/// Later layers replace earlier ones. Missing sections in a TOML file fall
/// back to defaults.
///
/// # Usage
///
/// ```rust,ignore
/// use riskwatch::config;
///
/// let cfg = config::load();
/// println!("connecting to {}", cfg.client.endpoint);
/// ```
pub mod schema;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub use schema::RiskwatchConfig;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved riskwatch configuration.
///
/// Merges all layers in order: defaults → global TOML → project TOML → env
/// vars.
pub fn load() -> RiskwatchConfig {
    let mut config = RiskwatchConfig::default();

    if let Some(global) = load_toml_file(global_config_path()) {
        config = global;
    }

    if let Some(project) = load_toml_file(project_config_path()) {
        config = project;
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    config
}

/// Load a TOML config file from the given path (if it exists).
///
/// Malformed files are skipped with a warning so a bad project file never
/// prevents the dashboard from starting.
fn load_toml_file(path: Option<PathBuf>) -> Option<RiskwatchConfig> {
    let path = path?;
    let content = fs::read_to_string(&path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config file");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// Path to the user global config: `~/.riskwatch/config.toml`.
fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".riskwatch").join("config.toml"))
}

/// Path to the project local config: `.riskwatch.toml` in the current directory.
fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".riskwatch.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// `lookup` abstracts `std::env::var` so tests can supply a fixed map.
///
/// Supported variables:
/// - `RISKWATCH_ENDPOINT` — WebSocket endpoint
/// - `RISKWATCH_USER_ID` — fixed user id
/// - `RISKWATCH_PROMPT_USER_ID` — prompt for the user id (`1`/`true`/`yes`/`on`)
/// - `RISKWATCH_AUTH_TOKEN` — handshake token
/// - `RISKWATCH_COLLECTOR_COMMAND` — collector program
/// - `RISKWATCH_BIND` — asset server bind address
/// - `RISKWATCH_DASHBOARD_DIR` / `RISKWATCH_COLLECTOR_DIR` — asset roots
/// - `RISKWATCH_LOG_LEVEL` — default tracing filter
/// - `RISKWATCH_JOURNAL` — session journal on/off
pub fn apply_env_overrides<F>(config: &mut RiskwatchConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

    // Client
    if let Some(val) = non_empty("RISKWATCH_ENDPOINT") {
        config.client.endpoint = val;
    }
    if let Some(val) = non_empty("RISKWATCH_USER_ID") {
        config.client.user_id = val;
    }
    if let Some(val) = lookup("RISKWATCH_PROMPT_USER_ID") {
        config.client.prompt_user_id = is_truthy(&val);
    }

    // Handshake extras
    if let Some(val) = non_empty("RISKWATCH_AUTH_TOKEN") {
        config.auth.token = Some(val);
    }
    if let Some(val) = non_empty("RISKWATCH_COLLECTOR_COMMAND") {
        config.collector.command = Some(val);
    }

    // Server
    if let Some(val) = non_empty("RISKWATCH_BIND") {
        config.server.bind = val;
    }
    if let Some(val) = non_empty("RISKWATCH_DASHBOARD_DIR") {
        config.server.dashboard_dir = val;
    }
    if let Some(val) = non_empty("RISKWATCH_COLLECTOR_DIR") {
        config.server.collector_dir = val;
    }

    // Logging
    if let Some(val) = non_empty("RISKWATCH_LOG_LEVEL") {
        config.logging.level = val;
    }
    if let Some(val) = lookup("RISKWATCH_JOURNAL") {
        config.logging.journal = is_truthy(&val);
    }
}

/// Check if a string value represents a truthy boolean.
fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.riskwatch/config.toml`.
///
/// Returns an error if the file already exists (use `force = true` to
/// overwrite).
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.riskwatch/ directory")?;
    }

    fs::write(&path, RiskwatchConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a single config key to a value in the global config file.
///
/// Supports dotted keys like `client.endpoint`. Keys absent from the file
/// are looked up in the serialized defaults so their type is known.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;

    let current = if path.exists() {
        fs::read_to_string(&path).context("failed to read config file")?
    } else {
        toml::to_string_pretty(&RiskwatchConfig::default())
            .context("failed to serialize default config")?
    };

    let mut root: toml::Value =
        toml::from_str(&current).context("failed to parse config as TOML value")?;
    set_toml_value(&mut root, key, value)?;

    // Reject values that no longer fit the schema before touching the file.
    let rendered = toml::to_string_pretty(&root).context("failed to serialize config")?;
    toml::from_str::<RiskwatchConfig>(&rendered)
        .with_context(|| format!("invalid value for '{key}': {value}"))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(&path, rendered).context("failed to write config file")?;

    Ok(())
}

/// Set a value in a TOML value tree using a dotted key path.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let Some((section, leaf)) = key.rsplit_once('.') else {
        anyhow::bail!("config key must be `section.field`, got '{key}'");
    };

    let mut current = root;
    for part in section.split('.') {
        let table = current
            .as_table_mut()
            .with_context(|| format!("expected table while resolving '{key}'"))?;
        if !table.contains_key(part) {
            if !RiskwatchConfig::has_section(part) {
                anyhow::bail!("config key not found: section '{part}' in '{key}'");
            }
            table.insert(part.to_string(), toml::Value::Table(toml::map::Map::new()));
        }
        current = table
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let table = current
        .as_table_mut()
        .with_context(|| format!("expected table at '{section}'"))?;

    let new_value = match default_value_for(section, leaf).or_else(|| table.get(leaf).cloned()) {
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(toml::Value::Array(_)) => toml::Value::Array(
            raw_value
                .split(',')
                .map(|s| toml::Value::String(s.trim().to_string()))
                .collect(),
        ),
        _ => toml::Value::String(raw_value.to_string()),
    };

    table.insert(leaf.to_string(), new_value);
    Ok(())
}

/// Look up the default value of `section.leaf`, if the schema has one.
fn default_value_for(section: &str, leaf: &str) -> Option<toml::Value> {
    let defaults = toml::Value::try_from(RiskwatchConfig::default()).ok()?;
    defaults.get(section)?.get(leaf).cloned()
}

impl RiskwatchConfig {
    fn has_section(name: &str) -> bool {
        matches!(name, "client" | "auth" | "collector" | "server" | "logging")
    }
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load();
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
