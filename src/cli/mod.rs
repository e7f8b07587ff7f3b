//! CLI command implementations for riskwatch.
//!
//! Provides subcommand handlers for:
//! - `riskwatch watch` — connect to the backend and render results
//! - `riskwatch serve` — serve the dashboard and collector assets
//! - `riskwatch history` — recent session journal entries
//! - `riskwatch health` — check config, asset dirs, server and backend reachability
//! - `riskwatch config show|init|set|reset` — configuration management

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::client::identity::SessionIdentity;
use crate::client::{self, DashboardOptions, DashboardSession};
use crate::config::{self, RiskwatchConfig};
use crate::config::schema::expand_home;
use crate::display::TerminalView;
use crate::journal::{EventKind, Journal, JournalEntry};
use crate::web;

/// Timeout for health probes.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Output format for `riskwatch history`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            Some("csv") => Self::Csv,
            _ => Self::Table,
        }
    }
}

// ---------------------------------------------------------------------------
// riskwatch watch
// ---------------------------------------------------------------------------

/// Resolve the identity, connect, and render results until the backend
/// closes the connection.
pub fn run_watch(config: &RiskwatchConfig) -> Result<()> {
    let options = DashboardOptions::from_config(config);

    let user_id = {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        options.identity.resolve(&mut input, &mut output)?
    };
    let identity = SessionIdentity::new(user_id, options.token.clone());
    let journal = Journal::from_config(&config.logging);

    println!("{}", "riskwatch dashboard".bold().cyan());
    println!("{}", "=".repeat(40));
    println!(
        "  {} {}  {} {}",
        "User:".bold(),
        identity.user_id,
        "Session:".bold(),
        identity.session_id.dimmed()
    );
    println!();

    tracing::info!(endpoint = %options.endpoint, "connecting");
    let transport = match client::connect(&options.endpoint) {
        Ok(transport) => transport,
        Err(e) => {
            journal.record(
                &JournalEntry::new(EventKind::ConnectFailed, &identity).with_detail(e.to_string()),
            );
            return Err(e).context("dashboard could not connect");
        }
    };

    let mut session = DashboardSession::new(transport, identity, TerminalView::new(io::stdout()))
        .with_journal(journal);
    if let Some(collector) = options.build_collector() {
        session = session.with_collector(collector);
    }

    let close = session.run()?;
    let stats = session.stats();

    println!();
    let outcome = if close.was_clean {
        "closed cleanly".green()
    } else {
        "connection died".red()
    };
    println!(
        "{} (code {}{})",
        outcome,
        close.code,
        if close.reason.is_empty() {
            String::new()
        } else {
            format!(", {}", close.reason)
        }
    );
    println!(
        "  {} rendered, {} ignored, {} dropped",
        stats.rendered, stats.ignored, stats.dropped
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// riskwatch serve
// ---------------------------------------------------------------------------

/// Serve the asset directories. Blocks until the process is stopped.
pub fn run_serve(config: &RiskwatchConfig) -> Result<()> {
    web::serve(&config.server)
}

// ---------------------------------------------------------------------------
// riskwatch history
// ---------------------------------------------------------------------------

/// Show the most recent journal entries.
pub fn run_history(config: &RiskwatchConfig, limit: usize, format: OutputFormat) -> Result<()> {
    let journal = Journal::from_config(&config.logging);
    let entries = journal.read_recent(limit);

    if entries.is_empty() {
        println!(
            "{}",
            "No session history yet. Run `riskwatch watch` to record some.".yellow()
        );
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Csv => {
            println!("timestamp,event,user_id,session_id,close_code,detail");
            for e in &entries {
                println!(
                    "{},{},{},{},{},{}",
                    e.timestamp,
                    e.event,
                    e.user_id,
                    e.session_id,
                    e.close_code.map(|c| c.to_string()).unwrap_or_default(),
                    e.detail.as_deref().unwrap_or_default().replace(',', ";"),
                );
            }
        }
        OutputFormat::Table => {
            println!("{}", "riskwatch Session History".bold().cyan());
            println!("{}", "=".repeat(72));
            println!(
                "  {:<20} {:<16} {:<22} {}",
                "Time", "Event", "Session", "Detail"
            );
            println!("  {}", "-".repeat(70));
            for (i, e) in entries.iter().enumerate() {
                let line = format!(
                    "  {:<20} {:<16} {:<22} {}",
                    short_time(&e.timestamp),
                    e.event.to_string(),
                    truncate(&e.session_id, 22),
                    entry_detail(e),
                );
                if i % 2 == 0 {
                    println!("{line}");
                } else {
                    println!("{}", line.dimmed());
                }
            }
        }
    }

    Ok(())
}

/// One-line summary of what an entry carries.
fn entry_detail(entry: &JournalEntry) -> String {
    let mut parts = Vec::new();
    if let Some(code) = entry.close_code {
        parts.push(format!("code {code}"));
    }
    if let Some(detail) = &entry.detail {
        parts.push(truncate(detail, 40));
    }
    parts.join(", ")
}

/// `2024-05-01T12:30:45.123+00:00` → `2024-05-01 12:30:45`.
fn short_time(timestamp: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(timestamp)
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|_| timestamp.to_string())
}

// ---------------------------------------------------------------------------
// riskwatch health
// ---------------------------------------------------------------------------

/// Check config files, asset directories, the asset server and the backend.
pub fn run_health() -> Result<()> {
    println!("{}", "riskwatch Health Check".bold().cyan());
    println!("{}", "=".repeat(40));

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let cfg = config::load();

    print_health_item(
        "Global config",
        global_exists,
        if global_exists {
            "~/.riskwatch/config.toml found"
        } else {
            "not found (run `riskwatch config init` to create)"
        },
    );
    print_health_item(
        "Project config",
        project_exists,
        if project_exists {
            ".riskwatch.toml found"
        } else {
            "none (optional)"
        },
    );

    // Asset directories
    for (name, dir) in [
        ("Dashboard assets", &cfg.server.dashboard_dir),
        ("Collector assets", &cfg.server.collector_dir),
    ] {
        let exists = expand_home(dir).is_dir();
        print_health_item(
            name,
            exists,
            &if exists {
                dir.clone()
            } else {
                format!("{dir} (missing)")
            },
        );
    }

    // Asset server
    let server_url = format!("http://{}/", cfg.server.bind);
    let server_ok = http_reachable(&server_url);
    print_health_item(
        "Asset server",
        server_ok,
        &if server_ok {
            format!("answering at {server_url}")
        } else {
            "not running (start with `riskwatch serve`)".to_string()
        },
    );

    // Backend
    let backend_ok = endpoint_authority(&cfg.client.endpoint)
        .map(|authority| tcp_reachable(&authority))
        .unwrap_or(false);
    print_health_item(
        "Analysis backend",
        backend_ok,
        &if backend_ok {
            format!("reachable at {}", cfg.client.endpoint)
        } else {
            format!("{} not reachable", cfg.client.endpoint)
        },
    );

    // Auth / collector
    print_health_item(
        "Auth token",
        true,
        if cfg.auth.token.is_some() {
            "configured"
        } else {
            "none (identification frame only)"
        },
    );
    print_health_item(
        "Collector",
        true,
        cfg.collector.command.as_deref().unwrap_or("none"),
    );

    // Journal
    let journal = Journal::from_config(&cfg.logging);
    let detail = match journal.path() {
        Some(path) if path.exists() => format!("{} entries", journal.read_all().len()),
        Some(_) => "no journal yet".to_string(),
        None => "disabled".to_string(),
    };
    print_health_item("Session journal", journal.path().is_some(), &detail);

    Ok(())
}

fn print_health_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<25} {}", status, name, detail.dimmed());
}

/// Any HTTP answer, including an error status, counts as reachable.
fn http_reachable(url: &str) -> bool {
    let url = url.replace("://localhost", "://127.0.0.1");
    match ureq::get(&url).timeout(PROBE_TIMEOUT).call() {
        Ok(_) | Err(ureq::Error::Status(..)) => true,
        Err(ureq::Error::Transport(_)) => false,
    }
}

fn tcp_reachable(authority: &str) -> bool {
    let Ok(mut addrs) = authority.to_socket_addrs() else {
        return false;
    };
    addrs.any(|addr| TcpStream::connect_timeout(&addr, PROBE_TIMEOUT).is_ok())
}

/// `ws://host:port/path` → `host:port`, with the scheme's default port
/// when none is given.
pub fn endpoint_authority(endpoint: &str) -> Option<String> {
    let (rest, default_port) = if let Some(rest) = endpoint.strip_prefix("ws://") {
        (rest, 80)
    } else if let Some(rest) = endpoint.strip_prefix("wss://") {
        (rest, 443)
    } else {
        return None;
    };

    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    if authority.is_empty() {
        return None;
    }

    // A bracketed IPv6 literal has colons of its own.
    let has_port = match authority.rfind(']') {
        Some(end) => authority[end..].contains(':'),
        None => authority.contains(':'),
    };

    if has_port {
        Some(authority.to_string())
    } else {
        Some(format!("{authority}:{default_port}"))
    }
}

// ---------------------------------------------------------------------------
// riskwatch config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective riskwatch Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    if global_exists {
        println!("  {} {}", "✓".green(), "~/.riskwatch/config.toml".dimmed());
    } else {
        println!(
            "  {} {}",
            "·".dimmed(),
            "~/.riskwatch/config.toml (not found)".dimmed()
        );
    }
    if project_exists {
        println!("  {} {}", "✓".green(), ".riskwatch.toml".dimmed());
    } else {
        println!(
            "  {} {}",
            "·".dimmed(),
            ".riskwatch.toml (not found)".dimmed()
        );
    }
    println!(
        "  {} {}",
        "·".dimmed(),
        "RISKWATCH_* environment variables".dimmed()
    );

    Ok(())
}

/// Initialize a default config file at `~/.riskwatch/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Truncate a string to `max_len` characters, appending "…" if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
