use anyhow::Result;
use clap::{Parser, Subcommand};

use riskwatch::{cli, config, logging};

#[derive(Debug, Parser)]
#[command(name = "riskwatch")]
#[command(about = "Real-time behavioral risk dashboard")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Connect to the analysis backend and render risk results as they arrive
    Watch {
        /// WebSocket endpoint (overrides `client.endpoint`)
        #[arg(long)]
        endpoint: Option<String>,
        /// User id to announce (overrides `client.user_id`)
        #[arg(long)]
        user: Option<String>,
        /// Ask for the user id before connecting
        #[arg(long)]
        prompt: bool,
        /// Send this token as the first handshake frame
        #[arg(long)]
        token: Option<String>,
        /// Program to start once the handshake is sent
        #[arg(long)]
        collector: Option<String>,
    },
    /// Serve the dashboard assets at `/` and collector assets under `/collector`
    Serve {
        /// Address to bind (overrides `server.bind`)
        #[arg(long)]
        bind: Option<String>,
        /// Dashboard asset directory
        #[arg(long)]
        dashboard_dir: Option<String>,
        /// Collector asset directory
        #[arg(long)]
        collector_dir: Option<String>,
    },
    /// Show recent session journal entries
    History {
        /// Number of entries to show
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Check config, asset directories, asset server and backend reachability
    Health,
    /// Inspect or edit configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default config to ~/.riskwatch/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set a dotted key, e.g. `client.endpoint ws://host:8765`
    Set { key: String, value: String },
    /// Restore the default config file
    Reset,
}

fn main() -> Result<()> {
    let app = App::parse();
    let mut cfg = config::load();
    logging::init(&cfg.logging.level);

    match app.command {
        Commands::Watch {
            endpoint,
            user,
            prompt,
            token,
            collector,
        } => {
            if let Some(endpoint) = endpoint {
                cfg.client.endpoint = endpoint;
            }
            if let Some(user) = user {
                cfg.client.user_id = user;
            }
            if prompt {
                cfg.client.prompt_user_id = true;
            }
            if token.is_some() {
                cfg.auth.token = token;
            }
            if collector.is_some() {
                cfg.collector.command = collector;
            }
            cli::run_watch(&cfg)
        }
        Commands::Serve {
            bind,
            dashboard_dir,
            collector_dir,
        } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            if let Some(dir) = dashboard_dir {
                cfg.server.dashboard_dir = dir;
            }
            if let Some(dir) = collector_dir {
                cfg.server.collector_dir = dir;
            }
            cli::run_serve(&cfg)
        }
        Commands::History { limit, format } => {
            let fmt = cli::OutputFormat::from_str_opt(Some(&format));
            cli::run_history(&cfg, limit, fmt)
        }
        Commands::Health => cli::run_health(),
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
    }
}
