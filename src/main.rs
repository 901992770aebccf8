use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use graphbus::banner::{BannerInfo, print_banner, print_session_summary};
use graphbus::bus::{EventBus, NameGuard, TracingMiddleware};
use graphbus::commands::{CommandRegistry, CommandResult, Session};
use graphbus::config::Config;
use graphbus::consts::default_config_path;
use graphbus::history::HistoryManager;
use graphbus::selection::SelectionManager;

#[derive(Parser)]
#[command(
    name = "graphbus",
    version,
    about = "Interactive shell over the graph event bus."
)]
struct Cli {
    /// JSON config file (defaults to ~/.graphbus/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Events kept in the bus history
    #[arg(long)]
    bus_history: Option<usize>,

    /// Entries kept in the selection trace
    #[arg(long)]
    selection_history: Option<usize>,

    /// Actions kept on the undo stack
    #[arg(long)]
    undo_limit: Option<usize>,

    /// Do not install the event-name guard middleware
    #[arg(long, default_value_t = false)]
    allow_any_name: bool,

    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Run `;`-separated commands and exit (non-interactive)
    #[arg(short, long)]
    run: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.clone().or_else(default_config_path);
    let mut config = match &config_path {
        Some(path) => Config::load(path).context("could not load configuration")?,
        None => Config::default(),
    };
    if let Some(n) = cli.bus_history {
        config.bus.max_history_size = n;
    }
    if let Some(n) = cli.selection_history {
        config.selection.max_history_size = n;
    }
    if let Some(n) = cli.undo_limit {
        config.history.max_history_size = n;
    }

    // Bus first; the managers hold a reference to it.
    let bus = Arc::new(EventBus::from_config(&config.bus));
    bus.use_middleware(TracingMiddleware);
    let mut middleware = vec!["tracing"];
    if !cli.allow_any_name {
        bus.use_middleware(NameGuard);
        middleware.push("name-guard");
    }
    let selection = SelectionManager::from_config(Arc::clone(&bus), &config.selection);
    let history = Arc::new(HistoryManager::from_config(
        Arc::clone(&bus),
        &config.history,
    ));
    let session = Session::new(Arc::clone(&bus), selection, history);
    let registry = CommandRegistry::new();
    info!(?config, "core assembled");

    let config_label = config_path
        .as_ref()
        .filter(|p| p.exists())
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());

    // Scripted mode
    if let Some(script) = cli.run {
        for line in script.split(';').map(str::trim).filter(|l| !l.is_empty()) {
            println!("> {line}");
            if run_line(&registry, line, &session) {
                break;
            }
        }
        print_session_summary(&bus);
        return Ok(());
    }

    print_banner(&BannerInfo {
        config: &config_label,
        bus_history: config.bus.max_history_size,
        selection_trace: config.selection.max_history_size,
        undo_limit: config.history.max_history_size,
        middleware: &middleware,
    });

    // REPL: async stdin so Ctrl+C is caught at the prompt too
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("\ngraphbus> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            result = lines.next_line() => {
                match result {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        // Ctrl+D (EOF)
                        println!();
                        break;
                    }
                    Err(e) => {
                        eprintln!("input error: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if run_line(&registry, line, &session) {
            break;
        }
    }

    print_session_summary(&bus);
    Ok(())
}

/// Dispatch one line. Returns true when the shell should exit.
fn run_line(registry: &CommandRegistry, line: &str, session: &Session) -> bool {
    match registry.dispatch(line, session) {
        CommandResult::Quit => true,
        CommandResult::NotACommand => {
            println!("commands start with '/'; type /help for a list");
            false
        }
        CommandResult::Handled | CommandResult::Failed(_) => false,
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
