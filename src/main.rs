//! clipassist: copy text, get the model's answer back on the clipboard
//!
//! Run with `clipassist` or `clipassist run` to start the assistant.

use clap::Parser;
use clipassist::cli::{Cli, Commands};
use clipassist::clipboard::{self, Clipboard};
use clipassist::config::{self, Config};
use clipassist::daemon::{self, Daemon, InstanceLock};
use clipassist::hotkey;
use clipassist::inference::ollama::{model_listed, OllamaClient};
use clipassist::inference::Inference;
use clipassist::state::AppStatus;
use clipassist::tray;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration first so the log file location is known
    let loaded = config::load_config(cli.config.as_deref());

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let log_file = loaded.as_ref().ok().and_then(Config::resolve_log_file);
    init_logging(log_level, log_file.as_deref())?;

    let mut config = loaded?;

    // Apply CLI overrides
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(url) = cli.url {
        config.server.url = url;
    }
    config.validate()?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config, cli.no_tray),
        Commands::Check => check(&config),
        Commands::Config => show_config(&config),
        Commands::Status => show_status(&config),
    }
}

/// Stderr plus an append-only log file (ANSI off)
fn init_logging(level: &str, log_file: Option<&Path>) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("clipassist={},warn", level)));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| anyhow::anyhow!("Failed to open log file {:?}: {}", path, e))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file {
        tracing::debug!("Logging to {:?}", path);
    }
    Ok(())
}

/// Start the assistant and block until it exits
fn run(config: Config, no_tray: bool) -> anyhow::Result<()> {
    let _lock = InstanceLock::acquire()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("clipassist-worker")
        .enable_all()
        .build()?;

    let clipboard: Arc<dyn Clipboard> = Arc::from(clipboard::create_clipboard(&config.clipboard)?);
    tracing::info!("Clipboard backend: {}", clipboard.name());
    let inference: Arc<dyn Inference> = Arc::new(OllamaClient::from_config(&config));

    let daemon = Daemon::new(
        Arc::new(config),
        clipboard,
        inference,
        hotkey::create_source(),
        runtime.handle().clone(),
    );
    daemon::spawn_signal_handler(&daemon, runtime.handle());

    if let Err(e) = daemon.start() {
        tracing::error!("Assistant not started: {}", e);
        tracing::info!("Exit from the tray menu or with Ctrl+C");
    }

    if no_tray || !tray::display_available() {
        tray::run_headless(&daemon);
    } else {
        tray::run(&daemon);
    }

    daemon.finish();
    drop(daemon);

    // A request still in flight is abandoned, not awaited
    runtime.shutdown_background();
    Ok(())
}

/// Probe the server once and report model availability
fn check(config: &Config) -> anyhow::Result<()> {
    let client = OllamaClient::from_config(config);
    println!("Server: {}", client.url());
    println!("Model:  {}\n", config.model);

    let models = match client.list_models() {
        Ok(models) => models,
        Err(e) => {
            println!("Ollama is not available: {}", e);
            println!("Start it with: ollama serve");
            anyhow::bail!("{}", e.user_message());
        }
    };

    println!("Ollama is running with {} model(s):", models.len());
    for model in &models {
        println!("  {}", model);
    }

    let names: Vec<&str> = models.iter().map(String::as_str).collect();
    if model_listed(&config.model, &names) {
        println!("\nModel '{}' is available.", config.model);
    } else {
        println!(
            "\nModel '{}' is not pulled yet. Run: ollama pull {}",
            config.model, config.model
        );
    }
    Ok(())
}

/// Print the effective configuration
fn show_config(config: &Config) -> anyhow::Result<()> {
    println!("Current Configuration\n");
    println!("=====================\n");

    if let Some(path) = Config::default_path() {
        println!("Config file: {:?}\n", path);
    }
    print!("{}", toml::to_string_pretty(config)?);

    println!("\n[paths]");
    println!(
        "  state_file = {:?}",
        config.resolve_state_file().map(|p| p.display().to_string())
    );
    println!(
        "  log_file = {:?}",
        config.resolve_log_file().map(|p| p.display().to_string())
    );
    println!("  lock = {:?}", Config::runtime_dir().join("clipassist.lock"));
    Ok(())
}

/// Print the status mirrored in the state file
fn show_status(config: &Config) -> anyhow::Result<()> {
    let Some(path) = config.resolve_state_file() else {
        anyhow::bail!(
            "state_file is not configured. Add state_file = \"auto\" to {:?}",
            Config::default_path().unwrap_or_default()
        );
    };

    let status = std::fs::read_to_string(&path)
        .ok()
        .and_then(|s| AppStatus::parse(&s));
    println!("{}", status.map(|s| s.as_str()).unwrap_or("stopped"));
    Ok(())
}
