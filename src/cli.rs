// Command-line interface definitions for clipassist
//
// This module is separate so it can be used by both the binary (main.rs)
// and build.rs for generating man pages.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "clipassist")]
#[command(author, version, about = "Hotkey-driven clipboard assistant backed by Ollama")]
#[command(long_about = "
clipassist sends copied text to a local Ollama model and puts the answer
back on the clipboard.

SETUP:
  1. Install Ollama and start it: ollama serve
  2. Pull a model: ollama pull deepseek-r1:8b
  3. Run: clipassist check (to verify the server and model)
  4. Run: clipassist (to start the assistant)

USAGE:
  Copy text with Ctrl+C (Cmd+C on macOS). After a moment the clipboard
  holds the model's answer; paste it anywhere. The tray icon turns blue
  while the model is working and red if the request failed.
  Press Ctrl+Esc or choose Exit from the tray menu to quit.
")]
pub struct Cli {
    /// Model to use (default: deepseek-r1:8b)
    #[arg(value_name = "MODEL")]
    pub model: Option<String>,

    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Ollama base URL (default: http://localhost:11434)
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Run without a tray icon
    #[arg(long)]
    pub no_tray: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the assistant (default if no command specified)
    Run,

    /// Probe the Ollama server once and report model availability
    Check,

    /// Print the effective configuration
    Config,

    /// Print the current status (requires state_file in config)
    Status,
}
