//! clipassist: hotkey-driven clipboard assistant backed by Ollama
//!
//! This library provides the core functionality for:
//! - Detecting the copy and exit shortcuts via rdev (global key events)
//! - Reading and writing the clipboard via arboard or command-line tools
//! - Asking a local Ollama model about the copied text (ureq, blocking)
//! - Reflecting progress in a tray icon (tray-icon + tao)
//!
//! # Architecture
//!
//! ```text
//!          ┌──────────────┐   Ctrl+C / Cmd+C    ┌──────────────┐
//!          │    Hotkey    │ ──────────────────▶ │  Scheduler   │ (100ms debounce)
//!          │   (rdev)     │                     └──────────────┘
//!          └──────────────┘                            │
//!                 │ Ctrl+Esc                           ▼
//!                 │                           ┌──────────────────┐
//!                 │                           │    Processor     │ (single flight)
//!                 │                           │ read ─▶ ask ─▶   │
//!                 │                           │ write ─▶ status  │
//!                 │                           └──────────────────┘
//!                 │                             │             │
//!                 ▼                             ▼             ▼
//!          ┌──────────────┐            ┌────────────┐  ┌────────────┐
//!          │    Daemon    │            │ Clipboard  │  │   Ollama   │
//!          │ (lifecycle)  │            │ (arboard)  │  │   (ureq)   │
//!          └──────────────┘            └────────────┘  └────────────┘
//!                 │
//!                 ▼ shutdown request           status (watch channel)
//!          ┌──────────────┐ ◀──────────────────────────────────────
//!          │     Tray     │
//!          │ (tray-icon)  │
//!          └──────────────┘
//! ```

pub mod cli;
pub mod clipboard;
pub mod config;
pub mod daemon;
pub mod error;
pub mod hotkey;
pub mod inference;
pub mod processor;
pub mod scheduler;
pub mod state;
pub mod tray;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use daemon::Daemon;
pub use error::{AssistantError, Result};
