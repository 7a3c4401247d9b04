//! Clipboard access through command-line tools
//!
//! Fallback for sessions where the native clipboard is unavailable (for
//! example a Wayland compositor without data-control support):
//! - wl-clipboard: `wl-paste --no-newline` / `wl-copy`
//! - xclip: `xclip -selection clipboard [-o]`
//! - macOS: `pbpaste` / `pbcopy`

use super::Clipboard;
use crate::error::ClipboardError;
use std::io::Write;
use std::process::{Command, Stdio};

/// A pair of paste/copy commands
#[derive(Debug, Clone)]
pub struct CommandClipboard {
    name: &'static str,
    read: (&'static str, &'static [&'static str]),
    write: (&'static str, &'static [&'static str]),
}

impl CommandClipboard {
    /// wl-copy / wl-paste (Wayland)
    pub fn wayland() -> Result<Self, ClipboardError> {
        Self::new(
            "wl-clipboard",
            ("wl-paste", &["--no-newline"]),
            ("wl-copy", &[]),
        )
    }

    /// xclip on the CLIPBOARD selection (X11)
    pub fn xclip() -> Result<Self, ClipboardError> {
        Self::new(
            "xclip",
            ("xclip", &["-selection", "clipboard", "-o"]),
            ("xclip", &["-selection", "clipboard"]),
        )
    }

    /// pbpaste / pbcopy (macOS)
    pub fn pbcopy() -> Result<Self, ClipboardError> {
        Self::new("pbcopy", ("pbpaste", &[]), ("pbcopy", &[]))
    }

    fn new(
        name: &'static str,
        read: (&'static str, &'static [&'static str]),
        write: (&'static str, &'static [&'static str]),
    ) -> Result<Self, ClipboardError> {
        for program in [read.0, write.0] {
            if which::which(program).is_err() {
                return Err(ClipboardError::CommandNotFound(program));
            }
        }
        Ok(Self { name, read, write })
    }
}

fn spawn_error(program: &'static str, e: std::io::Error) -> std::io::Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        std::io::Error::new(e.kind(), format!("{} not found", program))
    } else {
        e
    }
}

impl Clipboard for CommandClipboard {
    fn read_text(&self) -> Result<String, ClipboardError> {
        let (program, args) = self.read;
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| ClipboardError::Read(spawn_error(program, e).to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // wl-paste and xclip fail on an empty clipboard; that is not an error here
            if stderr.contains("No selection") || stderr.contains("Nothing is copied") {
                return Ok(String::new());
            }
            return Err(ClipboardError::Read(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let (program, args) = self.write;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ClipboardError::Write(spawn_error(program, e).to_string()))?;

        // Write text to stdin, then close it to signal EOF
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|e| ClipboardError::Write(e.to_string()))?;
        }

        let status = child
            .wait()
            .map_err(|e| ClipboardError::Write(e.to_string()))?;
        if !status.success() {
            return Err(ClipboardError::Write(format!(
                "{} exited with {}",
                program, status
            )));
        }

        tracing::debug!("Text copied to clipboard via {} ({} chars)", program, text.len());
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_reported() {
        let result = CommandClipboard::new(
            "missing",
            ("clipassist-no-such-paste", &[]),
            ("clipassist-no-such-copy", &[]),
        );
        match result {
            Err(ClipboardError::CommandNotFound(program)) => {
                assert_eq!(program, "clipassist-no-such-paste")
            }
            other => panic!("expected CommandNotFound, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_round_trip_through_commands() {
        // echo stands in for the paste tool, cat for the copy tool
        let clipboard = CommandClipboard {
            name: "test",
            read: ("echo", &["-n", "copied text"]),
            write: ("cat", &[]),
        };
        assert_eq!(clipboard.read_text().unwrap(), "copied text");
        clipboard.write_text("answer").unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_read_command() {
        let clipboard = CommandClipboard {
            name: "test",
            read: ("false", &[]),
            write: ("true", &[]),
        };
        assert!(matches!(
            clipboard.read_text(),
            Err(ClipboardError::Read(_))
        ));
    }
}
