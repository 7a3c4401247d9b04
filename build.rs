//! Renders clipassist's man pages at build time.
//!
//! One page for the top-level command (`clipassist.1`) and one per
//! subcommand (`clipassist-check.1`, ...), written to `$OUT_DIR/man` where
//! `cargo xtask install` picks them up. Debug builds skip this unless
//! `CLIPASSIST_GEN_MANPAGES` is set.

use clap::CommandFactory;
use clap_mangen::Man;
use std::env;
use std::fs::{self, File};
use std::io::Error;
use std::path::{Path, PathBuf};

// Cli and Commands, shared with the binary
include!("src/cli.rs");

fn render(cmd: clap::Command, path: &Path) -> Result<(), Error> {
    let mut file = File::create(path)?;
    Man::new(cmd).render(&mut file)
}

fn main() -> Result<(), Error> {
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-env-changed=CLIPASSIST_GEN_MANPAGES");

    let release = env::var("PROFILE").is_ok_and(|profile| profile == "release");
    if !release && env::var_os("CLIPASSIST_GEN_MANPAGES").is_none() {
        return Ok(());
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap_or_else(|_| "target".to_string()));
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir)?;

    let cmd = Cli::command();
    render(cmd.clone(), &man_dir.join("clipassist.1"))?;

    // run, check, config, status
    for sub in cmd.get_subcommands().filter(|sub| sub.get_name() != "help") {
        let page = format!("clipassist-{}.1", sub.get_name());
        render(sub.clone(), &man_dir.join(page))?;
    }

    println!("cargo:warning=clipassist man pages: {}", man_dir.display());
    Ok(())
}
