//! Development tasks for clipassist
//!
//! Usage:
//!   cargo xtask install     Install release binary and man pages under /usr/local (requires sudo)
//!   cargo xtask uninstall   Remove installed binary and man pages (requires sudo)
//!   cargo xtask dist        Build release binary and man pages into target/dist

use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

const BIN_DEST: &str = "/usr/local/bin/clipassist";
const MAN_DEST: &str = "/usr/local/share/man/man1";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    let Some(task) = args.first() else {
        print_help();
        return ExitCode::SUCCESS;
    };

    let result = match task.as_str() {
        "install" => install(),
        "uninstall" => uninstall(),
        "dist" => dist().map(|_| ()),
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_help();
            Err(anyhow::anyhow!("Unknown command"))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    eprintln!(
        r#"
clipassist development tasks

Usage: cargo xtask <COMMAND>

Commands:
  install    Build release binary and install to /usr/local (requires sudo)
  uninstall  Remove clipassist from /usr/local (requires sudo)
  dist       Build release binary and man pages into target/dist
"#
    );
}

/// Get the project root directory
fn project_root() -> anyhow::Result<PathBuf> {
    let dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => env::current_dir()?,
    };

    // xtask is in a subdirectory, go up one level
    Ok(dir.parent().unwrap_or(&dir).to_path_buf())
}

/// Build the release binary with man page generation enabled
fn build_release(root: &Path) -> anyhow::Result<()> {
    println!("==> Building release binary...");
    let status = Command::new("cargo")
        .args(["build", "--release"])
        .env("CLIPASSIST_GEN_MANPAGES", "1")
        .current_dir(root)
        .status()?;

    if !status.success() {
        anyhow::bail!("Build failed");
    }
    Ok(())
}

/// Man pages written by build.rs for the latest release build
fn find_man_pages(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let build_dir = root.join("target/release/build");
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;

    for entry in std::fs::read_dir(&build_dir)?.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let man_dir = entry.path().join("out/man");
        if !name.starts_with("clipassist-") || !man_dir.is_dir() {
            continue;
        }
        let modified = man_dir.metadata()?.modified()?;
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, man_dir));
        }
    }

    let Some((_, man_dir)) = newest else {
        anyhow::bail!("No generated man pages under {:?}", build_dir);
    };

    let mut pages: Vec<PathBuf> = std::fs::read_dir(man_dir)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "1"))
        .collect();
    pages.sort();
    Ok(pages)
}

fn sudo(args: &[&str]) -> anyhow::Result<()> {
    let status = Command::new("sudo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("sudo {} failed", args.join(" "));
    }
    Ok(())
}

/// Build release binary and install to /usr/local
fn install() -> anyhow::Result<()> {
    let root = project_root()?;
    build_release(&root)?;

    let binary = root.join("target/release/clipassist");
    if !binary.exists() {
        anyhow::bail!("Binary not found at {:?}", binary);
    }

    println!("==> Installing to {}...", BIN_DEST);
    sudo(&["install", "-Dm755", &binary.to_string_lossy(), BIN_DEST])?;

    for page in find_man_pages(&root)? {
        let name = page.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let dest = format!("{}/{}", MAN_DEST, name);
        println!("==> Installing {}", dest);
        sudo(&["install", "-Dm644", &page.to_string_lossy(), &dest])?;
    }

    println!("==> Installed successfully!");

    // Show version
    let _ = Command::new(BIN_DEST).arg("--version").status();

    Ok(())
}

/// Remove clipassist from /usr/local
fn uninstall() -> anyhow::Result<()> {
    println!("==> Removing {}...", BIN_DEST);
    sudo(&["rm", "-f", BIN_DEST])?;

    let pattern = format!("{}/clipassist*.1", MAN_DEST);
    println!("==> Removing {}...", pattern);
    sudo(&["sh", "-c", &format!("rm -f {}", pattern)])?;

    println!("==> Uninstalled successfully!");
    Ok(())
}

/// Build optimized release binary and collect it with its man pages
fn dist() -> anyhow::Result<PathBuf> {
    let root = project_root()?;
    build_release(&root)?;

    let dist_dir = root.join("target/dist");
    std::fs::create_dir_all(dist_dir.join("man"))?;

    let binary = root.join("target/release/clipassist");
    std::fs::copy(&binary, dist_dir.join("clipassist"))?;
    for page in find_man_pages(&root)? {
        if let Some(name) = page.file_name() {
            std::fs::copy(&page, dist_dir.join("man").join(name))?;
        }
    }

    println!("==> Built: {:?}", dist_dir);
    let _ = Command::new(dist_dir.join("clipassist"))
        .arg("--version")
        .status();

    Ok(dist_dir)
}
