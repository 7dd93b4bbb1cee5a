//! Doctor command implementation
//!
//! Checks the config file and the external tools the converters need.

use anyhow::Result;
use colored::Colorize;
use helios_transformers::config::{DEX2JAR_ENV, PYTHON3_ENV};
use helios_transformers::HeliosConfig;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use super::Session;

/// Run the doctor command
///
/// Checks:
/// - Config file location and parse status
/// - Python 3 and enjarify
/// - dex2jar
/// - Registered transformers
///
/// # Returns
/// Exit code: 0 if all checks pass, 1 if any fail
pub fn run(config: Option<&Path>) -> Result<ExitCode> {
    println!("{}", "Helios Doctor".cyan().bold());
    println!("{}", "=============".cyan());
    println!();

    let mut all_ok = true;

    println!("{}", "Versions:".bold());
    println!("  {} helios-cli v{}", "->".green(), env!("CARGO_PKG_VERSION"));
    println!();

    println!("{}", "Config:".bold());
    let path = config
        .map(Path::to_path_buf)
        .or_else(HeliosConfig::default_path);
    match &path {
        Some(p) if p.exists() => println!("  {} {}", "ok".green(), p.display()),
        Some(p) => println!("  {} {} (not present, using defaults)", "->".green(), p.display()),
        None => println!("  {} no config directory on this platform", "!!".yellow()),
    }
    let session = match Session::open(config) {
        Ok(session) => session,
        Err(e) => {
            println!("  {} {:#}", "!!".red(), e);
            println!();
            println!(
                "{} Some checks failed. See above for details.",
                "WARNING".yellow().bold()
            );
            return Ok(ExitCode::from(1));
        }
    };
    let cfg = &session.config;
    println!();

    println!("{}", "Dependencies:".bold());
    report_tool("Python 3", cfg.resolve_python3(), PYTHON3_ENV, "needed by enjarify");
    match &cfg.enjarify_dir {
        Some(dir) if dir.is_dir() => {
            println!("  {} enjarify checkout ({})", "ok".green(), dir.display())
        }
        Some(dir) => {
            println!("  {} enjarify checkout missing: {}", "!!".red(), dir.display());
            all_ok = false;
        }
        None => println!(
            "  {} enjarify checkout not configured (module must be importable)",
            "->".green()
        ),
    }
    report_tool("dex2jar", cfg.resolve_dex2jar(), DEX2JAR_ENV, "needed by dex2jar");
    if let Some(rt) = &cfg.rt_location {
        if rt.exists() {
            println!("  {} runtime library ({})", "ok".green(), rt.display());
        } else {
            println!("  {} runtime library missing: {}", "!!".red(), rt.display());
            all_ok = false;
        }
    }
    println!(
        "  {} process timeout {}s",
        "->".green(),
        cfg.process_timeout_secs
    );
    println!();

    println!("{}", "Transformers:".bold());
    for t in session.registry.all() {
        println!("  {} {} ({})", "ok".green(), t.id(), t.name());
    }
    println!();

    if all_ok {
        println!("{} All checks passed!", "SUCCESS".green().bold());
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "{} Some checks failed. See above for details.",
            "WARNING".yellow().bold()
        );
        Ok(ExitCode::from(1))
    }
}

/// Missing tools are warnings: only the converters that need them skip.
fn report_tool(label: &str, found: Option<PathBuf>, env_var: &str, purpose: &str) {
    match found {
        Some(path) => println!("  {} {} ({})", "ok".green(), label, path.display()),
        None => {
            println!("  {} {} not found", "!!".yellow(), label);
            println!(
                "     {}",
                format!("{}; set it in the config or {}", purpose, env_var).dimmed()
            );
        }
    }
}
