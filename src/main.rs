//! mp4ilst - read and rewrite iTunes-style MP4 metadata
//!
//! `probe` prints the tags of a file, `modify` writes a copy with tags set
//! or removed.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use mp4ilst::{Error, OffsetPatch, Tagger, TempPaths, WriteReport};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

use cli::{check_paths, parse_changes, Cli, Commands};

// =============================================================================
// Main
// =============================================================================

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{}: {:#}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let tagger = Tagger::new().with_dispatch(log_dispatch(cli.debug));

    match cli.command {
        Commands::Probe { file, json } => cmd_probe(&tagger, &file, json),
        Commands::Modify {
            file,
            out,
            tmp,
            tmp2,
            keep,
            data,
            rm,
        } => {
            let defaults = TempPaths::beside(&out);
            let temp = TempPaths::new(
                tmp.unwrap_or(defaults.tmp),
                tmp2.unwrap_or(defaults.tmp2),
            );
            let opts = ModifyOptions {
                file,
                out,
                temp,
                keep,
                quiet_spinner: cli.debug,
            };
            cmd_modify(&tagger, &opts, &data, &rm)
        }
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the level picked by `--debug`
fn log_dispatch(debug: bool) -> Dispatch {
    let default_filter = if debug { "mp4ilst=debug" } else { "mp4ilst=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    Dispatch::new(subscriber)
}

// =============================================================================
// Commands
// =============================================================================

fn cmd_probe(tagger: &Tagger, file: &Path, json: bool) -> Result<()> {
    let tags = tagger
        .read_file(file)
        .with_context(|| format!("Failed to read: {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tags)?);
        return Ok(());
    }

    println!("---");
    for (spec, value) in tags.iter() {
        println!("{}: {}", spec.id, value);
    }
    Ok(())
}

struct ModifyOptions {
    file: PathBuf,
    out: PathBuf,
    temp: TempPaths,
    keep: bool,
    quiet_spinner: bool,
}

fn cmd_modify(tagger: &Tagger, opts: &ModifyOptions, data: &[String], rm: &[String]) -> Result<()> {
    check_paths(&opts.file, &opts.out, &opts.temp)?;

    let (tags, delete) = parse_changes(data, rm)?;

    let spinner = if opts.quiet_spinner {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Writing {}", opts.out.display()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = tagger.write_file(&opts.file, &opts.out, &opts.temp, &tags, delete.as_slice());
    spinner.finish_and_clear();

    // a temp path resolving to the source must not be deleted
    let same_path = matches!(result, Err(Error::SamePath { .. }));
    if !opts.keep && !same_path {
        opts.temp
            .remove()
            .with_context(|| format!("Failed to remove: {}", opts.temp.tmp.display()))?;
    }

    let report = result.with_context(|| {
        format!(
            "Failed to write: {} -> {}",
            opts.file.display(),
            opts.out.display()
        )
    })?;
    print_report(&opts.file, &opts.out, &report);
    Ok(())
}

// =============================================================================
// Output
// =============================================================================

fn print_report(file: &Path, out: &Path, report: &WriteReport) {
    println!(
        "{} {} -> {}",
        "mp4ilst".green().bold(),
        file.display(),
        out.display()
    );

    if report.removed.is_empty() && report.modified.is_empty() && report.appended.is_empty() {
        println!("  {}: no tags changed", "info".cyan());
        return;
    }

    for id in &report.removed {
        println!("  {} {}", "-".red(), id);
    }
    for id in &report.modified {
        println!("  {} {}", "~".yellow(), id);
    }
    for id in &report.appended {
        println!("  {} {}", "+".green(), id);
    }

    println!("  Size change:    {:+} bytes", report.size_delta);
    match report.offsets {
        OffsetPatch::Unchanged => println!("  Chunk offsets:  unchanged"),
        OffsetPatch::SkippedMdatFirst => println!(
            "  Chunk offsets:  {} (media data precedes metadata)",
            "not shifted".yellow()
        ),
        OffsetPatch::Patched { tables, entries } => println!(
            "  Chunk offsets:  {} entries in {} table(s) shifted",
            entries.to_string().green(),
            tables
        ),
    }
}
