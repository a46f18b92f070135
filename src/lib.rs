// src/lib.rs

pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod orchestrator;
pub mod pipeline;
pub mod types;
pub mod watch;

pub use cache::{CacheEntry, Caches, PackageInfo};
pub use engine::Notification;
pub use orchestrator::Orchestrator;
pub use pipeline::{CacheCollector, DepRow, OutputMeter};
pub use types::{BuildOutcome, PollMode, WatchOptions};

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, ConfigFile};
use crate::exec::run_build;
use crate::watch::NotifyBackend;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the orchestrator on the `notify` backend
/// - the build command
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let root_dir = config_root_dir(&config_path);
    let options = cfg.watch_options().clone();
    let backend = NotifyBackend::new(options.poll);

    let (orchestrator, mut notifications) =
        Orchestrator::spawn(options, backend, Caches::default())?;

    build_pass(&orchestrator, &cfg, &root_dir).await;

    if args.once {
        orchestrator.close().await;
        return Ok(());
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            note = notifications.recv() => {
                let Some(note) = note else { break };
                match note {
                    Notification::Update(ids) => {
                        info!(?ids, "files changed; rebuilding");
                        build_pass(&orchestrator, &cfg, &root_dir).await;
                    }
                    Notification::WatchError { path, message } => {
                        warn!(%path, %message, "watch error");
                    }
                    Notification::Log(line) => info!("{line}"),
                    Notification::Bytes(n) => debug!(bytes = n, "build output size"),
                    Notification::Time(elapsed) => debug!(?elapsed, "build output time"),
                }
            }
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                }
                info!("shutdown requested");
                break;
            }
        }
    }

    orchestrator.close().await;
    Ok(())
}

/// One full build: announce the entry files (warming the module cache for
/// any that are missing), run the build command, and report the outcome.
///
/// `build_finished` is sent whether or not the command could be run.
async fn build_pass(orchestrator: &Orchestrator, cfg: &ConfigFile, root: &Path) -> BuildOutcome {
    orchestrator.build_started();

    let mut meter = orchestrator.meter();
    let collector = orchestrator.collector();
    for entry in &cfg.build().entries {
        let path = root.join(entry);
        let id = path.to_string_lossy().into_owned();

        if !orchestrator.caches().modules.contains(&id) {
            match tokio::fs::read_to_string(&path).await {
                Ok(source) => {
                    collector.observe(DepRow::new(id.clone(), source));
                }
                Err(e) => warn!(path = %id, error = %e, "could not read entry file"),
            }
        }
        orchestrator.file_discovered(id);
    }

    if root.join("package.json").is_file() {
        orchestrator.package_discovered(PackageInfo::new(root));
    }

    // Record phase over; time only the build's output.
    meter.mark();
    let outcome = match run_build(&cfg.build().cmd, root, meter).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let error = format!("{e:#}");
            warn!(%error, "build command could not be run");
            BuildOutcome::Failed
        }
    };
    if outcome == BuildOutcome::Failed {
        warn!("build failed; waiting for changes");
    }

    orchestrator.build_finished(outcome);
    outcome
}

/// Figure out a sensible project root.
///
/// - If the config path has a non-empty parent (e.g. "web/Depwatch.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Depwatch.toml" (parent = ""),
///   we fall back to the current working directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Simple dry-run output: print the resolved configuration.
fn print_dry_run(cfg: &ConfigFile) {
    let watch = cfg.watch_options();
    let build = cfg.build();

    println!("depwatch dry-run");
    println!("  watch.delay = {}ms", watch.delay.as_millis());
    println!("  watch.ignore = {:?}", watch.ignore);
    match watch.poll.interval() {
        Some(interval) => println!("  watch.poll = every {}ms", interval.as_millis()),
        None => println!("  watch.poll = off (native events)"),
    }
    println!();
    println!("build:");
    println!("  cmd: {}", build.cmd);
    println!("  entries ({}):", build.entries.len());
    for entry in &build.entries {
        println!("    - {entry}");
    }

    debug!("dry-run complete (no build)");
}
