// src/exec/command.rs

//! Runs the configured build command for the host binary.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::pipeline::OutputMeter;
use crate::types::BuildOutcome;

/// Build a shell command appropriate for the platform.
fn shell_command(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

/// Run `cmd` in `cwd`, streaming its stdout through `meter` and on to
/// our own stdout.
///
/// A non-zero exit is `Ok(BuildOutcome::Failed)`; `Err` means the process
/// could not be run at all.
pub async fn run_build(cmd: &str, cwd: &Path, meter: OutputMeter) -> Result<BuildOutcome> {
    info!(%cmd, ?cwd, "starting build");

    let mut command = shell_command(cmd);
    command
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning build command '{cmd}'"))?;

    // Always consume stderr so buffers don't fill; log at debug.
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("build stderr: {}", line);
            }
        });
    }

    let forward = child.stdout.take().map(|mut stdout| {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(16);
        let mut metered = meter.attach(rx);
        tokio::spawn(async move {
            let mut buf = vec![0u8; 8192];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
        tokio::spawn(async move {
            while let Some(chunk) = metered.recv().await {
                print!("{}", String::from_utf8_lossy(&chunk));
            }
        })
    });

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for build command '{cmd}'"))?;

    if let Some(forward) = forward {
        let _ = forward.await;
    }

    let code = status.code().unwrap_or(-1);
    info!(exit_code = code, success = status.success(), "build exited");

    Ok(if status.success() {
        BuildOutcome::Success
    } else {
        BuildOutcome::Failed
    })
}
