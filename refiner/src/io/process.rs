//! Helpers for running child processes with bounded output.
//!
//! Children are spawned with `kill_on_drop`, so dropping the returned future
//! (timeout or cancellation) kills the process.

use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result, anyhow};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
}

impl CommandOutput {
    /// Last few hundred bytes of stderr, for error messages.
    pub fn stderr_tail(&self) -> String {
        const TAIL: usize = 400;
        let text = String::from_utf8_lossy(&self.stderr);
        let trimmed = text.trim();
        match trimmed.char_indices().rev().nth(TAIL) {
            Some((idx, _)) => format!("...{}", &trimmed[idx..]),
            None => trimmed.to_string(),
        }
    }
}

/// Run `argv` feeding `input` on stdin and capture stdout/stderr.
///
/// Output is read concurrently while the child runs. `output_limit_bytes`
/// bounds what is kept in memory per stream; the rest is drained and counted.
#[instrument(skip_all, fields(program = argv.first().map(String::as_str).unwrap_or(""), output_limit_bytes = output_limit_bytes))]
pub async fn run_command(argv: &[String], input: &[u8], output_limit_bytes: usize) -> Result<CommandOutput> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow!("command must be non-empty"))?;
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("spawning child process");
    let mut child = cmd.spawn().with_context(|| format!("spawn {program}"))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("stdin was not piped"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let write = async move {
        stdin.write_all(input).await.context("write stdin")?;
        stdin.shutdown().await.context("close stdin")
    };
    let (written, stdout, stderr) = tokio::join!(
        write,
        read_stream_limited(stdout, output_limit_bytes),
        read_stream_limited(stderr, output_limit_bytes),
    );
    let (stdout, stdout_truncated) = stdout.context("read stdout")?;
    let (stderr, stderr_truncated) = stderr.context("read stderr")?;
    let status = child.wait().await.context("wait for command")?;
    // A child that exits without reading stdin is reported by its status below.
    if let Err(err) = written {
        if status.success() {
            return Err(err);
        }
        debug!(error = %err, "stdin not fully consumed by failing child");
    }

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }
    debug!(exit_code = ?status.code(), "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
    })
}

async fn read_stream_limited<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(kept.len());
        let keep = room.min(n);
        kept.extend_from_slice(&buf[..keep]);
        dropped += n - keep;
    }
    Ok((kept, dropped))
}
