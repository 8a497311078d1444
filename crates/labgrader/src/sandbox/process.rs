//! Process spawning and I/O
//!
//! Handles running a command with piped input, a wall clock limit and capped
//! output capture.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::sandbox::SandboxError;
use crate::sandbox::command::SandboxCommand;
use crate::types::{ExecutionLimits, RawExecution};

/// How long to keep draining output pipes after the process is gone
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

const READ_CHUNK: usize = 8192;

/// Run a command with batch I/O
///
/// `stdin_data` is written to the process's standard input, which is then
/// closed. Standard output and error are captured up to
/// `limits.max_output` bytes each. When the wall clock limit is hit the
/// process is killed and the result is marked as timed out.
///
/// The process leads its own process group. Once it exits or times out the
/// whole group is killed, so nothing it forked survives the run.
#[instrument(skip(command, stdin_data), fields(timeout = limits.timeout_seconds))]
pub async fn run_batch(
    command: &SandboxCommand,
    stdin_data: Option<&[u8]>,
    limits: &ExecutionLimits,
) -> Result<RawExecution, SandboxError> {
    let args = command.build();
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| SandboxError::CommandFailed("empty command arguments".to_string()))?;

    debug!(?args, "running command");

    let mut cmd = Command::new(program);
    cmd.args(rest)
        .env_clear()
        .env("PATH", command.search_path())
        .envs(command.env_vars())
        .stdin(if stdin_data.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);
    if let Some(dir) = command.working_dir_path() {
        cmd.current_dir(dir);
    }

    let started = Instant::now();
    let mut child = cmd.spawn().map_err(SandboxError::SpawnFailed)?;
    let group = child.id();

    let stdin_task = match (child.stdin.take(), stdin_data) {
        (Some(mut stdin), Some(data)) => {
            let data = data.to_vec();
            Some(tokio::spawn(async move {
                // The program may exit without reading its input
                if let Err(err) = stdin.write_all(&data).await {
                    debug!(%err, "stdin closed before all input was written");
                }
            }))
        }
        _ => None,
    };
    let stdout_task = child
        .stdout
        .take()
        .map(|out| tokio::spawn(read_capped(out, limits.max_output)));
    let stderr_task = child
        .stderr
        .take()
        .map(|err| tokio::spawn(read_capped(err, limits.max_output)));

    let waited = tokio::time::timeout(limits.timeout(), child.wait()).await;
    kill_process_group(group);
    let (status, timed_out) = match waited {
        Ok(status) => (Some(status?), false),
        Err(_) => {
            if let Err(err) = child.kill().await {
                warn!(%err, "failed to kill timed out process");
            }
            (None, true)
        }
    };
    let wall_time = started.elapsed();

    if let Some(task) = stdin_task {
        task.abort();
    }
    let stdout = collect(stdout_task).await;
    let stderr = collect(stderr_task).await;

    let result = RawExecution {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code: status.and_then(|s| s.code()),
        signal: status.and_then(exit_signal),
        timed_out,
        wall_time,
    };

    debug!(
        exit_code = ?result.exit_code,
        signal = ?result.signal,
        timed_out = result.timed_out,
        wall_time_ms = result.wall_time.as_millis() as u64,
        "execution complete"
    );

    Ok(result)
}

/// Run a command and capture its combined output (for compilation feedback)
///
/// Standard output and standard error are joined with a newline, like a
/// terminal would show them.
#[instrument(skip(command))]
pub async fn run_with_output(
    command: &SandboxCommand,
    limits: &ExecutionLimits,
) -> Result<(RawExecution, String), SandboxError> {
    let result = run_batch(command, None, limits).await?;

    let mut output = result.stdout.clone();
    if !output.is_empty() && !result.stderr.is_empty() && !output.ends_with('\n') {
        output.push('\n');
    }
    output.push_str(&result.stderr);

    Ok((result, output))
}

/// Read a stream to its end, keeping at most `cap` bytes
async fn read_capped<R>(mut reader: R, cap: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Vec::new();
    let mut buf = [0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let room = cap.saturating_sub(captured.len());
        captured.extend_from_slice(&buf[..n.min(room)]);
    }
    Ok(captured)
}

/// Wait briefly for a reader task; a background grandchild may hold the pipe open
async fn collect(task: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> Vec<u8> {
    let Some(mut task) = task else {
        return Vec::new();
    };
    match tokio::time::timeout(OUTPUT_GRACE, &mut task).await {
        Ok(Ok(Ok(bytes))) => bytes,
        Ok(Ok(Err(err))) => {
            debug!(%err, "failed to read process output");
            Vec::new()
        }
        Ok(Err(err)) => {
            warn!(%err, "output reader task failed");
            Vec::new()
        }
        Err(_) => {
            task.abort();
            debug!("output pipe still open after process exit");
            Vec::new()
        }
    }
}

/// SIGKILL every process left in the group led by `leader`
#[cfg(unix)]
fn kill_process_group(leader: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pgid) = leader.and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        // Group already empty
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => warn!(%err, pgid, "failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_leader: Option<u32>) {}

#[cfg(unix)]
fn exit_signal(status: std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: std::process::ExitStatus) -> Option<i32> {
    None
}
