use std::io::{self, Read};
use std::path::Path;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tokio::time::{Duration, timeout};

use crate::error::PaneError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecError {
    #[error("{program}: {reason}")]
    Spawn { program: String, reason: String },
    #[error("{output}[exit code: {code}]")]
    Exit { code: i32, output: String },
    #[error("{program}: timed out after {secs}s")]
    Timeout { program: String, secs: u64 },
}

impl From<ExecError> for PaneError {
    fn from(e: ExecError) -> Self {
        PaneError::Transport(e.to_string())
    }
}

/// Run `program` with `args` in `cwd`, without a shell.
///
/// stdout and stderr share one pipe, so the returned text keeps the order
/// in which the child wrote it.
pub async fn run(
    program: &str,
    args: &[String],
    cwd: &Path,
    limit: Duration,
) -> Result<String, ExecError> {
    let spawn_err = |e: io::Error| ExecError::Spawn { program: program.to_string(), reason: e.to_string() };

    let (mut reader, writer) = io::pipe().map_err(spawn_err)?;
    let err_writer = writer.try_clone().map_err(spawn_err)?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::from(writer))
        .stderr(Stdio::from(err_writer))
        .kill_on_drop(true);
    let mut child = cmd.spawn().map_err(spawn_err)?;
    // Our copies of the write end must close or the read never sees EOF
    drop(cmd);

    let drain = tokio::task::spawn_blocking(move || {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).map(|_| buf)
    });
    let work = async {
        let status = child.wait().await?;
        let buf = drain.await.map_err(io::Error::other)??;
        Ok::<_, io::Error>((status, buf))
    };

    let (status, buf) = match timeout(limit, work).await {
        Ok(Ok(done)) => done,
        Ok(Err(e)) => return Err(spawn_err(e)),
        Err(_) => {
            return Err(ExecError::Timeout { program: program.to_string(), secs: limit.as_secs() });
        }
    };

    let mut combined = String::from_utf8_lossy(&buf).into_owned();
    if status.success() {
        Ok(combined)
    } else {
        let code = status.code().unwrap_or(-1);
        if !combined.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        Err(ExecError::Exit { code, output: combined })
    }
}
