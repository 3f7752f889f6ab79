use std::time::Duration;

use tokio::process::Command;

use crate::prelude::*;

/// Runs `cmd` to completion and returns its standard output.
///
/// A non-zero exit status is logged but not fatal as long as the command
/// printed something; the caller decides what the output is worth. Failing to
/// launch, exceeding `deadline` or producing no output is an
/// `ExecutionFailure`.
pub async fn exec(cmd: &mut Command, deadline: Option<Duration>) -> Result<String> {
    let cmd_str = format!("{:?}", cmd);
    debug!("Executing command: {}", cmd_str);

    cmd.kill_on_drop(true);
    let output = match deadline {
        Some(deadline) => match tokio::time::timeout(deadline, cmd.output()).await {
            Ok(output) => output,
            Err(_) => {
                return Err(Error::ExecutionFailure {
                    cmd: cmd_str,
                    reason: format!("did not finish within {}s", deadline.as_secs()),
                });
            }
        },
        None => cmd.output().await,
    }
    .map_err(|e| Error::ExecutionFailure {
        cmd: cmd_str.clone(),
        reason: e.to_string(),
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.trim().split('\n') {
        debug!("{}", line);
    }
    let status = output.status;
    debug!("Command completed with status: {}", status);
    if !status.success() {
        for line in String::from_utf8_lossy(&output.stderr).trim().split('\n') {
            warn!("{}", line);
        }
    }
    if stdout.trim().is_empty() {
        return Err(Error::ExecutionFailure {
            cmd: cmd_str,
            reason: format!("no output (exit status {})", status),
        });
    }
    if !status.success() {
        warn!("'{}' exited with status {}, keeping its output", cmd_str, status);
    }
    Ok(stdout.into_owned())
}

/// First line of `<binary> --version`, with stderr folded in since some
/// tools print their banner there.
pub async fn tool_version(binary: &str) -> Option<String> {
    let output = Command::new(binary).arg("--version").output().await.ok()?;
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}
