use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::config::{EnvVar, Pairing};
use crate::http_probe;
use crate::prelude::*;

/// Spawns, probes and stops the servers under test.
///
/// `terminate` takes the handle by value: every handle returned by `spawn`
/// has to be passed back exactly once.
#[async_trait::async_trait]
pub trait ProcessManager: Send + Sync {
    type Handle: Send;

    async fn spawn(&self, pairing: &Pairing) -> Result<Self::Handle>;

    async fn probe_liveness(&self, port: u16) -> bool;

    async fn terminate(&self, handle: Self::Handle) -> Result<()>;

    /// Polls `probe_liveness` up to `max_attempts` times, sleeping `interval`
    /// between failed attempts.
    async fn wait_until_ready(&self, port: u16, max_attempts: u32, interval: Duration) -> bool {
        for attempt in 1..=max_attempts {
            if self.probe_liveness(port).await {
                debug!("Port {} ready after {} attempt(s)", port, attempt);
                return true;
            }
            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }
        false
    }
}

#[derive(Debug)]
pub struct ProcessHandle {
    pub name: String,
    child: Child,
}

impl ProcessHandle {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

#[derive(Debug)]
pub struct NativeProcessManager {
    client: reqwest::Client,
    env: EnvVar,
}

impl NativeProcessManager {
    pub fn new(env: EnvVar) -> Result<Self> {
        Ok(NativeProcessManager {
            client: http_probe::probe_client()?,
            env,
        })
    }
}

#[async_trait::async_trait]
impl ProcessManager for NativeProcessManager {
    type Handle = ProcessHandle;

    async fn spawn(&self, pairing: &Pairing) -> Result<ProcessHandle> {
        let mut cmd = Command::new(&pairing.runtime);
        cmd.arg(&pairing.script)
            .env(&self.env.name, &self.env.value)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        debug!("Spawning {:?}", cmd);

        let child = cmd.spawn().map_err(|source| Error::SpawnFailure {
            name: pairing.name.clone(),
            source,
        })?;
        info!(
            "Started {} (pid {})",
            pairing.name,
            child.id().map(|p| p.to_string()).unwrap_or_default()
        );
        Ok(ProcessHandle {
            name: pairing.name.clone(),
            child,
        })
    }

    async fn probe_liveness(&self, port: u16) -> bool {
        http_probe::probe_liveness(&self.client, port).await
    }

    async fn terminate(&self, mut handle: ProcessHandle) -> Result<()> {
        if let Some(pid) = handle.id() {
            if let Err(e) = send_sigterm(&mut handle.child, pid) {
                warn!("Failed to signal {} (pid {}): {}", handle.name, pid, e);
            }
        }
        let status = handle.child.wait().await?;
        debug!("{} exited with {}", handle.name, status);
        Ok(())
    }
}

#[cfg(unix)]
fn send_sigterm(_child: &mut Child, pid: u32) -> std::io::Result<()> {
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(not(unix))]
fn send_sigterm(child: &mut Child, _pid: u32) -> std::io::Result<()> {
    child.start_kill()
}
