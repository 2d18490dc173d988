use castway_core::{CastwayError, LaunchConfig, RestartPolicy, Result, ShutdownPolicy};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::process::{Child, Command};
use tracing::{info, warn};
use uuid::Uuid;

/// Final outcome of a supervision run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitSummary {
    /// Exit code the parent process should terminate with.
    pub code: i32,
    /// Signal that killed the child, when it did not exit on its own.
    pub signal: Option<i32>,
    /// Number of times the restart policy relaunched the child.
    pub restarts: u32,
}

impl ExitSummary {
    #[cfg(unix)]
    fn from_status(status: ExitStatus, restarts: u32) -> Self {
        use std::os::unix::process::ExitStatusExt;

        match status.code() {
            Some(code) => Self {
                code,
                signal: None,
                restarts,
            },
            None => {
                // Killed by a signal: map to the shell convention.
                let signal = status.signal().unwrap_or(0);
                Self {
                    code: 128 + signal,
                    signal: Some(signal),
                    restarts,
                }
            }
        }
    }

    #[cfg(not(unix))]
    fn from_status(status: ExitStatus, restarts: u32) -> Self {
        Self {
            code: status.code().unwrap_or(1),
            signal: None,
            restarts,
        }
    }
}

/// Termination request received by the parent process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelaySignal {
    Interrupt,
    Terminate,
}

/// Waits for the parent's termination requests and forwards the first one
/// to the child. Installing the streams up front also keeps the parent
/// alive through the forward-then-reap sequence.
struct SignalRelay {
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
}

impl SignalRelay {
    #[cfg(unix)]
    fn new() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    fn new() -> Result<Self> {
        Ok(Self {})
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> RelaySignal {
        tokio::select! {
            _ = self.sigint.recv() => RelaySignal::Interrupt,
            _ = self.sigterm.recv() => RelaySignal::Terminate,
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> RelaySignal {
        let _ = tokio::signal::ctrl_c().await;
        RelaySignal::Interrupt
    }

    #[cfg(unix)]
    fn forward(&self, child: &mut Child, request: RelaySignal) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        // A missing pid means the child already exited; the regular wait
        // path picks up its status.
        let Some(pid) = child.id() else {
            return;
        };

        let sig = match request {
            RelaySignal::Interrupt => Signal::SIGINT,
            RelaySignal::Terminate => Signal::SIGTERM,
        };

        info!(pid, signal = %sig, "Forwarding shutdown signal to server process");
        if let Err(err) = kill(Pid::from_raw(pid as i32), sig) {
            warn!(pid, error = %err, "Failed to forward signal to server process");
        }
    }

    #[cfg(not(unix))]
    fn forward(&self, child: &mut Child, _request: RelaySignal) {
        info!("Stopping server process");
        if let Err(err) = child.start_kill() {
            warn!(error = %err, "Failed to stop server process");
        }
    }
}

enum Outcome {
    /// The child exited on its own.
    Exited(ExitStatus),
    /// The operator asked for shutdown; the signal was forwarded and the
    /// child has been reaped.
    Shutdown(ExitStatus),
}

/// Supervises the external server process: spawn with the environment
/// overlay, relay the first termination request, propagate the exit status.
pub struct Supervisor {
    executable: PathBuf,
    args: Vec<String>,
    config: LaunchConfig,
    restart: RestartPolicy,
    shutdown: ShutdownPolicy,
}

impl Supervisor {
    pub fn new(executable: impl Into<PathBuf>, config: LaunchConfig) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            config,
            restart: RestartPolicy::default(),
            shutdown: ShutdownPolicy::default(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart = policy;
        self
    }

    pub fn with_shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.shutdown = policy;
        self
    }

    /// Run the external server to completion.
    ///
    /// Returns once the child has terminated and no restart applies. The
    /// summary carries the exit code the parent process should use.
    /// Consuming `self` keeps a single live child handle per supervisor.
    pub async fn run(self) -> Result<ExitSummary> {
        let session_id = Uuid::new_v4();
        let mut relay = SignalRelay::new()?;
        let mut total_restarts: u32 = 0;
        let mut consecutive: u32 = 0;

        loop {
            let mut child = self.spawn_child()?;
            let started = Instant::now();
            info!(
                session_id = %session_id,
                pid = ?child.id(),
                executable = %self.executable.display(),
                port = self.config.port,
                host = %self.config.host,
                "Server process started"
            );

            match self.supervise(&mut child, &mut relay).await? {
                Outcome::Shutdown(status) => {
                    let summary = ExitSummary::from_status(status, total_restarts);
                    info!(
                        session_id = %session_id,
                        code = summary.code,
                        "Server stopped after shutdown request"
                    );
                    return Ok(summary);
                }
                Outcome::Exited(status) => {
                    if started.elapsed() >= self.restart.min_uptime() {
                        consecutive = 0;
                    }
                    if self.restart.autorestart && consecutive < self.restart.max_restarts {
                        consecutive += 1;
                        total_restarts += 1;
                        warn!(
                            session_id = %session_id,
                            status = ?status,
                            restart = consecutive,
                            max_restarts = self.restart.max_restarts,
                            "Server process exited, restarting"
                        );
                        continue;
                    }

                    let summary = ExitSummary::from_status(status, total_restarts);
                    info!(
                        session_id = %session_id,
                        code = summary.code,
                        "Server process exited"
                    );
                    return Ok(summary);
                }
            }
        }
    }

    /// Spawn the child with inherited stdio and the configuration overlay
    /// applied on top of the parent's environment.
    fn spawn_child(&self) -> Result<Child> {
        let mut command = Command::new(&self.executable);
        command
            .args(&self.args)
            .envs(self.config.env_overlay())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        command.spawn().map_err(|err| {
            CastwayError::SpawnError(format!("{}: {}", self.executable.display(), err))
        })
    }

    async fn supervise(&self, child: &mut Child, relay: &mut SignalRelay) -> Result<Outcome> {
        tokio::select! {
            status = child.wait() => Ok(Outcome::Exited(status?)),
            request = relay.recv() => {
                relay.forward(child, request);
                let status = self.await_shutdown(child).await?;
                Ok(Outcome::Shutdown(status))
            }
        }
    }

    /// Wait for the child after the signal forward. Exactly one signal is
    /// relayed per shutdown: further interrupts land in the already
    /// installed streams and are never forwarded.
    async fn await_shutdown(&self, child: &mut Child) -> Result<ExitStatus> {
        match self.shutdown.kill_timeout() {
            Some(grace) => match tokio::time::timeout(grace, child.wait()).await {
                Ok(status) => Ok(status?),
                Err(_) => {
                    warn!(
                        grace_secs = grace.as_secs(),
                        "Server did not stop within the grace period, killing"
                    );
                    if let Err(err) = child.start_kill() {
                        warn!(error = %err, "Failed to kill server process");
                    }
                    Ok(child.wait().await?)
                }
            },
            None => Ok(child.wait().await?),
        }
    }
}


#[cfg(all(test, unix))]
mod process_tests {
    use super::*;

    fn sh(script: &str, config: LaunchConfig) -> Supervisor {
        Supervisor::new("/bin/sh", config).with_args(["-c", script])
    }

    #[tokio::test]
    async fn test_propagates_child_exit_code() {
        let summary = sh("exit 7", LaunchConfig::default()).run().await.unwrap();
        assert_eq!(summary.code, 7);
        assert_eq!(summary.signal, None);
        assert_eq!(summary.restarts, 0);
    }

    #[tokio::test]
    async fn test_clean_exit() {
        let summary = sh("exit 0", LaunchConfig::default()).run().await.unwrap();
        assert_eq!(summary.code, 0);
    }

    #[tokio::test]
    async fn test_child_observes_overlay() {
        let config = LaunchConfig::new(9000, "0.0.0.0");
        let summary = sh(r#"[ "$PORT" = "9000" ] && [ "$HOST" = "0.0.0.0" ]"#, config)
            .run()
            .await
            .unwrap();
        assert_eq!(summary.code, 0);
    }

    #[tokio::test]
    async fn test_child_inherits_parent_environment() {
        // The overlay is applied on top of the full parent environment.
        let summary = sh(r#"[ -n "$PATH" ] && [ "$PORT" = "8009" ]"#, LaunchConfig::default())
            .run()
            .await
            .unwrap();
        assert_eq!(summary.code, 0);
    }

    #[tokio::test]
    async fn test_overlay_wins_over_parent_environment() {
        std::env::set_var("PORT", "1111");
        let config = LaunchConfig::new(9000, "localhost");
        let summary = sh(r#"[ "$PORT" = "9000" ]"#, config).run().await.unwrap();
        assert_eq!(summary.code, 0);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let supervisor = Supervisor::new("/no/such/castway-server-binary", LaunchConfig::default());
        let result = supervisor.run().await;
        assert!(matches!(result, Err(CastwayError::SpawnError(_))));
    }

    #[tokio::test]
    async fn test_signal_killed_child_maps_to_convention() {
        let summary = sh("kill -TERM $$", LaunchConfig::default())
            .run()
            .await
            .unwrap();
        assert_eq!(summary.code, 143);
        assert_eq!(summary.signal, Some(15));
    }

    #[tokio::test]
    async fn test_restart_policy_bounds_relaunches() {
        let policy = RestartPolicy {
            autorestart: true,
            max_restarts: 2,
            min_uptime_secs: 3600,
        };
        let summary = sh("exit 1", LaunchConfig::default())
            .with_restart_policy(policy)
            .run()
            .await
            .unwrap();
        assert_eq!(summary.restarts, 2);
        assert_eq!(summary.code, 1);
    }
}
