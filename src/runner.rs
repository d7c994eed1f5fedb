use std::os::unix::process::CommandExt;
use std::process::ExitStatus;

use anyhow::{Context, Result};
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::Pid;
use tokio::process::Command;
use tokio::signal::unix::{SignalKind, signal as unix_signal};
use tracing::{error, info, warn};

use crate::config::SiteConfig;
use crate::ecflow::{DropFile, JobIdentity, SchedulerClient};
use crate::envir::{Environment, Resolver};
use crate::lifecycle::{AbortCause, AnnounceGuard, LifecycleRecord};

/// Exit status used when the job body cannot be started, as in `sh`.
const EXIT_NOT_FOUND: i32 = 127;

/// What `ecfjob run` was asked to execute.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub tier: Option<String>,
    pub program: String,
    pub args: Vec<String>,
}

/// How the job body ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exited(i32),
    Signaled(i32),
}

impl Termination {
    pub fn from_status(status: ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;
        match (status.code(), status.signal()) {
            (Some(code), _) => Termination::Exited(code),
            (None, Some(sig)) => Termination::Signaled(sig),
            // Neither code nor signal: report a generic failure.
            (None, None) => Termination::Exited(1),
        }
    }
}

/// How the wrapper itself should leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPlan {
    Code(i32),
    /// Die from this signal with its default disposition.
    Raise(i32),
}

impl ExitPlan {
    pub fn status(&self) -> i32 {
        match self {
            ExitPlan::Code(code) => *code,
            ExitPlan::Raise(sig) => 128 + sig,
        }
    }

    /// Leave the process with the same status the job body had.
    pub fn terminate(self) -> ! {
        if let ExitPlan::Raise(sig) = self {
            if let Ok(sig) = Signal::try_from(sig) {
                // SAFETY: restoring the default disposition installs no handler code.
                let _ = unsafe { signal::signal(sig, SigHandler::SigDfl) };
                let _ = signal::raise(sig);
            }
        }
        std::process::exit(self.status())
    }
}

/// Decide the announcement and exit status for a finished job body.
///
/// `interrupted` is the first terminating signal the wrapper received.
pub fn classify(
    termination: Termination,
    interrupted: Option<i32>,
) -> (Option<AbortCause>, ExitPlan) {
    match (termination, interrupted) {
        (Termination::Exited(0), None) => (None, ExitPlan::Code(0)),
        (Termination::Exited(0), Some(sig)) => {
            (Some(AbortCause::Interrupted), ExitPlan::Code(128 + sig))
        }
        (Termination::Exited(code), _) => (Some(AbortCause::Status(code)), ExitPlan::Code(code)),
        (Termination::Signaled(sig), _) => {
            (Some(AbortCause::Status(128 + sig)), ExitPlan::Raise(sig))
        }
    }
}

/// Result of a full `run`.
#[derive(Debug)]
pub struct JobExit {
    pub plan: ExitPlan,
    pub record: Option<LifecycleRecord>,
}

impl JobExit {
    fn new(plan: ExitPlan, mut record: LifecycleRecord) -> Self {
        record.exit_status = Some(plan.status());
        Self {
            plan,
            record: Some(record),
        }
    }
}

/// Terminating signals routed into the abort path while the job runs.
struct TrapSignals {
    term: tokio::signal::unix::Signal,
    int: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
    hup: tokio::signal::unix::Signal,
    usr1: tokio::signal::unix::Signal,
    usr2: tokio::signal::unix::Signal,
}

impl TrapSignals {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            term: unix_signal(SignalKind::terminate())?,
            int: unix_signal(SignalKind::interrupt())?,
            quit: unix_signal(SignalKind::quit())?,
            hup: unix_signal(SignalKind::hangup())?,
            usr1: unix_signal(SignalKind::user_defined1())?,
            usr2: unix_signal(SignalKind::user_defined2())?,
        })
    }

    async fn recv(&mut self) -> Signal {
        tokio::select! {
            Some(()) = self.term.recv() => Signal::SIGTERM,
            Some(()) = self.int.recv() => Signal::SIGINT,
            Some(()) = self.quit.recv() => Signal::SIGQUIT,
            Some(()) = self.hup.recv() => Signal::SIGHUP,
            Some(()) = self.usr1.recv() => Signal::SIGUSR1,
            Some(()) = self.usr2.recv() => Signal::SIGUSR2,
            else => std::future::pending().await,
        }
    }

    /// A signal that arrived while nothing was waiting on the streams.
    async fn pending(&mut self) -> Option<Signal> {
        // Let the runtime drain the signal driver first.
        tokio::task::yield_now().await;
        tokio::select! {
            biased;
            sig = self.recv() => Some(sig),
            () = std::future::ready(()) => None,
        }
    }
}

/// Runs one job body under an announce guard.
pub struct JobRunner<'a> {
    config: &'a SiteConfig,
    env: &'a Environment,
    pid: u32,
}

impl<'a> JobRunner<'a> {
    pub fn new(config: &'a SiteConfig, env: &'a Environment) -> Self {
        Self {
            config,
            env,
            pid: std::process::id(),
        }
    }

    /// Announce, resolve, run and report.
    ///
    /// Errors are returned only when nothing could be announced (no job
    /// identity, no signal handlers). Every later failure is announced and
    /// folded into the returned exit plan.
    pub async fn run<C: SchedulerClient>(&self, client: C, request: RunRequest) -> Result<JobExit> {
        let identity =
            JobIdentity::from_env(self.env, self.pid).context("cannot identify ecFlow job")?;
        let mut signals = TrapSignals::install().context("cannot install signal handlers")?;

        let drop_file = DropFile::locate(&self.config.drop, self.env, &identity);
        let guard = match AnnounceGuard::acquire(client, identity.clone(), drop_file) {
            Ok(guard) => guard,
            Err(e) => {
                error!(error = %e, "job setup failed");
                return Ok(JobExit {
                    plan: ExitPlan::Code(1),
                    record: None,
                });
            }
        };

        let resolver = Resolver::new(self.config, self.env);
        let tier_name = resolver.select_tier_name(request.tier.as_deref());
        let bindings = match resolver.resolve(&tier_name) {
            Ok(bindings) => bindings,
            Err(e) => {
                error!(tier = %tier_name, error = %e, "environment resolution failed");
                let record = guard.abort(AbortCause::Fatal(e.to_string()));
                return Ok(JobExit::new(ExitPlan::Code(1), record));
            }
        };

        if let Some(sig) = signals.pending().await {
            warn!(signal = %sig, "interrupted before the job body started");
            let plan = ExitPlan::Raise(sig as i32);
            let record = guard.abort(AbortCause::Status(plan.status()));
            return Ok(JobExit::new(plan, record));
        }

        // Own process group: signals aimed at the wrapper's group reach the
        // body only through the forward below.
        let mut body = std::process::Command::new(&request.program);
        body.args(&request.args)
            .envs(bindings.iter())
            .envs(identity.exports())
            .process_group(0);
        let mut child = match Command::from(body).spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(program = %request.program, error = %e, "cannot start job body");
                let record = guard.abort(AbortCause::Fatal(format!(
                    "cannot start {}: {e}",
                    request.program
                )));
                return Ok(JobExit::new(ExitPlan::Code(EXIT_NOT_FOUND), record));
            }
        };
        info!(program = %request.program, tier = %tier_name, pid = ?child.id(), "job body started");

        let mut interrupted: Option<Signal> = None;
        let status = loop {
            tokio::select! {
                status = child.wait() => break status,
                sig = signals.recv() => {
                    warn!(signal = %sig, "forwarding signal to job body");
                    interrupted.get_or_insert(sig);
                    if let Some(pid) = child.id() {
                        if let Err(e) = signal::killpg(Pid::from_raw(pid as i32), sig) {
                            warn!(pid, error = %e, "cannot forward signal");
                        }
                    }
                }
            }
        };

        let termination = match status {
            Ok(status) => Termination::from_status(status),
            Err(e) => {
                error!(error = %e, "lost track of job body");
                Termination::Exited(1)
            }
        };
        let (cause, plan) = classify(termination, interrupted.map(|s| s as i32));
        info!(?termination, status = plan.status(), "job body finished");

        let record = match cause {
            None => guard.complete(),
            Some(cause) => guard.abort(cause),
        };
        Ok(JobExit::new(plan, record))
    }
}
