use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::debug;

use super::error::ClientError;
use super::identity::JobIdentity;
use crate::config::SiteConfig;
use crate::envir::Environment;

const CLIENT_NAME: &str = "ecflow_client";

/// The two calls a job makes to the scheduler.
pub trait SchedulerClient {
    fn init(&self, identity: &JobIdentity) -> Result<(), ClientError>;
    fn abort(&self, identity: &JobIdentity, message: &str) -> Result<(), ClientError>;
}

/// Shells out to `ecflow_client`.
#[derive(Debug, Clone)]
pub struct EcflowClient {
    program: Option<PathBuf>,
}

impl EcflowClient {
    /// Find the client: explicit config, then `PATH`, then the configured
    /// search dirs. A missing client is reported on first use.
    pub fn locate(config: &SiteConfig, env: &Environment) -> Self {
        let program = config
            .client
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                let path_dirs: Vec<PathBuf> = env
                    .get("PATH")
                    .map(|p| std::env::split_paths(p).collect())
                    .unwrap_or_default();
                find_executable_in_dirs(CLIENT_NAME, &path_dirs)
            })
            .or_else(|| find_executable_in_dirs(CLIENT_NAME, &config.client_search_dirs));

        debug!(program = ?program, "located scheduler client");
        Self { program }
    }

    #[cfg(test)]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    #[cfg(test)]
    pub fn program(&self) -> Option<&Path> {
        self.program.as_deref()
    }

    fn call(&self, identity: &JobIdentity, arg: String) -> Result<(), ClientError> {
        let program = self.program.as_ref().ok_or(ClientError::NotFound)?;
        let display = program.display().to_string();

        let output = run_blocking(|| {
            Command::new(program)
                .arg(&arg)
                .envs(identity.exports())
                .stdin(Stdio::null())
                .output()
        })
        .map_err(|source| ClientError::Spawn {
                program: display.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ClientError::Failed {
                program: display,
                arg,
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl SchedulerClient for EcflowClient {
    fn init(&self, identity: &JobIdentity) -> Result<(), ClientError> {
        self.call(identity, format!("--init={}", identity.run_id))
    }

    fn abort(&self, identity: &JobIdentity, message: &str) -> Result<(), ClientError> {
        self.call(identity, format!("--abort={message}"))
    }
}

/// Client calls block until `ecflow_client` returns; there is no timeout.
/// On a multi-threaded runtime the worker is handed off first so other
/// tasks keep running.
fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && (m.permissions().mode() & 0o111 != 0))
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

fn find_executable_in_dirs(name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}
