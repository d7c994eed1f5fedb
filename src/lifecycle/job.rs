use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::AnnounceState;

/// Why a job is being reported as aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortCause {
    /// The job ended with this shell-style status (`128+N` for signal N).
    Status(i32),
    /// A terminating signal arrived but the job body still exited 0.
    Interrupted,
    /// Setup failed before or while starting the job body.
    Fatal(String),
}

impl AbortCause {
    /// Text sent with `--abort` and echoed to the job log.
    pub fn message(&self) -> String {
        match self {
            AbortCause::Status(0) | AbortCause::Interrupted => {
                "Killed by signal (likely via external kill)".to_string()
            }
            AbortCause::Status(code) => format!("Killed by signal {code}"),
            AbortCause::Fatal(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for AbortCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

/// Announce bookkeeping for the current job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lifecycle {
    pub state: AnnounceState,
    pub state_history: Vec<AnnounceState>,
    pub abort_message: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AnnounceState::Uninitialized,
            state_history: Vec::new(),
            abort_message: None,
            started_at: Utc::now(),
        }
    }

    pub(super) fn advance(&mut self, next: AnnounceState) {
        self.state_history.push(self.state);
        self.state = next;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Structured record produced when the job reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleRecord {
    pub job_name: String,
    pub run_id: String,
    pub state_transitions: Vec<AnnounceState>,
    pub abort_message: Option<String>,
    /// Status the wrapper leaves with; set once the exit plan is known.
    pub exit_status: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl LifecycleRecord {
    pub fn from_lifecycle(lifecycle: &Lifecycle, job_name: &str, run_id: &str) -> Self {
        let now = Utc::now();
        let mut transitions = lifecycle.state_history.clone();
        transitions.push(lifecycle.state);

        Self {
            job_name: job_name.to_string(),
            run_id: run_id.to_string(),
            state_transitions: transitions,
            abort_message: lifecycle.abort_message.clone(),
            exit_status: None,
            started_at: lifecycle.started_at,
            finished_at: now,
            duration_ms: (now - lifecycle.started_at).num_milliseconds(),
        }
    }
}
