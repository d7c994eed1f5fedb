use tracing::{info, warn};

use super::job::{AbortCause, Lifecycle, LifecycleRecord};
use super::state::{Event, StateMachine, Transition};
use crate::ecflow::{DropFile, JobIdentity, SchedulerClient};
use crate::error::JobError;
use crate::ui;

/// Scoped "job is running" announcement.
///
/// Created by announcing init to the scheduler. Must end with
/// [`complete`](Self::complete) or [`abort`](Self::abort); a guard dropped
/// while still running announces an abort itself.
pub struct AnnounceGuard<C: SchedulerClient> {
    client: C,
    identity: JobIdentity,
    drop_file: DropFile,
    lifecycle: Lifecycle,
}

impl<C: SchedulerClient> AnnounceGuard<C> {
    /// Announce init and publish the drop file.
    ///
    /// A failed init call is logged and ignored. A drop file that cannot be
    /// written aborts the job before the error is returned.
    pub fn acquire(
        client: C,
        identity: JobIdentity,
        drop_file: DropFile,
    ) -> Result<Self, JobError> {
        let mut guard = Self {
            client,
            identity,
            drop_file,
            lifecycle: Lifecycle::new(),
        };

        StateMachine::next(&mut guard.lifecycle, Event::Init);
        let job = guard.identity.name.clone();
        match guard.client.init(&guard.identity) {
            Ok(()) => info!(%job, rid = %guard.identity.run_id, "announced init"),
            Err(e) => warn!(%job, error = %e, "init announce failed"),
        }

        if let Err(e) = guard.drop_file.write(&guard.identity) {
            guard.announce(Event::Fail(AbortCause::Fatal(e.to_string())));
            return Err(e);
        }
        Ok(guard)
    }

    #[cfg(test)]
    fn state(&self) -> super::AnnounceState {
        self.lifecycle.state
    }

    /// The job body exited 0. No scheduler call is made.
    pub fn complete(mut self) -> LifecycleRecord {
        self.announce(Event::Succeed);
        self.record()
    }

    pub fn abort(mut self, cause: AbortCause) -> LifecycleRecord {
        self.announce(Event::Fail(cause));
        self.record()
    }

    fn record(&self) -> LifecycleRecord {
        LifecycleRecord::from_lifecycle(
            &self.lifecycle,
            &self.identity.name,
            &self.identity.run_id,
        )
    }

    fn announce(&mut self, event: Event) {
        let Transition::Abort { message } = StateMachine::next(&mut self.lifecycle, event) else {
            return;
        };

        if let Err(e) = self.client.abort(&self.identity, &message) {
            warn!(job = %self.identity.name, error = %e, "abort announce failed");
        }
        ui::announce_abort(&message);
        if let Err(e) = self.drop_file.append_marker() {
            warn!(path = %self.drop_file.path().display(), error = %e, "cannot mark drop file");
        }
    }
}

impl<C: SchedulerClient> Drop for AnnounceGuard<C> {
    fn drop(&mut self) {
        if !self.lifecycle.state.is_terminal() {
            self.announce(Event::Fail(AbortCause::Fatal(
                "job wrapper exited without reporting status".to_string(),
            )));
        }
    }
}
