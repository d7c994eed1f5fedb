use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::{AbortCause, Lifecycle};

/// Announce states of a job as seen by the scheduler.
///
/// Each job flows through: UNINITIALIZED → RUNNING → COMPLETED | ABORTED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnounceState {
    Uninitialized,
    Running,
    Completed,
    Aborted,
}

impl AnnounceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnnounceState::Completed | AnnounceState::Aborted)
    }
}

impl fmt::Display for AnnounceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnounceState::Uninitialized => write!(f, "UNINITIALIZED"),
            AnnounceState::Running => write!(f, "RUNNING"),
            AnnounceState::Completed => write!(f, "COMPLETED"),
            AnnounceState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// Things that happen to a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The init call was made.
    Init,
    /// The job body exited 0 without interruption.
    Succeed,
    Fail(AbortCause),
}

/// The result of applying an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Advance to the next state; no scheduler call needed.
    Next(AnnounceState),
    /// Move to `Aborted`; the caller must announce `message`.
    Abort { message: String },
    /// Event not valid in the current state; nothing to do.
    Ignored,
}

/// Drives a `Lifecycle` through the announce states.
pub struct StateMachine;

impl StateMachine {
    /// Compute and apply the transition for `event`.
    ///
    /// - `Uninitialized` accepts only `Init`.
    /// - `Running` accepts `Succeed` and `Fail`.
    /// - Terminal states ignore everything, so an abort is announced at
    ///   most once.
    pub fn next(lifecycle: &mut Lifecycle, event: Event) -> Transition {
        let transition = match (lifecycle.state, event) {
            (AnnounceState::Uninitialized, Event::Init) => Transition::Next(AnnounceState::Running),
            (AnnounceState::Running, Event::Succeed) => Transition::Next(AnnounceState::Completed),
            (AnnounceState::Running, Event::Fail(cause)) => Transition::Abort {
                message: cause.message(),
            },
            _ => Transition::Ignored,
        };

        match &transition {
            Transition::Next(next_state) => lifecycle.advance(*next_state),
            Transition::Abort { message } => {
                lifecycle.abort_message = Some(message.clone());
                lifecycle.advance(AnnounceState::Aborted);
            }
            Transition::Ignored => {}
        }

        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_all_states() {
        let mut lc = Lifecycle::new();
        assert_eq!(lc.state, AnnounceState::Uninitialized);

        let t = StateMachine::next(&mut lc, Event::Init);
        assert_eq!(t, Transition::Next(AnnounceState::Running));

        let t = StateMachine::next(&mut lc, Event::Succeed);
        assert_eq!(t, Transition::Next(AnnounceState::Completed));
        assert!(lc.state.is_terminal());
        assert!(lc.abort_message.is_none());
    }

    #[test]
    fn failure_aborts_once() {
        let mut lc = Lifecycle::new();
        StateMachine::next(&mut lc, Event::Init);

        let t = StateMachine::next(&mut lc, Event::Fail(AbortCause::Status(2)));
        assert_eq!(
            t,
            Transition::Abort {
                message: "Killed by signal 2".into()
            }
        );
        assert_eq!(lc.state, AnnounceState::Aborted);

        // A second failure (e.g. signal after error) is swallowed.
        let t = StateMachine::next(&mut lc, Event::Fail(AbortCause::Interrupted));
        assert_eq!(t, Transition::Ignored);
        assert_eq!(lc.abort_message.as_deref(), Some("Killed by signal 2"));
    }

    #[test]
    fn completed_job_never_aborts() {
        let mut lc = Lifecycle::new();
        StateMachine::next(&mut lc, Event::Init);
        StateMachine::next(&mut lc, Event::Succeed);

        let t = StateMachine::next(&mut lc, Event::Fail(AbortCause::Status(1)));
        assert_eq!(t, Transition::Ignored);
        assert_eq!(lc.state, AnnounceState::Completed);
    }

    #[test]
    fn events_before_init_are_ignored() {
        let mut lc = Lifecycle::new();
        assert_eq!(StateMachine::next(&mut lc, Event::Succeed), Transition::Ignored);
        assert_eq!(
            StateMachine::next(&mut lc, Event::Fail(AbortCause::Status(1))),
            Transition::Ignored
        );
        assert_eq!(lc.state, AnnounceState::Uninitialized);
    }

    #[test]
    fn state_history_is_recorded() {
        let mut lc = Lifecycle::new();
        StateMachine::next(&mut lc, Event::Init);
        StateMachine::next(&mut lc, Event::Fail(AbortCause::Interrupted));

        assert_eq!(
            lc.state_history,
            vec![AnnounceState::Uninitialized, AnnounceState::Running]
        );
    }

    #[test]
    fn state_display() {
        assert_eq!(AnnounceState::Uninitialized.to_string(), "UNINITIALIZED");
        assert_eq!(AnnounceState::Running.to_string(), "RUNNING");
        assert_eq!(AnnounceState::Completed.to_string(), "COMPLETED");
        assert_eq!(AnnounceState::Aborted.to_string(), "ABORTED");
    }
}
