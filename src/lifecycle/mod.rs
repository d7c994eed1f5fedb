mod guard;
mod job;
mod state;

pub use guard::AnnounceGuard;
pub use job::{AbortCause, LifecycleRecord};

#[cfg(test)]
pub(crate) use guard::tests::RecordingClient;
#[cfg(test)]
pub(crate) use state::AnnounceState;
