pub mod client;
pub mod drop_file;
pub mod error;
pub mod identity;

pub use client::{EcflowClient, SchedulerClient};
pub use drop_file::DropFile;
pub use identity::JobIdentity;
