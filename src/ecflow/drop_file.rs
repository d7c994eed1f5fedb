use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::identity::JobIdentity;
use crate::config::DropConfig;
use crate::envir::Environment;
use crate::error::JobError;

/// Line appended when the job ends through the abort path.
pub const TRAP_MARKER: &str = "Trap Caught";

/// Node family, told apart by the directories it mounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostClass {
    /// IBM iDataPlex: LSF spool directory present.
    IData,
    /// Cray XC40: drop files go to the shared tmpfs.
    Cray,
}

impl HostClass {
    pub fn probe(config: &DropConfig) -> Self {
        if config.lsf_dir.is_dir() {
            HostClass::IData
        } else {
            HostClass::Cray
        }
    }
}

/// File the LSF post-exec hook reads to report on the job.
#[derive(Debug, Clone)]
pub struct DropFile {
    path: PathBuf,
}

impl DropFile {
    /// Pick the drop file path for this node.
    ///
    /// On Cray nodes `$POST_OUT` overrides the tmpfs location.
    pub fn locate(config: &DropConfig, env: &Environment, identity: &JobIdentity) -> Self {
        let batch_id = env.get("LSB_BATCH_JID").unwrap_or(identity.run_id.as_str());
        let file_name = format!("{}{batch_id}", config.prefix);

        let class = HostClass::probe(config);
        let path = match class {
            HostClass::IData => config.lsf_dir.join(file_name),
            HostClass::Cray => env
                .get("POST_OUT")
                .map(PathBuf::from)
                .unwrap_or_else(|| config.tmpfs_dir.join(file_name)),
        };
        debug!(?class, path = %path.display(), "selected drop file");
        Self { path }
    }

    #[cfg(test)]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create or truncate the file with the identity fields.
    pub fn write(&self, identity: &JobIdentity) -> Result<(), JobError> {
        std::fs::write(&self.path, identity.drop_lines()).map_err(|source| JobError::DropFile {
            path: self.path.clone(),
            source,
        })
    }

    pub fn append_marker(&self) -> std::io::Result<()> {
        let mut file = OpenOptions::new().append(true).create(true).open(&self.path)?;
        writeln!(file, "{TRAP_MARKER}")
    }
}
