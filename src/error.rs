use std::path::PathBuf;

use thiserror::Error;

/// Fixed wording the scheduler operators grep for in aborted job logs.
pub const UNKNOWN_TIER_MESSAGE: &str = "ENVIR must be prod, para, eval,emcpara , or test";

#[derive(Debug, Error)]
pub enum JobError {
    #[error("{UNKNOWN_TIER_MESSAGE} (got '{0}')")]
    UnknownTier(String),

    #[error("Missing job identity variable: {0}")]
    MissingIdentity(&'static str),

    #[error("Invalid value for {name}: '{value}'")]
    InvalidIdentity { name: &'static str, value: String },

    #[error("Cannot read model version file {}: {source}", path.display())]
    VersionFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Version file for model '{0}' does not define {0}_ver")]
    MissingModelVersion(String),

    #[error("Cannot write drop file {}: {source}", path.display())]
    DropFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config error: {0}")]
    Config(String),
}
