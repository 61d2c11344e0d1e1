use crate::process::CommandError;
use thiserror::Error;

pub type ObsResult<T> = Result<T, ObsError>;

#[derive(Error, Debug)]
pub enum ObsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid package reference: {0}")]
    InvalidPackage(String),

    #[error("failed to branch {package}: {source}")]
    Branch {
        package: String,
        #[source]
        source: CommandError,
    },

    #[error("failed to check out {package}: {source}")]
    Checkout {
        package: String,
        #[source]
        source: CommandError,
    },

    #[error("failed to stage {file} for commit: {source}")]
    Staging {
        file: String,
        #[source]
        source: CommandError,
    },

    #[error("failed to commit {package}: {source}")]
    Commit {
        package: String,
        #[source]
        source: CommandError,
    },

    #[error("failed to create submit request for {package}: {source}")]
    Submit {
        package: String,
        #[source]
        source: CommandError,
    },

    /// The user-supplied `add_files` hook failed. The payload is passed
    /// through unchanged.
    #[error("error in add_files hook: {0}")]
    AddFiles(anyhow::Error),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("unexpected osc output: {0}")]
    UnexpectedOutput(String),

    #[error("malformed request listing: {0}")]
    RequestParse(String),
}
