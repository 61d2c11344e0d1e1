//! Automated package updates for the Open Build Service.
//!
//! This crate drives the `osc` command-line client as a subprocess to
//! branch, check out, modify, commit, and submit packages in an Open Build
//! Service instance. Consumers implement the [`FileGenerator`] extension
//! point, which writes the updated package files into a checked-out working
//! copy, and call [`PackageUpdater::update_package`] to run the update.

pub use crate::core::{ObsError, ObsResult};
pub use crate::package::Package;
pub use crate::process::{
    retry, run_cmd, CommandError, CommandOutput, CommandRunner, RunOptions,
};
pub use crate::request::{
    fetch_submitrequests, parse_request_list, RequestState, SubmitRequest,
    DEFAULT_REQUEST_STATES,
};
pub use crate::update::{
    FileGenerator, PackageUpdater, UpdateOptions, UpdaterConfig, DEFAULT_API_URL,
};

/// Error types.
pub mod core;

/// Package identity.
pub mod package;

/// Subprocess execution.
pub mod process;

/// Submit request inspection.
pub mod request;

/// The update pipeline.
pub mod update;
