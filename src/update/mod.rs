//! The package update pipeline.
//!
//! [`PackageUpdater`] drives one complete update cycle for a package: branch
//! it, check the branched copy out into a scratch directory, let the
//! [`FileGenerator`] write the new package contents, stage and commit them,
//! wait for source services, and send a submit request back to the source
//! project. The scratch directory is removed on every exit path.

use crate::core::{ObsError, ObsResult};
use crate::package::Package;
use crate::process::{CommandError, CommandOutput, CommandRunner, RunOptions};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, error, info};

/// API of the reference Open Build Service instance.
pub const DEFAULT_API_URL: &str = "https://api.opensuse.org";

/// Generates the updated package contents.
///
/// Implementations write the new package files into the checked-out working
/// copy passed as `destination` and return the paths of the files they wrote,
/// relative to `destination`. The method is async so implementations can
/// fetch upstream release artifacts without blocking the runtime.
#[async_trait]
pub trait FileGenerator: Send + Sync {
    async fn add_files(&self, destination: &Path) -> anyhow::Result<Vec<PathBuf>>;
}

/// Configuration for a [`PackageUpdater`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// URL of the API of the targeted Open Build Service instance
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// The osc executable to invoke
    #[serde(default = "default_osc_binary")]
    pub osc_binary: String,

    /// Timeout applied to every osc invocation; `None` disables it
    #[serde(default = "default_command_timeout")]
    pub command_timeout: Option<Duration>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_osc_binary() -> String {
    "osc".to_string()
}

fn default_command_timeout() -> Option<Duration> {
    Some(Duration::from_secs(60))
}

fn default_true() -> bool {
    true
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            osc_binary: default_osc_binary(),
            command_timeout: default_command_timeout(),
        }
    }
}

/// Per-call knobs for [`PackageUpdater::update_package`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOptions {
    /// Branch into this project instead of the default home project
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_project: Option<String>,

    /// Send a submit request back to the source project after committing
    #[serde(default = "default_true")]
    pub submit_package: bool,

    /// Delete the branched package in the build service when the update fails
    #[serde(default)]
    pub cleanup_on_error: bool,

    /// Delete the branched package when the update produced no change
    #[serde(default = "default_true")]
    pub cleanup_on_no_change: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            target_project: None,
            submit_package: true,
            cleanup_on_error: false,
            cleanup_on_no_change: true,
        }
    }
}

/// Drives one complete update cycle for a package.
pub struct PackageUpdater {
    config: UpdaterConfig,
    generator: Arc<dyn FileGenerator>,
}

impl PackageUpdater {
    pub fn new(config: UpdaterConfig, generator: Arc<dyn FileGenerator>) -> Self {
        Self { config, generator }
    }

    /// Create an updater with the default configuration.
    pub fn with_defaults(generator: Arc<dyn FileGenerator>) -> Self {
        Self::new(UpdaterConfig::default(), generator)
    }

    /// The configuration this updater runs with.
    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Update `package` by branching it (optionally into
    /// `options.target_project`), writing the new files via the
    /// [`FileGenerator`], committing them with `commit_msg` as changelog
    /// entry and commit message, and sending a submit request back to the
    /// source project.
    ///
    /// If the generated files result in no change to the package, nothing is
    /// committed and the branched copy is removed again (unless
    /// `options.cleanup_on_no_change` is false).
    ///
    /// The scratch working directory is removed whether the update succeeds
    /// or fails. No step is retried internally; the first failure surfaces to
    /// the caller.
    pub async fn update_package(
        &self,
        package: &Package,
        commit_msg: &str,
        options: &UpdateOptions,
    ) -> ObsResult<()> {
        let workdir = TempDir::new()?;
        info!(package = %package, "updating package");
        debug!(workdir = %workdir.path().display(), "running update in scratch checkout");

        let runner = CommandRunner::new(RunOptions {
            cwd: Some(workdir.path().to_path_buf()),
            timeout: self.config.command_timeout,
            ..RunOptions::default()
        });

        let mut branched = None;
        let result = self
            .run_pipeline(package, commit_msg, options, workdir.path(), &runner, &mut branched)
            .await;

        if let Err(err) = &result {
            error!(package = %package, error = %err, "package update failed");
            if options.cleanup_on_error {
                if let Some(target) = &branched {
                    info!(package = %target, "removing branched package after failed update");
                    if let Err(cleanup_err) = self.rdelete(&runner, target, "cleanup on error").await
                    {
                        // keep the pipeline error, the cleanup failure is only logged
                        error!(
                            package = %target,
                            error = %cleanup_err,
                            "failed to remove branched package"
                        );
                    }
                }
            }
        }

        // Drop removes the workdir on the error path; close() surfaces
        // removal errors on the success path.
        if result.is_ok() {
            workdir.close()?;
        }
        result
    }

    async fn run_pipeline(
        &self,
        package: &Package,
        commit_msg: &str,
        options: &UpdateOptions,
        workdir: &Path,
        runner: &CommandRunner,
        branched: &mut Option<Package>,
    ) -> ObsResult<()> {
        let mut branch_args = vec!["branch", package.project.as_str(), package.package.as_str()];
        if let Some(target_project) = &options.target_project {
            branch_args.push(target_project);
        }
        let branch_out = self
            .osc(runner, &branch_args)
            .await
            .map_err(|source| ObsError::Branch {
                package: package.to_string(),
                source,
            })?;

        let target = parse_branch_target(&branch_out.stdout)?;
        let target_spec = target.to_string();
        *branched = Some(target.clone());

        let workdir_str = workdir.to_string_lossy();
        self.osc(runner, &["co", &target_spec, "-o", workdir_str.as_ref()])
            .await
            .map_err(|source| ObsError::Checkout {
                package: target_spec.clone(),
                source,
            })?;

        let written_files = self
            .generator
            .add_files(workdir)
            .await
            .map_err(ObsError::AddFiles)?;

        for file in &written_files {
            let file_str = file.to_string_lossy();
            self.osc(runner, &["add", file_str.as_ref()])
                .await
                .map_err(|source| ObsError::Staging {
                    file: file.display().to_string(),
                    source,
                })?;
        }

        let status = self.osc(runner, &["st"]).await?;
        if status.stdout.trim().is_empty() {
            info!(package = %package, "nothing changed, no update available");
            if options.cleanup_on_no_change {
                self.rdelete(runner, &target, "cleanup as nothing changed")
                    .await?;
            }
            return Ok(());
        }

        for subcommand in ["vc", "ci"] {
            self.osc(runner, &[subcommand, "-m", commit_msg])
                .await
                .map_err(|source| ObsError::Commit {
                    package: target_spec.clone(),
                    source,
                })?;
        }

        // let any source services finish before submitting
        self.osc(runner, &["service", "wait", &target.project, &target.package])
            .await?;

        if options.submit_package {
            self.osc(runner, &["sr", "--cleanup", "-m", commit_msg])
                .await
                .map_err(|source| ObsError::Submit {
                    package: target_spec.clone(),
                    source,
                })?;
        }

        Ok(())
    }

    async fn osc(
        &self,
        runner: &CommandRunner,
        args: &[&str],
    ) -> Result<CommandOutput, CommandError> {
        let mut full_args = vec!["-A", self.config.api_url.as_str()];
        full_args.extend_from_slice(args);
        runner.run(&self.config.osc_binary, &full_args).await
    }

    async fn rdelete(
        &self,
        runner: &CommandRunner,
        target: &Package,
        message: &str,
    ) -> Result<CommandOutput, CommandError> {
        let target_spec = target.to_string();
        self.osc(runner, &["rdelete", &target_spec, "-m", message])
            .await
    }
}

/// Extract the branched package from the ready-to-run checkout command that
/// `osc branch` prints on its third stdout line.
fn parse_branch_target(stdout: &str) -> ObsResult<Package> {
    let co_line = stdout.lines().nth(2).ok_or_else(|| {
        ObsError::UnexpectedOutput(format!("osc branch printed no checkout hint: '{}'", stdout))
    })?;
    let target = co_line.split_whitespace().last().ok_or_else(|| {
        ObsError::UnexpectedOutput(format!("empty checkout hint from osc branch: '{}'", stdout))
    })?;
    target.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRANCH_OUTPUT: &str = "A working copy of the branched package can be checked out with:\n\nosc co home:tester:branches:devel:tools/example\n";

    #[test]
    fn test_parse_branch_target() {
        let target = parse_branch_target(BRANCH_OUTPUT).unwrap();
        assert_eq!(target.project, "home:tester:branches:devel:tools");
        assert_eq!(target.package, "example");
    }

    #[test]
    fn test_parse_branch_target_truncated_output() {
        assert!(parse_branch_target("only one line\n").is_err());
        assert!(parse_branch_target("").is_err());
    }

    #[test]
    fn test_parse_branch_target_no_package_reference() {
        assert!(parse_branch_target("a\nb\nnot-a-package-reference\n").is_err());
    }

    #[test]
    fn test_default_config() {
        let config = UpdaterConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.osc_binary, "osc");
        assert_eq!(config.command_timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_default_options() {
        let options = UpdateOptions::default();
        assert_eq!(options.target_project, None);
        assert!(options.submit_package);
        assert!(!options.cleanup_on_error);
        assert!(options.cleanup_on_no_change);
    }
}
