//! Common utilities for integration tests.

use async_trait::async_trait;
use obs_update::FileGenerator;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Print debug logs during a test when RUST_LOG is set.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Behavior knobs for the stub `osc` executable the pipeline tests run
/// against. The stub records the argv of every invocation to a log file.
pub struct StubOsc {
    /// Branch target printed in the checkout hint of `osc branch`
    pub branch_target: String,
    /// Output of `osc st`
    pub status_output: String,
    /// Subcommand that exits non-zero
    pub fail_on: Option<String>,
    /// File created inside the working copy by `osc co`
    pub checkout_file: Option<String>,
}

impl Default for StubOsc {
    fn default() -> Self {
        Self {
            branch_target: "home:tester:branches:devel:tools/example".to_string(),
            status_output: "M    example.spec".to_string(),
            fail_on: None,
            checkout_file: None,
        }
    }
}

impl StubOsc {
    /// Write the stub executable into `dir` and return its path together
    /// with the log file it records every invocation to.
    pub fn install(&self, dir: &Path) -> (PathBuf, PathBuf) {
        let log = dir.join("osc.log");
        let script = dir.join("osc");
        let fail_on = self.fail_on.as_deref().unwrap_or("__none__");
        let checkout_cmd = match &self.checkout_file {
            Some(file) => format!("touch \"$4/{}\"", file),
            None => ":".to_string(),
        };

        let body = format!(
            r#"#!/bin/sh
echo "$@" >> "{log}"
shift 2
cmd="$1"
if [ "$cmd" = "{fail_on}" ]; then
    echo "stub: refusing to run $cmd" >&2
    exit 1
fi
case "$cmd" in
    branch)
        echo "A working copy of the branched package can be checked out with:"
        echo ""
        echo "osc co {branch_target}"
        ;;
    co)
        {checkout_cmd}
        ;;
    st)
        printf '%s' '{status_output}'
        ;;
esac
exit 0
"#,
            log = log.display(),
            fail_on = fail_on,
            branch_target = self.branch_target,
            checkout_cmd = checkout_cmd,
            status_output = self.status_output,
        );

        fs::write(&script, body).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        (script, log)
    }
}

/// Read the recorded osc invocations, one argv line per call.
pub fn recorded_calls(log: &Path) -> Vec<String> {
    match fs::read_to_string(log) {
        Ok(content) => content.lines().map(str::to_string).collect(),
        Err(_) => Vec::new(),
    }
}

/// The osc subcommand of every recorded invocation (the argument after
/// `-A <api-url>`).
pub fn recorded_subcommands(log: &Path) -> Vec<String> {
    recorded_calls(log)
        .iter()
        .filter_map(|call| call.split_whitespace().nth(2).map(str::to_string))
        .collect()
}

/// Generator that returns a fixed file list and records every destination it
/// was invoked with.
pub struct RecordingGenerator {
    pub files: Vec<PathBuf>,
    pub destinations: Mutex<Vec<PathBuf>>,
}

impl RecordingGenerator {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            destinations: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl FileGenerator for RecordingGenerator {
    async fn add_files(&self, destination: &Path) -> anyhow::Result<Vec<PathBuf>> {
        self.destinations
            .lock()
            .unwrap()
            .push(destination.to_path_buf());
        Ok(self.files.clone())
    }
}

/// Generator whose hook always fails.
pub struct FailingGenerator {
    pub destinations: Mutex<Vec<PathBuf>>,
}

impl FailingGenerator {
    pub fn new() -> Self {
        Self {
            destinations: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl FileGenerator for FailingGenerator {
    async fn add_files(&self, destination: &Path) -> anyhow::Result<Vec<PathBuf>> {
        self.destinations
            .lock()
            .unwrap()
            .push(destination.to_path_buf());
        anyhow::bail!("generator exploded")
    }
}

/// Generator that removes everything from the working copy and returns an
/// empty file list.
pub struct DeleteAllGenerator {
    pub removed: Mutex<Vec<PathBuf>>,
    pub destinations: Mutex<Vec<PathBuf>>,
}

impl DeleteAllGenerator {
    pub fn new() -> Self {
        Self {
            removed: Mutex::new(Vec::new()),
            destinations: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl FileGenerator for DeleteAllGenerator {
    async fn add_files(&self, destination: &Path) -> anyhow::Result<Vec<PathBuf>> {
        self.destinations
            .lock()
            .unwrap()
            .push(destination.to_path_buf());
        for entry in fs::read_dir(destination)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
            }
            self.removed.lock().unwrap().push(entry.path());
        }
        Ok(Vec::new())
    }
}
