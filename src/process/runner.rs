use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// The captured result of a finished subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// The exit code
    pub exit_code: i32,
    /// Decoded standard output
    pub stdout: String,
    /// Decoded standard error
    pub stderr: String,
}

impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "exit code {}, stdout: '{}', stderr: '{}'",
            self.exit_code, self.stdout, self.stderr
        )
    }
}

/// A subprocess that could not be run to a successful exit.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command `{command}` failed with {output}")]
    Failed {
        command: String,
        output: CommandOutput,
    },

    #[error("command `{command}` timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
}

/// Options applied to a subprocess invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Working directory for the subprocess (defaults to the current one)
    pub cwd: Option<PathBuf>,

    /// Terminate the subprocess if it runs longer than this
    pub timeout: Option<Duration>,

    /// Extra environment variables, added to the inherited environment
    pub env: Vec<(String, String)>,

    /// Turn a non-zero exit into [`CommandError::Failed`] (defaults to true)
    pub check: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            timeout: None,
            env: Vec::new(),
            check: true,
        }
    }
}

fn render_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Run a subprocess and capture its output.
///
/// Standard output and standard error are captured and decoded lossily. A
/// non-zero exit becomes [`CommandError::Failed`] unless `options.check` is
/// false, in which case the [`CommandOutput`] is returned for the caller to
/// inspect.
pub async fn run_cmd(
    program: &str,
    args: &[&str],
    options: &RunOptions,
) -> Result<CommandOutput, CommandError> {
    let command_line = render_command(program, args);
    debug!(command = %command_line, "running command");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // reap the child if the timeout fires or the task is cancelled
        .kill_on_drop(true);
    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }
    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    let result = match options.timeout {
        Some(timeout) => match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(result) => result,
            Err(_) => {
                return Err(CommandError::TimedOut {
                    command: command_line,
                    timeout,
                })
            }
        },
        None => cmd.output().await,
    };

    let output = result.map_err(|source| CommandError::Spawn {
        command: command_line.clone(),
        source,
    })?;

    // a None exit code means the child was killed by a signal
    let exit_code = output.status.code().unwrap_or(-1);
    let output = CommandOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    debug!(
        command = %command_line,
        exit_code = output.exit_code,
        stdout = %output.stdout,
        stderr = %output.stderr,
        "command terminated"
    );

    if options.check && output.exit_code != 0 {
        return Err(CommandError::Failed {
            command: command_line,
            output,
        });
    }

    Ok(output)
}

/// Runs commands with a shared set of [`RunOptions`].
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    options: RunOptions,
}

impl CommandRunner {
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    /// The options applied to every command.
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
        run_cmd(program, args, &self.options).await
    }
}

/// Run a fallible async operation up to `attempts` times, returning the first
/// success or the last error. Failures are logged at debug level.
pub async fn retry<T, E, F, Fut>(attempts: usize, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                debug!(attempt, error = %err, "retried operation failed");
                if attempt >= attempts {
                    return Err(err);
                }
            }
        }
    }
}
