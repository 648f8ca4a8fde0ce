//! Fail-fast sequential execution of external commands.
//!
//! A [`Pipeline`] runs [`Invocation`]s one after another in a fixed working
//! directory. The first failure latches: every later invocation is skipped and
//! returns an empty string, so a multi-step git transaction can be written as a
//! straight-line sequence and checked once at the end with [`Pipeline::finish`].
//!
//! The combined output of every command that ran (prefixed with the command
//! line) is accumulated, because the root cause of a failed git step is often
//! in an earlier command's output rather than the failing one's.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::{debug, trace, warn};

/// Why a pipeline stopped.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The command ran and exited unsuccessfully.
    #[error("`{command}` failed ({status})")]
    Exit { command: String, status: ExitStatus },

    /// The command could not be started, or its stdin could not be written.
    #[error("`{command}` could not be run: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// A failed pipeline: the triggering error plus everything the pipeline printed.
///
/// Displays as the accumulated output, which is what gets shown to users.
#[derive(Debug, Error)]
#[error("{output}")]
pub struct PipelineFailure {
    #[source]
    pub cause: PipelineError,
    pub output: String,
}

/// A single external command: program, arguments, extra environment and stdin.
#[derive(Debug, Clone)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    stdin: Option<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Invocation {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
        }
    }

    /// A `git` invocation with system and user configuration disabled.
    ///
    /// Ignoring `/etc/gitconfig` and `~/.gitconfig` keeps behaviour identical
    /// across hosts (no aliases, hooks paths or rerere), and terminal prompts
    /// are disabled so a missing credential fails instead of hanging.
    pub fn git<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::new("git")
            .args(args)
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_CONFIG_GLOBAL", "/dev/null")
            .env("GIT_TERMINAL_PROMPT", "0")
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable for this invocation only.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Pipes `input` to the command's standard input.
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// The command line as shown in logs and diagnostics.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command(&self, workdir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(workdir)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        cmd
    }
}

/// Runs invocations in order until the first failure.
#[derive(Debug)]
pub struct Pipeline {
    workdir: PathBuf,
    output: String,
    error: Option<PipelineError>,
}

impl Pipeline {
    /// Creates an empty pipeline whose commands all run in `workdir`.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Pipeline {
            workdir: workdir.into(),
            output: String::new(),
            error: None,
        }
    }

    /// Runs `invocation` unless an earlier one failed.
    ///
    /// Returns the command's trimmed standard output, or an empty string if
    /// the command was skipped or failed.
    pub fn run(&mut self, invocation: Invocation) -> String {
        let command = invocation.command_line();
        if self.error.is_some() {
            trace!(command = %command, "Skipping command after earlier failure");
            return String::new();
        }

        debug!(command = %command, workdir = %self.workdir.display(), "Running command");
        self.output.push_str("$ ");
        self.output.push_str(&command);
        self.output.push('\n');

        match execute(&invocation, &self.workdir) {
            Ok((status, stdout, stderr)) => {
                self.output.push_str(&stdout);
                self.output.push_str(&stderr);
                if !self.output.ends_with('\n') {
                    self.output.push('\n');
                }

                if status.success() {
                    stdout.trim().to_string()
                } else {
                    warn!(command = %command, %status, "Command failed");
                    self.error = Some(PipelineError::Exit { command, status });
                    String::new()
                }
            }
            Err(source) => {
                warn!(command = %command, error = %source, "Command could not be run");
                self.output.push_str(&source.to_string());
                self.output.push('\n');
                self.error = Some(PipelineError::Io { command, source });
                String::new()
            }
        }
    }

    /// Returns true once any invocation has failed.
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// The error that stopped the pipeline, if any.
    pub fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    /// Consumes the pipeline, returning the accumulated output on success or a
    /// [`PipelineFailure`] carrying all of it on failure.
    pub fn finish(self) -> Result<String, PipelineFailure> {
        match self.error {
            None => Ok(self.output),
            Some(cause) => Err(PipelineFailure {
                cause,
                output: self.output,
            }),
        }
    }
}

fn execute(invocation: &Invocation, workdir: &Path) -> std::io::Result<(ExitStatus, String, String)> {
    let mut child = invocation.to_command(workdir).spawn()?;

    if let Some(input) = &invocation.stdin
        && let Some(mut stdin) = child.stdin.take()
    {
        stdin.write_all(input.as_bytes())?;
        // Dropping `stdin` closes the pipe so the child sees EOF.
    }

    let out = child.wait_with_output()?;
    Ok((
        out.status,
        String::from_utf8_lossy(&out.stdout).into_owned(),
        String::from_utf8_lossy(&out.stderr).into_owned(),
    ))
}
