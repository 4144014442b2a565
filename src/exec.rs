// src/exec.rs

//! External tool execution
//!
//! Merge and conversion tools are opaque executables. They are described by a
//! [`CommandSpec`] and run through a [`CommandRunner`], which returns the exit
//! status together with the captured output. Output is buffered in memory;
//! these tools write little and it is only surfaced when they fail.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tracing::{debug, warn};

/// How to launch an external tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    /// Direct invocation with an argument list (no shell interpretation)
    Program { program: PathBuf, args: Vec<OsString> },
    /// Command string interpreted by the platform shell
    Shell(String),
}

impl CommandSpec {
    pub fn program<P, I, A>(program: P, args: I) -> Self
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self::Program {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn shell(command: impl Into<String>) -> Self {
        Self::Shell(command.into())
    }

    /// Short name for logs and error messages
    pub fn display_name(&self) -> String {
        match self {
            Self::Program { program, .. } => program
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| program.display().to_string()),
            Self::Shell(command) => command
                .split_whitespace()
                .next()
                .unwrap_or("shell")
                .trim_matches(['"', '\''])
                .to_string(),
        }
    }
}

/// Exit status and captured streams of a finished tool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Message describing a failed run
    ///
    /// Standard error is preferred, then standard output, then the exit code.
    pub fn failure_message(&self, name: &str) -> String {
        let stderr = self.stderr.trim();
        let stdout = self.stdout.trim();
        if !stderr.is_empty() {
            stderr.to_string()
        } else if !stdout.is_empty() {
            stdout.to_string()
        } else {
            match self.code {
                Some(code) => format!("{name} exited with code {code}"),
                None => format!("{name} was terminated by a signal"),
            }
        }
    }
}

/// Runs external tools
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `spec` to completion and capture its output
    ///
    /// A non-zero exit is not an error at this level; see [`run_checked`].
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Runner that spawns real child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    fn build(spec: &CommandSpec) -> tokio::process::Command {
        let mut command = match spec {
            CommandSpec::Program { program, args } => {
                let mut command = tokio::process::Command::new(program);
                command.args(args);
                command
            }
            CommandSpec::Shell(line) if cfg!(windows) => {
                let mut command = tokio::process::Command::new("cmd");
                command.arg("/C").arg(line);
                command
            }
            CommandSpec::Shell(line) => {
                let mut command = tokio::process::Command::new("sh");
                command.arg("-c").arg(line);
                command
            }
        };

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let name = spec.display_name();
        debug!("Running {:?}", spec);

        let output = Self::build(spec).output().await.map_err(|e| {
            Error::IoError(format!("Failed to start {name}: {e}"))
        })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run a tool and turn a non-zero exit into [`Error::SubprocessError`]
pub async fn run_checked(runner: &dyn CommandRunner, spec: &CommandSpec) -> Result<CommandOutput> {
    let output = runner.run(spec).await?;
    if output.success() {
        return Ok(output);
    }

    let name = spec.display_name();
    let message = output.failure_message(&name);
    warn!("{} failed ({:?}): {}", name, output.code, message);
    Err(Error::SubprocessError {
        program: name,
        code: output.code,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        let spec = CommandSpec::program("/opt/tools/binmerge.exe", ["--outdir", "/tmp"]);
        assert_eq!(spec.display_name(), "binmerge.exe");
        assert_eq!(
            CommandSpec::shell("\"cue2pops\" \"a.cue\" \"b.vcd\"").display_name(),
            "cue2pops"
        );
    }

    #[test]
    fn test_failure_message_preference() {
        let output = CommandOutput {
            code: Some(1),
            stdout: "progress 50%\n".to_string(),
            stderr: "  bad sheet\n".to_string(),
        };
        assert_eq!(output.failure_message("tool"), "bad sheet");

        let output = CommandOutput {
            code: Some(1),
            stdout: "only stdout\n".to_string(),
            stderr: String::new(),
        };
        assert_eq!(output.failure_message("tool"), "only stdout");

        let output = CommandOutput {
            code: Some(3),
            ..Default::default()
        };
        assert_eq!(output.failure_message("tool"), "tool exited with code 3");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_shell_failure() {
        let spec = CommandSpec::shell("echo oops >&2; exit 4");
        let err = run_checked(&SystemRunner, &spec).await.unwrap_err();
        match err {
            Error::SubprocessError { code, message, .. } => {
                assert_eq!(code, Some(4));
                assert_eq!(message, "oops");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_program_args_not_shell_expanded() {
        let spec = CommandSpec::program("echo", ["$HOME", "a b"]);
        let output = run_checked(&SystemRunner, &spec).await.unwrap();
        assert_eq!(output.stdout.trim(), "$HOME a b");
    }

    #[tokio::test]
    async fn test_missing_program_is_io_error() {
        let spec = CommandSpec::program("/definitely/not/a/tool", Vec::<String>::new());
        let err = SystemRunner.run(&spec).await.unwrap_err();
        assert!(matches!(err, Error::IoError(_)));
    }
}
