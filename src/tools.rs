//! Narrow interface over external tool invocations.
//!
//! Every subprocess the pipeline needs (`hdiutil`, `xattr`, `osascript`,
//! `open`, `rm`, `ditto`) goes through [`ToolRunner`], with an explicit
//! argument list and a captured exit status. Tests substitute scripted
//! fakes so nothing real is ever spawned.

use std::io;
use std::process::{Command, Stdio};

/// Captured result of one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit code, or `None` if terminated by a signal.
    pub status: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ToolOutput {
    /// `true` if the tool exited with status 0.
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// First line of stderr, for compact error messages.
    pub fn stderr_brief(&self) -> &str {
        self.stderr.lines().next().unwrap_or("").trim()
    }
}

/// Runs an external tool and captures its output.
pub trait ToolRunner: Send + Sync {
    /// Run `program` with `args`, waiting for it to exit.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process could not be spawned or
    /// waited on; a non-zero exit is reported through [`ToolOutput`].
    fn run(&self, program: &str, args: &[&str]) -> io::Result<ToolOutput>;
}

/// The real runner, backed by [`std::process::Command`].
#[derive(Debug, Default)]
pub struct CommandRunner;

impl ToolRunner for CommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> io::Result<ToolOutput> {
        tracing::debug!(program, ?args, "running external tool");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        Ok(ToolOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
