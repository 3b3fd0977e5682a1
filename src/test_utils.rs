//! Shared test utilities.
//!
//! A scripted [`ToolRunner`] fake used by the installer, mounter, and
//! orchestrator tests, so no test ever spawns a real subprocess.

use crate::tools::{ToolOutput, ToolRunner};
use std::io;
use std::sync::Mutex;

/// One recorded tool invocation: program name plus full argv.
pub type RecordedCall = (String, Vec<String>);

/// Scripted behavior for a single tool, keyed by program name.
type Script = Box<dyn Fn(&[&str]) -> io::Result<ToolOutput> + Send + Sync>;

/// A [`ToolRunner`] that records every invocation and answers from
/// per-program scripts. Programs without a script succeed with empty
/// output.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<RecordedCall>>,
    scripts: Mutex<Vec<(String, Script)>>,
}

impl RecordingRunner {
    /// A runner where every tool succeeds with empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the response for `program`. The closure receives the argv
    /// and returns the simulated output (or a spawn error).
    pub fn script<F>(self, program: &str, f: F) -> Self
    where
        F: Fn(&[&str]) -> io::Result<ToolOutput> + Send + Sync + 'static,
    {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.push((program.to_owned(), Box::new(f)));
        }
        self
    }

    /// Script `program` to fail with exit status 1 and the given stderr.
    pub fn failing(self, program: &str, stderr: &str) -> Self {
        let stderr = stderr.to_owned();
        self.script(program, move |_| {
            Ok(ToolOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: stderr.clone(),
            })
        })
    }

    /// All invocations recorded so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of invocations of `program`.
    pub fn count_of(&self, program: &str) -> usize {
        self.calls()
            .iter()
            .filter(|(name, _)| name == program)
            .count()
    }
}

/// An invocation that succeeds with empty output.
pub fn ok_output() -> ToolOutput {
    ToolOutput {
        status: Some(0),
        stdout: String::new(),
        stderr: String::new(),
    }
}

impl ToolRunner for RecordingRunner {
    fn run(&self, program: &str, args: &[&str]) -> io::Result<ToolOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((
                program.to_owned(),
                args.iter().map(|a| (*a).to_owned()).collect(),
            ));
        }
        let scripts = self
            .scripts
            .lock()
            .map_err(|_| io::Error::other("script lock poisoned"))?;
        for (name, script) in scripts.iter() {
            if name == program {
                return script(args);
            }
        }
        Ok(ok_output())
    }
}
