//! External command execution.
//!
//! [`Invocation`] is a plain value describing one external command — program
//! plus argument vector, no shell involved. [`CommandRunner`] is the seam
//! between command planning and the operating system: production code uses
//! [`SystemRunner`]; tests use the recording `MockRunner` so the whole
//! pipeline runs without ImageMagick installed.

use std::path::Path;
use std::process::{Command, Output, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
}

/// One external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.display().to_string());
        self
    }

    /// Shell-quoted display form, recorded in summaries and reports.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Quote an argument the way a POSIX shell would need it typed.
fn quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Captured result of one external command (or pipeline stage).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// Process exit code; -1 when terminated by signal.
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    fn from_output(output: Output) -> Self {
        Self {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Executes planned invocations. Implemented by [`SystemRunner`] for real
/// runs and by the test mock for everything else.
pub trait CommandRunner {
    /// Run one command to completion, capturing stdout and stderr.
    fn run(&self, cmd: &Invocation) -> Result<RunOutput, ExecError>;

    /// Run `producer | consumer`, producer stdout feeding consumer stdin.
    /// A failed producer is surfaced as the pipeline's result.
    fn run_piped(
        &self,
        producer: &Invocation,
        consumer: &Invocation,
    ) -> Result<RunOutput, ExecError>;
}

/// Spawns real processes.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &Invocation) -> Result<RunOutput, ExecError> {
        let output = Command::new(&cmd.program)
            .args(&cmd.args)
            .output()
            .map_err(|source| ExecError::Spawn {
                program: cmd.program.clone(),
                source,
            })?;
        Ok(RunOutput::from_output(output))
    }

    fn run_piped(
        &self,
        producer: &Invocation,
        consumer: &Invocation,
    ) -> Result<RunOutput, ExecError> {
        let spawn_err = |program: &str, source: std::io::Error| ExecError::Spawn {
            program: program.to_string(),
            source,
        };

        let mut first = Command::new(&producer.program)
            .args(&producer.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_err(&producer.program, e))?;

        let stdout = first
            .stdout
            .take()
            .ok_or_else(|| spawn_err(&producer.program, std::io::Error::other("no stdout pipe")))?;

        let second = Command::new(&consumer.program)
            .args(&consumer.args)
            .stdin(Stdio::from(stdout))
            .output()
            .map_err(|e| spawn_err(&consumer.program, e))?;

        let first = first
            .wait_with_output()
            .map_err(|e| spawn_err(&producer.program, e))?;

        if !first.status.success() {
            return Ok(RunOutput::from_output(first));
        }
        Ok(RunOutput::from_output(second))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Runner that records every invocation and answers from a script
    /// closure. Uses Mutex so shared references stay usable across helpers.
    pub struct MockRunner {
        script: Box<dyn Fn(&Invocation) -> RunOutput + Send + Sync>,
        calls: Mutex<Vec<Invocation>>,
    }

    impl MockRunner {
        /// Every command succeeds with empty output.
        pub fn ok() -> Self {
            Self::with(|_| RunOutput {
                status: 0,
                stdout: String::new(),
                stderr: String::new(),
            })
        }

        pub fn with(script: impl Fn(&Invocation) -> RunOutput + Send + Sync + 'static) -> Self {
            Self {
                script: Box::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<Invocation> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_lines(&self) -> Vec<String> {
            self.calls().iter().map(Invocation::display).collect()
        }
    }

    /// Convenience constructor for scripted outputs.
    pub fn output(status: i32, stdout: &str, stderr: &str) -> RunOutput {
        RunOutput {
            status,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    impl CommandRunner for MockRunner {
        fn run(&self, cmd: &Invocation) -> Result<RunOutput, ExecError> {
            self.calls.lock().unwrap().push(cmd.clone());
            Ok((self.script)(cmd))
        }

        fn run_piped(
            &self,
            producer: &Invocation,
            consumer: &Invocation,
        ) -> Result<RunOutput, ExecError> {
            self.calls.lock().unwrap().push(producer.clone());
            self.calls.lock().unwrap().push(consumer.clone());
            Ok((self.script)(consumer))
        }
    }

    #[test]
    fn display_quotes_only_when_needed() {
        let cmd = Invocation::new("magick")
            .arg("in.png")
            .arg("-resize")
            .arg("100x100")
            .arg("my file.png");
        assert_eq!(cmd.display(), "magick in.png -resize 100x100 'my file.png'");
    }

    #[test]
    fn display_escapes_single_quotes() {
        let cmd = Invocation::new("magick").arg("it's.png");
        assert_eq!(cmd.display(), r"magick 'it'\''s.png'");
    }

    #[test]
    fn mock_records_calls_in_order() {
        let runner = MockRunner::ok();
        runner.run(&Invocation::new("a")).unwrap();
        runner.run(&Invocation::new("b")).unwrap();
        assert_eq!(runner.call_lines(), vec!["a", "b"]);
    }

    #[test]
    fn mock_scripts_failures() {
        let runner = MockRunner::with(|cmd| {
            if cmd.program == "magick" {
                output(1, "", "boom")
            } else {
                output(0, "", "")
            }
        });
        let out = runner.run(&Invocation::new("magick")).unwrap();
        assert_eq!(out.status, 1);
        assert_eq!(out.stderr, "boom");
    }
}
