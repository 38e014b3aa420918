//! Process execution seam.
//!
//! Inspectors probe interpreters by running them; the trait keeps that
//! behind a mockable boundary so tests never spawn real processes.

use std::io;
use std::path::Path;
use std::process::Command;

/// Captured output of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Stdout followed by stderr, lossily decoded. Version banners land on
    /// either stream depending on the interpreter.
    pub fn combined(&self) -> String {
        let mut s = String::from_utf8_lossy(&self.stdout).into_owned();
        s.push_str(&String::from_utf8_lossy(&self.stderr));
        s
    }
}

/// Runs an executable and captures its output.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args`, optionally in `cwd`. A non-zero exit
    /// status is an error.
    fn run(&self, program: &Path, args: &[&str], cwd: Option<&Path>) -> io::Result<CommandOutput>;
}

/// The real runner.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, program: &Path, args: &[&str], cwd: Option<&Path>) -> io::Result<CommandOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        let output = cmd.output()?;
        if !output.status.success() {
            return Err(io::Error::other(format!(
                "{} exited with {}: {}",
                program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(CommandOutput {
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
