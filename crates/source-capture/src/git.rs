// Copyright 2026 Oxide Computer Company

//! Thin wrapper around the git binary.

use crate::{ConfigurationError, GitError, config::read_env};
use camino::Utf8Path;
use source_capture_types::CommitId;
use std::{
    io::{self, Write},
    process::{Command, Output, Stdio},
};

/// The git binary used for every repository operation.
///
/// Commands run with interactive prompts disabled and stdin closed, so a
/// remote that asks for credentials fails instead of hanging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Git {
    binary: String,
}

impl Default for Git {
    fn default() -> Self {
        Git { binary: "git".to_owned() }
    }
}

impl Git {
    /// Uses the given binary.
    pub fn new(binary: impl Into<String>) -> Self {
        Git { binary: binary.into() }
    }

    /// Uses the `$GIT` environment variable, or `"git"`.
    ///
    /// Returns an error if `$GIT` is set but is not valid UTF-8.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Ok(Git { binary: read_env("GIT", "git")? })
    }

    /// Returns the path to the git binary.
    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn command(&self, dir: &Utf8Path, args: &[&str]) -> Command {
        tracing::debug!(dir = %dir, "git {}", args.join(" "));
        let mut command = Command::new(&self.binary);
        command
            .current_dir(dir)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0");
        command
    }

    fn spawn_failed(&self, dir: &Utf8Path, source: io::Error) -> GitError {
        GitError::SpawnFailed {
            binary_path: self.binary.clone(),
            dir: dir.to_owned(),
            source,
        }
    }

    /// Runs git in `dir` and returns the raw output, whatever the exit
    /// status.
    pub(crate) fn output(
        &self,
        dir: &Utf8Path,
        args: &[&str],
    ) -> Result<Output, GitError> {
        self.command(dir, args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| self.spawn_failed(dir, source))
    }

    /// Runs git in `dir` and returns its stdout, failing on a non-zero
    /// exit.
    pub(crate) fn run(
        &self,
        dir: &Utf8Path,
        args: &[&str],
    ) -> Result<String, GitError> {
        let output = self.output(dir, args)?;
        check_output(args, output)
    }

    /// Like [`run`](Self::run), with `input` written to git's stdin.
    pub(crate) fn run_with_input(
        &self,
        dir: &Utf8Path,
        args: &[&str],
        input: &[u8],
    ) -> Result<String, GitError> {
        let mut child = self
            .command(dir, args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| self.spawn_failed(dir, source))?;

        // Feed stdin from another thread so a large stdout cannot deadlock
        // the pipe.
        let stdin = child.stdin.take();
        let output = std::thread::scope(|s| {
            if let Some(mut stdin) = stdin {
                s.spawn(move || {
                    // A failed write means git already exited; its status
                    // says why.
                    let _ = stdin.write_all(input);
                });
            }
            child.wait_with_output()
        })
        .map_err(|source| self.spawn_failed(dir, source))?;
        check_output(args, output)
    }

    /// Runs a git command that prints one object id per input line, and
    /// returns the ids in order.
    pub(crate) fn run_object_ids(
        &self,
        dir: &Utf8Path,
        args: &[&str],
        input: &[u8],
        expected: usize,
    ) -> Result<Vec<String>, GitError> {
        let stdout = self.run_with_input(dir, args, input)?;
        let ids: Vec<String> = stdout.lines().map(str::to_owned).collect();
        if ids.len() != expected {
            return Err(GitError::ShortOutput {
                command: args.join(" "),
                expected,
                found: ids.len(),
            });
        }
        Ok(ids)
    }

    /// Runs a git command that prints a single object id.
    pub(crate) fn run_commit_id(
        &self,
        dir: &Utf8Path,
        args: &[&str],
    ) -> Result<CommitId, GitError> {
        let stdout = self.run(dir, args)?;
        CommitId::from_git_output(&stdout).map_err(|source| {
            GitError::UnexpectedOutput {
                command: args.join(" "),
                stdout: stdout.trim().to_owned(),
                source,
            }
        })
    }

    /// Resolves `rev` to a commit in the repository at `dir`, returning
    /// `None` if it does not name a commit.
    pub(crate) fn resolve_commit(
        &self,
        dir: &Utf8Path,
        rev: &str,
    ) -> Result<Option<CommitId>, GitError> {
        let spec = format!("{rev}^{{commit}}");
        let args = ["rev-parse", "--verify", "--quiet", spec.as_str()];
        let output = self.output(dir, &args)?;
        if !output.status.success() {
            return Ok(None);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        CommitId::from_git_output(&stdout).map(Some).map_err(|source| {
            GitError::UnexpectedOutput {
                command: args.join(" "),
                stdout: stdout.trim().to_owned(),
                source,
            }
        })
    }
}

fn check_output(args: &[&str], output: Output) -> Result<String, GitError> {
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(GitError::Failed {
            command: args.join(" "),
            exit_status: output.status.to_string(),
            stderr: stderr.trim().to_string(),
        })
    }
}
