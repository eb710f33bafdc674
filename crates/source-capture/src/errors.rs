// Copyright 2026 Oxide Computer Company

//! Error types for source capture.

use camino::Utf8PathBuf;
use source_capture_types::{CommitIdParseError, RefPrefix};
use std::{ffi::OsString, io, num::ParseIntError, path::PathBuf};
use thiserror::Error;

// ---- Configuration errors ----

/// A required setting is missing or malformed.
///
/// These are surfaced immediately and never retried.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// The environment variable is set but is not valid UTF-8.
    #[error("${var} environment variable is not valid UTF-8: {value:?}")]
    NonUtf8 {
        /// The environment variable name.
        var: &'static str,
        /// The non-UTF-8 value.
        value: OsString,
    },

    /// The environment variable is not a valid number.
    #[error("${var} environment variable is not a valid number: {value:?}")]
    InvalidNumber {
        /// The environment variable name.
        var: &'static str,
        /// The value that failed to parse.
        value: String,
        /// The underlying parse error.
        #[source]
        source: ParseIntError,
    },

    /// A setting is out of its allowed range.
    #[error("invalid value for {setting}: {reason}")]
    InvalidValue {
        /// The setting name.
        setting: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// No read-write URL is configured for an internal repository.
    #[error("no read-write URL configured for internal repository {name:?}")]
    MissingRepoUrl {
        /// The logical repository name (may be empty if not known).
        name: String,
    },
}

// ---- Git errors ----

/// An error from running the git binary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GitError {
    /// Failed to spawn the git process.
    #[error("failed to run git at {binary_path:?} in {dir}")]
    SpawnFailed {
        /// The path to the git executable.
        binary_path: String,
        /// The working directory where the command was run.
        dir: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The git command exited unsuccessfully.
    #[error("`git {command}` failed ({exit_status}): {stderr}")]
    Failed {
        /// The git arguments, space-separated.
        command: String,
        /// A human-readable description of the exit status (e.g.,
        /// "exit status: 128").
        exit_status: String,
        /// The stderr output from git.
        stderr: String,
    },

    /// The git command succeeded but printed something that is not a
    /// commit id.
    #[error("`git {command}` returned unexpected output {stdout:?}")]
    UnexpectedOutput {
        /// The git arguments, space-separated.
        command: String,
        /// The stdout content.
        stdout: String,
        /// Why the output could not be parsed.
        #[source]
        source: CommitIdParseError,
    },

    /// The git command printed a different number of object ids than it
    /// was given inputs.
    #[error("`git {command}` printed {found} object ids for {expected} inputs")]
    ShortOutput {
        /// The git arguments, space-separated.
        command: String,
        /// How many ids were expected.
        expected: usize,
        /// How many ids were printed.
        found: usize,
    },
}

// ---- Fetch errors ----

/// An error that occurs while fetching external source into a working
/// tree.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// Cloning the external git repository failed.
    #[error("failed to clone {url}")]
    Clone {
        /// The external URL.
        url: String,
        /// The underlying git error.
        #[source]
        source: GitError,
    },

    /// The requested ref does not resolve to a commit.
    #[error("ref {reference:?} not found in {url}")]
    RefNotFound {
        /// The external URL.
        url: String,
        /// The requested ref.
        reference: String,
    },

    /// Checking out the resolved commit failed.
    #[error("failed to check out {reference:?} from {url}")]
    Checkout {
        /// The external URL.
        url: String,
        /// The requested ref.
        reference: String,
        /// The underlying git error.
        #[source]
        source: GitError,
    },

    /// The archive URL could not be interpreted.
    #[error("invalid archive URL {url:?}: {reason}")]
    InvalidUrl {
        /// The URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The HTTP request failed before a status was received, or the client
    /// could not be built.
    #[error("HTTP request for {url} failed")]
    Http {
        /// The URL.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("HTTP request for {url} returned {status}")]
    HttpStatus {
        /// The URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Reading the archive body failed.
    #[error("failed to read archive body from {url}")]
    ReadBody {
        /// The URL.
        url: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The archive is larger than the configured limit.
    #[error("archive at {url} exceeds size limit ({size} > {limit} bytes)")]
    TooLarge {
        /// The URL.
        url: String,
        /// The observed size (or a lower bound on it).
        size: u64,
        /// The configured limit.
        limit: u64,
    },

    /// The archive's compression or container format is not recognized.
    #[error(
        "unrecognized archive format at {url} \
         (expected tar, tar.gz or tar.xz)"
    )]
    UnknownFormat {
        /// The URL.
        url: String,
    },

    /// Decompressing or reading the tar stream failed.
    #[error("corrupt archive at {url}")]
    CorruptArchive {
        /// The URL.
        url: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An archive entry would be written outside the working tree.
    #[error("archive entry {path:?} escapes the working tree")]
    PathTraversal {
        /// The entry path (or link target) as found in the archive.
        path: String,
    },

    /// An archive entry has a type that is never extracted.
    #[error("archive entry {path:?} has unsupported type {entry_type}")]
    UnsafeEntry {
        /// The entry path.
        path: String,
        /// The tar entry type.
        entry_type: String,
    },

    /// The archive contains no entries.
    #[error("archive at {url} is empty")]
    EmptyArchive {
        /// The URL.
        url: String,
    },

    /// Writing an extracted entry failed.
    #[error("failed to extract {path}")]
    Extract {
        /// The destination path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

// ---- Commit errors ----

/// Every candidate name for a commit was already taken on the internal
/// remote.
#[derive(Debug, Error)]
#[error(
    "could not find a free {prefix} name after {attempts} attempts \
     (last tried {last_branch})"
)]
pub struct CommitConflictError {
    /// The prefix of the names tried.
    pub prefix: RefPrefix,
    /// How many names were tried.
    pub attempts: u32,
    /// The last branch name tried.
    pub last_branch: String,
}

/// An error that occurs while committing a tree into the internal
/// repository.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CommitError {
    /// Creating the scratch directory failed.
    #[error("failed to create scratch directory")]
    ScratchDir(#[source] io::Error),

    /// Cloning the internal repository failed.
    #[error("failed to clone internal repository {url}")]
    Clone {
        /// The internal read-write URL.
        url: String,
        /// The underlying git error.
        #[source]
        source: GitError,
    },

    /// Reading the working tree failed.
    #[error("failed to read working tree")]
    WorkTree(#[from] SnapshotError),

    /// Staging or committing the tree failed.
    #[error("failed to commit {work_dir}")]
    Commit {
        /// The working tree being committed.
        work_dir: Utf8PathBuf,
        /// The underlying git error.
        #[source]
        source: GitError,
    },

    /// Pushing failed for a reason other than a name collision.
    #[error("failed to push {branch} to {url}")]
    Push {
        /// The internal read-write URL.
        url: String,
        /// The branch being pushed.
        branch: String,
        /// The underlying git error.
        #[source]
        source: GitError,
    },

    /// The naming-collision retry budget was exhausted.
    #[error(transparent)]
    Conflict(#[from] CommitConflictError),
}

// ---- Adjust errors ----

/// The adjust collaborator failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdjustError {
    /// Adjustment was requested but no adjust provider was supplied.
    #[error("adjustment requested but no adjust provider is configured")]
    NotConfigured,

    /// Failed to spawn the adjust program.
    #[error("failed to run adjust program {program:?} in {work_dir}")]
    SpawnFailed {
        /// The program.
        program: String,
        /// The working tree.
        work_dir: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The adjust program exited unsuccessfully.
    #[error("adjust program {program:?} failed ({exit_status}): {stderr}")]
    Failed {
        /// The program.
        program: String,
        /// A human-readable description of the exit status.
        exit_status: String,
        /// The stderr output.
        stderr: String,
    },

    /// A caller-supplied adjust provider failed.
    #[error("adjust provider failed")]
    Provider(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl AdjustError {
    /// Wraps an arbitrary error from a caller-supplied adjust provider.
    pub fn provider(
        error: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        AdjustError::Provider(error.into())
    }
}

// ---- Snapshot errors ----

/// An error that occurs while snapshotting a working tree.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SnapshotError {
    /// Walking or reading the tree failed.
    #[error("failed to read {path} while snapshotting")]
    Io {
        /// The path being read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A path in the tree is not valid UTF-8.
    #[error("path {} is not valid UTF-8", .path.display())]
    NonUtf8Path {
        /// The offending path.
        path: PathBuf,
    },
}

// ---- Top-level errors ----

/// An error that aborts an ingestion run.
///
/// A pull commit that was already pushed when a later step fails stays in
/// the internal repository.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CaptureError {
    /// Required configuration is missing or malformed.
    #[error("configuration error")]
    Configuration(#[from] ConfigurationError),

    /// Creating the working tree failed.
    #[error("failed to create working tree")]
    WorkingTree(#[source] io::Error),

    /// Fetching the external source failed.
    #[error("failed to fetch source")]
    Fetch(#[from] FetchError),

    /// Committing into the internal repository failed.
    #[error("failed to commit to internal repository")]
    Commit(#[from] CommitError),

    /// The adjust step failed.
    #[error("adjust step failed")]
    Adjust(#[from] AdjustError),

    /// Snapshotting the working tree failed.
    #[error("failed to snapshot working tree")]
    Snapshot(#[from] SnapshotError),
}
