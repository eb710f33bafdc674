// Copyright 2026 Oxide Computer Company

//! Capture external source code into an internal git repository.
//!
//! Each run fetches one external source (a git ref, or a tar archive over
//! HTTP), commits the tree into the internal repository as a root commit on
//! a fresh `pull-<epoch>` branch, and tags it `pull-<epoch>-root` with an
//! annotated tag recording where the tree came from. If adjustment is
//! requested, an adjust step may then rewrite the tree; when it changed
//! anything, the result is committed on an `adjust-<epoch>` branch whose
//! only parent is the pull commit.
//!
//! Internal refs are never rewritten. A name that is already taken on the
//! remote is retried with a later timestamp.
//!
//! # Usage
//!
//! ```no_run
//! use source_capture::{
//!     CaptureConfig, CommandAdjuster, Ingestor, StaticRepoProvider,
//! };
//! use source_capture_types::PullSpec;
//!
//! let config = CaptureConfig::from_env().expect("valid environment");
//! let ingestor = Ingestor::new(config);
//! let repos = StaticRepoProvider::new("", "ssh://git.internal/demo.git")
//!     .expect("read-write URL is set");
//! let adjuster = CommandAdjuster::new("./adjust.sh");
//!
//! let spec = PullSpec::archive("demo", "https://example.com/demo.tar.xz")
//!     .with_adjust(true);
//! let report = ingestor
//!     .pull(&spec, &repos, Some(&adjuster))
//!     .expect("capture succeeded");
//! println!("{}", serde_json::to_string_pretty(&report).unwrap());
//! ```

#![deny(missing_docs)]

mod archive;
mod config;
mod errors;
mod fetch;
mod git;
mod ingest;
mod internal;
mod snapshot;

pub use config::{
    CaptureConfig, DEFAULT_HTTP_TIMEOUT, DEFAULT_MAX_DOWNLOAD_SIZE,
    DEFAULT_NAME_ATTEMPTS, Identity,
};
pub use errors::{
    AdjustError, CaptureError, CommitConflictError, CommitError,
    ConfigurationError, FetchError, GitError, SnapshotError,
};
pub use fetch::SourceFetcher;
pub use git::Git;
pub use ingest::{
    AdjustMetadata, AdjustProvider, CommandAdjuster, Ingestor, RepoProvider,
    StaticRepoProvider,
};
pub use internal::{Clock, InternalRepositoryClient, SystemClock};
pub use snapshot::TreeSnapshot;
