// Copyright 2026 Oxide Computer Company

//! Data types for capturing external source into an internal repository.
//!
//! A capture run takes a [`PullSpec`] (a git ref or an archive URL), commits
//! the fetched tree into an internal git repository under a
//! `pull-<epoch>` branch with a `pull-<epoch>-root` tag, and optionally a
//! second `adjust-<epoch>` commit on top of it. The run's outcome is a
//! [`CaptureResult`].
//!
//! This crate only holds the types; the pipeline itself lives in
//! `source-capture`.
//!
//! # Examples
//!
//! ```
//! use source_capture_types::{PullSpec, RefName, RefPrefix, SourceType};
//!
//! let spec: PullSpec = serde_json::from_str(
//!     r#"{"name": "demo", "type": "git", "url": "https://example.com/demo.git",
//!         "ref": "v1.0"}"#,
//! )
//! .unwrap();
//! assert_eq!(spec.source_type, SourceType::Git);
//! assert!(!spec.adjust);
//!
//! let name: RefName = "pull-1700000000-root".parse().unwrap();
//! assert_eq!(name.prefix(), RefPrefix::Pull);
//! assert_eq!(name.branch(), "pull-1700000000");
//! ```

#![deny(missing_docs)]

mod commit;
mod errors;
mod naming;
mod origin;
mod result;
mod spec;

pub use commit::CommitId;
pub use errors::{CommitIdParseError, RefNameParseError, SourceTypeParseError};
pub use naming::{RefName, RefPrefix, TAG_SUFFIX};
pub use origin::Origin;
pub use result::{
    AdjustResult, CaptureReport, CaptureResult, InternalRef, PullResult,
};
pub use spec::{InternalRepo, PullSpec, SourceType};
