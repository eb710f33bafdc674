// Copyright 2026 Oxide Computer Company

//! Provenance of captured source.

use crate::{PullSpec, RefPrefix, SourceType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a captured tree came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    /// The external URL the tree was fetched from.
    pub url: String,
    /// The external reference (branch, tag or commit; empty for archives
    /// without one).
    pub reference: String,
    /// How the tree was fetched.
    #[serde(rename = "type")]
    pub source_type: SourceType,
}

impl Origin {
    /// Creates an origin record.
    pub fn new(
        url: impl Into<String>,
        reference: impl Into<String>,
        source_type: SourceType,
    ) -> Self {
        Origin { url: url.into(), reference: reference.into(), source_type }
    }

    /// Returns the origin of the tree fetched for `spec`.
    pub fn from_spec(spec: &PullSpec) -> Self {
        Origin::new(&spec.url, spec.origin_ref(), spec.source_type)
    }

    /// Returns the annotated tag message recorded for this origin.
    ///
    /// The format is consumed by audit tooling and must not change:
    ///
    /// ```text
    /// Origin: <url>
    ///     Reference: <reference>
    ///     Type: <type>
    /// ```
    pub fn tag_message(&self) -> String {
        self.to_string()
    }

    /// Returns the commit message for a commit of this origin.
    pub fn commit_message(&self, prefix: RefPrefix) -> String {
        format!("{prefix}: {} at {}\n\n{self}\n", self.url, self.reference)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Origin: {}\n    Reference: {}\n    Type: {}",
            self.url, self.reference, self.source_type
        )
    }
}
