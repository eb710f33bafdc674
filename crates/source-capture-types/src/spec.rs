// Copyright 2026 Oxide Computer Company

//! Inputs to an ingestion run.

use crate::SourceTypeParseError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// How the external source is fetched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Clone a git repository and check out a ref.
    Git,
    /// Download and extract a tar archive.
    Archive,
}

impl SourceType {
    /// Returns the name recorded in the `Type:` line of the provenance tag.
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Git => "git",
            SourceType::Archive => "archive",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = SourceTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "git" => Ok(SourceType::Git),
            "archive" => Ok(SourceType::Archive),
            other => Err(SourceTypeParseError(other.to_owned())),
        }
    }
}

/// A request to capture one external source.
///
/// Serializes with the field names used at service boundaries (`type`,
/// `ref`); `adjust` defaults to `false`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullSpec {
    /// Logical name of the internal repository.
    pub name: String,
    /// How to fetch the source.
    #[serde(rename = "type")]
    pub source_type: SourceType,
    /// Where to fetch the source from.
    pub url: String,
    /// Branch, tag or commit to check out. Only meaningful for git
    /// sources; `None` means the remote's default branch.
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Whether to run the adjust step after the pull commit.
    #[serde(default)]
    pub adjust: bool,
}

impl PullSpec {
    /// Creates a git pull spec.
    pub fn git(
        name: impl Into<String>,
        url: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        PullSpec {
            name: name.into(),
            source_type: SourceType::Git,
            url: url.into(),
            reference: Some(reference.into()),
            adjust: false,
        }
    }

    /// Creates an archive pull spec.
    pub fn archive(name: impl Into<String>, url: impl Into<String>) -> Self {
        PullSpec {
            name: name.into(),
            source_type: SourceType::Archive,
            url: url.into(),
            reference: None,
            adjust: false,
        }
    }

    /// Sets whether the adjust step runs.
    pub fn with_adjust(mut self, adjust: bool) -> Self {
        self.adjust = adjust;
        self
    }

    /// Returns the reference recorded in the provenance tag.
    ///
    /// Git sources without an explicit ref record `HEAD`; archives without
    /// one record an empty reference.
    pub fn origin_ref(&self) -> &str {
        match (&self.reference, self.source_type) {
            (Some(reference), _) => reference,
            (None, SourceType::Git) => "HEAD",
            (None, SourceType::Archive) => "",
        }
    }
}

/// Access URLs for the internal repository backing one logical name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalRepo {
    /// URL that downstream consumers clone from.
    pub read_only_url: String,
    /// URL that ingestion pushes to.
    pub read_write_url: String,
}

impl InternalRepo {
    /// Creates a handle from its two URLs.
    pub fn new(
        read_only_url: impl Into<String>,
        read_write_url: impl Into<String>,
    ) -> Self {
        InternalRepo {
            read_only_url: read_only_url.into(),
            read_write_url: read_write_url.into(),
        }
    }
}
