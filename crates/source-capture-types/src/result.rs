// Copyright 2026 Oxide Computer Company

//! Outputs of an ingestion run.

use crate::{CommitId, RefName};
use serde::{Deserialize, Serialize};

/// A commit pushed to the internal repository under a branch/tag pair.
///
/// Immutable once pushed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalRef {
    /// The branch name (`<prefix>-<epoch>`).
    pub branch: String,
    /// The tag name, always the branch name plus `-root`.
    pub tag: String,
    /// The commit both refs point at.
    pub commit: CommitId,
    /// The commit's parent: the pull commit for an adjust commit, `None`
    /// for a pull commit.
    pub parent: Option<CommitId>,
}

impl InternalRef {
    /// Creates a ref from the name it was pushed under.
    pub fn new(
        name: &RefName,
        commit: CommitId,
        parent: Option<CommitId>,
    ) -> Self {
        InternalRef { branch: name.branch(), tag: name.tag(), commit, parent }
    }
}

/// Provenance of the raw fetched tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullResult {
    /// The internal repository (read-only URL).
    pub url: String,
    /// The pull branch.
    pub branch: String,
    /// The pull tag.
    pub tag: String,
}

impl PullResult {
    /// Creates a result for `internal_ref` in the repository at `url`.
    pub fn new(url: impl Into<String>, internal_ref: &InternalRef) -> Self {
        PullResult {
            url: url.into(),
            branch: internal_ref.branch.clone(),
            tag: internal_ref.tag.clone(),
        }
    }
}

/// Provenance of an adjusted tree that differs from the pulled one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustResult {
    /// The internal repository (read-only URL).
    pub url: String,
    /// The adjust branch.
    pub branch: String,
    /// The adjust tag.
    pub tag: String,
    /// The pull commit the adjust commit is a child of.
    pub pull: PullResult,
}

/// The result of one ingestion run.
///
/// An adjust step that changed nothing yields [`CaptureResult::Pull`]:
/// there is no adjust commit, so there is nothing to nest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaptureResult {
    /// A distinct adjust commit was created on top of the pull commit.
    // Listed first so that untagged deserialization only falls back to
    // `Pull` when there is no `pull` key.
    Adjust(AdjustResult),
    /// Only the pull commit exists.
    Pull(PullResult),
}

impl CaptureResult {
    /// Returns the final branch.
    pub fn branch(&self) -> &str {
        match self {
            CaptureResult::Adjust(r) => &r.branch,
            CaptureResult::Pull(r) => &r.branch,
        }
    }

    /// Returns the final tag.
    pub fn tag(&self) -> &str {
        match self {
            CaptureResult::Adjust(r) => &r.tag,
            CaptureResult::Pull(r) => &r.tag,
        }
    }

    /// Returns the internal repository URL.
    pub fn url(&self) -> &str {
        match self {
            CaptureResult::Adjust(r) => &r.url,
            CaptureResult::Pull(r) => &r.url,
        }
    }

    /// Returns the nested pull result if an adjust commit was created.
    pub fn pull(&self) -> Option<&PullResult> {
        match self {
            CaptureResult::Adjust(r) => Some(&r.pull),
            CaptureResult::Pull(_) => None,
        }
    }
}

/// A [`CaptureResult`] together with the adjust step's metadata.
///
/// Serializes flat: `{branch, tag, url[, pull][, adjust_result]}`.
/// `adjust_result` is present whenever the adjust step ran, whether or not
/// it changed anything.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptureReport {
    /// Where the captured source ended up.
    #[serde(flatten)]
    pub result: CaptureResult,
    /// Opaque metadata returned by the adjust step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjust_result: Option<serde_json::Value>,
}
