// Copyright 2026 Oxide Computer Company

//! Deterministic branch and tag names for internal commits.

use crate::RefNameParseError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The suffix that turns a branch name into its tag name.
pub const TAG_SUFFIX: &str = "-root";

/// Which stage of an ingestion run produced a commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefPrefix {
    /// The raw fetched source.
    Pull,
    /// The source after the adjust step changed it.
    Adjust,
}

impl RefPrefix {
    /// Returns the prefix as it appears in branch and tag names.
    pub fn as_str(self) -> &'static str {
        match self {
            RefPrefix::Pull => "pull",
            RefPrefix::Adjust => "adjust",
        }
    }
}

impl fmt::Display for RefPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `<prefix>-<epoch_seconds>` name.
///
/// The branch is the name itself; the tag is the name followed by
/// [`TAG_SUFFIX`]. Only the push to the internal remote decides whether a
/// name is actually free, so a rejected name is replaced with
/// [`RefName::successor`] and tried again.
///
/// ```
/// use source_capture_types::{RefName, RefPrefix};
///
/// let name = RefName::new(RefPrefix::Pull, 1_700_000_000);
/// assert_eq!(name.branch(), "pull-1700000000");
/// assert_eq!(name.tag(), "pull-1700000000-root");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RefName {
    prefix: RefPrefix,
    stamp: u64,
}

impl RefName {
    /// Creates a name from a prefix and a Unix timestamp in seconds.
    pub fn new(prefix: RefPrefix, stamp: u64) -> Self {
        RefName { prefix, stamp }
    }

    /// Returns the prefix.
    pub fn prefix(&self) -> RefPrefix {
        self.prefix
    }

    /// Returns the timestamp component.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Returns the branch name.
    pub fn branch(&self) -> String {
        self.to_string()
    }

    /// Returns the tag name.
    pub fn tag(&self) -> String {
        format!("{self}{TAG_SUFFIX}")
    }

    /// Returns the name to try after this one was rejected.
    ///
    /// The stamp is `max(now, self.stamp + 1)`: it follows the clock when
    /// the clock has moved on and otherwise counts upward, so names keep
    /// the `<prefix>-<digits>` form and never repeat within a run.
    pub fn successor(&self, now: u64) -> Self {
        RefName {
            prefix: self.prefix,
            stamp: now.max(self.stamp.saturating_add(1)),
        }
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.stamp)
    }
}

impl FromStr for RefName {
    type Err = RefNameParseError;

    /// Parses a branch name (`pull-123`) or a tag name (`pull-123-root`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_suffix(TAG_SUFFIX).unwrap_or(s);
        let (prefix, stamp) = name
            .split_once('-')
            .ok_or_else(|| RefNameParseError::InvalidFormat(s.to_owned()))?;
        let prefix = match prefix {
            "pull" => RefPrefix::Pull,
            "adjust" => RefPrefix::Adjust,
            other => {
                return Err(RefNameParseError::UnknownPrefix(other.to_owned()));
            }
        };
        if stamp.is_empty() || !stamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RefNameParseError::InvalidStamp(stamp.to_owned()));
        }
        let stamp = stamp
            .parse()
            .map_err(|_| RefNameParseError::InvalidStamp(stamp.to_owned()))?;
        Ok(RefName { prefix, stamp })
    }
}
