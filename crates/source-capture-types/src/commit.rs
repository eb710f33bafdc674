// Copyright 2026 Oxide Computer Company

//! Git commit identifiers.

use crate::CommitIdParseError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

/// The id of a commit in the internal repository.
///
/// Holds either 20 bytes (SHA-1, 40 hex characters) or 32 bytes (SHA-256,
/// 64 hex characters). Displays as lowercase hex, which is also the
/// serialized form.
///
/// ```
/// use source_capture_types::CommitId;
///
/// let id: CommitId =
///     "0123456789abcdef0123456789abcdef01234567".parse().unwrap();
/// assert_eq!(id.to_string(), "0123456789abcdef0123456789abcdef01234567");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommitId {
    /// A SHA-1 object id.
    Sha1([u8; 20]),
    /// A SHA-256 object id, used by repositories in SHA-256 object format.
    Sha256([u8; 32]),
}

impl CommitId {
    /// Parses the output of a git plumbing command such as `rev-parse`,
    /// ignoring surrounding whitespace.
    pub fn from_git_output(s: &str) -> Result<Self, CommitIdParseError> {
        s.trim().parse()
    }
}

impl FromStr for CommitId {
    type Err = CommitIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.len() {
            40 => {
                let mut bytes = [0; 20];
                hex::decode_to_slice(s, &mut bytes)
                    .map_err(CommitIdParseError::InvalidHex)?;
                Ok(CommitId::Sha1(bytes))
            }
            64 => {
                let mut bytes = [0; 32];
                hex::decode_to_slice(s, &mut bytes)
                    .map_err(CommitIdParseError::InvalidHex)?;
                Ok(CommitId::Sha256(bytes))
            }
            len => Err(CommitIdParseError::InvalidLength(len)),
        }
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitId::Sha1(bytes) => hex::encode(bytes).fmt(f),
            CommitId::Sha256(bytes) => hex::encode(bytes).fmt(f),
        }
    }
}

impl Serialize for CommitId {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CommitId {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
