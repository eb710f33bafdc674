// Copyright 2026 Oxide Computer Company

//! Error types for parsing capture types.

use thiserror::Error;

/// An error that occurs while parsing a [`CommitId`](crate::CommitId).
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum CommitIdParseError {
    /// The commit id has an invalid length.
    #[error(
        "invalid length: expected 40 (SHA-1) or 64 (SHA-256) hex characters, \
         got {0}"
    )]
    InvalidLength(usize),

    /// The commit id is not valid hexadecimal.
    #[error("invalid hexadecimal")]
    InvalidHex(hex::FromHexError),
}

/// An error that occurs while parsing a [`RefName`](crate::RefName).
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum RefNameParseError {
    /// The name has no `-` separating prefix and timestamp.
    #[error("invalid ref name {0:?}: expected '<prefix>-<epoch>'")]
    InvalidFormat(String),

    /// The prefix is neither `pull` nor `adjust`.
    #[error("unknown ref name prefix {0:?} (expected 'pull' or 'adjust')")]
    UnknownPrefix(String),

    /// The timestamp is not a non-negative decimal integer.
    #[error("invalid ref name timestamp {0:?}")]
    InvalidStamp(String),
}

/// An error that occurs while parsing a [`SourceType`](crate::SourceType).
#[derive(Clone, Debug, Error, PartialEq)]
#[error("unknown source type {0:?} (expected 'git' or 'archive')")]
pub struct SourceTypeParseError(pub String);
