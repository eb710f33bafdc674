// Copyright 2026 Oxide Computer Company

//! Per-process settings for source capture.

use crate::{ConfigurationError, Git};
use std::time::Duration;

/// Default naming-collision retry budget.
pub const DEFAULT_NAME_ATTEMPTS: u32 = 8;

/// Default timeout for archive downloads.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Default archive size limit (1 GiB).
pub const DEFAULT_MAX_DOWNLOAD_SIZE: u64 = 1024 * 1024 * 1024;

/// Reads a string from an environment variable, falling back to `default`
/// if the variable is unset or empty.
///
/// The value is trimmed of leading and trailing whitespace.
///
/// Returns an error if the variable is set but is not valid UTF-8.
pub(crate) fn read_env(
    var: &'static str,
    default: &str,
) -> Result<String, ConfigurationError> {
    match std::env::var(var) {
        Ok(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(default.to_string())
            } else {
                Ok(trimmed.to_string())
            }
        }
        Err(std::env::VarError::NotPresent) => Ok(default.to_string()),
        Err(std::env::VarError::NotUnicode(value)) => {
            Err(ConfigurationError::NonUtf8 { var, value })
        }
    }
}

/// Reads an unsigned number from an environment variable, falling back to
/// `default` if the variable is unset or empty.
fn read_env_u64(
    var: &'static str,
    default: u64,
) -> Result<u64, ConfigurationError> {
    let value = read_env(var, "")?;
    if value.is_empty() {
        return Ok(default);
    }
    value.parse().map_err(|source| ConfigurationError::InvalidNumber {
        var,
        value,
        source,
    })
}

/// The name and email recorded as author and committer of internal commits
/// and as tagger of their tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// The user name.
    pub name: String,
    /// The email address.
    pub email: String,
}

impl Default for Identity {
    fn default() -> Self {
        Identity {
            name: "source-capture".to_owned(),
            email: "source-capture@localhost".to_owned(),
        }
    }
}

/// Settings shared by every ingestion run in a process.
///
/// Internal repository URLs are deliberately absent: they come from a
/// [`RepoProvider`](crate::RepoProvider) per run.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    git: Git,
    identity: Identity,
    max_name_attempts: u32,
    http_timeout: Duration,
    max_download_size: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            git: Git::default(),
            identity: Identity::default(),
            max_name_attempts: DEFAULT_NAME_ATTEMPTS,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            max_download_size: DEFAULT_MAX_DOWNLOAD_SIZE,
        }
    }
}

impl CaptureConfig {
    /// Builds a configuration from the environment.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `GIT` | `git` |
    /// | `SOURCE_CAPTURE_COMMITTER_NAME` | `source-capture` |
    /// | `SOURCE_CAPTURE_COMMITTER_EMAIL` | `source-capture@localhost` |
    /// | `SOURCE_CAPTURE_NAME_ATTEMPTS` | 8 |
    /// | `SOURCE_CAPTURE_HTTP_TIMEOUT_SECS` | 300 |
    /// | `SOURCE_CAPTURE_MAX_DOWNLOAD_BYTES` | 1 GiB |
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let defaults = Identity::default();
        let identity = Identity {
            name: read_env("SOURCE_CAPTURE_COMMITTER_NAME", &defaults.name)?,
            email: read_env(
                "SOURCE_CAPTURE_COMMITTER_EMAIL",
                &defaults.email,
            )?,
        };
        let attempts = read_env_u64(
            "SOURCE_CAPTURE_NAME_ATTEMPTS",
            u64::from(DEFAULT_NAME_ATTEMPTS),
        )?;
        let attempts = u32::try_from(attempts).map_err(|_| {
            ConfigurationError::InvalidValue {
                setting: "SOURCE_CAPTURE_NAME_ATTEMPTS",
                reason: format!("{attempts} is too large"),
            }
        })?;
        let timeout = read_env_u64(
            "SOURCE_CAPTURE_HTTP_TIMEOUT_SECS",
            DEFAULT_HTTP_TIMEOUT.as_secs(),
        )?;
        let max_download_size = read_env_u64(
            "SOURCE_CAPTURE_MAX_DOWNLOAD_BYTES",
            DEFAULT_MAX_DOWNLOAD_SIZE,
        )?;

        CaptureConfig::default()
            .with_git(Git::from_env()?)
            .with_identity(identity)
            .with_http_timeout(Duration::from_secs(timeout))
            .with_max_download_size(max_download_size)
            .with_max_name_attempts(attempts)
    }

    /// Overrides the git binary.
    pub fn with_git(mut self, git: Git) -> Self {
        self.git = git;
        self
    }

    /// Overrides the commit identity.
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    /// Overrides the naming-collision retry budget.
    ///
    /// Returns an error if `attempts` is zero.
    pub fn with_max_name_attempts(
        mut self,
        attempts: u32,
    ) -> Result<Self, ConfigurationError> {
        if attempts == 0 {
            return Err(ConfigurationError::InvalidValue {
                setting: "max_name_attempts",
                reason: "at least one attempt is required".to_owned(),
            });
        }
        self.max_name_attempts = attempts;
        Ok(self)
    }

    /// Overrides the archive download timeout.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Overrides the archive size limit.
    pub fn with_max_download_size(mut self, limit: u64) -> Self {
        self.max_download_size = limit;
        self
    }

    /// Returns the git binary.
    pub fn git(&self) -> &Git {
        &self.git
    }

    /// Returns the commit identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the naming-collision retry budget.
    pub fn max_name_attempts(&self) -> u32 {
        self.max_name_attempts
    }

    /// Returns the archive download timeout.
    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    /// Returns the archive size limit.
    pub fn max_download_size(&self) -> u64 {
        self.max_download_size
    }
}
