// Copyright 2026 Oxide Computer Company

//! Materializes external source into a working tree.

use crate::{CaptureConfig, FetchError, archive};
use camino::Utf8Path;
use source_capture_types::{CommitId, PullSpec, SourceType};

/// Populates an empty working tree with exactly the source a
/// [`PullSpec`] names.
///
/// Nothing outside the working tree is touched, and failures are not
/// retried.
#[derive(Debug, Clone, Copy)]
pub struct SourceFetcher<'a> {
    config: &'a CaptureConfig,
}

impl<'a> SourceFetcher<'a> {
    /// Creates a fetcher using `config` for git and HTTP settings.
    pub fn new(config: &'a CaptureConfig) -> Self {
        SourceFetcher { config }
    }

    /// Fetches `spec` into `work_dir`, which must exist and be empty.
    pub fn fetch(
        &self,
        spec: &PullSpec,
        work_dir: &Utf8Path,
    ) -> Result<(), FetchError> {
        match spec.source_type {
            SourceType::Git => {
                let commit = self.fetch_git(
                    &spec.url,
                    spec.reference.as_deref(),
                    work_dir,
                )?;
                tracing::info!(
                    url = %spec.url,
                    reference = spec.origin_ref(),
                    %commit,
                    "fetched git source"
                );
                Ok(())
            }
            SourceType::Archive => {
                archive::fetch_archive(self.config, &spec.url, work_dir)?;
                tracing::info!(url = %spec.url, "fetched archive source");
                Ok(())
            }
        }
    }

    /// Clones `url` into `work_dir` and checks out `reference` detached.
    ///
    /// `reference` may be a branch, tag or commit id; `None` keeps the
    /// remote's default branch. Returns the checked-out commit.
    pub fn fetch_git(
        &self,
        url: &str,
        reference: Option<&str>,
        work_dir: &Utf8Path,
    ) -> Result<CommitId, FetchError> {
        let git = self.config.git();
        git.run(work_dir, &["clone", "--quiet", "--", url, "."])
            .map_err(|source| FetchError::Clone {
                url: url.to_owned(),
                source,
            })?;

        let reference = reference.unwrap_or("HEAD");
        let clone_error =
            |source| FetchError::Clone { url: url.to_owned(), source };

        // Local branches other than the default one only exist as
        // remote-tracking refs after a clone.
        let mut commit =
            git.resolve_commit(work_dir, reference).map_err(clone_error)?;
        if commit.is_none() {
            let tracking = format!("origin/{reference}");
            commit =
                git.resolve_commit(work_dir, &tracking).map_err(clone_error)?;
        }
        let commit = commit.ok_or_else(|| FetchError::RefNotFound {
            url: url.to_owned(),
            reference: reference.to_owned(),
        })?;

        let commit_str = commit.to_string();
        git.run(work_dir, &["checkout", "--quiet", "--detach", &commit_str])
            .map_err(|source| FetchError::Checkout {
                url: url.to_owned(),
                reference: reference.to_owned(),
                source,
            })?;
        Ok(commit)
    }
}
