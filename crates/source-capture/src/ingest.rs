// Copyright 2026 Oxide Computer Company

//! The ingestion pipeline: fetch, pull commit, adjust, no-op check, adjust
//! commit.

use crate::{
    AdjustError, CaptureConfig, CaptureError, Clock, ConfigurationError,
    InternalRepositoryClient, SourceFetcher, TreeSnapshot,
};
use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use source_capture_types::{
    AdjustResult, CaptureReport, CaptureResult, InternalRepo, Origin,
    PullResult, PullSpec, RefPrefix, SourceType,
};
use std::process::{Command, Stdio};

/// Metadata returned by an adjust step. Opaque to the pipeline.
pub type AdjustMetadata = serde_json::Value;

/// Supplies the internal repository that backs a pull spec.
///
/// Implementations may create the repository if it does not exist yet.
pub trait RepoProvider {
    /// Returns access URLs for the repository backing `spec`.
    fn internal_repo(
        &self,
        spec: &PullSpec,
    ) -> Result<InternalRepo, CaptureError>;
}

impl<F> RepoProvider for F
where
    F: Fn(&PullSpec) -> Result<InternalRepo, CaptureError>,
{
    fn internal_repo(
        &self,
        spec: &PullSpec,
    ) -> Result<InternalRepo, CaptureError> {
        self(spec)
    }
}

/// A [`RepoProvider`] that returns the same repository for every spec.
#[derive(Debug, Clone)]
pub struct StaticRepoProvider {
    repo: InternalRepo,
}

impl StaticRepoProvider {
    /// Creates a provider for a fixed repository.
    ///
    /// An empty `read_only_url` falls back to `read_write_url`. Returns an
    /// error if `read_write_url` is empty.
    pub fn new(
        read_only_url: impl Into<String>,
        read_write_url: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let read_write_url = read_write_url.into();
        if read_write_url.trim().is_empty() {
            return Err(ConfigurationError::MissingRepoUrl {
                name: String::new(),
            });
        }
        let mut read_only_url = read_only_url.into();
        if read_only_url.trim().is_empty() {
            read_only_url.clone_from(&read_write_url);
        }
        Ok(StaticRepoProvider {
            repo: InternalRepo::new(read_only_url, read_write_url),
        })
    }

    /// Returns the repository handed out for every spec.
    pub fn repo(&self) -> &InternalRepo {
        &self.repo
    }
}

impl RepoProvider for StaticRepoProvider {
    fn internal_repo(
        &self,
        _spec: &PullSpec,
    ) -> Result<InternalRepo, CaptureError> {
        Ok(self.repo.clone())
    }
}

/// Runs the adjust step on a working tree.
///
/// The step may rewrite any file under `work_dir`, or nothing at all.
pub trait AdjustProvider {
    /// Adjusts `work_dir` in place and returns metadata describing what was
    /// done.
    fn adjust(
        &self,
        work_dir: &Utf8Path,
    ) -> Result<AdjustMetadata, AdjustError>;
}

impl<F> AdjustProvider for F
where
    F: Fn(&Utf8Path) -> Result<AdjustMetadata, AdjustError>,
{
    fn adjust(
        &self,
        work_dir: &Utf8Path,
    ) -> Result<AdjustMetadata, AdjustError> {
        self(work_dir)
    }
}

/// An [`AdjustProvider`] that runs an external program inside the working
/// tree.
///
/// The program's stdout is parsed as JSON metadata; empty output becomes
/// `null` and anything that is not JSON is kept as a string. There is no
/// timeout: a program that must be bounded should bound itself.
#[derive(Debug, Clone)]
pub struct CommandAdjuster {
    program: String,
    args: Vec<String>,
}

impl CommandAdjuster {
    /// Creates an adjuster for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        CommandAdjuster { program: program.into(), args: Vec::new() }
    }

    /// Appends arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl AdjustProvider for CommandAdjuster {
    fn adjust(
        &self,
        work_dir: &Utf8Path,
    ) -> Result<AdjustMetadata, AdjustError> {
        tracing::debug!(
            program = %self.program,
            dir = %work_dir,
            "running adjust program"
        );
        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| AdjustError::SpawnFailed {
                program: self.program.clone(),
                work_dir: work_dir.to_owned(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AdjustError::Failed {
                program: self.program.clone(),
                exit_status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            return Ok(AdjustMetadata::Null);
        }
        Ok(serde_json::from_str(stdout)
            .unwrap_or_else(|_| AdjustMetadata::String(stdout.to_owned())))
    }
}

/// Runs ingestion: fetches a source, commits it to the internal
/// repository, and optionally commits the adjusted tree on top.
///
/// # Examples
///
/// ```no_run
/// use source_capture::{CaptureConfig, Ingestor, StaticRepoProvider};
/// use source_capture_types::PullSpec;
///
/// let config = CaptureConfig::from_env().expect("valid environment");
/// let ingestor = Ingestor::new(config);
/// let repos = StaticRepoProvider::new(
///     "https://git.internal/demo.git",
///     "ssh://git.internal/demo.git",
/// )
/// .expect("read-write URL is set");
///
/// let spec = PullSpec::git("demo", "https://example.com/demo.git", "v1.0");
/// let report = ingestor.pull(&spec, &repos, None).expect("pull succeeded");
/// println!("{}", report.result.tag());
/// ```
#[derive(Debug, Clone)]
pub struct Ingestor {
    config: CaptureConfig,
    client: InternalRepositoryClient,
}

impl Ingestor {
    /// Creates an ingestor.
    pub fn new(config: CaptureConfig) -> Self {
        let client = InternalRepositoryClient::new(&config);
        Ingestor { config, client }
    }

    /// Replaces the clock used to name internal refs.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.client = self.client.with_clock(clock);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Returns the internal repository client.
    pub fn client(&self) -> &InternalRepositoryClient {
        &self.client
    }

    /// Fetches `spec` into a fresh working tree and runs
    /// [`process_source_tree`](Self::process_source_tree) on it.
    ///
    /// The working tree is deleted on every exit path. A pull commit that
    /// was pushed before a later failure is left in place.
    pub fn pull(
        &self,
        spec: &PullSpec,
        repo_provider: &dyn RepoProvider,
        adjust_provider: Option<&dyn AdjustProvider>,
    ) -> Result<CaptureReport, CaptureError> {
        let work = Utf8TempDir::with_prefix("source-capture-work-")
            .map_err(CaptureError::WorkingTree)?;

        SourceFetcher::new(&self.config).fetch(spec, work.path())?;

        self.process_source_tree(
            spec,
            repo_provider,
            adjust_provider,
            work.path(),
            spec.source_type,
            spec.origin_ref(),
        )
    }

    /// Commits an already-populated working tree, then runs the adjust step
    /// if `spec.adjust` is set.
    ///
    /// Returns the pull commit alone when adjust is off or changed nothing,
    /// and the adjust commit with the pull commit nested otherwise. The
    /// adjust commit's only parent is the pull commit.
    pub fn process_source_tree(
        &self,
        spec: &PullSpec,
        repo_provider: &dyn RepoProvider,
        adjust_provider: Option<&dyn AdjustProvider>,
        work_dir: &Utf8Path,
        origin_type: SourceType,
        origin_ref: &str,
    ) -> Result<CaptureReport, CaptureError> {
        let repo = repo_provider.internal_repo(spec)?;
        if repo.read_write_url.trim().is_empty() {
            return Err(ConfigurationError::MissingRepoUrl {
                name: spec.name.clone(),
            }
            .into());
        }
        let origin = Origin::new(&spec.url, origin_ref, origin_type);

        // Taken before the pull commit so it describes exactly what was
        // committed.
        let pulled = if spec.adjust {
            Some(TreeSnapshot::capture(work_dir)?)
        } else {
            None
        };

        let pull_ref = self.client.to_internal(
            &repo.read_write_url,
            work_dir,
            &origin,
            RefPrefix::Pull,
            None,
        )?;
        let pull_result = PullResult::new(&repo.read_only_url, &pull_ref);
        tracing::info!(
            name = %spec.name,
            branch = %pull_ref.branch,
            commit = %pull_ref.commit,
            "pull commit created"
        );

        let Some(pulled) = pulled else {
            tracing::info!(name = %spec.name, "adjust skipped");
            return Ok(CaptureReport {
                result: CaptureResult::Pull(pull_result),
                adjust_result: None,
            });
        };

        let adjust_provider =
            adjust_provider.ok_or(AdjustError::NotConfigured)?;
        let metadata = adjust_provider.adjust(work_dir)?;

        let adjusted = TreeSnapshot::capture(work_dir)?;
        if adjusted == pulled {
            tracing::info!(
                name = %spec.name,
                branch = %pull_ref.branch,
                "adjust made no changes, keeping pull commit"
            );
            return Ok(CaptureReport {
                result: CaptureResult::Pull(pull_result),
                adjust_result: Some(metadata),
            });
        }
        tracing::debug!(
            name = %spec.name,
            changed = pulled.changed_paths(&adjusted).len(),
            "adjust changed the tree"
        );

        let adjust_ref = self.client.to_internal(
            &repo.read_write_url,
            work_dir,
            &origin,
            RefPrefix::Adjust,
            Some(pull_ref.commit),
        )?;
        tracing::info!(
            name = %spec.name,
            branch = %adjust_ref.branch,
            commit = %adjust_ref.commit,
            parent = %pull_ref.commit,
            "adjust commit created"
        );

        Ok(CaptureReport {
            result: CaptureResult::Adjust(AdjustResult {
                url: repo.read_only_url,
                branch: adjust_ref.branch,
                tag: adjust_ref.tag,
                pull: pull_result,
            }),
            adjust_result: Some(metadata),
        })
    }
}
