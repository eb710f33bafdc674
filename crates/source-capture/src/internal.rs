// Copyright 2026 Oxide Computer Company

//! Commits working trees into the internal repository.

use crate::{
    CaptureConfig, CommitConflictError, CommitError, Git, GitError, Identity,
    SnapshotError,
    snapshot::{EntryKind, walk_tree},
};
use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use source_capture_types::{CommitId, InternalRef, Origin, RefName, RefPrefix};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

/// A source of Unix timestamps for ref names.
pub trait Clock: Send + Sync {
    /// Returns the current time in whole seconds since the Unix epoch.
    fn now_epoch_seconds(&self) -> u64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_seconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Read-write access to internal repositories.
///
/// Every commit is made in its own scratch clone, which is deleted when
/// the call returns. The only state shared between concurrent callers is
/// the remote itself: a push of a new branch and tag is atomic and fails
/// if either name exists, so the push decides which caller owns a name.
#[derive(Clone)]
pub struct InternalRepositoryClient {
    git: Git,
    identity: Identity,
    max_name_attempts: u32,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for InternalRepositoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternalRepositoryClient")
            .field("git", &self.git)
            .field("identity", &self.identity)
            .field("max_name_attempts", &self.max_name_attempts)
            .finish_non_exhaustive()
    }
}

impl InternalRepositoryClient {
    /// Creates a client using the system clock.
    pub fn new(config: &CaptureConfig) -> Self {
        InternalRepositoryClient {
            git: config.git().clone(),
            identity: config.identity().clone(),
            max_name_attempts: config.max_name_attempts(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used to generate ref names.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Commits the contents of `work_dir` to the internal repository at
    /// `repo_url` under a fresh `<prefix>-<epoch>` branch and
    /// `<prefix>-<epoch>-root` tag, annotated with `origin`.
    ///
    /// With `parent`, the new commit's only parent is that commit (which
    /// must already be on the remote); otherwise it is a root commit. The
    /// commit records exactly the bytes of the files under `work_dir`.
    /// `.git` entries are skipped at any depth, and the tree's own
    /// `.gitignore` and `.gitattributes` have no effect.
    ///
    /// If the name is taken by the time of the push, a later name is tried,
    /// up to the configured number of attempts.
    pub fn to_internal(
        &self,
        repo_url: &str,
        work_dir: &Utf8Path,
        origin: &Origin,
        prefix: RefPrefix,
        parent: Option<CommitId>,
    ) -> Result<InternalRef, CommitError> {
        let scratch = Utf8TempDir::with_prefix("source-capture-scratch-")
            .map_err(CommitError::ScratchDir)?;
        let clone_dir = scratch.path().join("repo");

        self.git
            .run(
                scratch.path(),
                &["clone", "--quiet", "--no-checkout", "--", repo_url, "repo"],
            )
            .map_err(|source| CommitError::Clone {
                url: repo_url.to_owned(),
                source,
            })?;

        self.stage_tree(&clone_dir, work_dir)?;
        let commit = self
            .commit_tree(&clone_dir, origin, prefix, parent)
            .map_err(|source| CommitError::Commit {
                work_dir: work_dir.to_owned(),
                source,
            })?;

        let name = self.push_with_fresh_name(
            &clone_dir,
            repo_url,
            commit,
            origin,
            prefix,
        )?;

        tracing::info!(
            repo = repo_url,
            branch = %name.branch(),
            tag = %name.tag(),
            %commit,
            "pushed internal commit"
        );
        Ok(InternalRef::new(&name, commit, parent))
    }

    /// Replaces the clone's index with exactly the files under
    /// `work_dir`.
    ///
    /// Blobs are written from the raw bytes on disk and entered into the
    /// index directly, so no attributes, filters, ignore rules or nested
    /// repositories in `work_dir` affect what is recorded. The entries are
    /// the ones [`TreeSnapshot`](crate::TreeSnapshot) hashes.
    fn stage_tree(
        &self,
        clone_dir: &Utf8Path,
        work_dir: &Utf8Path,
    ) -> Result<(), CommitError> {
        let commit_error = |source| CommitError::Commit {
            work_dir: work_dir.to_owned(),
            source,
        };
        let root = work_dir.canonicalize_utf8().map_err(|source| {
            SnapshotError::Io { path: work_dir.to_owned(), source }
        })?;
        let entries = walk_tree(&root)?;

        // Regular files are hashed in one batch by path. Link targets, and
        // paths that cannot be written one per line, go through stdin.
        let mut ids = vec![String::new(); entries.len()];
        let mut batch = Vec::new();
        let mut paths = String::new();
        for (i, entry) in entries.iter().enumerate() {
            let full = root.join(&entry.path);
            if entry.kind == EntryKind::Symlink
                || full.as_str().contains(['\n', '\r'])
            {
                let blob = entry.read_blob(&root)?;
                let mut id = self
                    .git
                    .run_object_ids(
                        clone_dir,
                        &["hash-object", "-w", "--no-filters", "--stdin"],
                        &blob,
                        1,
                    )
                    .map_err(commit_error)?;
                ids[i] = id.remove(0);
            } else {
                batch.push(i);
                paths.push_str(full.as_str());
                paths.push('\n');
            }
        }
        if !batch.is_empty() {
            let batch_ids = self
                .git
                .run_object_ids(
                    clone_dir,
                    &["hash-object", "-w", "--no-filters", "--stdin-paths"],
                    paths.as_bytes(),
                    batch.len(),
                )
                .map_err(commit_error)?;
            for (i, id) in batch.into_iter().zip(batch_ids) {
                ids[i] = id;
            }
        }

        let mut index_info = Vec::new();
        for (entry, id) in entries.iter().zip(&ids) {
            let mode = entry.kind.git_mode();
            let record = format!("{mode} {id}\t{}\0", entry.git_path());
            index_info.extend_from_slice(record.as_bytes());
        }
        tracing::debug!(
            dir = %work_dir,
            entries = entries.len(),
            "staging working tree"
        );
        self.git
            .run(clone_dir, &["read-tree", "--empty"])
            .map_err(commit_error)?;
        self.git
            .run_with_input(
                clone_dir,
                &["update-index", "-z", "--add", "--index-info"],
                &index_info,
            )
            .map_err(commit_error)?;
        Ok(())
    }

    /// Writes a commit object for the clone's index.
    fn commit_tree(
        &self,
        clone_dir: &Utf8Path,
        origin: &Origin,
        prefix: RefPrefix,
        parent: Option<CommitId>,
    ) -> Result<CommitId, GitError> {
        let tree = self.git.run_commit_id(clone_dir, &["write-tree"])?;
        let tree = tree.to_string();
        let message = origin.commit_message(prefix);
        let parent = parent.map(|p| p.to_string());

        let config = self.config_args();
        let mut args: Vec<&str> = config.iter().map(String::as_str).collect();
        args.extend(["commit-tree", tree.as_str(), "-m", message.as_str()]);
        if let Some(parent) = &parent {
            args.extend(["-p", parent.as_str()]);
        }
        self.git.run_commit_id(clone_dir, &args)
    }

    /// Tags `commit` and pushes it, moving on to the next name whenever the
    /// current one turns out to be taken.
    fn push_with_fresh_name(
        &self,
        clone_dir: &Utf8Path,
        repo_url: &str,
        commit: CommitId,
        origin: &Origin,
        prefix: RefPrefix,
    ) -> Result<RefName, CommitError> {
        let commit = commit.to_string();
        let message = origin.tag_message();
        let config = self.config_args();
        let mut name = RefName::new(prefix, self.clock.now_epoch_seconds());
        let mut last_branch = name.branch();

        for attempt in 1..=self.max_name_attempts {
            let branch = name.branch();
            last_branch.clone_from(&branch);
            let tag = name.tag();

            // The clone may already hold a tag of this name; it is only a
            // local copy, and the push below decides ownership.
            let mut args: Vec<&str> =
                config.iter().map(String::as_str).collect();
            args.extend([
                "tag",
                "--force",
                "--annotate",
                "--cleanup=verbatim",
                "-m",
                message.as_str(),
                tag.as_str(),
                commit.as_str(),
            ]);
            self.git.run(clone_dir, &args).map_err(|source| {
                CommitError::Commit { work_dir: clone_dir.to_owned(), source }
            })?;

            let branch_ref = format!("{commit}:refs/heads/{branch}");
            let tag_ref = format!("refs/tags/{tag}");
            let pushed = self.git.run(
                clone_dir,
                &[
                    "push",
                    "--quiet",
                    "--atomic",
                    "origin",
                    &branch_ref,
                    &tag_ref,
                ],
            );
            let error = match pushed {
                Ok(_) => return Ok(name),
                Err(error) => error,
            };

            if !self.name_taken(clone_dir, &branch, &tag).map_err(|source| {
                CommitError::Push {
                    url: repo_url.to_owned(),
                    branch: branch.clone(),
                    source,
                }
            })? {
                return Err(CommitError::Push {
                    url: repo_url.to_owned(),
                    branch,
                    source: error,
                });
            }

            let next = name.successor(self.clock.now_epoch_seconds());
            tracing::warn!(
                repo = repo_url,
                attempt,
                taken = %branch,
                next = %next.branch(),
                "internal ref name already taken, retrying"
            );
            name = next;
        }

        Err(CommitConflictError {
            prefix,
            attempts: self.max_name_attempts,
            last_branch,
        }
        .into())
    }

    /// Returns whether the remote has the branch or the tag.
    fn name_taken(
        &self,
        clone_dir: &Utf8Path,
        branch: &str,
        tag: &str,
    ) -> Result<bool, GitError> {
        let branch_ref = format!("refs/heads/{branch}");
        let tag_ref = format!("refs/tags/{tag}");
        let listing = self.git.run(
            clone_dir,
            &["ls-remote", "origin", &branch_ref, &tag_ref],
        )?;
        Ok(!listing.trim().is_empty())
    }

    /// Per-command config: the committer identity, and no signing
    /// regardless of the user's git config.
    fn config_args(&self) -> [String; 10] {
        [
            "-c".to_owned(),
            format!("user.name={}", self.identity.name),
            "-c".to_owned(),
            format!("user.email={}", self.identity.email),
            "-c".to_owned(),
            "commit.gpgSign=false".to_owned(),
            "-c".to_owned(),
            "tag.gpgSign=false".to_owned(),
            "-c".to_owned(),
            "tag.forceSignAnnotated=false".to_owned(),
        ]
    }
}
