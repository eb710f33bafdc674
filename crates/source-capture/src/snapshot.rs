// Copyright 2026 Oxide Computer Company

//! Content snapshots of working trees, used to detect no-op adjustments.

use crate::SnapshotError;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use walkdir::WalkDir;

/// Name of git metadata directories, which are never part of a snapshot.
const GIT_DIR_NAME: &str = ".git";

/// How git records a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EntryKind {
    File,
    Executable,
    Symlink,
}

impl EntryKind {
    /// The tree-entry mode git stores for this kind.
    pub(crate) fn git_mode(self) -> &'static str {
        match self {
            EntryKind::File => "100644",
            EntryKind::Executable => "100755",
            EntryKind::Symlink => "120000",
        }
    }

    fn digest_tag(self) -> &'static [u8] {
        match self {
            EntryKind::File => b"file\0",
            EntryKind::Executable => b"exec\0",
            EntryKind::Symlink => b"link\0",
        }
    }
}

/// One file or symlink found under a working tree.
#[derive(Clone, Debug)]
pub(crate) struct TreeEntry {
    /// Path relative to the tree root.
    pub(crate) path: Utf8PathBuf,
    pub(crate) kind: EntryKind,
}

impl TreeEntry {
    /// The `/`-separated path git uses in the index.
    pub(crate) fn git_path(&self) -> String {
        self.path
            .components()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Reads the bytes git stores for this entry: the file's contents, or
    /// the link target.
    pub(crate) fn read_blob(
        &self,
        root: &Utf8Path,
    ) -> Result<Vec<u8>, SnapshotError> {
        let path = root.join(&self.path);
        let io_error =
            |source| SnapshotError::Io { path: path.clone(), source };
        match self.kind {
            EntryKind::Symlink => {
                let target = fs::read_link(&path).map_err(io_error)?;
                Ok(target.into_os_string().into_encoded_bytes())
            }
            EntryKind::File | EntryKind::Executable => {
                fs::read(&path).map_err(io_error)
            }
        }
    }
}

/// Lists every regular file and symlink under `root`.
///
/// `.git` entries are skipped at any depth, so a nested repository
/// contributes its files rather than a gitlink. Directories only appear
/// through their entries, and other file types are ignored.
pub(crate) fn walk_tree(
    root: &Utf8Path,
) -> Result<Vec<TreeEntry>, SnapshotError> {
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != GIT_DIR_NAME);

    let mut entries = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|error| {
            let path = error
                .path()
                .and_then(|p| Utf8Path::from_path(p))
                .unwrap_or(root)
                .to_owned();
            SnapshotError::Io { path, source: error.into() }
        })?;
        let file_type = entry.file_type();
        let kind = if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_file() {
            if is_executable(&entry) {
                EntryKind::Executable
            } else {
                EntryKind::File
            }
        } else {
            continue;
        };

        let path = Utf8Path::from_path(entry.path()).ok_or_else(|| {
            SnapshotError::NonUtf8Path { path: entry.path().to_owned() }
        })?;
        let relative = path
            .strip_prefix(root)
            .map(Utf8Path::to_owned)
            .unwrap_or_else(|_| path.to_owned());
        entries.push(TreeEntry { path: relative, kind });
    }
    Ok(entries)
}

/// The content of a working tree: every path mapped to a digest of what
/// git would record for it.
///
/// Regular files hash their bytes and executable bit; symlinks hash their
/// target. Directories only appear through their entries, and `.git`
/// entries are skipped at any depth. This is the same view of the tree
/// that internal commits record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeSnapshot {
    entries: BTreeMap<Utf8PathBuf, String>,
}

impl TreeSnapshot {
    /// Snapshots the tree rooted at `root`.
    pub fn capture(root: &Utf8Path) -> Result<Self, SnapshotError> {
        let mut entries = BTreeMap::new();
        for entry in walk_tree(root)? {
            let mut hasher = Sha256::new();
            hasher.update(entry.kind.digest_tag());
            hasher.update(entry.read_blob(root)?);
            entries.insert(entry.path, hex::encode(hasher.finalize()));
        }
        Ok(TreeSnapshot { entries })
    }

    /// Returns the number of paths in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the tree has no files.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the hex digest recorded for `path`, if present.
    pub fn digest(&self, path: impl AsRef<Utf8Path>) -> Option<&str> {
        self.entries.get(path.as_ref()).map(String::as_str)
    }

    /// Returns the paths that were added, removed, or changed between
    /// `self` and `other`, in sorted order.
    pub fn changed_paths<'a>(&'a self, other: &'a Self) -> Vec<&'a Utf8Path> {
        let mut changed: Vec<&Utf8Path> = self
            .entries
            .iter()
            .filter(|(path, digest)| {
                other.entries.get(*path) != Some(*digest)
            })
            .map(|(path, _)| path.as_path())
            .collect();
        changed.extend(
            other
                .entries
                .keys()
                .filter(|path| !self.entries.contains_key(*path))
                .map(Utf8PathBuf::as_path),
        );
        changed.sort();
        changed
    }
}

#[cfg(unix)]
fn is_executable(entry: &walkdir::DirEntry) -> bool {
    use std::os::unix::fs::PermissionsExt;
    entry
        .metadata()
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_entry: &walkdir::DirEntry) -> bool {
    false
}
