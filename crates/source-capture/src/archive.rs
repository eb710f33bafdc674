// Copyright 2026 Oxide Computer Company

//! Archive download and extraction.

use crate::{CaptureConfig, FetchError};
use camino::Utf8Path;
use flate2::read::GzDecoder;
use fs_err as fs;
use std::{
    io::{self, Read},
    path::{Component, Path},
};
use tar::{Archive, EntryType};
use xz2::read::XzDecoder;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];
/// Offset of the `ustar` magic in a tar header.
const USTAR_OFFSET: usize = 257;

/// How an archive's tar stream is compressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Compression {
    None,
    Gzip,
    Xz,
}

impl Compression {
    /// Detects the compression from the leading bytes, falling back to the
    /// URL's extension.
    pub(crate) fn detect(data: &[u8], url: &str) -> Result<Self, FetchError> {
        if data.starts_with(GZIP_MAGIC) {
            return Ok(Compression::Gzip);
        }
        if data.starts_with(XZ_MAGIC) {
            return Ok(Compression::Xz);
        }
        if data
            .get(USTAR_OFFSET..USTAR_OFFSET + 5)
            .is_some_and(|magic| magic == b"ustar")
        {
            return Ok(Compression::None);
        }

        // Extensions only matter for content we could not sniff, which in
        // practice means a truncated or corrupt download; let the decoder
        // report that.
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
            Ok(Compression::Gzip)
        } else if path.ends_with(".tar.xz") || path.ends_with(".txz") {
            Ok(Compression::Xz)
        } else if path.ends_with(".tar") {
            Ok(Compression::None)
        } else {
            Err(FetchError::UnknownFormat { url: url.to_owned() })
        }
    }

    fn decoder<'a>(self, data: &'a [u8]) -> Box<dyn Read + 'a> {
        match self {
            Compression::None => Box::new(data),
            Compression::Gzip => Box::new(GzDecoder::new(data)),
            Compression::Xz => Box::new(XzDecoder::new(data)),
        }
    }
}

/// Downloads the archive at `url` and extracts it into `dest`.
pub(crate) fn fetch_archive(
    config: &CaptureConfig,
    url: &str,
    dest: &Utf8Path,
) -> Result<(), FetchError> {
    let data = download(config, url)?;
    tracing::debug!(url, bytes = data.len(), "downloaded archive");
    let compression = Compression::detect(&data, url)?;
    let entries = extract(&data, compression, url, dest.as_std_path())?;
    tracing::debug!(url, entries, ?compression, "extracted archive");
    Ok(())
}

/// Reads the archive body, enforcing the configured size limit.
fn download(
    config: &CaptureConfig,
    url: &str,
) -> Result<Vec<u8>, FetchError> {
    let limit = config.max_download_size();

    if url.starts_with("file:") {
        let path = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.to_file_path().ok())
            .ok_or_else(|| FetchError::InvalidUrl {
                url: url.to_owned(),
                reason: "not a valid local file URL".to_owned(),
            })?;
        let file = fs::File::open(&path).map_err(|source| {
            FetchError::ReadBody { url: url.to_owned(), source }
        })?;
        return read_limited(file, url, limit);
    }

    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("source-capture/", env!("CARGO_PKG_VERSION")))
        .timeout(config.http_timeout())
        .build()
        .map_err(|source| FetchError::Http { url: url.to_owned(), source })?;

    tracing::debug!(url, "downloading archive");
    let response = client
        .get(url)
        .send()
        .map_err(|source| FetchError::Http { url: url.to_owned(), source })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus {
            url: url.to_owned(),
            status: status.as_u16(),
        });
    }
    if let Some(len) = response.content_length() {
        if len > limit {
            return Err(FetchError::TooLarge {
                url: url.to_owned(),
                size: len,
                limit,
            });
        }
    }

    read_limited(response, url, limit)
}

fn read_limited(
    reader: impl Read,
    url: &str,
    limit: u64,
) -> Result<Vec<u8>, FetchError> {
    let mut data = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut data)
        .map_err(|source| FetchError::ReadBody {
            url: url.to_owned(),
            source,
        })?;
    let size = u64::try_from(data.len()).unwrap_or(u64::MAX);
    if size > limit {
        return Err(FetchError::TooLarge { url: url.to_owned(), size, limit });
    }
    Ok(data)
}

/// Extracts a tar stream into `dest`, returning the number of entries.
///
/// Every entry path is validated before anything is written: absolute
/// paths, `..` components and symlinks pointing outside `dest` are
/// rejected, as are hard links and special files.
pub(crate) fn extract(
    data: &[u8],
    compression: Compression,
    url: &str,
    dest: &Path,
) -> Result<usize, FetchError> {
    let corrupt = |source: io::Error| FetchError::CorruptArchive {
        url: url.to_owned(),
        source,
    };

    let mut archive = Archive::new(compression.decoder(data));
    // Keep the executable bit, drop setuid/setgid and ownership.
    archive.set_preserve_permissions(false);
    archive.set_preserve_mtime(false);

    let dest = dest.canonicalize().map_err(|source| FetchError::Extract {
        path: dest.display().to_string(),
        source,
    })?;

    let mut count = 0usize;
    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        let entry_type = entry.header().entry_type();
        let entry_path = entry.path().map_err(corrupt)?.into_owned();
        let display = entry_path.display().to_string();

        match entry_type {
            EntryType::Regular
            | EntryType::Continuous
            | EntryType::Directory => {}
            EntryType::Symlink => {
                let target = entry
                    .link_name()
                    .map_err(corrupt)?
                    .ok_or_else(|| FetchError::CorruptArchive {
                        url: url.to_owned(),
                        source: io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("symlink {display} has no target"),
                        ),
                    })?
                    .into_owned();
                validate_link_target(&entry_path, &target)?;
            }
            EntryType::XGlobalHeader
            | EntryType::XHeader
            | EntryType::GNULongName
            | EntryType::GNULongLink => continue,
            other => {
                return Err(FetchError::UnsafeEntry {
                    path: display,
                    entry_type: format!("{other:?}"),
                });
            }
        }

        validate_entry_path(&entry_path)?;
        let target = dest.join(&entry_path);
        if target == dest {
            // `./` entries name the root itself.
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| FetchError::Extract {
                path: parent.display().to_string(),
                source,
            })?;
            // Catches escapes through symlinks created by earlier entries,
            // which the lexical checks cannot see.
            let canonical_parent =
                parent.canonicalize().map_err(|source| FetchError::Extract {
                    path: parent.display().to_string(),
                    source,
                })?;
            if !canonical_parent.starts_with(&dest) {
                return Err(FetchError::PathTraversal { path: display });
            }
        }

        entry.unpack(&target).map_err(|source| FetchError::Extract {
            path: target.display().to_string(),
            source,
        })?;
        count += 1;
    }

    if count == 0 {
        return Err(FetchError::EmptyArchive { url: url.to_owned() });
    }
    Ok(count)
}

/// Rejects absolute paths and `..` components.
fn validate_entry_path(path: &Path) -> Result<(), FetchError> {
    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(FetchError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

/// Rejects symlinks whose target, resolved against the link's directory,
/// leaves the extraction root.
fn validate_link_target(
    link: &Path,
    target: &Path,
) -> Result<(), FetchError> {
    if target.is_absolute() {
        return Err(FetchError::PathTraversal {
            path: format!("{} -> {}", link.display(), target.display()),
        });
    }

    let mut depth: usize = 0;
    let base = link.parent().map(Path::to_path_buf).unwrap_or_default();
    for component in base.components().chain(target.components()) {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    FetchError::PathTraversal {
                        path: format!(
                            "{} -> {}",
                            link.display(),
                            target.display()
                        ),
                    }
                })?;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(FetchError::PathTraversal {
                    path: link.display().to_string(),
                });
            }
        }
    }
    Ok(())
}
