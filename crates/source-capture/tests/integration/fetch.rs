// Copyright 2026 Oxide Computer Company

//! Tests for fetching external sources into working trees.

use crate::helpers::{
    ExternalRepo, git, serve_once, tar_xz, test_config, write_file,
};
use anyhow::Result;
use camino_tempfile::Utf8TempDir;
use source_capture::{FetchError, SourceFetcher};
use source_capture_types::PullSpec;
use std::fs;

fn work_dir() -> Result<Utf8TempDir> {
    Ok(Utf8TempDir::with_prefix("source-capture-work-")?)
}

#[test]
fn test_fetch_git_branch_tag_and_commit() -> Result<()> {
    let external = ExternalRepo::new()?;
    let first = git(external.path(), &["rev-parse", "HEAD"])?;
    git(external.path(), &["tag", "v1.0"])?;
    git(external.path(), &["checkout", "--quiet", "-b", "feature"])?;
    let feature = external.commit("asd.txt", "feature\n", "feature work")?;
    git(external.path(), &["checkout", "--quiet", "master"])?;

    let config = test_config()?;
    let fetcher = SourceFetcher::new(&config);

    let work = work_dir()?;
    let commit =
        fetcher.fetch_git(external.url(), Some("v1.0"), work.path())?;
    assert_eq!(commit.to_string(), first.trim());

    let work = work_dir()?;
    let commit =
        fetcher.fetch_git(external.url(), Some("feature"), work.path())?;
    assert_eq!(commit.to_string(), feature);
    assert_eq!(fs::read_to_string(work.path().join("asd.txt"))?, "feature\n");

    let work = work_dir()?;
    let commit = fetcher.fetch_git(
        external.url(),
        Some(feature.as_str()),
        work.path(),
    )?;
    assert_eq!(commit.to_string(), feature);

    let work = work_dir()?;
    let commit = fetcher.fetch_git(external.url(), None, work.path())?;
    assert_eq!(commit.to_string(), first.trim(), "default branch is master");
    assert_eq!(fs::read_to_string(work.path().join("asd.txt"))?, "hello\n");

    Ok(())
}

#[test]
fn test_fetch_git_unknown_ref() -> Result<()> {
    let external = ExternalRepo::new()?;
    let config = test_config()?;
    let work = work_dir()?;

    let result = SourceFetcher::new(&config).fetch_git(
        external.url(),
        Some("no-such-branch"),
        work.path(),
    );
    match result {
        Err(FetchError::RefNotFound { reference, .. }) => {
            assert_eq!(reference, "no-such-branch");
        }
        other => panic!("expected RefNotFound, got {other:?}"),
    }

    Ok(())
}

#[test]
fn test_fetch_archive_from_file_url() -> Result<()> {
    let source = Utf8TempDir::with_prefix("source-capture-archive-")?;
    let archive = source.path().join("demo-1.0.tar.xz");
    write_file(
        &archive,
        tar_xz(&[
            ("demo-1.0/asd.txt", b"hello\n", 0o644),
            ("demo-1.0/bin/tool", b"#!/bin/sh\n", 0o755),
        ])?,
    )?;

    let config = test_config()?;
    let work = work_dir()?;
    let spec = PullSpec::archive("demo", format!("file://{archive}"));
    SourceFetcher::new(&config).fetch(&spec, work.path())?;

    assert_eq!(
        fs::read(work.path().join("demo-1.0/asd.txt"))?,
        b"hello\n",
        "relative paths are preserved"
    );
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode =
            fs::metadata(work.path().join("demo-1.0/bin/tool"))?.permissions();
        assert_eq!(mode.mode() & 0o111, 0o111, "executable bit is kept");
    }

    Ok(())
}

#[test]
fn test_fetch_archive_http_status() -> Result<()> {
    let base = serve_once("404 Not Found", b"missing".to_vec())?;
    let config = test_config()?;
    let work = work_dir()?;
    let spec = PullSpec::archive("demo", format!("{base}/demo.tar.xz"));

    let result = SourceFetcher::new(&config).fetch(&spec, work.path());
    assert!(
        matches!(result, Err(FetchError::HttpStatus { status: 404, .. })),
        "expected HTTP 404, got {result:?}"
    );

    Ok(())
}

#[test]
fn test_fetch_archive_size_limit() -> Result<()> {
    let body = tar_xz(&[("asd.txt", b"hello\n", 0o644)])?;
    let limit = body.len() as u64 - 1;
    let base = serve_once("200 OK", body)?;
    let config = test_config()?.with_max_download_size(limit);
    let work = work_dir()?;
    let spec = PullSpec::archive("demo", format!("{base}/demo.tar.xz"));

    let result = SourceFetcher::new(&config).fetch(&spec, work.path());
    assert!(
        matches!(result, Err(FetchError::TooLarge { .. })),
        "expected TooLarge, got {result:?}"
    );

    Ok(())
}

#[test]
fn test_fetch_archive_not_an_archive() -> Result<()> {
    let base = serve_once("200 OK", b"<html>not a tarball</html>".to_vec())?;
    let config = test_config()?;
    let work = work_dir()?;
    let spec = PullSpec::archive("demo", format!("{base}/download"));

    let result = SourceFetcher::new(&config).fetch(&spec, work.path());
    assert!(
        matches!(result, Err(FetchError::UnknownFormat { .. })),
        "expected UnknownFormat, got {result:?}"
    );

    Ok(())
}
