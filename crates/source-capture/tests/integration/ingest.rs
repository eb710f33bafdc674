// Copyright 2026 Oxide Computer Company

//! End-to-end tests for the ingestion pipeline.

use crate::helpers::{
    ExternalRepo, FixedClock, InternalRemote, assert_ref_name, nested_repo,
    serve_once, tar_xz, test_config, write_file,
};
use anyhow::Result;
use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use source_capture::{
    AdjustError, AdjustMetadata, AdjustProvider, CaptureError,
    ConfigurationError, FetchError, Ingestor, StaticRepoProvider,
};
use source_capture_types::{
    CaptureReport, CaptureResult, InternalRepo, PullSpec, RefPrefix,
    SourceType,
};

const READ_ONLY_URL: &str = "https://git.internal.example/demo.git";

fn repos(remote: &InternalRemote) -> Result<StaticRepoProvider> {
    Ok(StaticRepoProvider::new(READ_ONLY_URL, remote.url())?)
}

fn rewrite_asd(work_dir: &Utf8Path) -> Result<AdjustMetadata, AdjustError> {
    write_file(work_dir.join("asd.txt"), "adjusted\n")
        .map_err(AdjustError::provider)?;
    Ok(serde_json::json!({"rewrote": ["asd.txt"]}))
}

fn leave_alone(_: &Utf8Path) -> Result<AdjustMetadata, AdjustError> {
    Ok(serde_json::json!({"rewrote": []}))
}

fn to_lf(work_dir: &Utf8Path) -> Result<AdjustMetadata, AdjustError> {
    let path = work_dir.join("win.txt");
    let bytes = fs_err::read(&path).map_err(AdjustError::provider)?;
    let lf: Vec<u8> = bytes.into_iter().filter(|b| *b != b'\r').collect();
    write_file(&path, lf).map_err(AdjustError::provider)?;
    Ok(serde_json::json!({"normalized": ["win.txt"]}))
}

fn rewrite_same(work_dir: &Utf8Path) -> Result<AdjustMetadata, AdjustError> {
    let path = work_dir.join("win.txt");
    let bytes = fs_err::read(&path).map_err(AdjustError::provider)?;
    write_file(&path, bytes).map_err(AdjustError::provider)?;
    Ok(serde_json::json!({"normalized": []}))
}

fn patch_vendored(
    work_dir: &Utf8Path,
) -> Result<AdjustMetadata, AdjustError> {
    write_file(work_dir.join("vendor/lib/a.c"), "int a = 1;\n")
        .map_err(AdjustError::provider)?;
    Ok(serde_json::json!({"patched": ["vendor/lib/a.c"]}))
}

/// A working tree whose attributes would normalize line endings on add.
fn crlf_tree() -> Result<Utf8TempDir> {
    let work = Utf8TempDir::with_prefix("source-capture-work-")?;
    write_file(work.path().join(".gitattributes"), "* text=auto\n")?;
    write_file(work.path().join("win.txt"), b"a\r\nb\r\n")?;
    Ok(work)
}

fn process(
    remote: &InternalRemote,
    work_dir: &Utf8Path,
    adjust: &dyn AdjustProvider,
) -> Result<CaptureReport> {
    let ingestor = Ingestor::new(test_config()?);
    let provider = |_: &PullSpec| -> Result<InternalRepo, CaptureError> {
        Ok(InternalRepo::new("", remote.url()))
    };
    let spec = PullSpec::archive("prepared", "https://example.com/p.tar.gz")
        .with_adjust(true);
    Ok(ingestor.process_source_tree(
        &spec,
        &provider,
        Some(adjust),
        work_dir,
        SourceType::Archive,
        "v1",
    )?)
}

#[test]
fn test_pull_git_without_adjust() -> Result<()> {
    let external = ExternalRepo::new()?;
    let remote = InternalRemote::new()?;
    let ingestor = Ingestor::new(test_config()?);

    let spec = PullSpec::git("demo", external.url(), "master");
    let report = ingestor.pull(&spec, &repos(&remote)?, None)?;

    let CaptureResult::Pull(pull) = &report.result else {
        panic!("expected a pull result, got {:?}", report.result);
    };
    assert_ref_name(&pull.branch, RefPrefix::Pull);
    assert_eq!(pull.tag, format!("{}-root", pull.branch));
    assert_eq!(pull.url, READ_ONLY_URL);
    assert_eq!(report.adjust_result, None);

    assert_eq!(remote.paths(&pull.branch)?, ["asd.txt"]);
    assert_eq!(remote.file(&pull.branch, "asd.txt")?, b"hello\n");
    assert_eq!(
        remote.tag_message(&pull.tag)?,
        format!(
            "Origin: {}\n    Reference: master\n    Type: git",
            external.url()
        )
    );
    assert!(remote.branches(RefPrefix::Adjust)?.is_empty());

    let json = serde_json::to_value(&report)?;
    assert_eq!(
        json,
        serde_json::json!({
            "url": READ_ONLY_URL,
            "branch": pull.branch,
            "tag": pull.tag,
        })
    );

    Ok(())
}

#[test]
fn test_pull_git_default_ref_recorded_as_head() -> Result<()> {
    let external = ExternalRepo::new()?;
    let remote = InternalRemote::new()?;
    let ingestor = Ingestor::new(test_config()?);

    let mut spec = PullSpec::git("demo", external.url(), "master");
    spec.reference = None;
    let report = ingestor.pull(&spec, &repos(&remote)?, None)?;

    let message = remote.tag_message(report.result.tag())?;
    assert!(
        message.contains("\n    Reference: HEAD\n"),
        "unexpected tag message: {message:?}"
    );

    Ok(())
}

#[test]
fn test_pull_with_adjust_commits_child() -> Result<()> {
    let external = ExternalRepo::new()?;
    let remote = InternalRemote::new()?;
    let ingestor =
        Ingestor::new(test_config()?).with_clock(FixedClock(1_700_000_000));

    let spec =
        PullSpec::git("demo", external.url(), "master").with_adjust(true);
    let report = ingestor.pull(&spec, &repos(&remote)?, Some(&rewrite_asd))?;

    let CaptureResult::Adjust(adjust) = &report.result else {
        panic!("expected an adjust result, got {:?}", report.result);
    };
    assert_eq!(adjust.branch, "adjust-1700000000");
    assert_eq!(adjust.tag, "adjust-1700000000-root");
    assert_eq!(adjust.url, READ_ONLY_URL);
    assert_eq!(adjust.pull.branch, "pull-1700000000");
    assert_eq!(adjust.pull.tag, "pull-1700000000-root");
    assert_eq!(adjust.pull.url, READ_ONLY_URL);
    assert_eq!(
        report.adjust_result,
        Some(serde_json::json!({"rewrote": ["asd.txt"]}))
    );

    let pull_commit = remote.rev_parse(&adjust.pull.branch)?;
    assert_eq!(remote.parents(&adjust.branch)?, [pull_commit]);
    assert_eq!(remote.file(&adjust.pull.branch, "asd.txt")?, b"hello\n");
    assert_eq!(remote.file(&adjust.branch, "asd.txt")?, b"adjusted\n");
    assert_eq!(
        remote.tag_message(&adjust.tag)?,
        remote.tag_message(&adjust.pull.tag)?,
        "both tags record the same origin"
    );

    let json = serde_json::to_value(&report)?;
    assert_eq!(json["branch"], "adjust-1700000000");
    assert_eq!(json["pull"]["branch"], "pull-1700000000");
    assert_eq!(json["adjust_result"]["rewrote"][0], "asd.txt");

    Ok(())
}

#[test]
fn test_adjust_without_changes_keeps_pull() -> Result<()> {
    let external = ExternalRepo::new()?;
    let remote = InternalRemote::new()?;
    let ingestor = Ingestor::new(test_config()?);

    let spec =
        PullSpec::git("demo", external.url(), "master").with_adjust(true);
    let report = ingestor.pull(&spec, &repos(&remote)?, Some(&leave_alone))?;

    assert!(
        matches!(report.result, CaptureResult::Pull(_)),
        "a no-op adjustment yields the pull result, got {:?}",
        report.result
    );
    assert_eq!(report.adjust_result, Some(serde_json::json!({"rewrote": []})));
    assert!(remote.branches(RefPrefix::Adjust)?.is_empty());
    assert_eq!(remote.branches(RefPrefix::Pull)?.len(), 1);

    Ok(())
}

#[test]
fn test_adjust_requested_without_provider() -> Result<()> {
    let external = ExternalRepo::new()?;
    let remote = InternalRemote::new()?;
    let ingestor = Ingestor::new(test_config()?);

    let spec =
        PullSpec::git("demo", external.url(), "master").with_adjust(true);
    let result = ingestor.pull(&spec, &repos(&remote)?, None);

    assert!(
        matches!(
            result,
            Err(CaptureError::Adjust(AdjustError::NotConfigured))
        ),
        "expected NotConfigured, got {result:?}"
    );
    assert_eq!(
        remote.branches(RefPrefix::Pull)?.len(),
        1,
        "the pull commit stays pushed"
    );

    Ok(())
}

#[test]
fn test_adjust_failure_leaves_pull_commit() -> Result<()> {
    let external = ExternalRepo::new()?;
    let remote = InternalRemote::new()?;
    let ingestor = Ingestor::new(test_config()?);
    let failing = |_: &Utf8Path| -> Result<AdjustMetadata, AdjustError> {
        Err(AdjustError::provider("patch did not apply"))
    };

    let spec =
        PullSpec::git("demo", external.url(), "master").with_adjust(true);
    let result = ingestor.pull(&spec, &repos(&remote)?, Some(&failing));

    assert!(
        matches!(result, Err(CaptureError::Adjust(AdjustError::Provider(_)))),
        "expected a provider failure, got {result:?}"
    );
    assert_eq!(remote.branches(RefPrefix::Pull)?.len(), 1);
    assert!(remote.branches(RefPrefix::Adjust)?.is_empty());

    Ok(())
}

#[test]
fn test_pull_archive_over_http() -> Result<()> {
    let remote = InternalRemote::new()?;
    let contents: &[u8] = b"hello world\n\x00\xffbinary tail";
    let body = tar_xz(&[
        ("asd.txt", contents, 0o644),
        ("docs/readme.md", b"# demo\n", 0o644),
    ])?;
    let base = serve_once("200 OK", body)?;
    let url = format!("{base}/demo-1.0.tar.xz");
    let ingestor = Ingestor::new(test_config()?);

    let spec = PullSpec::archive("demo", &url);
    let report = ingestor.pull(&spec, &repos(&remote)?, None)?;

    let branch = report.result.branch();
    assert_ref_name(branch, RefPrefix::Pull);
    assert_eq!(remote.paths(branch)?, ["asd.txt", "docs/readme.md"]);
    assert_eq!(
        remote.file(branch, "asd.txt")?,
        contents,
        "archive contents are stored byte for byte"
    );
    assert_eq!(
        remote.tag_message(report.result.tag())?,
        format!("Origin: {url}\n    Reference: \n    Type: archive")
    );

    Ok(())
}

#[test]
fn test_pull_archive_http_error() -> Result<()> {
    let remote = InternalRemote::new()?;
    let base = serve_once("404 Not Found", Vec::new())?;
    let ingestor = Ingestor::new(test_config()?);

    let spec = PullSpec::archive("demo", format!("{base}/missing.tar.xz"));
    let result = ingestor.pull(&spec, &repos(&remote)?, None);

    assert!(
        matches!(
            result,
            Err(CaptureError::Fetch(FetchError::HttpStatus {
                status: 404,
                ..
            }))
        ),
        "expected HTTP 404, got {result:?}"
    );
    assert!(remote.branches(RefPrefix::Pull)?.is_empty());

    Ok(())
}

#[test]
fn test_pull_unknown_git_ref() -> Result<()> {
    let external = ExternalRepo::new()?;
    let remote = InternalRemote::new()?;
    let ingestor = Ingestor::new(test_config()?);

    let spec = PullSpec::git("demo", external.url(), "v9.9.9");
    let result = ingestor.pull(&spec, &repos(&remote)?, None);

    assert!(
        matches!(
            result,
            Err(CaptureError::Fetch(FetchError::RefNotFound { .. }))
        ),
        "expected RefNotFound, got {result:?}"
    );
    assert!(remote.branches(RefPrefix::Pull)?.is_empty());

    Ok(())
}

#[test]
fn test_process_existing_tree() -> Result<()> {
    let remote = InternalRemote::new()?;
    let work = Utf8TempDir::with_prefix("source-capture-work-")?;
    write_file(work.path().join("asd.txt"), "prepared\n")?;
    let ingestor = Ingestor::new(test_config()?);
    let provider = |spec: &PullSpec| -> Result<InternalRepo, CaptureError> {
        assert_eq!(spec.name, "prepared");
        Ok(InternalRepo::new("", remote.url()))
    };

    let spec = PullSpec::archive("prepared", "https://example.com/p.tar.gz");
    let report = ingestor.process_source_tree(
        &spec,
        &provider,
        None,
        work.path(),
        SourceType::Archive,
        "v2",
    )?;

    assert_eq!(remote.file(report.result.branch(), "asd.txt")?, b"prepared\n");
    assert!(
        remote
            .tag_message(report.result.tag())?
            .contains("Reference: v2\n    Type: archive")
    );

    Ok(())
}

#[test]
fn test_missing_internal_repo_url() -> Result<()> {
    let work = Utf8TempDir::with_prefix("source-capture-work-")?;
    write_file(work.path().join("asd.txt"), "hello\n")?;
    let ingestor = Ingestor::new(test_config()?);
    let provider = |_: &PullSpec| -> Result<InternalRepo, CaptureError> {
        Ok(InternalRepo::new("https://ro.example/x.git", ""))
    };

    let spec = PullSpec::archive("orphan", "https://example.com/o.tar");
    let result = ingestor.process_source_tree(
        &spec,
        &provider,
        None,
        work.path(),
        SourceType::Archive,
        "",
    );
    match result {
        Err(CaptureError::Configuration(
            ConfigurationError::MissingRepoUrl { name },
        )) => assert_eq!(name, "orphan"),
        other => panic!("expected MissingRepoUrl, got {other:?}"),
    }

    Ok(())
}

#[test]
fn test_line_ending_adjust_is_committed() -> Result<()> {
    let remote = InternalRemote::new()?;
    let work = crlf_tree()?;

    let report = process(&remote, work.path(), &to_lf)?;

    let CaptureResult::Adjust(adjust) = &report.result else {
        panic!("expected an adjust result, got {:?}", report.result);
    };
    assert_eq!(remote.file(&adjust.pull.branch, "win.txt")?, b"a\r\nb\r\n");
    assert_eq!(remote.file(&adjust.branch, "win.txt")?, b"a\nb\n");
    assert_ne!(
        remote.tree(&adjust.branch)?,
        remote.tree(&adjust.pull.branch)?,
        "the adjust commit changes the tree"
    );

    Ok(())
}

#[test]
fn test_identical_rewrite_keeps_pull() -> Result<()> {
    let remote = InternalRemote::new()?;
    let work = crlf_tree()?;

    let report = process(&remote, work.path(), &rewrite_same)?;

    let CaptureResult::Pull(pull) = &report.result else {
        panic!("expected a pull result, got {:?}", report.result);
    };
    assert_eq!(remote.file(&pull.branch, "win.txt")?, b"a\r\nb\r\n");
    assert!(remote.branches(RefPrefix::Adjust)?.is_empty());

    Ok(())
}

#[test]
fn test_adjust_inside_nested_repository() -> Result<()> {
    let remote = InternalRemote::new()?;
    let work = Utf8TempDir::with_prefix("source-capture-work-")?;
    nested_repo(&work.path().join("vendor/lib"), "a.c", "int a;\n")?;

    let report = process(&remote, work.path(), &patch_vendored)?;

    let CaptureResult::Adjust(adjust) = &report.result else {
        panic!("expected an adjust result, got {:?}", report.result);
    };
    assert_eq!(
        remote.file(&adjust.pull.branch, "vendor/lib/a.c")?,
        b"int a;\n"
    );
    assert_eq!(remote.file(&adjust.branch, "vendor/lib/a.c")?, b"int a = 1;\n");
    assert_eq!(
        remote.entry_kind(&adjust.branch, "vendor/lib/a.c")?.as_deref(),
        Some("100644 blob")
    );

    Ok(())
}
