//! End-to-end CLI tests for the bulkdl binary.

// `Command::cargo_bin` is deprecated in assert_cmd >=2.0.17 in favor of
// `cargo::cargo_bin_cmd!` macro. Suppressed until migration to the new API.
#![allow(deprecated)]

mod support;
use support::socket_guard::{socket_skip_return, start_mock_server_or_skip};

use std::path::Path;

use assert_cmd::Command;
use bulkdl_core::history::CompletionMetadata;
use bulkdl_core::{Database, Fingerprint, FingerprintPolicy, SqliteHistory};
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A command running inside `workdir` with an isolated config home.
fn bulkdl(workdir: &Path) -> Command {
    let config_home = workdir.join("xdg-config");
    std::fs::create_dir_all(&config_home).unwrap();
    let mut cmd = Command::cargo_bin("bulkdl").unwrap();
    cmd.current_dir(workdir)
        .env("XDG_CONFIG_HOME", &config_home)
        .env_remove("RUST_LOG");
    cmd
}

fn toml_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "\\\\")
}

fn seed_completed_history_row(db_path: &Path, url: &str) {
    tokio_test::block_on(async {
        let history = SqliteHistory::new(Database::new(db_path).await.unwrap());
        let fingerprint = Fingerprint::compute(url, None, FingerprintPolicy::UrlAndSize);
        history
            .record_completed(
                &fingerprint,
                &CompletionMetadata {
                    source_url: url,
                    file_path: None,
                    file_size: None,
                },
            )
            .await
            .unwrap();
        history.database().clone().close().await;
    });
}

async fn mount_file(server: &MockServer, route: &str, body: &'static [u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let tempdir = TempDir::new().unwrap();
    bulkdl(tempdir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bulk download files"))
        .stdout(predicate::str::contains("--input-file"))
        .stdout(predicate::str::contains("Exit codes:"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let tempdir = TempDir::new().unwrap();
    bulkdl(tempdir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_binary_missing_input_file_is_created_and_exits_one() {
    let tempdir = TempDir::new().unwrap();

    let assert = bulkdl(tempdir.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("URLs.txt created. Populate it and retry."));
    assert_eq!(assert.get_output().status.code(), Some(1));
    assert!(tempdir.path().join("URLs.txt").is_file());
    assert!(tempdir.path().join("downloader.log").is_file());
}

#[test]
fn test_binary_empty_input_file_prints_guidance_and_exits_zero() {
    let tempdir = TempDir::new().unwrap();
    std::fs::write(tempdir.path().join("URLs.txt"), "nothing to see here\n").unwrap();

    bulkdl(tempdir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No links found"));
    assert!(!tempdir.path().join("Downloads").exists());
    assert!(!tempdir.path().join("download_history.sqlite").exists());
}

#[test]
fn test_binary_rejects_threads_above_maximum() {
    let tempdir = TempDir::new().unwrap();
    bulkdl(tempdir.path())
        .args(["--threads", "101"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("101"));
}

#[test]
fn test_binary_rejects_invalid_config_file() {
    let tempdir = TempDir::new().unwrap();
    let config = tempdir.path().join("bulkdl.toml");
    std::fs::write(&config, "rate_limit = 3\n").unwrap();

    let assert = bulkdl(tempdir.path())
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
    assert_eq!(assert.get_output().status.code(), Some(1));
}

#[test]
fn test_binary_skips_links_already_in_history() {
    let tempdir = TempDir::new().unwrap();
    // Nothing listens on the discard port, so a fetch would fail.
    let url = "http://127.0.0.1:9/seen.jpg";
    seed_completed_history_row(&tempdir.path().join("download_history.sqlite"), url);
    std::fs::write(tempdir.path().join("URLs.txt"), format!("{url}\n")).unwrap();

    bulkdl(tempdir.path())
        .args(["--attempts", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipped (already downloaded): 1"))
        .stdout(predicate::str::contains("Failed").not());
}

#[tokio::test]
async fn test_binary_downloads_links_and_exits_zero() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    mount_file(&mock_server, "/album/one.jpg", b"one").await;
    mount_file(&mock_server, "/album/two.mp4", b"two").await;

    let tempdir = TempDir::new().unwrap();
    std::fs::write(
        tempdir.path().join("URLs.txt"),
        format!(
            "first: {uri}/album/one.jpg\nsecond: {uri}/album/two.mp4.\n",
            uri = mock_server.uri()
        ),
    )
    .unwrap();

    bulkdl(tempdir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Downloaded: 2"))
        .stdout(predicate::str::contains("Finished downloading. Enjoy :)"));

    let host_dir = tempdir.path().join("Downloads").join("127.0.0.1");
    assert_eq!(std::fs::read(host_dir.join("one.jpg")).unwrap(), b"one");
    assert_eq!(std::fs::read(host_dir.join("two.mp4")).unwrap(), b"two");
    assert!(tempdir.path().join("download_history.sqlite").is_file());
}

#[tokio::test]
async fn test_binary_second_run_skips_history_and_reports_json() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("GET"))
        .and(path("/once.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".as_slice()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let tempdir = TempDir::new().unwrap();
    std::fs::write(tempdir.path().join("URLs.txt"), "").unwrap();
    let url = format!("{}/once.png", mock_server.uri());

    bulkdl(tempdir.path()).arg(&url).assert().success();

    let assert = bulkdl(tempdir.path())
        .arg("--json")
        .arg(&url)
        .assert()
        .success();
    let summary: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(summary["skipped_duplicate"], 1);
    assert_eq!(summary["succeeded"], 0);
    assert_eq!(summary["interrupted"], false);
}

#[tokio::test]
async fn test_binary_partial_failure_exits_two() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    mount_file(&mock_server, "/ok.jpg", b"ok").await;
    Mock::given(method("GET"))
        .and(path("/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let tempdir = TempDir::new().unwrap();
    std::fs::write(tempdir.path().join("URLs.txt"), "").unwrap();

    let assert = bulkdl(tempdir.path())
        .args(["--attempts", "1"])
        .arg(format!("{}/ok.jpg", mock_server.uri()))
        .arg(format!("{}/missing.jpg", mock_server.uri()))
        .assert()
        .failure()
        .stdout(predicate::str::contains("Failed: 1"))
        .stdout(predicate::str::contains("missing.jpg"));
    assert_eq!(
        assert.get_output().status.code(),
        Some(2),
        "partial success must yield exit code 2"
    );
}

#[tokio::test]
async fn test_binary_total_failure_exits_one() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let tempdir = TempDir::new().unwrap();
    std::fs::write(tempdir.path().join("URLs.txt"), "").unwrap();

    let assert = bulkdl(tempdir.path())
        .args(["--attempts", "2", "-q"])
        .arg(format!("{}/a.jpg", mock_server.uri()))
        .assert()
        .failure();
    assert_eq!(assert.get_output().status.code(), Some(1));
    assert!(!tempdir.path().join("Downloads").join("127.0.0.1").exists());
}

#[tokio::test]
async fn test_binary_excluded_images_are_not_requested() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("GET"))
        .and(path("/pic.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".as_slice()))
        .expect(0)
        .mount(&mock_server)
        .await;
    mount_file(&mock_server, "/song.mp3", b"audio").await;

    let tempdir = TempDir::new().unwrap();
    std::fs::write(tempdir.path().join("URLs.txt"), "").unwrap();

    bulkdl(tempdir.path())
        .arg("--exclude-images")
        .arg(format!("{}/pic.jpg", mock_server.uri()))
        .arg(format!("{}/song.mp3", mock_server.uri()))
        .assert()
        .success()
        .stdout(predicate::str::contains("Excluded by filter: 1"));
}

#[tokio::test]
async fn test_binary_config_file_sets_output_folder() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    mount_file(&mock_server, "/cfg.jpg", b"cfg").await;

    let tempdir = TempDir::new().unwrap();
    std::fs::write(tempdir.path().join("URLs.txt"), "").unwrap();
    let target = tempdir.path().join("from-config");
    let config_dir = tempdir.path().join("xdg-config").join("bulkdl");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        format!("output_folder = \"{}\"\n", toml_path(&target)),
    )
    .unwrap();

    bulkdl(tempdir.path())
        .arg(format!("{}/cfg.jpg", mock_server.uri()))
        .assert()
        .success();

    assert!(target.join("127.0.0.1").join("cfg.jpg").is_file());
    assert!(!tempdir.path().join("Downloads").exists());
}
