//! CLI end-to-end tests
//!
//! Tests for the scdloop command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use scdloop_format::testing::{filler, VorbisFixture};
use scdloop_format::{CodecId, ScdBuilder, ScdFile};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{tempdir, TempDir};

/// Get a command for the scdloop binary
#[allow(deprecated)]
fn scdloop_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("scdloop").unwrap();
    // Keep default config lookup away from the developer's files.
    cmd.current_dir(dir).env("HOME", dir).env_remove("RUST_LOG");
    cmd
}

fn pcm_file(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("se_pcm.scd");
    let bytes = ScdBuilder::new(CodecId::Pcm16, 2, 44_100)
        .stream(filler(4 * 44_100))
        .build()
        .unwrap();
    fs::write(&path, bytes).unwrap();
    path
}

fn vorbis_file(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("bgm_vorbis.scd");
    fs::write(&path, VorbisFixture::new(2, 44_100).build().unwrap()).unwrap();
    path
}

#[test]
fn test_cli_no_args_shows_help() {
    let dir = tempdir().unwrap();
    scdloop_cmd(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_flag() {
    let dir = tempdir().unwrap();
    scdloop_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("scdloop"));
}

#[test]
fn test_cli_write_help() {
    let dir = tempdir().unwrap();
    scdloop_cmd(dir.path())
        .args(["write", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--no-header-sync"));
}

#[test]
fn test_cli_read_without_loop() {
    let dir = tempdir().unwrap();
    let file = pcm_file(&dir);
    scdloop_cmd(dir.path())
        .arg("read")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Codec: PCM16"))
        .stdout(predicate::str::contains("Length: 44100 samples"))
        .stdout(predicate::str::contains("Loop: none"));
}

#[test]
fn test_cli_write_then_read_json() {
    let dir = tempdir().unwrap();
    let file = vorbis_file(&dir);

    scdloop_cmd(dir.path())
        .arg("write")
        .arg(&file)
        .args(["0", "88200"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote loop"))
        .stdout(predicate::str::contains("embedded-comment"))
        .stdout(predicate::str::contains("Size change: +32 bytes"));

    let output = scdloop_cmd(dir.path())
        .arg("read")
        .arg(&file)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["strategy"], "EmbeddedComment");
    assert_eq!(json["total_samples"], 88_200);
    assert_eq!(json["loop_points"]["start"], 0);
    assert_eq!(json["loop_points"]["end"], 88_200);
    assert_eq!(json["loop_points"]["valid"], true);
}

#[test]
fn test_cli_no_header_sync() {
    let dir = tempdir().unwrap();
    let file = vorbis_file(&dir);

    scdloop_cmd(dir.path())
        .arg("write")
        .arg(&file)
        .args(["22050", "88200", "--no-header-sync"])
        .assert()
        .success();

    let meta = ScdFile::open(&file).unwrap().metadata().clone();
    assert_eq!((meta.loop_start_bytes, meta.loop_end_bytes), (0, 0));
}

#[test]
fn test_cli_clear() {
    let dir = tempdir().unwrap();
    let file = pcm_file(&dir);

    scdloop_cmd(dir.path())
        .arg("write")
        .arg(&file)
        .args(["100", "200"])
        .assert()
        .success();
    scdloop_cmd(dir.path())
        .arg("clear")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared loop"));
    scdloop_cmd(dir.path())
        .arg("read")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Loop: none"));
}

#[test]
fn test_cli_invalid_range_says_file_unchanged() {
    let dir = tempdir().unwrap();
    let file = pcm_file(&dir);
    let before = fs::read(&file).unwrap();

    scdloop_cmd(dir.path())
        .arg("write")
        .arg(&file)
        .args(["500", "100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("the original file is unchanged"));

    assert_eq!(fs::read(&file).unwrap(), before);
}

#[test]
fn test_cli_unknown_codec() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("odd.scd");
    let bytes = ScdBuilder::new(CodecId::Other(99), 1, 22_050)
        .stream(filler(256))
        .build()
        .unwrap();
    fs::write(&file, &bytes).unwrap();

    scdloop_cmd(dir.path())
        .arg("info")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("unknown (0x63)"));

    scdloop_cmd(dir.path())
        .arg("read")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("no loop support"))
        .stdout(predicate::str::contains("Sample rate: 22050 Hz"))
        .stdout(predicate::str::contains("Loop: none"));

    scdloop_cmd(dir.path())
        .arg("write")
        .arg(&file)
        .args(["0", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("original file is unchanged"));

    assert_eq!(fs::read(&file).unwrap(), bytes);
}

#[test]
fn test_cli_missing_file() {
    let dir = tempdir().unwrap();
    scdloop_cmd(dir.path())
        .args(["read", "missing.scd"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_cli_info_json() {
    let dir = tempdir().unwrap();
    let file = pcm_file(&dir);
    let output = scdloop_cmd(dir.path())
        .arg("info")
        .arg(&file)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["channels"], 2);
    assert_eq!(json["sample_rate"], 44_100);
    assert_eq!(json["stream_size"], 4 * 44_100);
}

#[test]
fn test_cli_config_enables_json_output() {
    let dir = tempdir().unwrap();
    let file = pcm_file(&dir);
    fs::write(dir.path().join("scdloop.toml"), "[output]\njson = true\n").unwrap();

    scdloop_cmd(dir.path())
        .arg("read")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_samples\": 44100"));
}

#[test]
fn test_cli_validate_config() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("custom.toml");
    fs::write(&config, "[edit]\nkeep_backup_on_failure = true\n").unwrap();

    scdloop_cmd(dir.path())
        .arg("validate")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("Keep backup on failure: true"));

    fs::write(&config, "[edit]\nsync_vorbis_header = \"yes\"\n").unwrap();
    scdloop_cmd(dir.path())
        .args(["--config"])
        .arg(&config)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[test]
fn test_cli_validate_defaults() {
    let dir = tempdir().unwrap();
    scdloop_cmd(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("using defaults"));
}
