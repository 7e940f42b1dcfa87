//! CLI integration tests

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use image::{GrayImage, Luma};
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Build command for the boardmatch-cli binary.
fn boardmatch_cli() -> Command {
    cargo_bin_cmd!("boardmatch-cli")
}

fn paint(img: &mut GrayImage, x: u32, y: u32, w: u32, h: u32) {
    for yy in y..y + h {
        for xx in x..x + w {
            img.put_pixel(xx, yy, Luma([0]));
        }
    }
}

/// Writes a two-pad board, optionally bridged, and a matching resistor
/// footprint with its pin table.
fn fixtures(bridged: bool) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().to_path_buf();

    let mut mask = GrayImage::from_pixel(120, 80, Luma([255]));
    paint(&mut mask, 42, 32, 8, 8);
    paint(&mut mask, 58, 32, 8, 8);
    let mut traces = mask.clone();
    if bridged {
        paint(&mut traces, 50, 35, 8, 2);
    }
    mask.save(root.join("front_mask.png")).expect("mask");
    traces.save(root.join("front_traces.png")).expect("traces");

    let mut footprint = GrayImage::from_pixel(24, 8, Luma([255]));
    paint(&mut footprint, 0, 0, 8, 8);
    paint(&mut footprint, 16, 0, 8, 8);
    footprint.save(root.join("r0805.png")).expect("footprint");
    std::fs::write(
        root.join("r0805.json"),
        r#"[{"label": "1", "x": -0.8, "y": 0.0}, {"label": "2", "x": 0.8, "y": 0.0}]"#,
    )
    .expect("pins");

    (dir, root)
}

fn match_cmd(root: &Path) -> Command {
    let mut cmd = boardmatch_cli();
    cmd.arg("match")
        .arg("--front-mask")
        .arg(root.join("front_mask.png"))
        .arg("--front-traces")
        .arg(root.join("front_traces.png"))
        .arg("--footprint")
        .arg(root.join("r0805.png"))
        .arg("--pins")
        .arg(root.join("r0805.json"))
        .arg("--px-per-mm")
        .arg("10");
    cmd
}

#[test]
fn test_cli_help() {
    let mut cmd = boardmatch_cli();

    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Footprint matching"));
}

#[test]
fn test_cli_version() {
    let mut cmd = boardmatch_cli();

    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_match_human() {
    let (_dir, root) = fixtures(false);

    match_cmd(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("front side at (40, 30)"))
        .stdout(predicate::str::contains("1 matches"));
}

#[test]
fn test_cli_match_json() {
    let (_dir, root) = fixtures(false);

    let output = match_cmd(&root).arg("--format").arg("json").output().expect("run");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let matches = json.as_array().expect("array");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["side"], "front");
    assert_eq!(matches[0]["orientation"], 0);
}

#[test]
fn test_cli_bridged_board_has_no_matches() {
    let (_dir, root) = fixtures(true);

    match_cmd(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("No matches found"));
}

#[test]
fn test_cli_saves_and_renders() {
    let (_dir, root) = fixtures(false);
    let saved = root.join("matches.json");
    let render = root.join("render.png");

    match_cmd(&root)
        .arg("--output")
        .arg(&saved)
        .arg("--render")
        .arg(&render)
        .assert()
        .success();

    let text = std::fs::read_to_string(&saved).expect("saved matches");
    assert!(text.contains("\"pin_to_pads\""));
    let img = image::open(&render).expect("render").to_rgb8();
    assert_eq!(img.dimensions(), (120, 80));
}

#[test]
fn test_cli_missing_input() {
    let (_dir, root) = fixtures(false);

    boardmatch_cli()
        .arg("match")
        .arg("--front-mask")
        .arg(root.join("does_not_exist.png"))
        .arg("--front-traces")
        .arg(root.join("front_traces.png"))
        .arg("--footprint")
        .arg(root.join("r0805.png"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_cli_nets() {
    let (_dir, root) = fixtures(true);

    boardmatch_cli()
        .arg("nets")
        .arg("--front-mask")
        .arg(root.join("front_mask.png"))
        .arg("--front-traces")
        .arg(root.join("front_traces.png"))
        .assert()
        .success()
        .stdout(predicate::str::contains("front pads [0, 1]"))
        .stdout(predicate::str::contains("1 nets"));
}

#[test]
fn test_cli_pad_out_of_range() {
    let (_dir, root) = fixtures(false);

    boardmatch_cli()
        .arg("pad")
        .arg("--front-mask")
        .arg(root.join("front_mask.png"))
        .arg("--front-traces")
        .arg(root.join("front_traces.png"))
        .arg("--footprint")
        .arg(root.join("r0805.png"))
        .arg("--px-per-mm")
        .arg("10")
        .arg("--pad")
        .arg("7")
        .assert()
        .failure()
        .stderr(predicate::str::contains("pad 7 does not exist"));
}

#[test]
fn test_cli_pad_search() {
    let (_dir, root) = fixtures(false);

    boardmatch_cli()
        .arg("pad")
        .arg("--front-mask")
        .arg(root.join("front_mask.png"))
        .arg("--front-traces")
        .arg(root.join("front_traces.png"))
        .arg("--footprint")
        .arg(root.join("r0805.png"))
        .arg("--pins")
        .arg(root.join("r0805.json"))
        .arg("--px-per-mm")
        .arg("10")
        .arg("--pad")
        .arg("0")
        .arg("--pin")
        .arg("1")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 matches"));
}
