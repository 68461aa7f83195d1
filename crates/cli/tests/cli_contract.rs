use assert_cmd::cargo::cargo_bin_cmd;
use pdf_engine::fixtures::{self, FixturePage, FixtureText, LETTER};
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

const SCRIPT: &str = r##"{
    "edits": [{ "run": "n_p0_0", "text": "Goodbye", "color": "#cc0000" }],
    "added_texts": [{ "page_index": 0, "text": "Reviewed", "x": 72, "y": 72 }],
    "overlays": [{ "page_index": 1, "text": "DRAFT", "x_pct": 50, "y_pct": 10 }],
    "strokes": [
        { "page_index": 0, "points": [{ "x": 10, "y": 10 }, { "x": 20, "y": 20 }, { "x": 30, "y": 10 }] },
        { "page_index": 0, "points": [{ "x": 5, "y": 5 }], "mode": "eraser" }
    ]
}"##;

fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).expect("fixture should be written");
    path
}

fn two_page_pdf(dir: &Path) -> PathBuf {
    let bytes = fixtures::multi_page_pdf(&[
        FixturePage {
            size: LETTER,
            runs: vec![FixtureText::new("Hello", 100.0, 700.0, 12.0), FixtureText::new("World", 100.0, 680.0, 12.0)],
        },
        FixturePage { size: LETTER, runs: vec![FixtureText::new("Second", 72.0, 720.0, 18.0)] },
    ]);
    write_file(dir, "letter.pdf", &bytes)
}

fn stdout_json(cmd: &mut assert_cmd::Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout should contain valid json")
}

#[test]
fn info_reports_pages_and_runs() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = two_page_pdf(temp.path());

    let value = stdout_json(cargo_bin_cmd!("inkpatch").arg("info").arg(&pdf));

    assert_eq!(value["page_count"], 2);
    assert_eq!(value["pages"][0]["width"], 612.0);
    assert_eq!(value["pages"][0]["height"], 792.0);
    assert_eq!(value["pages"][0]["runs"], 2);
    assert_eq!(value["pages"][1]["runs"], 1);
}

#[test]
fn runs_lists_one_page() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = two_page_pdf(temp.path());

    let value = stdout_json(cargo_bin_cmd!("inkpatch").arg("runs").arg(&pdf).arg("--page").arg("2"));

    let runs = value.as_array().expect("runs should be an array");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["id"], "n_p1_0");
    assert_eq!(runs[0]["text"], "Second");
    assert_eq!(runs[0]["x"], 72.0);
}

#[test]
fn runs_rejects_page_out_of_range() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = two_page_pdf(temp.path());

    cargo_bin_cmd!("inkpatch")
        .arg("runs")
        .arg(&pdf)
        .arg("--page")
        .arg("3")
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn sample_falls_back_to_white_and_black_without_a_raster() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = two_page_pdf(temp.path());

    let value = stdout_json(cargo_bin_cmd!("inkpatch").arg("sample").arg(&pdf).arg("--run").arg("n_p0_1"));

    assert_eq!(value["run"], "n_p0_1");
    assert_eq!(value["background"], "#ffffff");
    assert_eq!(value["foreground"], "#000000");
}

#[test]
fn apply_writes_edited_copy_next_to_input() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = two_page_pdf(temp.path());
    let script = write_file(temp.path(), "edits.json", SCRIPT.as_bytes());

    let value = stdout_json(
        cargo_bin_cmd!("inkpatch").arg("apply").arg(&pdf).arg("--edits").arg(&script).arg("--offline"),
    );

    let output = temp.path().join("edited_letter.pdf");
    assert_eq!(value["output"], output.display().to_string());
    assert!(value.get("session").is_none());

    let report = json!({ "report": value["report"], "script": value["script"] });
    insta::with_settings!({ sort_maps => true }, {
        insta::assert_json_snapshot!("apply_report", report);
    });

    cargo_bin_cmd!("inkpatch")
        .arg("runs")
        .arg(&output)
        .arg("--page")
        .arg("1")
        .assert()
        .success()
        .stdout(predicate::str::contains("Goodbye").and(predicate::str::contains("Reviewed")));
}

#[test]
fn apply_honors_output_and_session_dir() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = two_page_pdf(temp.path());
    let script = write_file(temp.path(), "edits.json", SCRIPT.as_bytes());
    let output = temp.path().join("out/final.pdf");
    let sessions = temp.path().join("sessions");

    let value = stdout_json(
        cargo_bin_cmd!("inkpatch")
            .arg("apply")
            .arg(&pdf)
            .arg("--edits")
            .arg(&script)
            .arg("--output")
            .arg(&output)
            .arg("--session-dir")
            .arg(&sessions)
            .arg("--offline"),
    );

    assert!(output.is_file(), "output PDF should exist");
    let saved = sessions.join("letter.pdf.session.json");
    assert_eq!(value["session"], saved.display().to_string());
    let envelope: Value =
        serde_json::from_slice(&fs::read(&saved).expect("session should be saved")).expect("session should be json");
    assert_eq!(envelope["version"], 1);
    assert_eq!(envelope["source_name"], "letter.pdf");
}

#[test]
fn apply_fails_for_unknown_run() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = two_page_pdf(temp.path());
    let script = write_file(temp.path(), "edits.json", br#"{ "edits": [{ "run": "n_p0_7", "text": "x" }] }"#);

    cargo_bin_cmd!("inkpatch")
        .arg("apply")
        .arg(&pdf)
        .arg("--edits")
        .arg(&script)
        .arg("--offline")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown text run n_p0_7"));

    assert!(!temp.path().join("edited_letter.pdf").exists());
}

#[test]
fn apply_rejects_invalid_config() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = two_page_pdf(temp.path());
    let script = write_file(temp.path(), "edits.json", b"{}");

    cargo_bin_cmd!("inkpatch")
        .arg("apply")
        .arg(&pdf)
        .arg("--edits")
        .arg(&script)
        .env("INKPATCH_SAMPLE_SCALE", "0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid export configuration"));
}

#[test]
fn info_fails_for_missing_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    cargo_bin_cmd!("inkpatch")
        .arg("info")
        .arg(temp.path().join("missing.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn info_fails_for_invalid_pdf() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_file(temp.path(), "invalid.pdf", b"not a pdf");

    cargo_bin_cmd!("inkpatch")
        .arg("info")
        .arg(&pdf)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open PDF"));
}

#[test]
fn info_fails_for_encrypted_marker_pdf() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let mut bytes = fixtures::single_run_pdf("Hello", 100.0, 700.0, 12.0);
    bytes.extend_from_slice(b"\n% /Encrypt\n");
    let pdf = write_file(temp.path(), "locked.pdf", &bytes);

    cargo_bin_cmd!("inkpatch")
        .arg("info")
        .arg(&pdf)
        .assert()
        .failure()
        .stderr(predicate::str::contains("encrypted PDFs are not supported"));
}
