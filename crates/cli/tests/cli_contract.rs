use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../tests/fixtures").join(name)
}

fn stdout_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout should contain valid json")
}

fn create_project(data: &Path) -> String {
    let output = cargo_bin_cmd!("iiif-annotator")
        .arg("--data")
        .arg(data)
        .args(["project", "create"])
        .arg(fixture("manifest.json"))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let meta = stdout_json(&output);
    meta["id"].as_str().expect("project id should be a string").to_owned()
}

#[test]
fn inspect_emits_stable_summary() {
    let output = cargo_bin_cmd!("iiif-annotator")
        .arg("inspect")
        .arg(fixture("manifest.json"))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8(output).expect("stdout should be utf-8");
    insta::assert_snapshot!("inspect_manifest", stdout.trim_end());
}

#[test]
fn inspect_rejects_collections() {
    cargo_bin_cmd!("iiif-annotator")
        .arg("inspect")
        .arg(fixture("collection.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a IIIF Presentation v3 Manifest"));
}

#[test]
fn inspect_fails_for_missing_file() {
    cargo_bin_cmd!("iiif-annotator")
        .arg("inspect")
        .arg(fixture("missing.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn project_create_list_and_delete() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let id = create_project(temp.path());
    assert!(id.starts_with("urn:uuid:"));

    let output = cargo_bin_cmd!("iiif-annotator")
        .arg("--data")
        .arg(temp.path())
        .args(["project", "list"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let listed = stdout_json(&output);
    assert_eq!(listed[0]["id"], id.as_str());
    assert_eq!(listed[0]["name"], "往来物");
    assert_eq!(listed[0]["sourceType"], "manifest-file");

    cargo_bin_cmd!("iiif-annotator")
        .arg("--data")
        .arg(temp.path())
        .args(["project", "delete", id.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted:"));

    cargo_bin_cmd!("iiif-annotator")
        .arg("--data")
        .arg(temp.path())
        .args(["project", "show", id.as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("project not found"));
}

#[test]
fn project_create_records_source_url() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    let output = cargo_bin_cmd!("iiif-annotator")
        .arg("--data")
        .arg(temp.path())
        .args(["project", "create"])
        .arg(fixture("manifest.json"))
        .args(["--name", "remote", "--source-url", "https://example.org/iiif/book1/manifest"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let meta = stdout_json(&output);
    assert_eq!(meta["name"], "remote");
    assert_eq!(meta["sourceType"], "manifest-url");
    assert_eq!(meta["sourceRef"], "https://example.org/iiif/book1/manifest");
}

#[test]
fn ocr_import_persists_and_exports() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let id = create_project(temp.path());

    let output = cargo_bin_cmd!("iiif-annotator")
        .env("IIIF_DATA_DIR", temp.path())
        .args(["import-ocr", id.as_str()])
        .arg(fixture("page_00002.json"))
        .args(["--language", "en"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let summary = stdout_json(&output);
    assert_eq!(summary["imported"], 2);
    assert_eq!(summary["canvases"], serde_json::json!([1]));

    let output = cargo_bin_cmd!("iiif-annotator")
        .arg("--data")
        .arg(temp.path())
        .args(["project", "show", id.as_str()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let shown = stdout_json(&output);
    assert_eq!(shown["canvases"][0]["annotations"], 1);
    assert_eq!(shown["canvases"][1]["annotations"], 2);

    let exported_path = temp.path().join("out").join("manifest-annotated.json");
    cargo_bin_cmd!("iiif-annotator")
        .arg("--data")
        .arg(temp.path())
        .args(["export", id.as_str(), "--output"])
        .arg(&exported_path)
        .assert()
        .success();

    let text = std::fs::read_to_string(&exported_path).expect("export should be written");
    assert!(text.starts_with("{\n  \"@context\""));
    let exported: Value = serde_json::from_str(&text).expect("export should be valid json");

    let first = &exported["items"][0]["annotations"];
    assert_eq!(first.as_array().map(Vec::len), Some(1));
    assert_eq!(first[0]["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(first[0]["items"][0]["target"], "https://example.org/iiif/book1/canvas/p1#xywh=100,200,300,400");

    let second = &exported["items"][1]["annotations"][0]["items"];
    assert_eq!(second[0]["body"]["value"], "first line");
    assert_eq!(second[0]["body"]["language"], "en");
    assert_eq!(second[0]["target"], "https://example.org/iiif/book1/canvas/p2#xywh=20,40,200,80");
    assert_eq!(second[1]["target"], "https://example.org/iiif/book1/canvas/p2#xywh=400,600,400,80");
}

#[test]
fn ocr_import_reports_unmatched_files() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let id = create_project(temp.path());
    let stray = temp.path().join("unrelated.json");
    std::fs::write(&stray, r#"{ "contents": [] }"#).expect("write stray OCR file");

    cargo_bin_cmd!("iiif-annotator")
        .arg("--data")
        .arg(temp.path())
        .args(["import-ocr", id.as_str()])
        .arg(&stray)
        .assert()
        .failure()
        .stdout(predicate::str::contains("no canvas matches"))
        .stderr(predicate::str::contains("no OCR file could be imported"));
}

#[test]
fn export_pages_writes_one_file_per_annotated_canvas() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let id = create_project(temp.path());
    let pages_dir = temp.path().join("pages");

    cargo_bin_cmd!("iiif-annotator")
        .arg("--data")
        .arg(temp.path())
        .args(["export-pages", id.as_str(), "--output-dir"])
        .arg(&pages_dir)
        .assert()
        .success();

    assert!(pages_dir.join("0.json").exists());
    assert!(!pages_dir.join("1.json").exists());

    let page: Value = serde_json::from_str(
        &std::fs::read_to_string(pages_dir.join("0.json")).expect("page should be written"),
    )
    .expect("page should be valid json");
    assert_eq!(page["@context"], "http://iiif.io/api/presentation/3/context.json");
    assert_eq!(page["type"], "AnnotationPage");
}

#[test]
fn settings_persist_between_runs() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    cargo_bin_cmd!("iiif-annotator")
        .arg("--data")
        .arg(temp.path())
        .args(["settings", "--language", "en", "--safe-delete", "false"])
        .assert()
        .success();

    let output = cargo_bin_cmd!("iiif-annotator")
        .arg("--data")
        .arg(temp.path())
        .arg("settings")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let settings = stdout_json(&output);
    assert_eq!(settings["defaultLanguage"], "en");
    assert_eq!(settings["safeDelete"], false);
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("iiif-annotator")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
