//! Integration tests for the pbxkit CLI.

use serde_json::Value;
use std::path::Path;
use std::process::Command;

fn run_pbxkit(dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_pbxkit"))
        .current_dir(dir)
        .env_remove("PBXKIT_PROJECT")
        .env_remove("PBXKIT_PROJECT_ROOT")
        .env("PBXKIT_LOG", "off")
        .args(args)
        .output()
        .expect("run pbxkit");

    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

fn run_ok(dir: &Path, args: &[&str]) -> String {
    let (code, out, err) = run_pbxkit(dir, args);
    assert_eq!(code, 0, "pbxkit {args:?} failed: {err}");
    out
}

fn run_json(dir: &Path, args: &[&str]) -> (i32, Value) {
    let mut full = args.to_vec();
    full.extend(["-f", "json"]);
    let (code, out, err) = run_pbxkit(dir, &full);
    let text = if out.trim().is_empty() { err } else { out };
    let value = serde_json::from_str(&text).expect("json output");
    (code, value)
}

fn init_project(dir: &Path) -> std::path::PathBuf {
    run_ok(dir, &["init", "Demo"]);
    let path = dir.join("Demo.pbxproj.json");
    assert!(path.exists());
    path
}

fn read_doc(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).expect("read project")).expect("parse project")
}

/// Deletes the product of the only target, as if it was lost in a merge.
fn drop_only_product(path: &Path) {
    let mut doc = read_doc(path);
    let product = {
        let targets = doc["targets"].as_object_mut().expect("targets");
        let (_, target) = targets.iter_mut().next().expect("one target");
        target
            .as_object_mut()
            .expect("target object")
            .remove("product")
            .expect("product id")
    };
    let product = product.as_str().expect("id string").to_string();
    doc["file_refs"]
        .as_object_mut()
        .expect("file_refs")
        .remove(&product);
    let products_group = doc["products_group"].as_str().expect("products group").to_string();
    doc["groups"][&products_group]["children"]
        .as_array_mut()
        .expect("children")
        .retain(|c| c["file"].as_str() != Some(product.as_str()));
    std::fs::write(path, serde_json::to_vec_pretty(&doc).expect("encode")).expect("write");
}

#[test]
fn init_then_add_target_and_file() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = init_project(tmp.path());

    run_ok(tmp.path(), &["target", "add", "App", "--type", "application"]);
    run_ok(tmp.path(), &["group", "add", "/", "Sources", "--path", "Sources"]);

    let (code, value) = run_json(
        tmp.path(),
        &["file", "add", "main.swift", "--group", "Sources", "--target", "App"],
    );
    assert_eq!(code, 0, "{value}");
    assert_eq!(value["success"], true);
    assert_eq!(value["data"]["written"], true);
    assert_eq!(value["data"]["result"]["path"], "Sources/main.swift");
    assert_eq!(value["data"]["result"]["build_files"][0]["outcome"]["outcome"], "added");

    let doc = read_doc(&path);
    assert_eq!(doc["build_files"].as_object().expect("build files").len(), 1);

    let out = run_ok(tmp.path(), &["target", "list"]);
    assert!(out.contains("App.app"), "{out}");

    let (code, value) = run_json(tmp.path(), &["phase", "list", "App"]);
    assert_eq!(code, 0);
    let sources = value["data"]
        .as_array()
        .expect("phases")
        .iter()
        .find(|p| p["kind"] == "sources")
        .expect("sources phase");
    assert_eq!(sources["files"], 1);
}

#[test]
fn adding_the_same_file_twice_reports_existing_entry() {
    let tmp = tempfile::tempdir().expect("tempdir");
    init_project(tmp.path());
    run_ok(tmp.path(), &["target", "add", "App", "--type", "application"]);
    run_ok(tmp.path(), &["file", "add", "main.swift", "--target", "App"]);

    let (code, value) = run_json(tmp.path(), &["file", "resolve", "main.swift"]);
    assert_eq!(code, 0);
    let file_id = value["data"]["id"].as_str().expect("id").to_string();

    let (code, err) = run_json(tmp.path(), &["target", "add", "App"]);
    assert_eq!(code, 3);
    assert_eq!(err["error"]["code"], "target_exists");

    let (code, value) = run_json(tmp.path(), &["file", "list"]);
    assert_eq!(code, 0);
    assert!(value["data"]
        .as_array()
        .expect("files")
        .iter()
        .any(|f| f["id"] == file_id.as_str()));
}

#[test]
fn ambiguous_file_name_exits_with_conflict() {
    let tmp = tempfile::tempdir().expect("tempdir");
    init_project(tmp.path());
    run_ok(tmp.path(), &["group", "add", "", "A"]);
    run_ok(tmp.path(), &["group", "add", "", "B"]);
    run_ok(tmp.path(), &["file", "add", "Model.swift", "--group", "A"]);
    run_ok(tmp.path(), &["file", "add", "Model.swift", "--group", "B"]);

    let (code, value) = run_json(tmp.path(), &["file", "resolve", "Model.swift"]);
    assert_eq!(code, 3);
    assert_eq!(value["success"], false);
    assert_eq!(value["error"]["kind"], "ambiguous_reference");
    assert_eq!(value["error"]["candidates"].as_array().map(Vec::len), Some(2));

    let (code, value) = run_json(tmp.path(), &["file", "resolve", "B/Model.swift"]);
    assert_eq!(code, 0);
    assert_eq!(value["data"]["path"], "B/Model.swift");

    let (code, _, _) = run_pbxkit(tmp.path(), &["file", "resolve", "Missing.swift"]);
    assert_eq!(code, 2);
}

#[test]
fn dry_run_leaves_project_untouched() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = init_project(tmp.path());
    let before = std::fs::read(&path).expect("read");

    let (code, value) = run_json(
        tmp.path(),
        &["--dry-run", "target", "add", "App", "--type", "framework"],
    );
    assert_eq!(code, 0, "{value}");
    assert_eq!(value["data"]["written"], false);
    assert_eq!(std::fs::read(&path).expect("read"), before);
}

#[test]
fn failed_mutation_leaves_project_untouched() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = init_project(tmp.path());
    run_ok(tmp.path(), &["target", "add", "App", "--type", "application"]);
    let before = std::fs::read(&path).expect("read");

    // The file reference is added before the unknown target is looked up.
    let (code, _, err) = run_pbxkit(
        tmp.path(),
        &["file", "add", "main.swift", "--target", "Nope"],
    );
    assert_eq!(code, 2, "{err}");
    assert_eq!(std::fs::read(&path).expect("read"), before);
}

#[test]
fn repair_recreates_missing_product_and_is_idempotent() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = init_project(tmp.path());
    run_ok(tmp.path(), &["target", "add", "App", "--type", "application"]);
    drop_only_product(&path);

    let (code, value) = run_json(tmp.path(), &["validate", "--no-fs"]);
    assert_eq!(code, 1);
    assert_eq!(value["data"]["findings"][0]["kind"], "missing_product_reference");

    let (code, value) = run_json(tmp.path(), &["repair", "--fix", "--no-fs"]);
    assert_eq!(code, 0, "{value}");
    let applied = value["data"]["report"]["applied"].as_array().expect("applied");
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0]["action"], "created_product");
    assert_eq!(applied[0]["name"], "App.app");

    let (code, _) = run_json(tmp.path(), &["validate", "--no-fs"]);
    assert_eq!(code, 0);

    let (code, value) = run_json(tmp.path(), &["repair", "--fix", "--no-fs"]);
    assert_eq!(code, 0);
    assert_eq!(value["data"]["report"]["applied"].as_array().map(Vec::len), Some(0));
}

#[test]
fn repair_without_fix_only_reports() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = init_project(tmp.path());
    run_ok(tmp.path(), &["target", "add", "App", "--type", "application"]);
    drop_only_product(&path);
    let before = std::fs::read(&path).expect("read");

    let (code, out, _) = run_pbxkit(tmp.path(), &["repair", "--no-fs"]);
    assert_eq!(code, 1);
    assert!(out.contains("missing_product_reference"), "{out}");
    assert_eq!(std::fs::read(&path).expect("read"), before);
}

#[test]
fn backup_is_written_before_mutation() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = init_project(tmp.path());
    let before = std::fs::read(&path).expect("read");

    run_ok(tmp.path(), &["--backup", "target", "add", "Lib", "--type", "static-library"]);

    let backups: Vec<_> = std::fs::read_dir(tmp.path())
        .expect("read dir")
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".bak"))
        .collect();
    assert_eq!(backups.len(), 1);
    assert_eq!(std::fs::read(backups[0].path()).expect("read"), before);
}

#[test]
fn schemes_follow_target_removal() {
    let tmp = tempfile::tempdir().expect("tempdir");
    init_project(tmp.path());
    run_ok(tmp.path(), &["target", "add", "App", "--type", "application"]);
    run_ok(tmp.path(), &["scheme", "create", "App"]);
    run_ok(tmp.path(), &["scheme", "add-target", "App", "App"]);

    let (code, value) = run_json(tmp.path(), &["scheme", "show", "App"]);
    assert_eq!(code, 0);
    assert_eq!(value["data"]["actions"]["build"]["targets"][0], "App");

    let (code, _, _) = run_pbxkit(tmp.path(), &["scheme", "add-target", "App", "Ghost"]);
    assert_eq!(code, 2);

    let (code, value) = run_json(tmp.path(), &["target", "remove", "App"]);
    assert_eq!(code, 0, "{value}");
    assert_eq!(value["data"]["result"]["scheme_entries_removed"], 3);

    let (_, value) = run_json(tmp.path(), &["scheme", "list"]);
    assert_eq!(value["data"][0]["targets"].as_array().map(Vec::len), Some(0));
}

#[test]
fn unreadable_schemes_block_target_removal() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = init_project(tmp.path());
    run_ok(tmp.path(), &["target", "add", "App", "--type", "application"]);
    std::fs::write(tmp.path().join("Demo.pbxproj.schemes.json"), "{ not json").expect("write");
    let before = std::fs::read(&path).expect("read");

    let (code, value) = run_json(tmp.path(), &["target", "remove", "App"]);
    assert_eq!(code, 4, "{value}");
    assert_eq!(value["error"]["code"], "scheme_malformed");
    assert_eq!(std::fs::read(&path).expect("read"), before);

    let (code, _) = run_json(tmp.path(), &["target", "show", "App"]);
    assert_eq!(code, 0);
}

#[test]
fn dependency_cycles_are_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");
    init_project(tmp.path());
    run_ok(tmp.path(), &["target", "add", "App", "--type", "application"]);
    run_ok(tmp.path(), &["target", "add", "Core", "--type", "framework"]);
    run_ok(tmp.path(), &["target", "add-dependency", "App", "Core"]);

    let (code, value) = run_json(tmp.path(), &["target", "add-dependency", "Core", "App"]);
    assert_eq!(code, 3);
    assert_eq!(value["error"]["kind"], "invalid_graph_state");

    let (code, value) = run_json(tmp.path(), &["target", "show", "App"]);
    assert_eq!(code, 0);
    assert_eq!(value["data"]["target"]["dependencies"][0], "Core");
}

#[test]
fn missing_project_is_reported() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (code, _, err) = run_pbxkit(tmp.path(), &["target", "list"]);
    assert_eq!(code, 2);
    assert!(err.contains("project_not_found"), "{err}");
}

#[test]
fn version_is_structured_in_json() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (code, value) = run_json(tmp.path(), &["version"]);
    assert_eq!(code, 0);
    assert_eq!(value["data"]["name"], "pbxkit");
}
