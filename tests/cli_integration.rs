//! Integration tests for the sg-preview binary
//!
//! Covers the preview/apply commands and the JSON-lines serve loop.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const SOURCE: &str = "fn main() {\n    let b = a.clone();\n    let c = b.clone();\n}\n";
const REWRITTEN: &str = "fn main() {\n    let b = a;\n    let c = b;\n}\n";

fn setup_test_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/main.rs"), SOURCE).unwrap();
    fs::write(dir.path().join("notes.txt"), "a.clone()\n").unwrap();
    dir
}

fn sg_preview(dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_sg-preview"));
    command.current_dir(dir).env("NO_COLOR", "1");
    command
}

fn run(dir: &Path, args: &[&str]) -> Output {
    sg_preview(dir).args(args).output().unwrap()
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    let output = run(dir.path(), &["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("serve"));
    assert!(stdout.contains("preview"));
    assert!(stdout.contains("apply"));
}

#[test]
fn test_preview_prints_diff_without_writing() {
    let dir = setup_test_workspace();
    let output = run(
        dir.path(),
        &["preview", "--pattern", "$A.clone()", "--rewrite", "$A", "src"],
    );

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("-    let b = a.clone();"));
    assert!(stdout.contains("+    let b = a;"));
    assert!(stdout.contains("1 of 1 files would change"));

    assert_eq!(fs::read_to_string(dir.path().join("src/main.rs")).unwrap(), SOURCE);
}

#[test]
fn test_apply_rewrites_file() {
    let dir = setup_test_workspace();
    let output = run(
        dir.path(),
        &["apply", "--pattern", "$A.clone()", "--rewrite", "$A", "."],
    );

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Rewrote"));
    assert!(stdout.contains("(2 matches)"));

    assert_eq!(
        fs::read_to_string(dir.path().join("src/main.rs")).unwrap(),
        REWRITTEN
    );
    // Not a parseable language; left alone by the directory walk.
    assert_eq!(
        fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
        "a.clone()\n"
    );
}

#[test]
fn test_apply_is_idempotent() {
    let dir = setup_test_workspace();
    let args = ["apply", "--pattern", "$A.clone()", "--rewrite", "$A", "src"];

    assert!(run(dir.path(), &args).status.success());
    let output = run(dir.path(), &args);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("0 rewritten"));
    assert!(stdout.contains("1 unchanged"));
}

#[test]
fn test_apply_dry_run() {
    let dir = setup_test_workspace();
    let output = run(
        dir.path(),
        &["apply", "-n", "--pattern", "$A.clone()", "--rewrite", "$A", "src"],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("DRY RUN"));
    assert!(stdout.contains("Would rewrite"));

    assert_eq!(fs::read_to_string(dir.path().join("src/main.rs")).unwrap(), SOURCE);
}

#[test]
fn test_apply_skips_forbidden_dirs() {
    let dir = setup_test_workspace();
    fs::create_dir(dir.path().join("target")).unwrap();
    fs::write(dir.path().join("target/gen.rs"), SOURCE).unwrap();

    let output = run(
        dir.path(),
        &["apply", "--pattern", "$A.clone()", "--rewrite", "$A", "."],
    );

    assert!(output.status.success());
    assert_eq!(fs::read_to_string(dir.path().join("target/gen.rs")).unwrap(), SOURCE);
}

#[test]
fn test_unsupported_file_fails() {
    let dir = setup_test_workspace();
    let output = run(
        dir.path(),
        &["preview", "--pattern", "$A", "notes.txt"],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("notes.txt"));
}

#[test]
fn test_invalid_config_fails() {
    let dir = setup_test_workspace();
    fs::write(
        dir.path().join("sg-preview.toml"),
        "[search]\nbatch_size = 0\n",
    )
    .unwrap();

    let output = run(dir.path(), &["preview", "--pattern", "$A", "src"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("sg-preview.toml"));
}

#[test]
fn test_serve_answers_preview_with_diff() {
    let dir = setup_test_workspace();
    let mut child = sg_preview(dir.path())
        .args(["serve", "--workspace", "."])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    {
        let mut stdin = child.stdin.take().unwrap();
        writeln!(stdin, "not json").unwrap();
        writeln!(
            stdin,
            r#"{{"type":"previewDiff","filePath":"src/main.rs","pattern":"$A.clone()","rewrite":"$A"}}"#
        )
        .unwrap();
    }

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let commands: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(commands[0]["type"], "openDiff");
    assert_eq!(commands[0]["content"], REWRITTEN);
    assert_eq!(commands[0]["preview"]["scheme"], "sgpreview");
    assert_eq!(commands[1]["type"], "reveal");
    assert_eq!(commands[1]["selection"]["start"]["line"], 1);
}
