//! End-to-end tests of the `raw-to-jpg` binary.
//!
//! None of these need real RAW data. They cover usage errors, archive mode,
//! smart-mode copying and idempotence; the only file LibRaw is handed is one
//! it has to reject.
//!
//! Run with: `cargo test --test cli`

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

// ===========================================================================
// Helpers
// ===========================================================================

fn raw_to_jpg(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_raw-to-jpg"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// `in/` with the given files and an empty `out/`.
fn tree(files: &[(&str, &str)]) -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("in");
    let dst = tmp.path().join("out");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dst).unwrap();
    for (relative, content) in files {
        let path = src.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    (tmp, src, dst)
}

fn files_under(root: &Path) -> Vec<String> {
    fn visit(root: &Path, dir: &Path, out: &mut Vec<String>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                visit(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_string_lossy();
                out.push(rel.replace('\\', "/"));
            }
        }
    }
    let mut out = Vec::new();
    visit(root, root, &mut out);
    out.sort();
    out
}

// ===========================================================================
// Usage errors
// ===========================================================================

#[test]
fn archive_mode_rejects_a_single_file() {
    let (_tmp, src, dst) = tree(&[("x.CR2", "sensor data")]);
    let file = src.join("x.CR2");

    let output = raw_to_jpg(&["-a", path_arg(&file), path_arg(&dst)]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("Only folders are accepted as input in archive mode!"));
    assert!(files_under(&dst).is_empty());
    assert_eq!(fs::read_to_string(&file).unwrap(), "sensor data");
}

#[test]
fn group_enhance_rejects_a_single_file() {
    let (_tmp, src, dst) = tree(&[("x.CR2", "sensor data")]);

    let output = raw_to_jpg(&["-g", path_arg(&src.join("x.CR2")), path_arg(&dst)]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("group enhance mode"));
    assert!(files_under(&dst).is_empty());
}

#[test]
fn missing_source_exits_with_one() {
    let (_tmp, src, dst) = tree(&[]);
    let output = raw_to_jpg(&[path_arg(&src.join("nope")), path_arg(&dst)]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("does not exist"));
}

#[test]
fn missing_arguments_are_a_parse_error() {
    let output = raw_to_jpg(&[]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn bad_config_exits_with_one_before_touching_anything() {
    let (tmp, src, dst) = tree(&[("b.txt", "notes")]);
    let config = tmp.path().join("config.toml");
    fs::write(&config, "[jpeg]\nquality = 0\n").unwrap();

    let output = raw_to_jpg(&["-c", path_arg(&config), path_arg(&src), path_arg(&dst)]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("jpeg.quality"));
    assert!(files_under(&dst).is_empty());
}

// ===========================================================================
// Archive mode
// ===========================================================================

#[test]
fn archive_copies_raw_files_byte_for_byte() {
    let (_tmp, src, dst) = tree(&[
        ("x.CR2", "canon sensor data"),
        ("2024/y.NEF", "nikon sensor data"),
        ("notes.txt", "ignored"),
    ]);

    let output = raw_to_jpg(&["-a", path_arg(&src), path_arg(&dst)]);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(files_under(&dst), vec!["2024/y.NEF", "x.CR2"]);
    assert_eq!(fs::read(dst.join("x.CR2")).unwrap(), b"canon sensor data");
    assert_eq!(fs::read(src.join("x.CR2")).unwrap(), b"canon sensor data");

    let out = stdout(&output);
    assert!(out.starts_with(&format!("Archiving all files in {}", src.display())));
    assert!(out.contains(".../x.CR2\t\t => copying file"));
    assert!(out.contains("No errors occurred"));
    assert!(out.trim_end().ends_with("Done"));
}

#[test]
fn archive_collision_keeps_going() {
    let (_tmp, src, dst) = tree(&[("a.CR2", "a"), ("b.CR2", "b")]);
    fs::write(dst.join("a.CR2"), "earlier copy").unwrap();

    let output = raw_to_jpg(&["-a", path_arg(&src), path_arg(&dst)]);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(fs::read_to_string(dst.join("a.CR2")).unwrap(), "earlier copy");
    assert_eq!(fs::read_to_string(dst.join("b.CR2")).unwrap(), "b");
    assert!(stdout(&output).contains(".../a.CR2\t\t => ignored (file exists)"));
}

// ===========================================================================
// Smart-mode copying
// ===========================================================================

#[test]
fn smart_mode_mirrors_non_raw_files() {
    let (_tmp, src, dst) = tree(&[("a.txt", "a"), ("sub/b.xmp", "b"), ("sub/deeper/c.jpg", "c")]);

    let output = raw_to_jpg(&["-r", path_arg(&src), path_arg(&dst)]);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        files_under(&dst),
        vec!["a.txt", "sub/b.xmp", "sub/deeper/c.jpg"]
    );
    assert!(stdout(&output).contains(".../sub/\t\t => browsing folder"));
}

#[test]
fn stupid_mode_copies_nothing() {
    let (_tmp, src, dst) = tree(&[("a.txt", "a")]);

    let output = raw_to_jpg(&["-s", path_arg(&src), path_arg(&dst)]);

    assert_eq!(output.status.code(), Some(0));
    assert!(files_under(&dst).is_empty());
}

#[test]
fn quiet_mode_prints_nothing() {
    let (_tmp, src, dst) = tree(&[("a.txt", "a")]);

    let output = raw_to_jpg(&["-q", path_arg(&src), path_arg(&dst)]);

    assert_eq!(output.status.code(), Some(0));
    assert!(output.stdout.is_empty());
    assert_eq!(files_under(&dst), vec!["a.txt"]);
}

#[test]
fn second_run_ignores_existing_files() {
    let (_tmp, src, dst) = tree(&[("a.txt", "a"), ("b.txt", "b")]);

    let first = raw_to_jpg(&[path_arg(&src), path_arg(&dst)]);
    assert_eq!(first.status.code(), Some(0));
    let second = raw_to_jpg(&[path_arg(&src), path_arg(&dst)]);

    assert_eq!(second.status.code(), Some(0));
    let out = stdout(&second);
    assert!(!out.contains("copying file"));
    assert!(out.contains(".../a.txt\t\t => ignored (file exists)"));
    assert!(out.contains("Converted 0, copied 0, ignored 2"));
}

#[test]
fn corrupt_raw_file_is_reported_and_run_succeeds() {
    let (_tmp, src, dst) = tree(&[("bad.CR2", "not a raw file"), ("ok.txt", "fine")]);

    let output = raw_to_jpg(&[path_arg(&src), path_arg(&dst)]);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(files_under(&dst), vec!["ok.txt"]);
    let out = stdout(&output);
    assert!(out.contains("1 errors occurred:"));
    assert!(out.contains("bad.CR2"));
}

// ===========================================================================
// --gen-config
// ===========================================================================

#[test]
fn gen_config_prints_stock_config() {
    let output = raw_to_jpg(&["--gen-config"]);

    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    let value: toml::Value = toml::from_str(&text).unwrap();
    assert_eq!(value["jpeg"]["quality"].as_integer(), Some(90));
}

#[test]
fn generated_config_is_accepted() {
    let (tmp, src, dst) = tree(&[("a.txt", "a")]);
    let config = tmp.path().join("config.toml");
    fs::write(&config, raw_to_jpg(&["--gen-config"]).stdout).unwrap();

    let output = raw_to_jpg(&["--config", path_arg(&config), path_arg(&src), path_arg(&dst)]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(files_under(&dst), vec!["a.txt"]);
}
