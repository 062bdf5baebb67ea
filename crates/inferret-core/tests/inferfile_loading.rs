//! Integration tests for loading Inferfiles and resolving regions on disk.

use std::fs;
use std::path::Path;

use inferret_core::{load, resolve, InferError, RegionStatus};
use tempfile::TempDir;

const AUTH_SOURCE: &str = "package main\n\
    \n\
    // Infer: OpenAI client\n\
    func openaiClient() {\n\
    \t// This is a stub function\n\
    }\n\
    // EndInfer: OpenAI client\n";

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

/// Test: a missing file is reported with its declared path and Inferfile line
#[test]
fn test_missing_file_is_reference_error() {
    let dir = TempDir::new().unwrap();
    let inferfile = write(
        dir.path(),
        "Inferfile",
        "[[file]]\npath = \"./this/file/does/not/exist\"\n",
    );

    let err = load(&inferfile).unwrap_err();
    match &err {
        InferError::Reference { path, line, .. } => {
            assert_eq!(path, "./this/file/does/not/exist");
            assert_eq!(*line, 2);
        }
        other => panic!("expected reference error, got {other:?}"),
    }
    assert!(err
        .to_string()
        .starts_with("file not found: ./this/file/does/not/exist ("));
}

/// Test: the second of several files is the one named when it is missing
#[test]
fn test_reference_error_names_offending_block() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "present.go", AUTH_SOURCE);
    let inferfile = write(
        dir.path(),
        "Inferfile",
        "[[file]]\npath = \"present.go\"\n\n[[file]]\npath = \"absent.go\"\n",
    );

    match load(&inferfile).unwrap_err() {
        InferError::Reference { path, line, .. } => {
            assert_eq!(path, "absent.go");
            assert_eq!(line, 5);
        }
        other => panic!("expected reference error, got {other:?}"),
    }
}

/// Test: an Inferfile with no file entries loads to an empty configuration
#[test]
fn test_empty_inferfile_loads() {
    let dir = TempDir::new().unwrap();
    let inferfile = write(dir.path(), "Inferfile", "");

    let config = load(&inferfile).unwrap();
    assert!(config.files.is_empty());
    assert!(resolve(&config).unwrap().files.is_empty());
}

/// Test: a missing Inferfile is an I/O error naming the Inferfile
#[test]
fn test_missing_inferfile_is_io_error() {
    let dir = TempDir::new().unwrap();
    let inferfile = dir.path().join("Inferfile");

    match load(&inferfile).unwrap_err() {
        InferError::Io { path, .. } => assert_eq!(path, inferfile),
        other => panic!("expected io error, got {other:?}"),
    }
}

/// Test: tagged code is extracted relative to the Inferfile's directory
#[test]
fn test_load_and_resolve_tagged_region() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/mycode.go", AUTH_SOURCE);
    let inferfile = write(
        dir.path(),
        "Inferfile",
        r#"
[[file]]
path = "src/mycode.go"

[[file.tag]]
name = "OpenAI client"

[[file.tag.infer]]
assert = "the function is a stub"
model = "gpt-4o"
count = 3
threshold = 0.67

[[file.tag]]
name = "not in the file"
"#,
    );

    let config = load(&inferfile).unwrap();
    let resolved = resolve(&config).unwrap();

    let tags = &resolved.files[0].tags;
    assert_eq!(resolved.files[0].path, "src/mycode.go");
    assert_eq!(
        &*tags[0].code,
        "func openaiClient() {\n\t// This is a stub function\n}\n"
    );
    assert_eq!(tags[0].status, RegionStatus::Closed);
    assert_eq!(tags[0].inferences[0].count, 3);

    assert!(tags[1].code.is_empty());
    assert_eq!(tags[1].status, RegionStatus::Missing);
    assert_eq!(resolved.inference_count(), 1);
}

/// Test: resolving twice from an unchanged file yields identical regions
#[test]
fn test_resolution_is_idempotent() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "mycode.go", AUTH_SOURCE);
    let inferfile = write(
        dir.path(),
        "Inferfile",
        "[[file]]\npath = \"mycode.go\"\n[[file.tag]]\nname = \"OpenAI client\"\n",
    );

    let config = load(&inferfile).unwrap();
    assert_eq!(resolve(&config).unwrap(), resolve(&config).unwrap());
}

/// Test: a file that disappears between load and resolve aborts resolution
#[test]
fn test_unreadable_file_aborts_resolution() {
    let dir = TempDir::new().unwrap();
    let source = write(dir.path(), "gone.go", AUTH_SOURCE);
    let inferfile = write(
        dir.path(),
        "Inferfile",
        "[[file]]\npath = \"gone.go\"\n[[file.tag]]\nname = \"OpenAI client\"\n",
    );

    let config = load(&inferfile).unwrap();
    fs::remove_file(&source).unwrap();

    match resolve(&config).unwrap_err() {
        InferError::Io { path, .. } => assert_eq!(path, source),
        other => panic!("expected io error, got {other:?}"),
    }
}

/// Test: a directory is not accepted as a source file
#[test]
fn test_directory_path_is_reference_error() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("src")).unwrap();
    let inferfile = write(dir.path(), "Inferfile", "[[file]]\npath = \"src\"\n");

    assert!(matches!(
        load(&inferfile).unwrap_err(),
        InferError::Reference { .. }
    ));
}
