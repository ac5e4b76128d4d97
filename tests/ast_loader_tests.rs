//! Boundary behaviors of the artifact loader: missing paths, malformed
//! JSON, and directories with nothing to load.

use std::path::Path;

use reentrancy_analyzer::ast_loader::load_contexts;
use reentrancy_analyzer::error::AnalyzerError;

#[test]
fn nonexistent_path_is_an_io_error() {
    let result = load_contexts(Path::new("/does/not/exist/anywhere.json"));
    match result {
        Err(AnalyzerError::Io { .. }) => {}
        other => panic!("expected AnalyzerError::Io, got {other:?}"),
    }
}

#[test]
fn malformed_json_names_the_offending_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file_path = dir.path().join("broken.json");
    std::fs::write(&file_path, "{ this is not valid json").expect("write fixture");

    let result = load_contexts(&file_path);
    match result {
        Err(AnalyzerError::Json { path, .. }) => assert_eq!(path, file_path),
        other => panic!("expected AnalyzerError::Json, got {other:?}"),
    }
}

#[test]
fn empty_directory_loads_zero_contexts() {
    let dir = tempfile::tempdir().expect("tempdir");

    let contexts = load_contexts(dir.path()).expect("empty directory should load cleanly");
    assert!(contexts.is_empty());
}

#[test]
fn raw_source_unit_file_with_no_contracts_loads_zero_contexts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file_path = dir.path().join("empty.json");
    std::fs::write(&file_path, r#"{"nodeType": "SourceUnit", "nodes": []}"#).expect("write fixture");

    let contexts = load_contexts(&file_path).expect("should load");
    assert!(contexts.is_empty());
}

#[test]
fn unsupported_artifact_shape_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file_path = dir.path().join("weird.json");
    std::fs::write(&file_path, r#"{"totally": "unrelated"}"#).expect("write fixture");

    let result = load_contexts(&file_path);
    match result {
        Err(AnalyzerError::UnsupportedArtifact { path }) => assert_eq!(path, file_path),
        other => panic!("expected AnalyzerError::UnsupportedArtifact, got {other:?}"),
    }
}
