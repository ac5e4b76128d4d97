//! AST Loader (§4.1): reads artifact files off disk and extracts
//! `ContractContext` records. Purely syntactic, it never validates
//! anything beyond the shape it needs to find `ContractDefinition` nodes.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{AnalyzerError, Result};
use crate::model::{ContractContext, ContractKind};

/// Loads every `ContractContext` reachable from `path`.
///
/// `path` may be a single JSON file or a directory of them. Directories
/// are scanned non-recursively for files ending in `.json`, sorted by
/// filename so a given artifact set always loads in the same order
/// (§5's determinism requirement starts here).
pub fn load_contexts(path: &Path) -> Result<Vec<ContractContext>> {
    let metadata = fs::metadata(path).map_err(|source| AnalyzerError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let files = if metadata.is_dir() {
        collect_json_files(path)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut contexts = Vec::new();
    for file in files {
        contexts.extend(load_file(&file)?);
    }

    if contexts.is_empty() {
        warn!(path = %path.display(), "loaded zero contract contexts");
    } else {
        debug!(path = %path.display(), count = contexts.len(), "loaded contract contexts");
    }

    Ok(contexts)
}

fn collect_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|source| AnalyzerError::Io {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn load_file(path: &Path) -> Result<Vec<ContractContext>> {
    let raw = fs::read_to_string(path).map_err(|source| AnalyzerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&raw).map_err(|source| AnalyzerError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    extract_contexts(&value, path)
}

fn extract_contexts(artifact: &Value, file_path: &Path) -> Result<Vec<ContractContext>> {
    if let Some(sources) = artifact.pointer("/output/sources").and_then(Value::as_object) {
        let mut contexts = Vec::new();
        for (source_file, source_info) in sources {
            if let Some(ast) = source_info.get("ast") {
                if ast.get("nodeType").and_then(Value::as_str) == Some("SourceUnit") {
                    contexts.extend(extract_contracts_from_source_unit(ast, source_file));
                }
            }
        }
        return Ok(contexts);
    }

    if artifact.get("nodeType").and_then(Value::as_str) == Some("SourceUnit") {
        let source_file = file_path.to_string_lossy().to_string();
        return Ok(extract_contracts_from_source_unit(artifact, &source_file));
    }

    Err(AnalyzerError::UnsupportedArtifact {
        path: file_path.to_path_buf(),
    })
}

fn extract_contracts_from_source_unit(source_unit: &Value, source_file: &str) -> Vec<ContractContext> {
    let Some(nodes) = source_unit.get("nodes").and_then(Value::as_array) else {
        return Vec::new();
    };

    nodes
        .iter()
        .filter(|node| node.get("nodeType").and_then(Value::as_str) == Some("ContractDefinition"))
        .map(|node| {
            let contract_name = node.get("name").and_then(Value::as_str).unwrap_or("").to_string();
            let contract_kind = node.get("contractKind").and_then(Value::as_str).unwrap_or("");
            let is_abstract = node.get("abstract").and_then(Value::as_bool).unwrap_or(false);

            ContractContext {
                contract_name,
                file_path: source_file.to_string(),
                ast: node.clone(),
                kind: ContractKind::from_solidity(contract_kind),
                is_abstract,
            }
        })
        .collect()
}
