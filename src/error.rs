//! Error types for the reentrancy analyzer.
//!
//! Only input-boundary failures become `AnalyzerError`. Resolution gaps
//! (unresolved bases, unknown callees, AST shapes the walker doesn't
//! recognize) are absorbed into the data model as absence and never
//! reach this enum; see `crate::analyzer`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can abort an analysis before it produces a report.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} does not look like a build-info artifact or a raw SourceUnit")]
    UnsupportedArtifact { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
