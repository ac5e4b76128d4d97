//! Cross-contract reentrancy analyzer for Solidity AST artifacts.

pub mod analyzer;
pub mod ast_loader;
pub mod callgraph;
pub mod cfg;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod error;
pub mod model;
pub mod report;
pub mod symbols;

pub use analyzer::Analyzer;
pub use config::AnalyzerConfig;
pub use error::{AnalyzerError, Result};
pub use report::AnalysisReport;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
