//! Analyzer configuration.

use serde::{Deserialize, Serialize};

use crate::model::Severity;

/// Controls which passes run and how aggressively findings are reported.
///
/// Defaults report everything at every severity: a caller that wants a
/// quieter run (e.g. only `high`/`critical` in CI) raises `severity_threshold`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Drop reentrancy patterns below this severity from the report.
    pub severity_threshold: Severity,
    /// Run the reentrancy detector at all. Disabling it still builds the
    /// symbol table, call graph and CFGs; only `reentrancy_patterns` is empty.
    pub enable_reentrancy_detection: bool,
    /// Attempt cross-contract resolution via the interface-implementation
    /// map. Disabling it degrades every cross-contract call site to
    /// `external_unknown`, a coarser but still-sound analysis mode.
    pub enable_cross_contract_resolution: bool,
    /// Include `safe_external_call` patterns in the report.
    pub report_safe_calls: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            severity_threshold: Severity::Low,
            enable_reentrancy_detection: true,
            enable_cross_contract_resolution: true,
            report_safe_calls: true,
        }
    }
}
