//! Analyzer orchestration (§4.7): drives the pipeline end to end and owns
//! the `tracing` spans each stage reports through.

use std::path::Path;

use tracing::info;

use crate::ast_loader::load_contexts;
use crate::callgraph::build_call_graph;
use crate::cfg::build_cfgs;
use crate::config::AnalyzerConfig;
use crate::detector::detect_reentrancy;
use crate::error::Result;
use crate::model::{ContractContext, SymbolTable};
use crate::report::{build_report, AnalysisReport};

pub struct Analyzer {
    config: AnalyzerConfig,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Load `path`, then run the full pipeline over what it yields.
    pub fn analyze(&self, path: &Path) -> Result<AnalysisReport> {
        let contexts = load_contexts(path)?;
        Ok(self.analyze_contexts(&contexts))
    }

    /// Run the pipeline over already-loaded contexts; never fails, since
    /// everything past the load boundary absorbs gaps as absence.
    pub fn analyze_contexts(&self, contexts: &[ContractContext]) -> AnalysisReport {
        let mut symbols = SymbolTable::build(contexts);
        info!(
            contracts = symbols.contracts.len(),
            functions = symbols.functions.len(),
            "symbol table built"
        );

        let call_graph = build_call_graph(&mut symbols, self.config.enable_cross_contract_resolution);
        info!(edges = call_graph.edges().count(), "call graph built");

        let cfgs = build_cfgs(&symbols, self.config.enable_cross_contract_resolution);
        info!(functions = cfgs.len(), "control-flow graphs built");

        let patterns = if self.config.enable_reentrancy_detection {
            detect_reentrancy(&symbols, &call_graph, &cfgs)
        } else {
            Vec::new()
        };
        info!(patterns = patterns.len(), "reentrancy detection complete");

        let patterns: Vec<_> = patterns
            .into_iter()
            .filter(|p| self.config.report_safe_calls || p.classification != crate::detector::Classification::SafeExternalCall)
            .filter(|p| p.severity >= self.config.severity_threshold)
            .collect();

        build_report(&symbols, &call_graph, &cfgs, patterns)
    }
}
