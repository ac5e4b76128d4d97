//! Report Projection (§6): flattens the symbol table, call graph, CFGs and
//! detector output into serde-serializable structures, plus a pure
//! function rendering a human-readable summary from the same data.

use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::Serialize;

use crate::callgraph::{CallGraph, CallNode, CallType};
use crate::cfg::CFG;
use crate::detector::{Classification, ReentrancyPattern};
use crate::model::{ContractKind, Severity, SymbolTable, Visibility};

#[derive(Debug, Serialize)]
pub struct ContractSummary {
    pub name: String,
    pub kind: ContractKind,
    pub functions_count: usize,
    pub state_variables_count: usize,
    pub is_abstract: bool,
    pub base_contracts: Vec<String>,
    pub file_path: String,
}

#[derive(Debug, Serialize)]
pub struct FunctionSummary {
    pub name: String,
    pub contract: String,
    pub visibility: Visibility,
    pub state_mutability: String,
    pub external_calls: usize,
    pub state_changes: usize,
    pub is_override: bool,
}

#[derive(Debug, Serialize)]
pub struct CallGraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub contract: Option<String>,
    pub function: Option<String>,
    pub visibility: Option<Visibility>,
    pub state_mutability: Option<String>,
    pub has_state_changes: bool,
    pub external_calls_count: usize,
}

#[derive(Debug, Serialize)]
pub struct CallGraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: &'static str,
    pub is_resolved: bool,
    pub via_interface: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallGraphView {
    pub nodes: Vec<CallGraphNode>,
    pub edges: Vec<CallGraphEdge>,
}

#[derive(Debug, Serialize)]
pub struct CfgNodeView {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: &'static str,
    pub function_name: String,
    pub called_function: Option<String>,
    pub is_external: bool,
    pub modifies_state: bool,
}

#[derive(Debug, Serialize)]
pub struct CfgEdgeView {
    pub source: String,
    pub target: String,
    pub label: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CfgView {
    pub nodes: Vec<CfgNodeView>,
    pub edges: Vec<CfgEdgeView>,
}

#[derive(Debug, Serialize)]
pub struct ReentrancyPatternView {
    pub function: String,
    pub external_call_node: String,
    pub external_call_target: Option<String>,
    pub state_changes_after: Vec<StateChangeView>,
    pub state_changes_count: usize,
    pub severity: Severity,
    pub classification: &'static str,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct StateChangeView {
    pub node: String,
    pub variable: String,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub total_contracts: usize,
    pub total_functions: usize,
    pub external_calls: usize,
    pub cross_contract_calls: usize,
    pub reentrancy_patterns: usize,
    pub critical_issues: usize,
    pub high_issues: usize,
    pub medium_issues: usize,
    pub low_issues: usize,
}

#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub contracts: Vec<ContractSummary>,
    pub functions: Vec<FunctionSummary>,
    pub call_graph: CallGraphView,
    pub cfg: IndexMap<String, CfgView>,
    pub reentrancy_patterns: Vec<ReentrancyPatternView>,
    pub summary: Summary,
}

pub fn build_report(
    symbols: &SymbolTable,
    call_graph: &CallGraph,
    cfgs: &IndexMap<String, CFG>,
    patterns: Vec<ReentrancyPattern>,
) -> AnalysisReport {
    let contracts: Vec<_> = symbols
        .contracts
        .values()
        .map(|c| ContractSummary {
            name: c.name.clone(),
            kind: c.kind,
            functions_count: c.functions.len(),
            state_variables_count: c.state_variables.len(),
            is_abstract: c.is_abstract,
            base_contracts: c.base_contracts.clone(),
            file_path: c.source_file.clone(),
        })
        .collect();

    let functions: Vec<FunctionSummary> = symbols
        .functions
        .values()
        .map(|f| FunctionSummary {
            name: f.fully_qualified_name(),
            contract: f.owning_contract.clone(),
            visibility: f.visibility,
            state_mutability: f.state_mutability.label().to_string(),
            external_calls: f.external_calls.len() + f.cross_contract_calls.len(),
            state_changes: f.state_changes.len(),
            is_override: f.is_override,
        })
        .collect();

    let call_graph_view = build_call_graph_view(symbols, call_graph);
    let cfg_view = build_cfg_view(cfgs);

    let total_external = functions.iter().map(|f| f.external_calls).sum::<usize>();
    let total_cross_contract = symbols
        .functions
        .values()
        .map(|f| f.cross_contract_calls.len())
        .sum::<usize>();

    let pattern_views: Vec<ReentrancyPatternView> = patterns
        .into_iter()
        .map(|p| {
            let count = p.state_changes_after.len();
            ReentrancyPatternView {
                function: p.function,
                external_call_node: p.external_call_node,
                external_call_target: p.external_call_target,
                state_changes_after: p
                    .state_changes_after
                    .into_iter()
                    .map(|s| StateChangeView {
                        node: s.node,
                        variable: s.variable,
                    })
                    .collect(),
                state_changes_count: count,
                severity: p.severity,
                classification: p.classification.as_str(),
                details: p.details,
            }
        })
        .collect();

    let critical_issues = pattern_views.iter().filter(|p| p.severity == Severity::Critical).count();
    let high_issues = pattern_views.iter().filter(|p| p.severity == Severity::High).count();
    let medium_issues = pattern_views.iter().filter(|p| p.severity == Severity::Medium).count();
    let low_issues = pattern_views.iter().filter(|p| p.severity == Severity::Low).count();

    let summary = Summary {
        total_contracts: contracts.len(),
        total_functions: functions.len(),
        external_calls: total_external,
        cross_contract_calls: total_cross_contract,
        reentrancy_patterns: pattern_views.len(),
        critical_issues,
        high_issues,
        medium_issues,
        low_issues,
    };

    AnalysisReport {
        contracts,
        functions,
        call_graph: call_graph_view,
        cfg: cfg_view,
        reentrancy_patterns: pattern_views,
        summary,
    }
}

fn build_call_graph_view(symbols: &SymbolTable, call_graph: &CallGraph) -> CallGraphView {
    let nodes = call_graph
        .nodes()
        .map(|node| match node {
            CallNode::Function(full_name) => {
                let function = symbols.functions.get(full_name);
                let (contract, short_name) = full_name
                    .split_once('.')
                    .map(|(c, f)| (c.to_string(), f.to_string()))
                    .unwrap_or((String::new(), full_name.clone()));

                let visibility = function.map(|f| f.visibility);
                let node_type = match visibility {
                    Some(Visibility::External) => "external",
                    Some(Visibility::Public) => "public",
                    _ => "internal",
                }
                .to_string();

                CallGraphNode {
                    id: full_name.clone(),
                    label: short_name,
                    node_type,
                    contract: Some(contract),
                    function: function.map(|f| f.short_name.clone()),
                    visibility,
                    state_mutability: function.map(|f| f.state_mutability.label().to_string()),
                    has_state_changes: function.map(|f| !f.state_changes.is_empty()).unwrap_or(false),
                    external_calls_count: function
                        .map(|f| f.external_calls.len() + f.cross_contract_calls.len())
                        .unwrap_or(0),
                }
            }
            CallNode::External(name) => CallGraphNode {
                id: format!("EXTERNAL:{name}"),
                label: name.clone(),
                node_type: "external".to_string(),
                contract: None,
                function: Some(name.clone()),
                visibility: None,
                state_mutability: None,
                has_state_changes: false,
                external_calls_count: 0,
            },
        })
        .collect();

    let edges = call_graph
        .edges()
        .map(|(source, target, edge)| CallGraphEdge {
            source,
            target,
            edge_type: call_type_label(edge.call_type),
            is_resolved: edge.is_resolved,
            via_interface: edge.via_interface.clone(),
        })
        .collect();

    CallGraphView { nodes, edges }
}

fn call_type_label(call_type: CallType) -> &'static str {
    match call_type {
        CallType::Internal => "internal",
        CallType::Inherited => "inherited",
        CallType::CrossContract => "cross_contract",
        CallType::External => "external",
        CallType::Indirect => "indirect",
    }
}

fn build_cfg_view(cfgs: &IndexMap<String, CFG>) -> IndexMap<String, CfgView> {
    cfgs.iter()
        .map(|(function_key, cfg)| {
            let nodes = cfg
                .nodes
                .values()
                .map(|n| CfgNodeView {
                    id: n.id.clone(),
                    node_type: cfg_node_type_label(n.node_type),
                    function_name: n.function_key.clone(),
                    called_function: n.called_function.clone(),
                    is_external: n.is_external,
                    modifies_state: n.modifies_state,
                })
                .collect();

            let edges = cfg
                .edges
                .iter()
                .map(|e| CfgEdgeView {
                    source: e.source.clone(),
                    target: e.target.clone(),
                    label: e.label.clone(),
                })
                .collect();

            (function_key.clone(), CfgView { nodes, edges })
        })
        .collect()
}

fn cfg_node_type_label(node_type: crate::cfg::CFGNodeType) -> &'static str {
    use crate::cfg::CFGNodeType::*;
    match node_type {
        Entry => "entry",
        Exit => "exit",
        Condition => "condition",
        FunctionCall => "function_call",
        ExternalCall => "external_call",
        KnownExternalCall => "known_external_call",
        InheritedCall => "inherited_call",
        IndirectCall => "indirect_call",
        StateChange => "state_change",
        Return => "return",
        Revert => "revert",
        Modifier => "modifier",
    }
}

/// Pure rendering of a report into a human-readable summary, grouped by
/// classification, followed by a cross-contract call listing.
pub fn render_text_report(report: &AnalysisReport) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Analyzed {} contracts, {} functions",
        report.summary.total_contracts, report.summary.total_functions
    );
    let _ = writeln!(
        out,
        "Found {} potential reentrancy patterns ({} critical, {} high, {} medium, {} low)",
        report.summary.reentrancy_patterns,
        report.summary.critical_issues,
        report.summary.high_issues,
        report.summary.medium_issues,
        report.summary.low_issues
    );

    for (title, wanted) in [
        ("Confirmed reentrancy", Classification::ConfirmedReentrancy.as_str()),
        ("Potential reentrancy", Classification::PotentialReentrancy.as_str()),
        ("Safe external calls", Classification::SafeExternalCall.as_str()),
    ] {
        let matching: Vec<&ReentrancyPatternView> = report
            .reentrancy_patterns
            .iter()
            .filter(|p| p.classification == wanted)
            .collect();
        if matching.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{title}:");
        for pattern in matching {
            let target = pattern.external_call_target.as_deref().unwrap_or("<unknown>");
            let _ = writeln!(
                out,
                "  {} -> {} ({} state changes, {})",
                pattern.function, target, pattern.state_changes_count, pattern.severity
            );
        }
    }

    let cross_contract_edges: Vec<&CallGraphEdge> = report
        .call_graph
        .edges
        .iter()
        .filter(|e| e.edge_type == "cross_contract")
        .collect();
    if !cross_contract_edges.is_empty() {
        let _ = writeln!(out, "\nCross-contract calls:");
        for edge in cross_contract_edges {
            match &edge.via_interface {
                Some(interface) => {
                    let _ = writeln!(out, "  {} -> {} (via {})", edge.source, edge.target, interface);
                }
                None => {
                    let _ = writeln!(out, "  {} -> {}", edge.source, edge.target);
                }
            }
        }
    }

    out
}
