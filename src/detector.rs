//! Reentrancy Detector (§4.6): for every function, find the external-call
//! CFG nodes, check whether the callee can re-enter, and classify the
//! state changes that follow.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::callgraph::{full_variable_path, CallGraph, EXTERNAL_PREFIX};
use crate::cfg::{CFGNodeType, CFG};
use crate::model::{Severity, SymbolTable, Visibility};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    ConfirmedReentrancy,
    SafeExternalCall,
    PotentialReentrancy,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::ConfirmedReentrancy => "confirmed_reentrancy",
            Classification::SafeExternalCall => "safe_external_call",
            Classification::PotentialReentrancy => "potential_reentrancy",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StateChangeAfter {
    pub node: String,
    pub variable: String,
}

#[derive(Debug, Clone)]
pub struct ReentrancyPattern {
    pub function: String,
    pub external_call_node: String,
    pub external_call_target: Option<String>,
    pub state_changes_after: Vec<StateChangeAfter>,
    pub severity: Severity,
    pub classification: Classification,
    pub details: String,
}

/// Run the detector over every function that has a CFG, in CFG-map order
/// (which follows contract/function AST order).
pub fn detect_reentrancy(
    symbols: &SymbolTable,
    call_graph: &CallGraph,
    cfgs: &IndexMap<String, CFG>,
) -> Vec<ReentrancyPattern> {
    let mut patterns = Vec::new();

    for (function_key, cfg) in cfgs {
        let prefix = function_key.replace('.', "_");

        let external_nodes: Vec<&str> = cfg
            .nodes
            .values()
            .filter(|n| {
                n.id.starts_with(&prefix)
                    && matches!(n.node_type, CFGNodeType::ExternalCall | CFGNodeType::KnownExternalCall)
            })
            .map(|n| n.id.as_str())
            .collect();

        for node_id in external_nodes {
            let node = &cfg.nodes[node_id];

            let state_changes = state_changes_after(cfg, node_id, &prefix);
            if state_changes.is_empty() {
                continue;
            }

            let classification = match node.node_type {
                CFGNodeType::KnownExternalCall => {
                    let target = node.called_function.as_deref();
                    let reachable = target
                        .map(|t| can_reach(call_graph, t, function_key))
                        .unwrap_or(false);
                    if reachable {
                        Classification::ConfirmedReentrancy
                    } else {
                        Classification::SafeExternalCall
                    }
                }
                _ => Classification::PotentialReentrancy,
            };

            let visibility = symbols
                .functions
                .get(function_key)
                .map(|f| f.visibility)
                .unwrap_or(Visibility::Internal);

            let severity = severity_for(classification, visibility, state_changes.len());

            let target_label = node
                .called_function
                .clone()
                .unwrap_or_else(|| "<unknown>".to_string());
            let details = format!(
                "External call to {target_label} followed by {} state changes",
                state_changes.len()
            );

            patterns.push(ReentrancyPattern {
                function: function_key.clone(),
                external_call_node: node_id.to_string(),
                external_call_target: node.called_function.clone(),
                state_changes_after: state_changes,
                severity,
                classification,
                details,
            });
        }
    }

    patterns
}

/// DFS over the call graph from `target`: true if any successor is a
/// synthetic `EXTERNAL:*` node (assumed re-entrant) or `caller` itself.
fn can_reach(call_graph: &CallGraph, target: &str, caller: &str) -> bool {
    let mut visited = HashSet::new();
    let mut stack = vec![target.to_string()];

    while let Some(current) = stack.pop() {
        if !visited.insert(current.clone()) {
            continue;
        }
        for succ_idx in call_graph.successors(&current) {
            let Some(succ_key) = call_graph.node_key(succ_idx) else {
                continue;
            };
            if succ_key.starts_with(EXTERNAL_PREFIX) || succ_key == caller {
                return true;
            }
            stack.push(succ_key);
        }
    }
    false
}

/// BFS from `node_id` over CFG successors restricted to `prefix`, excluding
/// the function's Exit, collecting `StateChange` nodes with `modifies_state`.
fn state_changes_after(cfg: &CFG, node_id: &str, prefix: &str) -> Vec<StateChangeAfter> {
    let mut visited = HashSet::new();
    let mut queue = std::collections::VecDeque::new();
    queue.push_back(node_id.to_string());
    visited.insert(node_id.to_string());

    let mut found = Vec::new();

    while let Some(current) = queue.pop_front() {
        for succ in cfg.successors(&current) {
            if succ == cfg.exit || !succ.starts_with(prefix) {
                continue;
            }
            if !visited.insert(succ.to_string()) {
                continue;
            }
            if let Some(node) = cfg.nodes.get(succ) {
                if node.node_type == CFGNodeType::StateChange && node.modifies_state {
                    let assignment = node.ast.get("expression").cloned().unwrap_or_default();
                    let lhs = assignment
                        .get("leftHandSide")
                        .or_else(|| assignment.get("left"))
                        .cloned()
                        .unwrap_or_default();
                    let variable = full_variable_path(&lhs);
                    found.push(StateChangeAfter {
                        node: succ.to_string(),
                        variable,
                    });
                }
            }
            queue.push_back(succ.to_string());
        }
    }

    found
}

fn severity_for(classification: Classification, visibility: Visibility, state_change_count: usize) -> Severity {
    match classification {
        Classification::SafeExternalCall => Severity::Low,
        Classification::ConfirmedReentrancy => Severity::Critical,
        Classification::PotentialReentrancy => {
            if visibility.is_externally_reachable() {
                if state_change_count >= 2 {
                    Severity::High
                } else {
                    Severity::Medium
                }
            } else {
                Severity::Low
            }
        }
    }
}
