//! Call Graph Builder (§4.4): walks every non-interface function's AST and
//! emits edges into a global, directed multigraph over petgraph.
//!
//! Function nodes are keyed by fully-qualified name; unresolved external
//! targets get a synthetic `EXTERNAL:{name}` node, exactly as the
//! reentrancy detector (§4.6) expects when it looks for `EXTERNAL:*`
//! successors during reachability analysis.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use serde_json::Value;
use tracing::debug;

use crate::classifier::{classify_call, CallKind};
use crate::model::{CrossContractCall, StateChangeRef, SymbolTable};

pub const EXTERNAL_PREFIX: &str = "EXTERNAL:";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallNode {
    Function(String),
    External(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallType {
    Internal,
    Inherited,
    CrossContract,
    External,
    Indirect,
}

#[derive(Debug, Clone)]
pub struct CallEdge {
    pub call_type: CallType,
    pub is_resolved: bool,
    pub via_interface: Option<String>,
}

/// The global inter-procedural call graph plus id-to-index lookup.
pub struct CallGraph {
    graph: DiGraph<CallNode, CallEdge>,
    index: HashMap<String, NodeIndex>,
}

impl CallGraph {
    fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    fn ensure_function_node(&mut self, full_name: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(full_name) {
            return idx;
        }
        let idx = self.graph.add_node(CallNode::Function(full_name.to_string()));
        self.index.insert(full_name.to_string(), idx);
        idx
    }

    fn ensure_external_node(&mut self, called_name: &str) -> NodeIndex {
        let key = format!("{EXTERNAL_PREFIX}{called_name}");
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.graph.add_node(CallNode::External(called_name.to_string()));
        self.index.insert(key, idx);
        idx
    }

    pub fn node_index(&self, key: &str) -> Option<NodeIndex> {
        self.index.get(key).copied()
    }

    pub fn node_key(&self, idx: NodeIndex) -> Option<String> {
        match self.graph.node_weight(idx)? {
            CallNode::Function(name) => Some(name.clone()),
            CallNode::External(name) => Some(format!("{EXTERNAL_PREFIX}{name}")),
        }
    }

    pub fn successors(&self, key: &str) -> impl Iterator<Item = NodeIndex> + '_ {
        self.index
            .get(key)
            .into_iter()
            .flat_map(move |&idx| self.graph.neighbors(idx))
    }

    /// Nodes in insertion order (which follows AST walk order), not the
    /// side-table's arbitrary hash order.
    pub fn nodes(&self) -> impl Iterator<Item = &CallNode> {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    pub fn edges(&self) -> impl Iterator<Item = (String, String, &CallEdge)> {
        self.graph.edge_indices().filter_map(move |e| {
            let (source, target) = self.graph.edge_endpoints(e)?;
            let weight = self.graph.edge_weight(e)?;
            Some((self.node_key(source)?, self.node_key(target)?, weight))
        })
    }
}

/// Build the call graph, skipping interface contracts, and fill in each
/// function's `internal_calls`/`external_calls`/`cross_contract_calls`/
/// `indirect_calls`/`state_changes` on `symbols` as a side effect of the walk.
pub fn build_call_graph(symbols: &mut SymbolTable, resolve_cross_contract: bool) -> CallGraph {
    let mut graph = CallGraph::new();

    let contract_names: Vec<String> = symbols
        .contracts
        .iter()
        .filter(|(_, c)| !c.kind.is_interface())
        .map(|(name, _)| name.clone())
        .collect();

    for contract_name in &contract_names {
        let function_short_names: Vec<String> = symbols.contracts[contract_name]
            .functions
            .keys()
            .cloned()
            .collect();

        for short_name in function_short_names {
            let full_name = format!("{contract_name}.{short_name}");
            graph.ensure_function_node(&full_name);

            let ast = symbols.functions[&full_name].ast.clone();
            walk_function_body(&ast, &full_name, None, symbols, &mut graph, resolve_cross_contract);
        }
    }

    debug!(
        functions = contract_names.len(),
        edges = graph.graph.edge_count(),
        "call graph built"
    );
    graph
}

fn walk_function_body(
    node: &Value,
    current_function: &str,
    parent: Option<&Value>,
    symbols: &mut SymbolTable,
    graph: &mut CallGraph,
    resolve_cross_contract: bool,
) {
    if !node.is_object() {
        return;
    }

    match node.get("nodeType").and_then(Value::as_str) {
        Some("FunctionCall") => {
            process_function_call(node, current_function, symbols, graph, resolve_cross_contract)
        }
        Some("MemberAccess") => {
            let member_name = node.get("memberName").and_then(Value::as_str).unwrap_or("");
            if matches!(member_name, "encodeWithSelector" | "encode" | "encodePacked") {
                check_indirect_call(node, current_function, parent, symbols, graph);
            }
        }
        Some("Assignment") => {
            let left = node
                .get("leftHandSide")
                .or_else(|| node.get("left"))
                .cloned()
                .unwrap_or(Value::Null);
            let current_contract = current_function.split('.').next().unwrap_or("");
            if is_state_variable_access(&left, current_contract, symbols) {
                let variable = full_variable_path(&left);
                if let Some(function) = symbols.functions.get_mut(current_function) {
                    function.state_changes.push(StateChangeRef { variable });
                }
            }
        }
        _ => {}
    }

    if let Some(obj) = node.as_object() {
        for (_, child) in obj {
            if child.is_object() {
                walk_function_body(child, current_function, Some(node), symbols, graph, resolve_cross_contract);
            } else if let Some(items) = child.as_array() {
                for item in items {
                    if item.is_object() {
                        walk_function_body(
                            item,
                            current_function,
                            Some(node),
                            symbols,
                            graph,
                            resolve_cross_contract,
                        );
                    }
                }
            }
        }
    }
}

fn process_function_call(
    call_node: &Value,
    current_function: &str,
    symbols: &mut SymbolTable,
    graph: &mut CallGraph,
    resolve_cross_contract: bool,
) {
    let expression = call_node.get("expression").cloned().unwrap_or(Value::Null);
    let current_contract = current_function.split('.').next().unwrap_or("").to_string();

    let call_info = classify_call(&expression, &current_contract, symbols);

    match call_info.kind {
        CallKind::CrossContract => {
            let target_function = call_info.called_name.clone();

            // Disabling cross-contract resolution degrades every
            // cross-contract call site straight to external-unknown,
            // without ever consulting the interface-implementation map.
            if resolve_cross_contract {
                if let Some(target_contract) = call_info.resolved_contract().map(String::from) {
                    let full_target = format!("{target_contract}.{target_function}");
                    if symbols.has_function(&full_target) {
                        let via_interface = if call_info.implementation_contract.is_some() {
                            call_info.target_contract.clone()
                        } else {
                            None
                        };

                        let from_idx = graph.ensure_function_node(current_function);
                        let to_idx = graph.ensure_function_node(&full_target);
                        graph.graph.add_edge(
                            from_idx,
                            to_idx,
                            CallEdge {
                                call_type: CallType::CrossContract,
                                is_resolved: true,
                                via_interface: via_interface.clone(),
                            },
                        );

                        if let Some(function) = symbols.functions.get_mut(current_function) {
                            function.cross_contract_calls.push(CrossContractCall {
                                target: full_target,
                                contract: target_contract,
                                function: target_function,
                                via_interface,
                            });
                        }
                        return;
                    }
                }
            }
            add_external_call(current_function, &call_info.called_name, symbols, graph);
        }
        CallKind::Inherited => {
            if let Some(inherited_target) =
                symbols.find_inherited_function(&call_info.called_name, &current_contract)
            {
                let from_idx = graph.ensure_function_node(current_function);
                let to_idx = graph.ensure_function_node(&inherited_target);
                graph.graph.add_edge(
                    from_idx,
                    to_idx,
                    CallEdge {
                        call_type: CallType::Inherited,
                        is_resolved: true,
                        via_interface: None,
                    },
                );
            }
        }
        CallKind::Internal if call_info.is_external => {
            // Rule 3: the callee's own type carries an external-function
            // signature but rule 2 never pinned a target contract (e.g. a
            // bare `address` or interface variable without a resolvable
            // declared type), emit a synthetic external node instead of
            // guessing a same-contract target.
            add_external_call(current_function, &call_info.called_name, symbols, graph);
        }
        CallKind::Internal => {
            let full_target = format!("{current_contract}.{}", call_info.called_name);
            if symbols.has_function(&full_target) {
                let from_idx = graph.ensure_function_node(current_function);
                let to_idx = graph.ensure_function_node(&full_target);
                graph.graph.add_edge(
                    from_idx,
                    to_idx,
                    CallEdge {
                        call_type: CallType::Internal,
                        is_resolved: true,
                        via_interface: None,
                    },
                );
                if let Some(function) = symbols.functions.get_mut(current_function) {
                    function.internal_calls.push(full_target);
                }
            }
        }
    }
}

fn add_external_call(
    from_function: &str,
    target: &str,
    symbols: &mut SymbolTable,
    graph: &mut CallGraph,
) {
    let from_idx = graph.ensure_function_node(from_function);
    let to_idx = graph.ensure_external_node(target);
    graph.graph.add_edge(
        from_idx,
        to_idx,
        CallEdge {
            call_type: CallType::External,
            is_resolved: false,
            via_interface: None,
        },
    );

    if let Some(function) = symbols.functions.get_mut(from_function) {
        function.external_calls.push(target.to_string());
    }
}

/// §4.4.3: `abi.encodeWithSelector(this.target.selector)` inside
/// `address(this).call(...)` resolves to an indirect call edge to `target`.
fn check_indirect_call(
    _encode_node: &Value,
    current_function: &str,
    parent: Option<&Value>,
    symbols: &mut SymbolTable,
    graph: &mut CallGraph,
) {
    let Some(parent) = parent else { return };
    if parent.get("nodeType").and_then(Value::as_str) != Some("FunctionCall") {
        return;
    }
    let Some(args) = parent.get("arguments").and_then(Value::as_array) else {
        return;
    };
    let Some(first_arg) = args.first() else { return };
    if first_arg.get("nodeType").and_then(Value::as_str) != Some("MemberAccess")
        || first_arg.get("memberName").and_then(Value::as_str) != Some("selector")
    {
        return;
    }

    let selector_base = first_arg.get("expression").cloned().unwrap_or(Value::Null);
    if selector_base.get("nodeType").and_then(Value::as_str) != Some("MemberAccess") {
        return;
    }

    let func_name = selector_base.get("memberName").and_then(Value::as_str).unwrap_or("");
    let base_expr = selector_base.get("expression").cloned().unwrap_or(Value::Null);
    let is_this = base_expr.get("nodeType").and_then(Value::as_str) == Some("Identifier")
        && base_expr.get("name").and_then(Value::as_str) == Some("this");

    if !is_this || func_name.is_empty() {
        return;
    }

    let current_contract = current_function.split('.').next().unwrap_or("");
    let target_func = format!("{current_contract}.{func_name}");
    if !symbols.has_function(&target_func) {
        return;
    }

    let from_idx = graph.ensure_function_node(current_function);
    let to_idx = graph.ensure_function_node(&target_func);
    graph.graph.add_edge(
        from_idx,
        to_idx,
        CallEdge {
            call_type: CallType::Indirect,
            is_resolved: true,
            via_interface: None,
        },
    );

    if let Some(function) = symbols.functions.get_mut(current_function) {
        function.indirect_calls.push(target_func);
    }
}

/// §4.5's state-variable access test, shared between the call-graph walk
/// (which only needs to know state_changes for report counts) and the CFG
/// builder (which needs the same test per-assignment).
pub fn is_state_variable_access(node: &Value, contract_name: &str, symbols: &SymbolTable) -> bool {
    if !node.is_object() {
        return false;
    }

    match node.get("nodeType").and_then(Value::as_str) {
        Some("Identifier") => {
            let var_name = node.get("name").and_then(Value::as_str).unwrap_or("");
            let type_string = node
                .pointer("/typeDescriptions/typeString")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_lowercase();

            if type_string.contains("storage") {
                return true;
            }
            symbols
                .state_var_names
                .get(contract_name)
                .map(|names| names.contains(var_name))
                .unwrap_or(false)
        }
        Some("MemberAccess") => {
            let type_string = node
                .pointer("/typeDescriptions/typeString")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_lowercase();
            if type_string.contains("storage") {
                return true;
            }

            let base_expr = node.get("expression").cloned().unwrap_or(Value::Null);
            if base_expr.get("nodeType").and_then(Value::as_str) == Some("Identifier") {
                let base_type = base_expr
                    .pointer("/typeDescriptions/typeString")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_lowercase();
                if base_type.contains("storage") {
                    return true;
                }
            }

            is_state_variable_access(&base_expr, contract_name, symbols)
        }
        _ => false,
    }
}

/// §4.6's `_get_full_variable_path`: reconstructs `a.b.c` for nested
/// `MemberAccess` chains, used both for recorded state changes here and
/// for the detector's state-changes-after entries.
pub fn full_variable_path(node: &Value) -> String {
    if !node.is_object() {
        return String::new();
    }

    match node.get("nodeType").and_then(Value::as_str) {
        Some("Identifier") => node.get("name").and_then(Value::as_str).unwrap_or("").to_string(),
        Some("MemberAccess") => {
            let base_expr = node.get("expression").cloned().unwrap_or(Value::Null);
            let member_name = node.get("memberName").and_then(Value::as_str).unwrap_or("");

            match base_expr.get("nodeType").and_then(Value::as_str) {
                Some("Identifier") => {
                    let base_name = base_expr.get("name").and_then(Value::as_str).unwrap_or("");
                    format!("{base_name}.{member_name}")
                }
                Some("MemberAccess") => {
                    let base_path = full_variable_path(&base_expr);
                    format!("{base_path}.{member_name}")
                }
                _ => member_name.to_string(),
            }
        }
        _ => String::new(),
    }
}
