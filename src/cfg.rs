//! CFG Builder (§4.5): one intra-procedural control-flow graph per
//! function, with typed nodes annotated for the reentrancy detector.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::callgraph::is_state_variable_access;
use crate::classifier::{classify_call, CallKind};
use crate::model::{Function, SymbolTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CFGNodeType {
    Entry,
    Exit,
    Condition,
    FunctionCall,
    ExternalCall,
    KnownExternalCall,
    InheritedCall,
    IndirectCall,
    StateChange,
    Return,
    /// Reserved for a dedicated revert-statement node; the builder currently
    /// folds `RevertStatement` into the generic `Condition` placeholder,
    /// same as any other unhandled statement kind.
    Revert,
    /// Reserved; modifier bodies are never walked (see the Non-goal on
    /// reentrancy-guard tracking).
    Modifier,
}

#[derive(Debug, Clone)]
pub struct CFGNode {
    pub id: String,
    pub node_type: CFGNodeType,
    pub function_key: String,
    pub called_function: Option<String>,
    pub is_external: bool,
    pub is_inherited: bool,
    pub modifies_state: bool,
    pub ast: Value,
}

#[derive(Debug, Clone)]
pub struct CFGEdge {
    pub source: String,
    pub target: String,
    pub label: Option<String>,
}

pub struct CFG {
    pub function_key: String,
    pub entry: String,
    pub exit: String,
    pub nodes: IndexMap<String, CFGNode>,
    pub edges: Vec<CFGEdge>,
}

impl CFG {
    pub fn successors(&self, node_id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.source == node_id)
            .map(|e| e.target.as_str())
            .collect()
    }
}

struct Builder {
    prefix: String,
    function_key: String,
    entry_id: String,
    exit_id: String,
    counter: usize,
    nodes: IndexMap<String, CFGNode>,
    edges: Vec<CFGEdge>,
}

impl Builder {
    fn new(function_key: String) -> Self {
        let prefix = function_key.replace('.', "_");
        let entry_id = format!("{prefix}_entry");
        let exit_id = format!("{prefix}_exit");
        let mut nodes = IndexMap::new();
        nodes.insert(
            entry_id.clone(),
            CFGNode {
                id: entry_id.clone(),
                node_type: CFGNodeType::Entry,
                function_key: function_key.clone(),
                called_function: None,
                is_external: false,
                is_inherited: false,
                modifies_state: false,
                ast: Value::Null,
            },
        );
        nodes.insert(
            exit_id.clone(),
            CFGNode {
                id: exit_id.clone(),
                node_type: CFGNodeType::Exit,
                function_key: function_key.clone(),
                called_function: None,
                is_external: false,
                is_inherited: false,
                modifies_state: false,
                ast: Value::Null,
            },
        );

        Self {
            prefix,
            function_key,
            entry_id,
            exit_id,
            counter: 0,
            nodes,
            edges: Vec::new(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn new_node(
        &mut self,
        node_type: CFGNodeType,
        ast: Value,
        called_function: Option<String>,
        is_external: bool,
        is_inherited: bool,
        modifies_state: bool,
    ) -> String {
        let id = format!("{}_node_{}", self.prefix, self.counter);
        self.counter += 1;
        self.nodes.insert(
            id.clone(),
            CFGNode {
                id: id.clone(),
                node_type,
                function_key: self.function_key.clone(),
                called_function,
                is_external,
                is_inherited,
                modifies_state,
                ast,
            },
        );
        id
    }

    fn add_edge(&mut self, source: &str, target: &str, label: Option<&str>) {
        let label = label.map(String::from);
        if self
            .edges
            .iter()
            .any(|e| e.source == source && e.target == target && e.label == label)
        {
            return;
        }
        self.edges.push(CFGEdge {
            source: source.to_string(),
            target: target.to_string(),
            label,
        });
    }

    fn successors(&self, node_id: &str) -> Vec<String> {
        self.edges
            .iter()
            .filter(|e| e.source == node_id)
            .map(|e| e.target.clone())
            .collect()
    }

    fn finish(self) -> CFG {
        CFG {
            function_key: self.function_key,
            entry: self.entry_id,
            exit: self.exit_id,
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}

/// §4.5's branch-end discovery, reused for every statement-to-statement
/// hop as well as If/merge wiring: the nearest reachable node (excluding
/// Exit) whose successors are empty or all equal to Exit.
fn find_branch_end(builder: &Builder, start: &str) -> String {
    let mut visited = HashSet::new();
    let mut stack = vec![start.to_string()];

    while let Some(node) = stack.pop() {
        if !visited.insert(node.clone()) {
            continue;
        }
        let succs = builder.successors(&node);
        if succs.is_empty() || succs.iter().all(|s| s == &builder.exit_id) {
            return node;
        }
        for s in succs {
            if s != builder.exit_id {
                stack.push(s);
            }
        }
    }
    start.to_string()
}

pub fn build_cfgs(symbols: &SymbolTable, resolve_cross_contract: bool) -> IndexMap<String, CFG> {
    let mut cfgs = IndexMap::new();

    for contract in symbols.contracts.values() {
        if contract.kind.is_interface() {
            continue;
        }
        for function in contract.functions.values() {
            let full_name = function.fully_qualified_name();
            cfgs.insert(
                full_name,
                build_function_cfg(function, &contract.name, symbols, resolve_cross_contract),
            );
        }
    }

    cfgs
}

fn build_function_cfg(
    function: &Function,
    contract_name: &str,
    symbols: &SymbolTable,
    resolve_cross_contract: bool,
) -> CFG {
    let mut builder = Builder::new(function.fully_qualified_name());

    let head = function
        .ast
        .get("body")
        .filter(|b| b.get("nodeType").and_then(Value::as_str) == Some("Block"))
        .and_then(|block| process_block(block, contract_name, symbols, resolve_cross_contract, &mut builder));

    let entry_id = builder.entry_id.clone();
    let exit_id = builder.exit_id.clone();

    match head {
        Some(head) => {
            builder.add_edge(&entry_id, &head, None);
            let end = find_branch_end(&builder, &head);
            builder.add_edge(&end, &exit_id, None);
        }
        None => builder.add_edge(&entry_id, &exit_id, None),
    }

    builder.finish()
}

fn process_block(
    block: &Value,
    contract_name: &str,
    symbols: &SymbolTable,
    resolve_cross_contract: bool,
    builder: &mut Builder,
) -> Option<String> {
    let statements = block.get("statements").and_then(Value::as_array)?;
    if statements.is_empty() {
        return None;
    }

    let mut head = None;
    let mut prev: Option<String> = None;

    for statement in statements {
        let Some(node_head) = process_statement(statement, contract_name, symbols, resolve_cross_contract, builder) else {
            continue;
        };
        if head.is_none() {
            head = Some(node_head.clone());
        }
        if let Some(prev_head) = &prev {
            let prev_end = find_branch_end(builder, prev_head);
            builder.add_edge(&prev_end, &node_head, None);
        }
        prev = Some(node_head);
    }

    head
}

fn process_statement(
    stmt: &Value,
    contract_name: &str,
    symbols: &SymbolTable,
    resolve_cross_contract: bool,
    builder: &mut Builder,
) -> Option<String> {
    match stmt.get("nodeType").and_then(Value::as_str) {
        Some("Block") => process_block(stmt, contract_name, symbols, resolve_cross_contract, builder),
        Some("IfStatement") => Some(process_if(stmt, contract_name, symbols, resolve_cross_contract, builder)),
        Some("Return") => {
            let id = builder.new_node(CFGNodeType::Return, stmt.clone(), None, false, false, false);
            let exit_id = builder.exit_id.clone();
            builder.add_edge(&id, &exit_id, None);
            Some(id)
        }
        Some("ExpressionStatement") => {
            let expr = stmt.get("expression").cloned().unwrap_or(Value::Null);
            let classified = classify_expression(&expr, contract_name, symbols, resolve_cross_contract);
            Some(builder.new_node(
                classified.node_type,
                stmt.clone(),
                classified.called_function,
                classified.is_external,
                classified.is_inherited,
                classified.modifies_state,
            ))
        }
        Some("VariableDeclarationStatement") => {
            let initial = stmt.get("initialValue").cloned().unwrap_or(Value::Null);
            let classified = if initial.get("nodeType").and_then(Value::as_str) == Some("FunctionCall") {
                classify_expression(&initial, contract_name, symbols, resolve_cross_contract)
            } else {
                ExprClass::condition()
            };
            Some(builder.new_node(
                classified.node_type,
                stmt.clone(),
                classified.called_function,
                classified.is_external,
                classified.is_inherited,
                classified.modifies_state,
            ))
        }
        _ => Some(builder.new_node(CFGNodeType::Condition, stmt.clone(), None, false, false, false)),
    }
}

fn process_if(
    stmt: &Value,
    contract_name: &str,
    symbols: &SymbolTable,
    resolve_cross_contract: bool,
    builder: &mut Builder,
) -> String {
    let condition_id = builder.new_node(CFGNodeType::Condition, stmt.clone(), None, false, false, false);
    let merge_id = builder.new_node(
        CFGNodeType::Condition,
        json!({"nodeType": "Merge"}),
        None,
        false,
        false,
        false,
    );

    wire_branch(
        builder,
        &condition_id,
        &merge_id,
        stmt.get("trueBody"),
        "true",
        contract_name,
        symbols,
        resolve_cross_contract,
    );
    wire_branch(
        builder,
        &condition_id,
        &merge_id,
        stmt.get("falseBody"),
        "false",
        contract_name,
        symbols,
        resolve_cross_contract,
    );

    condition_id
}

fn wire_branch(
    builder: &mut Builder,
    condition_id: &str,
    merge_id: &str,
    branch: Option<&Value>,
    label: &str,
    contract_name: &str,
    symbols: &SymbolTable,
    resolve_cross_contract: bool,
) {
    let head = match branch {
        Some(b) if b.get("nodeType").and_then(Value::as_str) == Some("Block") => {
            process_block(b, contract_name, symbols, resolve_cross_contract, builder)
        }
        Some(b) => process_statement(b, contract_name, symbols, resolve_cross_contract, builder),
        None => None,
    };

    match head {
        Some(head) => {
            builder.add_edge(condition_id, &head, Some(label));
            let end = find_branch_end(builder, &head);
            builder.add_edge(&end, merge_id, None);
        }
        None => builder.add_edge(condition_id, merge_id, Some(label)),
    }
}

struct ExprClass {
    node_type: CFGNodeType,
    called_function: Option<String>,
    is_external: bool,
    is_inherited: bool,
    modifies_state: bool,
}

impl ExprClass {
    fn condition() -> Self {
        Self {
            node_type: CFGNodeType::Condition,
            called_function: None,
            is_external: false,
            is_inherited: false,
            modifies_state: false,
        }
    }
}

fn classify_expression(
    expr: &Value,
    contract_name: &str,
    symbols: &SymbolTable,
    resolve_cross_contract: bool,
) -> ExprClass {
    match expr.get("nodeType").and_then(Value::as_str) {
        Some("FunctionCall") => {
            let callee = expr.get("expression").cloned().unwrap_or(Value::Null);
            let call_info = classify_call(&callee, contract_name, symbols);

            match call_info.kind {
                CallKind::CrossContract => {
                    if resolve_cross_contract {
                        if let Some(resolved) = call_info.resolved_contract() {
                            let full_target = format!("{resolved}.{}", call_info.called_name);
                            if symbols.has_function(&full_target) {
                                return ExprClass {
                                    node_type: CFGNodeType::KnownExternalCall,
                                    called_function: Some(full_target),
                                    is_external: true,
                                    is_inherited: false,
                                    modifies_state: false,
                                };
                            }
                        }
                    }
                    ExprClass {
                        node_type: CFGNodeType::ExternalCall,
                        called_function: Some(call_info.called_name),
                        is_external: true,
                        is_inherited: false,
                        modifies_state: false,
                    }
                }
                CallKind::Inherited => ExprClass {
                    node_type: CFGNodeType::InheritedCall,
                    called_function: Some(call_info.called_name),
                    is_external: false,
                    is_inherited: true,
                    modifies_state: false,
                },
                CallKind::Internal if call_info.is_external => ExprClass {
                    node_type: CFGNodeType::ExternalCall,
                    called_function: Some(call_info.called_name),
                    is_external: true,
                    is_inherited: false,
                    modifies_state: false,
                },
                CallKind::Internal => ExprClass {
                    node_type: CFGNodeType::FunctionCall,
                    called_function: Some(call_info.called_name),
                    is_external: false,
                    is_inherited: false,
                    modifies_state: false,
                },
            }
        }
        Some("Assignment") => {
            let lhs = expr
                .get("leftHandSide")
                .or_else(|| expr.get("left"))
                .cloned()
                .unwrap_or(Value::Null);
            let modifies_state = is_state_variable_access(&lhs, contract_name, symbols);
            ExprClass {
                node_type: CFGNodeType::StateChange,
                called_function: None,
                is_external: false,
                is_inherited: false,
                modifies_state,
            }
        }
        Some("BinaryOperation") => {
            let left = expr.get("leftExpression").or_else(|| expr.get("left"));
            let right = expr.get("rightExpression").or_else(|| expr.get("right"));

            for operand in [left, right].into_iter().flatten() {
                if operand.get("nodeType").and_then(Value::as_str) == Some("FunctionCall") {
                    return classify_expression(operand, contract_name, symbols, resolve_cross_contract);
                }
            }
            ExprClass::condition()
        }
        _ => ExprClass::condition(),
    }
}
