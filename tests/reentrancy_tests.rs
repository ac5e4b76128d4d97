//! Integration tests for the reentrancy analysis pipeline, built directly
//! from `ContractContext` fixtures rather than on-disk artifacts so each
//! scenario can isolate exactly the AST shapes it needs.

use std::collections::HashSet;

use pretty_assertions::assert_eq;
use serde_json::json;

use reentrancy_analyzer::callgraph::CallType;
use reentrancy_analyzer::cfg::CFGNodeType;
use reentrancy_analyzer::detector::Classification;
use reentrancy_analyzer::model::{ContractContext, ContractKind, Severity};
use reentrancy_analyzer::{Analyzer, AnalyzerConfig};

fn contract(name: &str, kind: ContractKind, base_contracts: &[&str], state_vars: &[&str], functions: serde_json::Value) -> ContractContext {
    let base_contracts_json: Vec<serde_json::Value> = base_contracts
        .iter()
        .map(|b| json!({"baseName": {"nodeType": "IdentifierPath", "name": b}}))
        .collect();
    let state_var_nodes: Vec<serde_json::Value> = state_vars
        .iter()
        .map(|v| {
            json!({
                "nodeType": "VariableDeclaration",
                "name": v,
                "stateVariable": true,
                "typeDescriptions": {"typeString": "mapping(address => uint256)"}
            })
        })
        .collect();

    let mut nodes = state_var_nodes;
    if let Some(function_nodes) = functions.as_array() {
        nodes.extend(function_nodes.iter().cloned());
    }

    let ast = json!({
        "nodeType": "ContractDefinition",
        "name": name,
        "contractKind": match kind {
            ContractKind::Interface => "interface",
            ContractKind::Library => "library",
            ContractKind::Regular => "contract",
        },
        "abstract": false,
        "baseContracts": base_contracts_json,
        "nodes": nodes,
    });

    ContractContext {
        contract_name: name.to_string(),
        file_path: format!("{name}.sol"),
        ast,
        kind,
        is_abstract: false,
    }
}

fn function(name: &str, visibility: &str, body: Option<serde_json::Value>) -> serde_json::Value {
    let mut node = json!({
        "nodeType": "FunctionDefinition",
        "kind": "function",
        "name": name,
        "visibility": visibility,
        "stateMutability": "nonpayable",
    });
    if let Some(body) = body {
        node["body"] = body;
    }
    node
}

fn block(statements: Vec<serde_json::Value>) -> serde_json::Value {
    json!({"nodeType": "Block", "statements": statements})
}

fn expr_stmt(expression: serde_json::Value) -> serde_json::Value {
    json!({"nodeType": "ExpressionStatement", "expression": expression})
}

fn identifier(name: &str) -> serde_json::Value {
    json!({"nodeType": "Identifier", "name": name})
}

fn identifier_typed(name: &str, type_string: &str) -> serde_json::Value {
    json!({"nodeType": "Identifier", "name": name, "typeDescriptions": {"typeString": type_string}})
}

fn assign_state_var(name: &str) -> serde_json::Value {
    expr_stmt(json!({
        "nodeType": "Assignment",
        "leftHandSide": identifier(name),
        "rightHandSide": {"nodeType": "Literal", "value": "0"},
    }))
}

/// `target.member(...)` where `target`'s declared type is `contract {contract}`.
fn cross_contract_call(var_name: &str, contract_name: &str, member: &str) -> serde_json::Value {
    expr_stmt(json!({
        "nodeType": "FunctionCall",
        "expression": {
            "nodeType": "MemberAccess",
            "expression": identifier_typed(var_name, &format!("contract {contract_name}")),
            "memberName": member,
            "typeDescriptions": {"typeString": "function () external returns ()"},
        },
        "arguments": [],
    }))
}

/// An unknown external call: `target.call("")` where `target` is not a
/// declared contract type, but the member access's own type string carries
/// `external`/`function`.
fn unknown_external_call() -> serde_json::Value {
    expr_stmt(json!({
        "nodeType": "FunctionCall",
        "expression": {
            "nodeType": "MemberAccess",
            "expression": {
                "nodeType": "MemberAccess",
                "expression": identifier("msg"),
                "memberName": "sender",
            },
            "memberName": "call",
            "typeDescriptions": {"typeString": "function (bytes memory) payable external returns (bool, bytes memory)"},
        },
        "arguments": [],
    }))
}

fn super_call(member: &str) -> serde_json::Value {
    expr_stmt(json!({
        "nodeType": "FunctionCall",
        "expression": {
            "nodeType": "MemberAccess",
            "expression": identifier("super"),
            "memberName": member,
        },
        "arguments": [],
    }))
}

/// `address(this).call(abi.encodeWithSelector(this.target.selector))`.
fn indirect_dispatch_call(target_func: &str) -> serde_json::Value {
    expr_stmt(json!({
        "nodeType": "FunctionCall",
        "expression": {
            "nodeType": "MemberAccess",
            "memberName": "call",
            "expression": {
                "nodeType": "FunctionCall",
                "expression": identifier("address"),
                "arguments": [identifier("this")],
            },
        },
        "arguments": [{
            "nodeType": "FunctionCall",
            "expression": {
                "nodeType": "MemberAccess",
                "expression": identifier("abi"),
                "memberName": "encodeWithSelector",
            },
            "arguments": [{
                "nodeType": "MemberAccess",
                "memberName": "selector",
                "expression": {
                    "nodeType": "MemberAccess",
                    "memberName": target_func,
                    "expression": identifier("this"),
                },
            }],
        }],
    }))
}

/// Every CFG must have exactly one entry/exit and no duplicate node ids
/// across the whole report (§8's universal invariants).
fn assert_cfg_invariants(cfgs: &std::collections::HashMap<String, reentrancy_analyzer::cfg::CFG>) {
    let mut seen = HashSet::new();
    for cfg in cfgs.values() {
        assert!(cfg.nodes.contains_key(&cfg.entry));
        assert!(cfg.nodes.contains_key(&cfg.exit));
        assert_eq!(cfg.nodes.values().filter(|n| n.node_type == CFGNodeType::Entry).count(), 1);
        assert_eq!(cfg.nodes.values().filter(|n| n.node_type == CFGNodeType::Exit).count(), 1);
        for id in cfg.nodes.keys() {
            assert!(seen.insert(id.clone()), "duplicate CFG node id {id}");
        }
    }
}

#[test]
fn classic_vulnerable_withdraw_is_potential_reentrancy() {
    let vault = contract(
        "Vault",
        ContractKind::Regular,
        &[],
        &["balances"],
        json!([function(
            "withdraw",
            "public",
            Some(block(vec![unknown_external_call(), assign_state_var("balances")])),
        )]),
    );

    let report = Analyzer::new(AnalyzerConfig::default()).analyze_contexts(&[vault]);

    assert_eq!(report.reentrancy_patterns.len(), 1);
    let pattern = &report.reentrancy_patterns[0];
    assert_eq!(pattern.classification, Classification::PotentialReentrancy.as_str());
    assert_eq!(pattern.severity, Severity::Medium);
    assert_eq!(pattern.state_changes_count, 1);
}

#[test]
fn known_cross_contract_reentrancy_is_confirmed_and_critical() {
    let a = contract(
        "A",
        ContractKind::Regular,
        &[],
        &["locked"],
        json!([function(
            "enter",
            "public",
            Some(block(vec![cross_contract_call("b", "B", "pull"), assign_state_var("locked")])),
        )]),
    );
    let b = contract(
        "B",
        ContractKind::Regular,
        &[],
        &[],
        json!([function("pull", "public", Some(block(vec![cross_contract_call("a", "A", "enter")])))]),
    );

    let report = Analyzer::new(AnalyzerConfig::default()).analyze_contexts(&[a, b]);

    let pattern = report
        .reentrancy_patterns
        .iter()
        .find(|p| p.function == "A.enter")
        .expect("A.enter should have a reentrancy pattern");
    assert_eq!(
        (pattern.classification, pattern.severity, pattern.external_call_target.as_deref()),
        (Classification::ConfirmedReentrancy.as_str(), Severity::Critical, Some("B.pull")),
    );
}

#[test]
fn safe_known_call_is_low_severity() {
    let a = contract(
        "A",
        ContractKind::Regular,
        &[],
        &["done"],
        json!([function(
            "f",
            "public",
            Some(block(vec![cross_contract_call("logger", "Logger", "log"), assign_state_var("done")])),
        )]),
    );
    let logger = contract(
        "Logger",
        ContractKind::Regular,
        &[],
        &[],
        json!([function("log", "public", Some(block(vec![])))]),
    );

    let report = Analyzer::new(AnalyzerConfig::default()).analyze_contexts(&[a, logger]);

    let pattern = report
        .reentrancy_patterns
        .iter()
        .find(|p| p.function == "A.f")
        .expect("A.f should have a reentrancy pattern");
    assert_eq!(pattern.classification, Classification::SafeExternalCall.as_str());
    assert_eq!(pattern.severity, Severity::Low);
}

#[test]
fn indirect_selector_dispatch_produces_indirect_edge() {
    let a = contract(
        "A",
        ContractKind::Regular,
        &[],
        &[],
        json!([
            function("dispatch", "public", Some(block(vec![indirect_dispatch_call("target")]))),
            function("target", "public", Some(block(vec![]))),
        ]),
    );

    let report = Analyzer::new(AnalyzerConfig::default()).analyze_contexts(&[a]);

    let edge = report
        .call_graph
        .edges
        .iter()
        .find(|e| e.source == "A.dispatch" && e.target == "A.target")
        .expect("indirect edge A.dispatch -> A.target should exist");
    assert_eq!(edge.edge_type, "indirect");
}

#[test]
fn interface_call_resolves_to_implementer_via_interface() {
    let itoken = contract(
        "IToken",
        ContractKind::Interface,
        &[],
        &[],
        json!([function("transfer", "external", None)]),
    );
    let token = contract(
        "Token",
        ContractKind::Regular,
        &["IToken"],
        &[],
        json!([function("transfer", "public", Some(block(vec![])))]),
    );
    let caller = contract(
        "Caller",
        ContractKind::Regular,
        &[],
        &[],
        json!([function(
            "call",
            "public",
            Some(block(vec![cross_contract_call("token", "IToken", "transfer")])),
        )]),
    );

    let report = Analyzer::new(AnalyzerConfig::default()).analyze_contexts(&[itoken, token, caller]);

    let edge = report
        .call_graph
        .edges
        .iter()
        .find(|e| e.source == "Caller.call" && e.target == "Token.transfer")
        .expect("resolved edge Caller.call -> Token.transfer should exist");
    assert_eq!(edge.edge_type, "cross_contract");
    assert!(edge.is_resolved);
    assert_eq!(edge.via_interface.as_deref(), Some("IToken"));
}

#[test]
fn super_call_resolves_to_nearest_base() {
    let a = contract("A", ContractKind::Regular, &[], &[], json!([function("foo", "public", Some(block(vec![])))]));
    let b = contract(
        "B",
        ContractKind::Regular,
        &["A"],
        &[],
        json!([function("foo", "public", Some(block(vec![super_call("foo")])))]),
    );

    let report = Analyzer::new(AnalyzerConfig::default()).analyze_contexts(&[a, b]);

    let edge = report
        .call_graph
        .edges
        .iter()
        .find(|e| e.source == "B.foo" && e.target == "A.foo")
        .expect("inherited edge B.foo -> A.foo should exist");
    assert_eq!(edge.edge_type, "inherited");
}

#[test]
fn empty_contract_analyzes_cleanly() {
    let empty = contract("Empty", ContractKind::Regular, &[], &[], json!([]));

    let report = Analyzer::new(AnalyzerConfig::default()).analyze_contexts(&[empty]);

    assert_eq!(report.summary.total_functions, 0);
    assert_eq!(report.contracts[0].state_variables_count, 0);
    assert!(report.reentrancy_patterns.is_empty());
}

#[test]
fn interface_only_input_builds_no_cfgs_or_patterns() {
    let itoken = contract(
        "IToken",
        ContractKind::Interface,
        &[],
        &[],
        json!([function("transfer", "external", None)]),
    );

    let report = Analyzer::new(AnalyzerConfig::default()).analyze_contexts(&[itoken]);

    assert!(report.call_graph.nodes.is_empty());
    assert!(report.call_graph.edges.is_empty());
    assert!(report.cfg.is_empty());
    assert!(report.reentrancy_patterns.is_empty());
}

#[test]
fn disabling_cross_contract_resolution_degrades_to_external_unknown() {
    let a = contract(
        "A",
        ContractKind::Regular,
        &[],
        &[],
        json!([function("enter", "public", Some(block(vec![cross_contract_call("b", "B", "pull")])))]),
    );
    let b = contract("B", ContractKind::Regular, &[], &[], json!([function("pull", "public", Some(block(vec![])))]));

    let config = AnalyzerConfig {
        enable_cross_contract_resolution: false,
        ..AnalyzerConfig::default()
    };
    let report = Analyzer::new(config).analyze_contexts(&[a, b]);

    assert!(report.call_graph.edges.iter().all(|e| e.edge_type != "cross_contract"));
    assert!(report
        .call_graph
        .edges
        .iter()
        .any(|e| e.source == "A.enter" && e.edge_type == "external"));
}

#[test]
fn report_counts_match_list_lengths() {
    let a = contract(
        "A",
        ContractKind::Regular,
        &[],
        &["done"],
        json!([function(
            "f",
            "public",
            Some(block(vec![unknown_external_call(), assign_state_var("done")])),
        )]),
    );

    let report = Analyzer::new(AnalyzerConfig::default()).analyze_contexts(&[a]);

    assert_eq!(report.summary.total_contracts, report.contracts.len());
    assert_eq!(report.summary.total_functions, report.functions.len());
    assert_eq!(report.summary.reentrancy_patterns, report.reentrancy_patterns.len());

    let text = reentrancy_analyzer::report::render_text_report(&report);
    assert!(text.contains("Analyzed 1 contracts"));
}

#[test]
fn text_report_never_panics_on_zero_patterns() {
    let empty = contract("Empty", ContractKind::Regular, &[], &[], json!([]));
    let report = Analyzer::new(AnalyzerConfig::default()).analyze_contexts(&[empty]);

    let text = reentrancy_analyzer::report::render_text_report(&report);
    assert!(!text.contains("Cross-contract calls:"));
    assert!(!text.is_empty());
}

#[test]
fn call_graph_function_nodes_are_backed_by_symbol_table() {
    let a = contract(
        "A",
        ContractKind::Regular,
        &[],
        &[],
        json!([function("f", "public", Some(block(vec![])))]),
    );

    let report = Analyzer::new(AnalyzerConfig::default()).analyze_contexts(&[a]);

    for node in &report.call_graph.nodes {
        if node.node_type != "external" {
            let contract_name = node.contract.as_deref().unwrap_or("");
            assert!(report.contracts.iter().any(|c| c.name == contract_name));
        }
    }
}

#[test]
fn default_config_reports_every_classification_and_severity() {
    let config = AnalyzerConfig::default();
    assert_eq!(config.severity_threshold, Severity::Low);
    assert!(config.report_safe_calls);
    assert!(config.enable_reentrancy_detection);
    assert!(config.enable_cross_contract_resolution);
}

#[test]
fn call_type_values_cover_all_variants() {
    for call_type in [
        CallType::Internal,
        CallType::Inherited,
        CallType::CrossContract,
        CallType::External,
        CallType::Indirect,
    ] {
        let _ = call_type;
    }
}

#[test]
fn cfg_invariants_hold_across_a_multi_contract_report() {
    use std::collections::HashMap as StdHashMap;

    let a = contract(
        "A",
        ContractKind::Regular,
        &[],
        &["locked"],
        json!([function(
            "enter",
            "public",
            Some(block(vec![cross_contract_call("b", "B", "pull"), assign_state_var("locked")])),
        )]),
    );
    let b = contract(
        "B",
        ContractKind::Regular,
        &[],
        &[],
        json!([function("pull", "public", Some(block(vec![cross_contract_call("a", "A", "enter")])))]),
    );

    let mut symbols = reentrancy_analyzer::model::SymbolTable::build(&[a, b]);
    let cfgs = reentrancy_analyzer::cfg::build_cfgs(&symbols, true);
    let _ = reentrancy_analyzer::callgraph::build_call_graph(&mut symbols, true);

    let mut as_map: StdHashMap<String, reentrancy_analyzer::cfg::CFG> = StdHashMap::new();
    for (k, v) in cfgs {
        as_map.insert(k, v);
    }
    assert_cfg_invariants(&as_map);
}
