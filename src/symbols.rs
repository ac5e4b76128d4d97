//! Symbol Table (§4.2): turns the loader's `ContractContext`s into the
//! `Contract`/`Function`/`StateVar` index every later stage reads from.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde_json::Value;

use crate::model::{
    Contract, ContractContext, Function, Modifier, StateMutability, StateVar, SymbolTable,
    Visibility,
};

impl SymbolTable {
    /// Build the symbol table from every loaded context, in order.
    ///
    /// Two passes are required: the first extracts every contract's own
    /// members so inheritance and interface-implementation resolution
    /// (the second pass) can see the complete function sets of every
    /// contract, not just the ones processed so far.
    pub fn build(contexts: &[ContractContext]) -> Self {
        let mut table = SymbolTable::default();

        for context in contexts {
            table.extract_contract(context);
        }

        table.identify_interface_implementations();
        table
    }

    fn extract_contract(&mut self, context: &ContractContext) {
        let node = &context.ast;
        let contract_name = context.contract_name.clone();

        let base_contracts = node
            .get("baseContracts")
            .and_then(Value::as_array)
            .map(|bases| {
                bases
                    .iter()
                    .filter_map(extract_base_contract_name)
                    .collect()
            })
            .unwrap_or_default();

        let mut contract = Contract {
            name: contract_name.clone(),
            source_file: context.file_path.clone(),
            kind: context.kind,
            is_abstract: context.is_abstract,
            base_contracts,
            functions: IndexMap::new(),
            state_variables: Vec::new(),
            modifiers: HashMap::new(),
            ast: node.clone(),
        };

        let mut state_var_names = HashSet::new();

        if let Some(children) = node.get("nodes").and_then(Value::as_array) {
            for child in children {
                match child.get("nodeType").and_then(Value::as_str) {
                    Some("FunctionDefinition") if child.get("kind").and_then(Value::as_str) == Some("function") => {
                        if let Some(function) = extract_function(child, &contract_name) {
                            contract.functions.insert(function.short_name.clone(), function);
                        }
                    }
                    Some("VariableDeclaration")
                        if child.get("stateVariable").and_then(Value::as_bool) == Some(true) =>
                    {
                        let state_var = extract_state_var(child);
                        state_var_names.insert(state_var.name.clone());
                        contract.state_variables.push(state_var);
                    }
                    Some("ModifierDefinition") => {
                        if let Some(modifier) = extract_modifier(child) {
                            contract.modifiers.insert(modifier.name.clone(), modifier);
                        }
                    }
                    _ => {}
                }
            }
        }

        for function in contract.functions.values() {
            self.functions
                .insert(function.fully_qualified_name(), function.clone());
        }
        self.state_var_names.insert(contract_name.clone(), state_var_names);
        self.contracts.insert(contract_name, contract);
    }

    /// §4.2: a non-interface contract `C` implements interface `I` when
    /// either `C`'s function set is a superset of `I`'s, or `C` names `I`
    /// as a base contract. Transitive inheritance is not precomputed.
    fn identify_interface_implementations(&mut self) {
        let interfaces: Vec<String> = self
            .contracts
            .iter()
            .filter(|(_, c)| c.kind.is_interface())
            .map(|(name, _)| name.clone())
            .collect();

        for interface_name in interfaces {
            let interface_functions: HashSet<&String> = self.contracts[&interface_name]
                .functions
                .keys()
                .collect();

            for (other_name, other) in &self.contracts {
                if other_name == &interface_name || other.kind.is_interface() {
                    continue;
                }

                let other_functions: HashSet<&String> = other.functions.keys().collect();
                let by_function_superset = interface_functions.is_subset(&other_functions);
                let by_base_contract = other.base_contracts.iter().any(|b| b == &interface_name);

                if by_function_superset || by_base_contract {
                    let implementers = self
                        .interface_implementations
                        .entry(interface_name.clone())
                        .or_default();
                    if !implementers.contains(other_name) {
                        implementers.push(other_name.clone());
                    }
                }
            }
        }
    }
}

fn extract_base_contract_name(base_node: &Value) -> Option<String> {
    let base_name = base_node.get("baseName")?;
    match base_name.get("nodeType").and_then(Value::as_str) {
        Some("UserDefinedTypeName") => {
            let path_node = base_name.get("pathNode").unwrap_or(base_name);
            path_node
                .get("name")
                .and_then(Value::as_str)
                .map(String::from)
        }
        Some("IdentifierPath") => base_name.get("name").and_then(Value::as_str).map(String::from),
        _ => None,
    }
}

fn extract_function(node: &Value, contract_name: &str) -> Option<Function> {
    let short_name = node.get("name").and_then(Value::as_str)?.to_string();
    if short_name.is_empty() {
        return None;
    }

    let visibility = node
        .get("visibility")
        .and_then(Value::as_str)
        .map(Visibility::from_solidity)
        .unwrap_or(Visibility::Internal);
    let state_mutability = node
        .get("stateMutability")
        .and_then(Value::as_str)
        .map(StateMutability::from_solidity)
        .unwrap_or(StateMutability::Nonpayable);
    let is_virtual = node.get("virtual").and_then(Value::as_bool).unwrap_or(false);
    let has_overrides_list = node
        .get("overrides")
        .and_then(Value::as_array)
        .map(|v| !v.is_empty())
        .unwrap_or(false);
    let override_flag = node.get("override").and_then(Value::as_bool).unwrap_or(false);

    Some(Function {
        short_name,
        owning_contract: contract_name.to_string(),
        visibility,
        state_mutability,
        is_virtual,
        is_override: has_overrides_list || override_flag,
        ast: node.clone(),
        internal_calls: Vec::new(),
        external_calls: Vec::new(),
        cross_contract_calls: Vec::new(),
        indirect_calls: Vec::new(),
        state_changes: Vec::new(),
    })
}

fn extract_state_var(node: &Value) -> StateVar {
    let name = node.get("name").and_then(Value::as_str).unwrap_or("").to_string();
    let type_string = node
        .pointer("/typeDescriptions/typeString")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    StateVar {
        name,
        type_string,
        ast: node.clone(),
    }
}

fn extract_modifier(node: &Value) -> Option<Modifier> {
    let name = node.get("name").and_then(Value::as_str)?.to_string();
    Some(Modifier { name, ast: node.clone() })
}
