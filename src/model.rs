//! Data model shared by every pipeline stage: contracts, functions, state
//! variables and the symbol table that indexes them.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One `ContractDefinition` extracted from an AST, with provenance.
///
/// This is the loader's output and the symbol table's input; it carries
/// only what the loader can read syntactically (§4.1); functions, state
/// variables and modifiers are extracted later by the symbol table.
#[derive(Debug, Clone)]
pub struct ContractContext {
    pub contract_name: String,
    pub file_path: String,
    pub ast: Value,
    pub kind: ContractKind,
    pub is_abstract: bool,
}

/// What kind of contract declaration this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractKind {
    Regular,
    Interface,
    Library,
}

impl ContractKind {
    pub fn from_solidity(contract_kind: &str) -> Self {
        match contract_kind {
            "interface" => ContractKind::Interface,
            "library" => ContractKind::Library,
            _ => ContractKind::Regular,
        }
    }

    pub fn is_interface(self) -> bool {
        matches!(self, ContractKind::Interface)
    }
}

/// Function visibility as declared in the AST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    External,
    Public,
    Internal,
    Private,
}

impl Visibility {
    pub fn from_solidity(visibility: &str) -> Self {
        match visibility {
            "external" => Visibility::External,
            "public" => Visibility::Public,
            "private" => Visibility::Private,
            _ => Visibility::Internal,
        }
    }

    pub fn is_externally_reachable(self) -> bool {
        matches!(self, Visibility::Public | Visibility::External)
    }
}

/// Function state mutability as declared in the AST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    Pure,
    View,
    Payable,
    Nonpayable,
    /// The AST omitted `stateMutability` or used a value this analyzer
    /// doesn't recognize yet; treated as `nonpayable` for every decision
    /// that reads this field.
    Unknown(String),
}

impl StateMutability {
    pub fn from_solidity(state_mutability: &str) -> Self {
        match state_mutability {
            "pure" => StateMutability::Pure,
            "view" => StateMutability::View,
            "payable" => StateMutability::Payable,
            "nonpayable" => StateMutability::Nonpayable,
            "" => StateMutability::Nonpayable,
            other => StateMutability::Unknown(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            StateMutability::Pure => "pure",
            StateMutability::View => "view",
            StateMutability::Payable => "payable",
            StateMutability::Nonpayable => "nonpayable",
            StateMutability::Unknown(raw) => raw,
        }
    }
}

/// A contract-level storage declaration.
#[derive(Debug, Clone)]
pub struct StateVar {
    pub name: String,
    pub type_string: String,
    pub ast: Value,
}

/// A `modifier` declaration. The analyzer never interprets modifier bodies
/// (see the Non-goal on reentrancy-guard tracking); this is provenance only.
#[derive(Debug, Clone)]
pub struct Modifier {
    pub name: String,
    pub ast: Value,
}

/// A function, keyed in the symbol table by `"{contract}.{short_name}"`.
#[derive(Debug, Clone)]
pub struct Function {
    pub short_name: String,
    pub owning_contract: String,
    pub visibility: Visibility,
    pub state_mutability: StateMutability,
    pub is_virtual: bool,
    pub is_override: bool,
    pub ast: Value,

    /// Call sites resolved to a function in the same contract.
    pub internal_calls: Vec<String>,
    /// Call sites resolved to a synthetic `EXTERNAL:*` node.
    pub external_calls: Vec<String>,
    /// Call sites resolved to a function in a different contract.
    pub cross_contract_calls: Vec<CrossContractCall>,
    /// Call sites resolved via the `abi.encodeWithSelector(this.f.selector)` pattern.
    pub indirect_calls: Vec<String>,
    /// State-variable writes found while walking this function's body.
    pub state_changes: Vec<StateChangeRef>,
}

impl Function {
    pub fn fully_qualified_name(&self) -> String {
        format!("{}.{}", self.owning_contract, self.short_name)
    }
}

/// Record of a resolved cross-contract call, kept on the `Function` for
/// report projection independent of the call graph.
#[derive(Debug, Clone)]
pub struct CrossContractCall {
    pub target: String,
    pub contract: String,
    pub function: String,
    /// Set when the syntactic target was an interface and this call was
    /// resolved to a concrete implementer through it.
    pub via_interface: Option<String>,
}

/// A state-variable write found during the call-graph walk, independent of
/// (but consistent with) the CFG's `StateChange` nodes.
#[derive(Debug, Clone)]
pub struct StateChangeRef {
    pub variable: String,
}

/// A contract, keyed by its (assumed globally unique) name.
#[derive(Debug, Clone)]
pub struct Contract {
    pub name: String,
    pub source_file: String,
    pub kind: ContractKind,
    pub is_abstract: bool,
    pub base_contracts: Vec<String>,
    pub functions: IndexMap<String, Function>,
    pub state_variables: Vec<StateVar>,
    pub modifiers: HashMap<String, Modifier>,
    pub ast: Value,
}

/// Severity assigned to a reentrancy pattern (see `crate::detector`), kept
/// here because `AnalyzerConfig` needs it without depending on the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        };
        write!(f, "{s}")
    }
}

/// Global index over every loaded contract and function.
///
/// Built once by `SymbolTable::build` and never mutated afterward; every
/// later stage (classifier, call graph, CFG, detector) only reads from it.
#[derive(Debug, Default)]
pub struct SymbolTable {
    pub contracts: IndexMap<String, Contract>,
    /// `"{contract}.{name}"` -> function, mirroring `contracts[..].functions`
    /// for O(1) lookup by fully-qualified key.
    pub functions: IndexMap<String, Function>,
    /// Per-contract state-variable name sets, for the classifier's
    /// state-variable-access test.
    pub state_var_names: HashMap<String, HashSet<String>>,
    /// `interface -> ordered unique implementers`.
    pub interface_implementations: HashMap<String, Vec<String>>,
}

impl SymbolTable {
    pub fn contract_kind_of(&self, contract: &str) -> Option<ContractKind> {
        self.contracts.get(contract).map(|c| c.kind)
    }

    pub fn is_interface(&self, contract: &str) -> bool {
        self.contract_kind_of(contract) == Some(ContractKind::Interface)
    }

    pub fn is_abstract(&self, contract: &str) -> bool {
        self.contracts
            .get(contract)
            .map(|c| c.is_abstract)
            .unwrap_or(false)
    }

    pub fn base_contracts_of(&self, contract: &str) -> &[String] {
        self.contracts
            .get(contract)
            .map(|c| c.base_contracts.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_function(&self, full_name: &str) -> bool {
        self.functions.contains_key(full_name)
    }

    /// Depth-first search over `base_contracts`, first match wins, used by
    /// both inherited-call resolution (§4.4) and `super.f()` resolution.
    pub fn find_inherited_function(&self, func_name: &str, contract: &str) -> Option<String> {
        let mut visited = HashSet::new();
        self.find_inherited_function_inner(func_name, contract, &mut visited)
    }

    fn find_inherited_function_inner(
        &self,
        func_name: &str,
        contract: &str,
        visited: &mut HashSet<String>,
    ) -> Option<String> {
        if !visited.insert(contract.to_string()) {
            return None;
        }
        for base in self.base_contracts_of(contract) {
            let full_name = format!("{base}.{func_name}");
            if self.functions.contains_key(&full_name) {
                return Some(full_name);
            }
            if let Some(found) = self.find_inherited_function_inner(func_name, base, visited) {
                return Some(found);
            }
        }
        None
    }

    /// First implementer (in insertion order) of `interface_name` that
    /// defines `function_name`, or the interface's own name resolved
    /// directly when it's actually a concrete, non-abstract contract.
    pub fn find_implementation(&self, contract_name: &str, function_name: &str) -> Option<String> {
        let contract = self.contracts.get(contract_name)?;
        if contract.kind.is_interface() {
            let implementers = self.interface_implementations.get(contract_name)?;
            implementers
                .iter()
                .find(|implementer| {
                    self.contracts
                        .get(*implementer)
                        .map(|c| c.functions.contains_key(function_name))
                        .unwrap_or(false)
                })
                .cloned()
        } else if !contract.is_abstract {
            Some(contract_name.to_string())
        } else {
            None
        }
    }
}
