//! Call Classifier (§4.3): classifies a call expression's callee as
//! internal, inherited, cross-contract, or external-to-an-unknown-target.
//!
//! Purely syntactic, it never follows storage pointers or aliasing, only
//! the shape of the AST node and its `typeDescriptions.typeString`.

use serde_json::Value;

use crate::model::SymbolTable;

/// Resolved classification of a single call-site's callee expression.
#[derive(Debug, Clone)]
pub struct CallSite {
    pub kind: CallKind,
    pub called_name: String,
    pub target_contract: Option<String>,
    pub implementation_contract: Option<String>,
    pub is_external: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Internal,
    Inherited,
    CrossContract,
}

impl CallSite {
    /// Preferred cross-contract target: the resolved implementer when one
    /// was found, otherwise the syntactic target contract.
    pub fn resolved_contract(&self) -> Option<&str> {
        self.implementation_contract
            .as_deref()
            .or(self.target_contract.as_deref())
    }
}

/// Classify `expression` (a call's callee), given the contract it appears in.
pub fn classify_call(expression: &Value, current_contract: &str, symbols: &SymbolTable) -> CallSite {
    match expression.get("nodeType").and_then(Value::as_str) {
        Some("MemberAccess") => classify_member_access(expression, current_contract, symbols),
        Some("Identifier") => {
            let name = expression.get("name").and_then(Value::as_str).unwrap_or("unknown");
            CallSite {
                kind: CallKind::Internal,
                called_name: name.to_string(),
                target_contract: None,
                implementation_contract: None,
                is_external: false,
            }
        }
        _ => CallSite {
            kind: CallKind::Internal,
            called_name: "unknown".to_string(),
            target_contract: None,
            implementation_contract: None,
            is_external: false,
        },
    }
}

fn classify_member_access(expression: &Value, current_contract: &str, symbols: &SymbolTable) -> CallSite {
    let base_expr = expression.get("expression").cloned().unwrap_or(Value::Null);
    let member_name = expression.get("memberName").and_then(Value::as_str).unwrap_or("");
    let type_string = expression
        .pointer("/typeDescriptions/typeString")
        .and_then(Value::as_str)
        .unwrap_or("");

    let mut is_external = false;
    let mut kind = CallKind::Internal;
    let mut target_contract = None;
    let mut implementation_contract = None;

    if base_expr.get("nodeType").and_then(Value::as_str) == Some("Identifier") {
        if base_expr.get("name").and_then(Value::as_str) == Some("super") {
            return CallSite {
                kind: CallKind::Inherited,
                called_name: member_name.to_string(),
                target_contract: None,
                implementation_contract: None,
                is_external: false,
            };
        }

        let base_type_string = base_expr
            .pointer("/typeDescriptions/typeString")
            .and_then(Value::as_str)
            .unwrap_or("");

        if base_type_string.contains("contract") {
            if let Some(contract_name) = extract_contract_from_type(base_type_string) {
                implementation_contract = symbols.find_implementation(&contract_name, member_name);
                target_contract = Some(contract_name.clone());

                if contract_name != current_contract {
                    kind = CallKind::CrossContract;
                    is_external = true;
                }
            }
        }
    }

    if type_string.contains("external") && type_string.contains("function") {
        is_external = true;
    }

    CallSite {
        kind,
        called_name: member_name.to_string(),
        target_contract,
        implementation_contract,
        is_external,
    }
}

/// Extract the contract name immediately following the `"contract"` token
/// in a type string (e.g. `"contract Vault"` -> `"Vault"`). Fragile by
/// design; see §9's note on preferring `referencedDeclaration` when it's
/// available; not implemented here, matching the documented limitation.
fn extract_contract_from_type(type_string: &str) -> Option<String> {
    let parts: Vec<&str> = type_string.split_whitespace().collect();
    parts
        .iter()
        .position(|&p| p == "contract")
        .and_then(|i| parts.get(i + 1))
        .map(|s| s.to_string())
}
