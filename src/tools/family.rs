//! Tool families: many model-facing leaf tools funnelled into one handler.
//!
//! `debug_set_breakpoint` and `debug_continue` are separate tools to the
//! model, but both run through the `debug` family handler, which receives the
//! leaf's operation under `debug_operation`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::core::block::{JSON_PAYLOAD_PARAM, ToolUse};

use super::catalog::{ParamDoc, ParamKind, render_doc};
use super::spec::ToolHandler;

/// Result of validating a family operation.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyValidation {
    pub is_valid: bool,
    pub message: Option<String>,
    /// Arguments after normalization; handed to the family handler.
    pub transformed_args: Option<Value>,
}

impl FamilyValidation {
    #[must_use]
    pub fn valid(args: Value) -> Self {
        Self {
            is_valid: true,
            message: None,
            transformed_args: Some(args),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: Some(message.into()),
            transformed_args: None,
        }
    }
}

/// Family-specific validator, replacing the generic mode validator.
pub trait FamilyValidator: Send + Sync {
    fn validate(&self, operation: &str, args: &Value) -> FamilyValidation;
}

/// One operation of a family.
#[derive(Debug, Clone)]
pub struct OperationSpec {
    pub name: &'static str,
    pub summary: &'static str,
    pub params: &'static [ParamDoc],
    /// Writes to the workspace, so the engine checkpoints before running it.
    pub mutating: bool,
}

impl OperationSpec {
    fn required_args(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.params
            .iter()
            .filter(|param| param.required)
            .map(|param| param.name)
    }

    fn kind_of(&self, arg: &str) -> ParamKind {
        self.params
            .iter()
            .find(|param| param.name == arg)
            .map_or(ParamKind::Text, |param| param.kind)
    }
}

/// Validator driven by a static table of operations and their required args.
#[derive(Debug, Clone)]
pub struct OperationTableValidator {
    family: &'static str,
    operations: BTreeMap<&'static str, OperationSpec>,
}

impl OperationTableValidator {
    #[must_use]
    pub fn new(family: &'static str, operations: &[OperationSpec]) -> Self {
        Self {
            family,
            operations: operations
                .iter()
                .map(|spec| (spec.name, spec.clone()))
                .collect(),
        }
    }
}

impl FamilyValidator for OperationTableValidator {
    fn validate(&self, operation: &str, args: &Value) -> FamilyValidation {
        let Some(spec) = self.operations.get(operation) else {
            return FamilyValidation::invalid(format!(
                "Unknown {} operation '{operation}'.",
                self.family
            ));
        };
        let Some(object) = args.as_object() else {
            return FamilyValidation::invalid(format!(
                "Arguments for {}_{operation} must be a JSON object.",
                self.family
            ));
        };
        let missing: Vec<&str> = spec
            .required_args()
            .filter(|name| object.get(*name).is_none_or(is_blank))
            .collect();
        if !missing.is_empty() {
            return FamilyValidation::invalid(format!(
                "Missing required argument(s) for {}_{operation}: {}.",
                self.family,
                missing.join(", ")
            ));
        }
        FamilyValidation::valid(normalize_args(spec, object))
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

// Flat XML params arrive as strings. Only arguments the table types as
// integer or boolean are converted; everything else is passed through as
// written.
fn normalize_args(spec: &OperationSpec, object: &Map<String, Value>) -> Value {
    let normalized = object
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(text) => typed_scalar(spec.kind_of(key), text),
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect();
    Value::Object(normalized)
}

fn typed_scalar(kind: ParamKind, text: &str) -> Value {
    match kind {
        ParamKind::Text => {}
        ParamKind::Boolean => match text {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        },
        // Canonical decimal only: "007", "+5" and " 3" stay strings.
        ParamKind::Integer => {
            if let Ok(int) = text.parse::<i64>()
                && int.to_string() == text
            {
                return Value::from(int);
            }
        }
    }
    Value::String(text.to_string())
}

/// A registered family: prefix, operations, validator and shared handler.
#[derive(Clone)]
pub struct ToolFamily {
    name: &'static str,
    summary: &'static str,
    operations: Vec<OperationSpec>,
    validator: Arc<dyn FamilyValidator>,
    handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for ToolFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolFamily")
            .field("name", &self.name)
            .field("operations", &self.operations.len())
            .finish()
    }
}

impl ToolFamily {
    pub fn new(
        name: &'static str,
        summary: &'static str,
        operations: Vec<OperationSpec>,
        validator: Arc<dyn FamilyValidator>,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name,
            summary,
            operations,
            validator,
            handler,
        }
    }

    /// Family whose validator is built from its own operation table.
    pub fn with_table_validator(
        name: &'static str,
        summary: &'static str,
        operations: Vec<OperationSpec>,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        let validator = Arc::new(OperationTableValidator::new(name, &operations));
        Self::new(name, summary, operations, validator, handler)
    }

    /// Meta-tool name, e.g. `debug`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Leaf-name prefix, e.g. `debug_`.
    #[must_use]
    pub fn prefix(&self) -> String {
        format!("{}_", self.name)
    }

    /// Key carrying the operation in reconstructed blocks, e.g. `debug_operation`.
    #[must_use]
    pub fn operation_key(&self) -> String {
        format!("{}_operation", self.name)
    }

    #[must_use]
    pub fn operations(&self) -> &[OperationSpec] {
        &self.operations
    }

    #[must_use]
    pub fn validator(&self) -> &dyn FamilyValidator {
        self.validator.as_ref()
    }

    #[must_use]
    pub fn handler(&self) -> &Arc<dyn ToolHandler> {
        &self.handler
    }

    /// Whether `operation` writes to the workspace.
    #[must_use]
    pub fn mutates(&self, operation: &str) -> bool {
        self.operations
            .iter()
            .any(|op| op.name == operation && op.mutating)
    }

    /// Operation named by `leaf`, stripping the family prefix exactly once.
    #[must_use]
    pub fn operation_of<'a>(&self, leaf: &'a str) -> Option<&'a str> {
        leaf.strip_prefix(self.name)
            .and_then(|rest| rest.strip_prefix('_'))
            .filter(|op| !op.is_empty())
    }

    /// Documentation for one leaf tool.
    #[must_use]
    pub fn leaf_doc(&self, operation: &str) -> Option<String> {
        let spec = self.operations.iter().find(|op| op.name == operation)?;
        let leaf = format!("{}_{}", self.name, spec.name);
        let summary = format!("{} ({}: {})", spec.summary, self.name, self.summary);
        Some(render_doc(&leaf, &summary, spec.params))
    }
}

/// Rewrite a leaf block into the family's meta-tool shape.
///
/// `{family}_{operation}` becomes `{family}` with the original params plus
/// `{family}_operation = operation`. The partial flag is carried through.
#[must_use]
pub fn reconstruct(block: &ToolUse, family: &str) -> ToolUse {
    let operation = block
        .name
        .strip_prefix(family)
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or_default();
    let mut params = block.params.clone();
    params.insert(format!("{family}_operation"), operation.to_string());
    ToolUse {
        name: family.to_string(),
        params,
        partial: block.partial,
    }
}

/// Reconstruct and replace the arguments with validated ones.
pub(crate) fn reconstruct_with_args(block: &ToolUse, family: &str, args: Option<&Value>) -> ToolUse {
    let mut rebuilt = reconstruct(block, family);
    if let Some(args) = args {
        rebuilt
            .params
            .insert(JSON_PAYLOAD_PARAM.to_string(), args.to_string());
    }
    rebuilt
}
