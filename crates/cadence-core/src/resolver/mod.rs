//! Dependency resolver
//!
//! Substitutes forward references (`$$STEP_<n>_OUTPUT$$`) in a step's
//! declared input with the outputs already recorded in the execution state.
//! Only a string that is exactly one reference is substituted; the
//! template itself is never modified.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{step_output_key, ExecutionState};

const REFERENCE_PREFIX: &str = "$$STEP_";
const REFERENCE_SUFFIX: &str = "_OUTPUT$$";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("dependency '{reference}' not found in execution state (expected key '{key}')")]
    DependencyNotFound { reference: String, key: String },
}

/// State key named by `text` if it is a forward reference.
///
/// The step number is read as an integer, so `$$STEP_01_OUTPUT$$` names
/// `STEP_1_OUTPUT`.
pub fn forward_reference_key(text: &str) -> Option<String> {
    let digits = text
        .strip_prefix(REFERENCE_PREFIX)?
        .strip_suffix(REFERENCE_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(match digits.parse::<u32>() {
        Ok(step) => step_output_key(step),
        Err(_) => format!("STEP_{}_OUTPUT", digits),
    })
}

fn reference_step(text: &str) -> Option<u32> {
    text.strip_prefix(REFERENCE_PREFIX)?
        .strip_suffix(REFERENCE_SUFFIX)?
        .parse()
        .ok()
}

/// Step numbers referenced anywhere inside `template`, in walk order.
pub fn references(template: &Value) -> Vec<u32> {
    let mut found = Vec::new();
    collect_references(template, &mut found);
    found
}

fn collect_references(value: &Value, found: &mut Vec<u32>) {
    match value {
        Value::String(text) => found.extend(reference_step(text)),
        Value::Array(items) => items.iter().for_each(|item| collect_references(item, found)),
        Value::Object(map) => map.values().for_each(|item| collect_references(item, found)),
        _ => {}
    }
}

/// Build a resolved copy of `template` against `state`.
pub fn resolve(template: &Value, state: &ExecutionState) -> Result<Value, ResolveError> {
    match template {
        Value::String(text) => match forward_reference_key(text) {
            Some(key) => state
                .get(&key)
                .cloned()
                .ok_or_else(|| ResolveError::DependencyNotFound {
                    reference: text.clone(),
                    key,
                }),
            None => Ok(template.clone()),
        },
        Value::Array(items) => items
            .iter()
            .map(|item| resolve(item, state))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => map
            .iter()
            .map(|(key, item)| Ok((key.clone(), resolve(item, state)?)))
            .collect::<Result<Map<_, _>, _>>()
            .map(Value::Object),
        _ => Ok(template.clone()),
    }
}
