//! Execution state: step outputs accumulated over one run.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("state entry '{0}' is already written")]
    AlreadyWritten(String),
}

/// Write-once mapping from `STEP_<n>_OUTPUT` keys to step outputs.
///
/// Keys keep their insertion order. A key is never rewritten.
#[derive(Debug, Clone, Default)]
pub struct ExecutionState {
    values: HashMap<String, Value>,
    order: Vec<String>,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keys in the order they were written.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Record a step output.
    pub fn record(&mut self, key: impl Into<String>, value: Value) -> Result<(), StateError> {
        let key = key.into();
        if self.values.contains_key(&key) {
            return Err(StateError::AlreadyWritten(key));
        }
        self.order.push(key.clone());
        self.values.insert(key, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_preserves_write_order() {
        let mut state = ExecutionState::new();
        state.record("STEP_10_OUTPUT", json!("a")).unwrap();
        state.record("STEP_2_OUTPUT", json!("b")).unwrap();

        let keys: Vec<&str> = state.keys().collect();
        assert_eq!(keys, vec!["STEP_10_OUTPUT", "STEP_2_OUTPUT"]);
        assert_eq!(state.get("STEP_2_OUTPUT"), Some(&json!("b")));
    }

    #[test]
    fn test_record_refuses_overwrite() {
        let mut state = ExecutionState::new();
        state.record("STEP_1_OUTPUT", json!("first")).unwrap();
        let err = state.record("STEP_1_OUTPUT", json!("second")).unwrap_err();

        assert_eq!(err, StateError::AlreadyWritten("STEP_1_OUTPUT".to_string()));
        assert_eq!(state.get("STEP_1_OUTPUT"), Some(&json!("first")));
        assert_eq!(state.len(), 1);
    }
}
