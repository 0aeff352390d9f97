//! Plan shape normalization
//!
//! Planner output arrives as arbitrary JSON. Only two shapes are accepted:
//! a bare list of steps, or a mapping wrapping such a list under one key.

use serde_json::Value;

use super::PlanError;
use crate::resolver::references;
use crate::types::{Plan, Step};

const WRAPPER_KEYS: [&str; 2] = ["plan", "steps"];

/// Coerce parsed planner output into a [`Plan`].
pub fn normalize_plan_value(value: Value) -> Result<Plan, PlanError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let preferred = WRAPPER_KEYS
                .iter()
                .find(|key| map.get(**key).is_some_and(Value::is_array))
                .map(|key| key.to_string());
            let key = preferred.or_else(|| {
                map.iter()
                    .find(|(_, value)| value.is_array())
                    .map(|(key, _)| key.clone())
            });
            match key.and_then(|key| map.remove(&key)) {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(PlanError::InvalidPlanShape(
                        "mapping holds no list of steps".to_string(),
                    ))
                }
            }
        }
        other => {
            return Err(PlanError::InvalidPlanShape(format!(
                "expected a list of steps, got {}",
                json_kind(&other)
            )))
        }
    };

    if items.is_empty() {
        return Err(PlanError::InvalidPlanShape("plan has no steps".to_string()));
    }

    let steps = items
        .into_iter()
        .enumerate()
        .map(|(position, item)| {
            serde_json::from_value::<Step>(item).map_err(|e| {
                PlanError::InvalidPlanShape(format!("step at position {}: {}", position, e))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Plan::new(steps))
}

/// Strict ordering check: step numbers are non-zero and strictly
/// ascending, and every forward reference names an earlier step.
pub fn check_step_order(plan: &Plan) -> Result<(), PlanError> {
    let mut previous: Option<u32> = None;
    for step in plan.steps() {
        if step.step == 0 {
            return Err(PlanError::InvalidOrdering(
                "step numbers start at 1".to_string(),
            ));
        }
        if let Some(previous) = previous {
            if step.step <= previous {
                return Err(PlanError::InvalidOrdering(format!(
                    "step {} follows step {}",
                    step.step, previous
                )));
            }
        }
        for referenced in references(&step.input) {
            if referenced >= step.step {
                return Err(PlanError::InvalidOrdering(format!(
                    "step {} references the output of step {}",
                    step.step, referenced
                )));
            }
        }
        previous = Some(step.step);
    }
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(n: u32, input: Value) -> Value {
        json!({"step": n, "agent": "Writer", "input": input})
    }

    #[test]
    fn test_bare_list_is_accepted() {
        let plan = normalize_plan_value(json!([step(1, json!({}))])).unwrap();
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_plan_wrapper_is_unwrapped() {
        let plan = normalize_plan_value(json!({"plan": [step(1, json!({})), step(2, json!({}))]}))
            .unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.steps()[1].step, 2);
    }

    #[test]
    fn test_any_list_valued_key_is_unwrapped() {
        let plan =
            normalize_plan_value(json!({"note": "x", "workflow": [step(1, json!({}))]})).unwrap();
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_plan_key_wins_over_other_lists() {
        let plan = normalize_plan_value(json!({
            "alternatives": [step(7, json!({}))],
            "plan": [step(1, json!({})), step(2, json!({}))]
        }))
        .unwrap();
        assert_eq!(plan.steps()[0].step, 1);
    }

    #[test]
    fn test_mapping_without_list_is_rejected() {
        let err = normalize_plan_value(json!({"foo": 1})).unwrap_err();
        assert!(matches!(err, PlanError::InvalidPlanShape(_)));
    }

    #[test]
    fn test_scalar_and_empty_list_are_rejected() {
        assert!(matches!(
            normalize_plan_value(json!("do it")),
            Err(PlanError::InvalidPlanShape(_))
        ));
        assert!(matches!(
            normalize_plan_value(json!([])),
            Err(PlanError::InvalidPlanShape(_))
        ));
    }

    #[test]
    fn test_malformed_step_is_rejected() {
        let err = normalize_plan_value(json!([{"step": "one", "agent": "Writer"}])).unwrap_err();
        match err {
            PlanError::InvalidPlanShape(reason) => assert!(reason.contains("position 0")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_step_order_check() {
        let ordered = normalize_plan_value(json!([
            step(1, json!({})),
            step(2, json!({"facts": "$$STEP_1_OUTPUT$$"}))
        ]))
        .unwrap();
        assert!(check_step_order(&ordered).is_ok());

        let descending =
            normalize_plan_value(json!([step(2, json!({})), step(1, json!({}))])).unwrap();
        assert!(matches!(
            check_step_order(&descending),
            Err(PlanError::InvalidOrdering(_))
        ));

        let self_reference =
            normalize_plan_value(json!([step(1, json!({"x": "$$STEP_1_OUTPUT$$"}))])).unwrap();
        assert!(matches!(
            check_step_order(&self_reference),
            Err(PlanError::InvalidOrdering(_))
        ));
    }
}
