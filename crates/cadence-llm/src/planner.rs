use async_trait::async_trait;
use tracing::{debug, info};

use cadence_core::planner::{normalize_plan_value, PlanError, Planner, PlannerContext};
use cadence_core::text::truncate_for_log;
use cadence_core::types::Plan;

const MAX_PROMPT_LOG_CHARS: usize = 4_000;
const MAX_LLM_OUTPUT_LOG_CHARS: usize = 8_000;

const DEFAULT_SYSTEM_PROMPT: &str = "You are the strategic core of the Context Engine. \
Analyze the user's high-level goal and create a structured Execution Plan using the available agents.";

const PLAN_EXAMPLES: &str = r#"EXAMPLE GOAL: "Write a suspenseful story about Apollo 11."
EXAMPLE PLAN:
[
  {"step": 1, "agent": "Librarian", "input": {"intent_query": "suspenseful narrative blueprint"}},
  {"step": 2, "agent": "Researcher", "input": {"topic_query": "Apollo 11 landing details"}},
  {"step": 3, "agent": "Writer", "input": {"blueprint": "$$STEP_1_OUTPUT$$", "facts": "$$STEP_2_OUTPUT$$"}}
]

EXAMPLE GOAL: "Write a technical report on Juno, then rewrite it casually."
EXAMPLE PLAN:
[
  {"step": 1, "agent": "Librarian", "input": {"intent_query": "technical report structure"}},
  {"step": 2, "agent": "Researcher", "input": {"topic_query": "Juno mission technology"}},
  {"step": 3, "agent": "Writer", "input": {"blueprint": "$$STEP_1_OUTPUT$$", "facts": "$$STEP_2_OUTPUT$$"}},
  {"step": 4, "agent": "Librarian", "input": {"intent_query": "casual summary style"}},
  {"step": 5, "agent": "Writer", "input": {"blueprint": "$$STEP_4_OUTPUT$$", "previous_content": "$$STEP_3_OUTPUT$$"}}
]"#;

/// Planner config for LLM
#[derive(Debug, Clone)]
pub struct LlmPlannerConfig {
    pub temperature: f32,
    pub system_prompt: String,
}

impl Default for LlmPlannerConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// LLM-based planner
///
/// Reaches the text oracle through the run's bindings, so planning calls
/// share the run's retry policy and cancellation.
#[derive(Debug, Clone, Default)]
pub struct LlmPlanner {
    pub config: LlmPlannerConfig,
}

impl LlmPlanner {
    pub fn new(config: LlmPlannerConfig) -> Self {
        Self { config }
    }

    fn build_prompt(&self, goal: &str, context: &PlannerContext) -> (String, String) {
        let mut system = String::new();
        system.push_str(self.config.system_prompt.trim());
        system.push_str("\n\n--- AVAILABLE CAPABILITIES ---\n");
        system.push_str(context.manifest.trim_end());
        system.push_str("\n--- END CAPABILITIES ---\n\n");
        system.push_str("INSTRUCTIONS:\n");
        system.push_str(
            "1) The plan MUST be a JSON list of step objects: {\"step\": <int>, \"agent\": <name>, \"input\": {...}}. \
If you must return an object, put the list under the key \"plan\".\n",
        );
        system.push_str(
            "2) Use Context Chaining: when a step needs the output of an earlier step, \
use the exact string $$STEP_<n>_OUTPUT$$ as the input value.\n",
        );
        system.push_str("3) Number steps from 1 in execution order; only reference earlier steps.\n");
        system.push_str(
            "4) Use only the agent names and input keys listed above. \
Use 'facts' for new material and 'previous_content' when rewriting.\n",
        );
        system.push_str("5) Return JSON only.\n\n");
        system.push_str(PLAN_EXAMPLES);

        let user = format!("Goal:\n{}\n", goal.trim());
        (system, user)
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, goal: &str, context: &PlannerContext) -> Result<Plan, PlanError> {
        let (system, user) = self.build_prompt(goal, context);
        let bindings = &context.bindings;
        info!(
            model = %bindings.generation_model,
            temperature = self.config.temperature,
            goal_len = goal.len(),
            "planner request prepared"
        );
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                system_prompt = %truncate_for_log(&system, MAX_PROMPT_LOG_CHARS),
                user_prompt = %truncate_for_log(&user, MAX_PROMPT_LOG_CHARS),
                "planner prompts"
            );
        }

        let request = bindings
            .request(system, user)
            .with_temperature(self.config.temperature)
            .with_json_mode();
        let output = bindings.complete("planner", request).await?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                llm_output = %truncate_for_log(&output, MAX_LLM_OUTPUT_LOG_CHARS),
                "planner raw llm output"
            );
        }

        let json_str = extract_json(&output)
            .ok_or_else(|| PlanError::Parse("LLM output did not contain JSON".to_string()))?;
        let value: serde_json::Value = serde_json::from_str(json_str)
            .map_err(|e| PlanError::Parse(format!("invalid plan JSON: {}", e)))?;
        let plan = normalize_plan_value(value)?;

        info!(
            step_count = plan.len(),
            agents = ?plan.steps().iter().map(|s| s.agent.as_str()).collect::<Vec<_>>(),
            "planner parsed plan"
        );
        Ok(plan)
    }
}

/// Slice the JSON payload out of surrounding prose or code fences.
///
/// Starts at whichever of `[` or `{` comes first and ends at the last
/// matching closer.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c == '[' || c == '{')?;
    let closer = if text[start..].starts_with('[') { ']' } else { '}' };
    let end = text.rfind(closer)?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{HashingEmbeddingOracle, MockTextOracle};
    use async_trait::async_trait;
    use cadence_core::capability::RunBindings;
    use cadence_core::oracle::OracleError;
    use cadence_core::retry::RetryPolicy;
    use cadence_core::store::{StoreError, VectorIndex, VectorMatch, VectorRecord};
    use std::sync::Arc;

    struct NoopIndex;

    #[async_trait]
    impl VectorIndex for NoopIndex {
        fn name(&self) -> &str {
            "noop"
        }

        async fn query(
            &self,
            _namespace: &str,
            _vector: &[f32],
            _top_k: usize,
        ) -> Result<Vec<VectorMatch>, StoreError> {
            Ok(Vec::new())
        }

        async fn upsert(
            &self,
            _namespace: &str,
            records: Vec<VectorRecord>,
        ) -> Result<usize, StoreError> {
            Ok(records.len())
        }
    }

    fn context(oracle: Arc<MockTextOracle>) -> PlannerContext {
        let bindings = RunBindings::new(
            oracle,
            Arc::new(HashingEmbeddingOracle::default()),
            Arc::new(NoopIndex),
        )
        .with_models("planner-model", "embed-model")
        .with_retry(RetryPolicy::immediate(3));
        PlannerContext::new("- Writer: writes\n", Arc::new(bindings))
    }

    #[test]
    fn test_prompt_embeds_manifest_goal_and_examples() {
        let planner = LlmPlanner::default();
        let ctx = context(Arc::new(MockTextOracle::new("[]")));
        let (system, user) = planner.build_prompt("Explain Juno", &ctx);

        assert!(system.contains("--- AVAILABLE CAPABILITIES ---\n- Writer: writes"));
        assert!(system.contains("$$STEP_<n>_OUTPUT$$"));
        assert!(system.contains("previous_content"));
        assert!(user.contains("Explain Juno"));
    }

    #[test]
    fn test_plan_parses_wrapped_json_in_code_fence() {
        tokio_test::block_on(async {
            let oracle = Arc::new(MockTextOracle::new(
                "Here you go:\n```json\n{\"plan\": [{\"step\": 1, \"agent\": \"Writer\", \"input\": {\"facts\": \"x\"}}]}\n```",
            ));
            let ctx = context(Arc::clone(&oracle));

            let plan = LlmPlanner::default().plan("write", &ctx).await.unwrap();
            assert_eq!(plan.len(), 1);
            assert_eq!(plan.steps()[0].agent, "Writer");

            let requests = oracle.requests();
            assert_eq!(requests.len(), 1);
            assert!(requests[0].json_mode);
            assert_eq!(requests[0].model, "planner-model");
        });
    }

    #[test]
    fn test_plan_rejects_non_plan_shape() {
        tokio_test::block_on(async {
            let ctx = context(Arc::new(MockTextOracle::new("{\"foo\": 1}")));
            let err = LlmPlanner::default().plan("write", &ctx).await.unwrap_err();
            assert!(matches!(err, PlanError::InvalidPlanShape(_)));
        });
    }

    #[test]
    fn test_plan_without_json_is_parse_error() {
        tokio_test::block_on(async {
            let ctx = context(Arc::new(MockTextOracle::new("I cannot help with that.")));
            let err = LlmPlanner::default().plan("write", &ctx).await.unwrap_err();
            assert!(matches!(err, PlanError::Parse(_)));
        });
    }

    #[test]
    fn test_planner_oracle_failure_retries_then_surfaces() {
        tokio_test::block_on(async {
            let oracle = Arc::new(MockTextOracle::new("[]").with_script(vec![
                Err(OracleError::Http("reset".into())),
                Err(OracleError::Http("reset".into())),
                Err(OracleError::Http("reset".into())),
            ]));
            let ctx = context(Arc::clone(&oracle));

            let err = LlmPlanner::default().plan("write", &ctx).await.unwrap_err();
            assert!(matches!(err, PlanError::Oracle(_)));
            assert_eq!(oracle.requests().len(), 3);
        });
    }

    #[test]
    fn test_extract_json_prefers_first_opener() {
        assert_eq!(extract_json("x [1, {\"a\": 2}] y"), Some("[1, {\"a\": 2}]"));
        assert_eq!(extract_json("{\"plan\": [1]}"), Some("{\"plan\": [1]}"));
        assert_eq!(extract_json("no json"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }
}
