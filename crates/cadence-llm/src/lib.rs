//! Oracle and planner implementations for Cadence.
//!
//! This crate provides:
//! - OpenAI-compatible text and embedding oracles over HTTP
//! - Offline mock oracles
//! - The LLM planner
//!
//! Use `build_text_oracle` / `build_embedding_oracle` to create oracles
//! from configuration.

mod factory;
mod mock;
mod openai;
mod planner;

pub use factory::{build_embedding_oracle, build_text_oracle, OracleBuildError};
pub use mock::{HashingEmbeddingOracle, MockTextOracle};
pub use openai::{OpenAiConfig, OpenAiEmbeddingOracle, OpenAiTextOracle, DEFAULT_ENDPOINT};
pub use planner::{extract_json, LlmPlanner, LlmPlannerConfig};
