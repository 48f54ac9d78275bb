// Relevance scoring: oracle strategies, score blending and threshold filtering.
// All LLM calls go through llm_client.

pub mod oracle;
pub mod prompts;
pub mod relevance;
