// Cross-cutting prompt fragments. Each module that calls the LLM keeps its
// own prompts.rs next to it.

/// Appended to every prompt so small local models stay in JSON mode.
pub const JSON_ONLY_INSTRUCTION: &str = "\
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";
