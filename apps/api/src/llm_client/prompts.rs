// Cross-cutting prompt fragments. Feature prompts live next to the feature
// (see `ai/prompts.rs`).

/// Appended to every system prompt that expects a JSON reply.
pub const JSON_ONLY_INSTRUCTION: &str = "\
    Return ONLY valid JSON. \
    Do NOT include any text outside the JSON object. \
    Do NOT include explanations or apologies.";

/// Joins a feature prompt and the JSON-only instruction.
pub fn json_system_prompt(feature_prompt: &str) -> String {
    format!("{}\n\n{}", feature_prompt.trim_end(), JSON_ONLY_INSTRUCTION)
}
