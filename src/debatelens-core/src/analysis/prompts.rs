//! Prompt templates for turn analysis and debate narratives.

use crate::participant::Side;

pub const CLAIMS_SYSTEM_PROMPT: &str = r#"You are a debate analyst extracting claims.
Identify the distinct claims the speaker asserts in their argument.

OUTPUT RULES:
- Respond with ONLY a JSON array of strings, e.g. ["claim one", "claim two"]
- Each claim is one short sentence in your own words
- At most 5 claims; return [] if the text makes no claims
- No commentary, no markdown"#;

pub const REBUTTALS_SYSTEM_PROMPT: &str = r#"You are a debate analyst extracting rebuttals.
Identify where the speaker directly responds to or counters points made earlier in the debate.

OUTPUT RULES:
- Respond with ONLY a JSON array of strings
- Each entry names the opposing point being answered and how it is answered, in one sentence
- At most 5 entries; return [] if the speaker does not engage with earlier points
- No commentary, no markdown"#;

pub const FALLACIES_SYSTEM_PROMPT: &str = r#"You are a logic instructor detecting logical fallacies in debate arguments.
Only flag clear fallacies; do not flag strong but legitimate rhetoric.

OUTPUT RULES:
- Respond with ONLY a JSON array of objects:
  [{"type": "snake_case_fallacy_name", "explanation": "one sentence", "severity": 1-10}]
- At most 3 entries; return [] if there are none
- No commentary, no markdown"#;

pub const TONE_SYSTEM_PROMPT: &str = r#"You are a debate judge rating TONE.
100 means respectful, measured and constructive; 0 means hostile, insulting or dismissive.

OUTPUT RULES:
- Respond with ONLY a JSON object: {"score": 0-100, "reasoning": "one sentence"}"#;

pub const CLARITY_SYSTEM_PROMPT: &str = r#"You are a debate judge rating CLARITY.
100 means well structured, precise and easy to follow; 0 means confused, vague or incoherent.

OUTPUT RULES:
- Respond with ONLY a JSON object: {"score": 0-100, "reasoning": "one sentence"}"#;

pub const NARRATIVE_SYSTEM_PROMPT: &str = r#"You are a debate commentator summarising the outcome of a finished debate.
Write 3 to 5 plain sentences explaining who argued better and why, based on the scores and highlights provided.
Do not invent facts that are not in the summary. No markdown."#;

/// User prompt shared by every per-turn analysis step.
pub fn build_turn_prompt(
    topic: &str,
    side: Side,
    content: &str,
    prior_context: &str,
    retrieved: &str,
) -> String {
    let mut prompt = format!(
        "DEBATE TOPIC: {}\nSPEAKER SIDE: {}\n\n",
        topic,
        side.display_name()
    );

    if !prior_context.is_empty() {
        prompt.push_str("EARLIER TURNS:\n");
        prompt.push_str(prior_context);
        prompt.push_str("\n\n");
    }

    if !retrieved.is_empty() {
        prompt.push_str(retrieved);
        prompt.push('\n');
    }

    prompt.push_str("ARGUMENT TO ANALYZE:\n");
    prompt.push_str(content);
    prompt
}
