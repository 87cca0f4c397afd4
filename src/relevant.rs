use serde_json::Value;

use crate::context::truncate_chars;
use crate::data_models::FollowUps;
use crate::llm::{ChatRequest, LlmClient, Message};
use crate::prompts::RELEVANT_PROMPT_SYSTEM;

pub const RELEVANT_MAX_TOKENS: u32 = 512;
// lower temperature keeps the json output consistent
pub const RELEVANT_TEMPERATURE: f32 = 0.3;

const EMPTY_FOLLOW_UPS: &str = r#"{"followUp":[]}"#;

/// Which canned question set stands in for model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// No completion client configured.
    Unavailable,
    /// The response held no `{"followUp": [...]}` object.
    NoFollowUps,
    /// The braces in the response did not enclose valid json.
    MalformedJson,
    /// The completion call itself failed.
    CallFailed,
}

pub fn templated_questions(fallback: Fallback, query: &str) -> FollowUps {
    let follow_up = match fallback {
        Fallback::Unavailable => vec![
            format!("What are the latest developments regarding {query}?"),
            format!("How does {query} compare to similar topics?"),
            format!("What are the implications of {query}?"),
        ],
        Fallback::NoFollowUps => vec![
            format!("Tell me more about {query}"),
            format!("What are the recent updates on {query}?"),
            format!("How significant is {query}?"),
        ],
        Fallback::MalformedJson => vec![
            format!("What else should I know about {query}?"),
            format!("Are there recent developments in {query}?"),
            format!("What are the key aspects of {query}?"),
        ],
        Fallback::CallFailed => vec![
            format!("What are the main points about {query}?"),
            format!("Can you provide more details on {query}?"),
            format!("What should I know about {query}?"),
        ],
    };
    FollowUps { follow_up }
}

pub fn relevant_request(context: &str, query: &str, max_context_chars: usize) -> ChatRequest {
    ChatRequest::new(
        vec![
            Message::system(RELEVANT_PROMPT_SYSTEM),
            Message::user(format!(
                "User Query: {query}\n\nContexts: {}\n",
                truncate_chars(context, max_context_chars)
            )),
        ],
        RELEVANT_MAX_TOKENS,
        RELEVANT_TEMPERATURE,
    )
}

/// Finds the json object embedded in free text.
///
/// Starts at the first `{` and returns the span up to its matching `}`,
/// skipping braces inside string literals. If the object never closes, the
/// span up to the last `}` is returned instead so the json parser can report
/// what is wrong with it. `None` when there is no `{ ... }` at all.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Turns raw model output into follow-up questions, substituting templated
/// questions whenever the output does not contain a valid
/// `{"followUp": [string, ...]}` object.
pub fn parse_follow_ups(generated: &str, query: &str) -> FollowUps {
    let generated = generated.trim();
    if generated.is_empty() {
        log::warn!("no text generated for relevant questions");
        return FollowUps::default();
    }

    let Some(candidate) = extract_json_object(generated) else {
        return templated_questions(Fallback::NoFollowUps, query);
    };

    let value: Value = match serde_json::from_str(candidate) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("relevant questions response is not valid json: {e}");
            return templated_questions(Fallback::MalformedJson, query);
        }
    };

    match serde_json::from_value::<FollowUps>(value) {
        Ok(follow_ups) => follow_ups,
        Err(e) => {
            log::warn!("relevant questions response has no followUp list: {e}");
            templated_questions(Fallback::NoFollowUps, query)
        }
    }
}

/// Asks the model for follow-up questions. Always returns a json encoded
/// `{"followUp": [...]}` object, whatever happens to the completion.
pub async fn get_relevant_questions(
    client: Option<&dyn LlmClient>,
    context: &str,
    query: &str,
    max_context_chars: usize,
) -> String {
    let follow_ups = match client {
        None => templated_questions(Fallback::Unavailable, query),
        Some(client) => {
            log::info!("requesting relevant questions");
            let request = relevant_request(context, query, max_context_chars);
            match client.chat(request).await {
                Ok(generated) => parse_follow_ups(&generated, query),
                Err(e) => {
                    log::error!("error requesting relevant questions: {:#}", e);
                    templated_questions(Fallback::CallFailed, query)
                }
            }
        }
    };

    serde_json::to_string(&follow_ups).unwrap_or_else(|e| {
        log::error!("failed to encode follow up questions: {e}");
        EMPTY_FOLLOW_UPS.to_string()
    })
}
