use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;

use crate::context::truncate_chars;
use crate::llm::{ChatRequest, LlmClient, Message};
use crate::prompts::search_prompt;

pub const ANSWER_MAX_TOKENS: u32 = 1024;
pub const ANSWER_TEMPERATURE: f32 = 0.7;

const UNAVAILABLE_CONTEXT_CHARS: usize = 500;
const FAILED_CONTEXT_CHARS: usize = 300;

pub fn answer_request(query: &str, context: &str, date_context: &str) -> ChatRequest {
    ChatRequest::new(
        vec![
            Message::system(search_prompt(date_context)),
            Message::user(format!("User Question: {query}\n\nCONTEXTS:\n\n{context}")),
        ],
        ANSWER_MAX_TOKENS,
        ANSWER_TEMPERATURE,
    )
}

pub fn unavailable_fallback(query: &str, context: &str) -> String {
    format!(
        "Based on the available information about '{query}', here's what I found from the search results:\n\n{}...",
        truncate_chars(context, UNAVAILABLE_CONTEXT_CHARS)
    )
}

pub fn failed_fallback(query: &str, context: &str) -> String {
    format!(
        "I encountered an issue processing your question about '{query}'. Based on the search results: {}...",
        truncate_chars(context, FAILED_CONTEXT_CHARS)
    )
}

/// Streams the answer to `query` fragment by fragment.
///
/// The stream always yields at least one fragment: without a client, or if
/// the completion fails before or while streaming, a single fallback built
/// from the context and the query ends it.
pub fn get_answer(
    client: Option<Arc<dyn LlmClient>>,
    query: &str,
    context: &str,
    date_context: &str,
) -> BoxStream<'static, String> {
    let query = query.to_string();
    let context = context.to_string();
    let request = answer_request(&query, &context, date_context);

    let stream = async_stream::stream! {
        let Some(client) = client else {
            log::warn!("completion client not available, sending fallback answer");
            yield unavailable_fallback(&query, &context);
            return;
        };

        log::info!("requesting streamed answer");
        let mut fragments = match client.stream_chat(request).await {
            Ok(fragments) => fragments,
            Err(e) => {
                log::error!("error starting answer stream: {:#}", e);
                yield failed_fallback(&query, &context);
                return;
            }
        };

        let mut produced = false;
        while let Some(fragment) = fragments.next().await {
            match fragment {
                Ok(text) => {
                    produced = true;
                    yield text;
                }
                Err(e) => {
                    log::error!("answer stream failed: {:#}", e);
                    yield failed_fallback(&query, &context);
                    return;
                }
            }
        }

        if !produced {
            log::warn!("completion produced no text, sending fallback answer");
            yield failed_fallback(&query, &context);
        }
    };
    stream.boxed()
}
