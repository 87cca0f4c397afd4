use std::panic::{self, AssertUnwindSafe};

use crate::chunking::{MIN_CHUNKING_CHARS, get_chunking};
use crate::data_models::SearchBundle;

pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Assembles the model context from a search bundle: snippet lines, chunks of
/// scraped page text, top story titles, the knowledge graph description and
/// the answer box, in that order.
///
/// Never fails; a bundle with nothing usable gives an empty string.
pub fn build_context(sources: &SearchBundle) -> String {
    match panic::catch_unwind(AssertUnwindSafe(|| assemble(sources))) {
        Ok(context) => context,
        Err(_) => {
            log::error!("context assembly panicked, continuing with empty context");
            String::new()
        }
    }
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn assemble(sources: &SearchBundle) -> String {
    let mut pieces: Vec<String> = Vec::new();
    let organic = sources.organic.as_deref().unwrap_or_default();

    pieces.extend(organic.iter().filter_map(|item| {
        let snippet = item.snippet.as_deref()?;
        Some(format!("{} {}", snippet, item.date.as_deref().unwrap_or("")))
    }));

    let html_text = organic
        .iter()
        .filter_map(|item| item.html.as_deref())
        .collect::<Vec<&str>>()
        .join(" ");
    if html_text.chars().count() > MIN_CHUNKING_CHARS {
        pieces.extend(get_chunking(&html_text));
    }

    if let Some(stories) = &sources.top_stories {
        pieces.extend(stories.iter().filter_map(|s| s.title.clone()));
    }

    if let Some(description) = sources
        .knowledge_graph
        .as_ref()
        .and_then(|g| g.description.as_deref())
        .filter(|d| !d.is_empty())
    {
        pieces.push(description.to_string());
    }

    if let Some(answer_box) = &sources.answer_box {
        pieces.extend(answer_box.answer.clone());
        pieces.extend(answer_box.snippet.clone());
    }

    pieces.join(CONTEXT_SEPARATOR)
}
