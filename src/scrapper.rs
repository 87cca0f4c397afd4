use anyhow::{Context, Result};
use async_trait::async_trait;
use html2text::from_read;

use crate::data_models::OrganicResult;

/// Pages shorter than this are treated as having no usable content.
pub const MIN_PAGE_CHARS: usize = 200;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const SKIPPED_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

// wide enough that html2text never has to break a word
const RENDER_WIDTH: usize = 1000;

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Returns the visible text of the page at `url`.
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<HttpPageFetcher> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build scrape http client")?;
        Ok(HttpPageFetcher { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let res = self
            .client
            .get(url)
            .header("Accept", "text/html")
            .send()
            .await
            .with_context(|| format!("failed to fetch {url}"))?
            .error_for_status()?;
        let body = res.text().await?;
        extract_text(&body).with_context(|| format!("failed to convert {url} to text"))
    }
}

/// Flattens an html document into one line of visible text.
pub fn extract_text(html: &str) -> Result<String> {
    let mut visible = html.to_string();
    for tag in SKIPPED_TAGS {
        visible = strip_tag_blocks(&visible, tag);
    }
    let text = from_read(visible.as_bytes(), RENDER_WIDTH)?;
    Ok(text.split_whitespace().collect::<Vec<&str>>().join(" "))
}

/// Drops every `<tag ...>...</tag>` block. An unclosed block is left alone.
fn strip_tag_blocks(html: &str, tag: &str) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let lower = html.to_ascii_lowercase();

    let mut out = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(rel) = lower[pos..].find(&open) {
        let start = pos + rel;
        let after_open = start + open.len();
        // `<s` must not match `<span`
        let boundary = lower[after_open..]
            .chars()
            .next()
            .is_none_or(|c| c == '>' || c == '/' || c.is_ascii_whitespace());
        if !boundary {
            out.push_str(&html[pos..after_open]);
            pos = after_open;
            continue;
        }
        let Some(rel_end) = lower[after_open..].find(&close) else {
            break;
        };
        out.push_str(&html[pos..start]);
        pos = after_open + rel_end + close.len();
    }
    out.push_str(&html[pos..]);
    out
}

/// Keeps the first `max_chars` characters of a page, or nothing if the page
/// is too short to be worth feeding to the model.
pub fn clip_page_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() > MIN_PAGE_CHARS {
        text.chars().take(max_chars).collect()
    } else {
        String::new()
    }
}

/// Scrapes the first `num_elements` sources and attaches their text as
/// `html`. Entries past `num_elements` are never touched; entries without a
/// link or whose fetch fails are logged and left as they were.
pub async fn populate_sources(
    fetcher: &dyn PageFetcher,
    sources: &mut [OrganicResult],
    num_elements: usize,
    max_chars: usize,
) -> usize {
    let mut populated = 0;
    for (i, source) in sources.iter_mut().take(num_elements).enumerate() {
        let Some(link) = source.link.clone() else {
            log::warn!("skipping source at index {i} without a link");
            continue;
        };

        match fetcher.fetch_text(&link).await {
            Ok(text) => {
                source.html = Some(clip_page_text(&text, max_chars));
                populated += 1;
            }
            Err(e) => {
                log::error!("error extracting content from {link}: {:#}", e);
            }
        }
    }
    populated
}
