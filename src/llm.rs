use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Lazy, finite stream of generated text fragments.
pub type TextStream = BoxStream<'static, Result<String>>;

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            messages,
            max_tokens,
            temperature,
        }
    }
}

/// Chat-completion backend used by the answer and follow-up stages.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Starts a streaming completion. Errors opening the stream are returned
    /// here, errors while reading it show up as stream items.
    async fn stream_chat(&self, request: ChatRequest) -> Result<TextStream>;

    /// One complete assistant message.
    async fn chat(&self, request: ChatRequest) -> Result<String>;
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize, Debug)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize, Debug)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize, Debug)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    content: Option<String>,
}

/// Groq's OpenAI-compatible chat completions endpoint.
pub struct GroqClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl GroqClient {
    pub fn new(api_url: &str, api_key: &str, model: &str) -> Result<GroqClient> {
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build llm http client")?;
        Ok(GroqClient {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    /// `None` when no API key is configured; the pipeline then runs with its
    /// fallback answers.
    pub fn from_config(config: &Config) -> Result<Option<GroqClient>> {
        let Some(api_key) = config.groq_api_key.as_deref() else {
            log::error!("GROQ_API_KEY is not set, answers will fall back to search context");
            return Ok(None);
        };
        let client = GroqClient::new(&config.groq_api_url, api_key, &config.groq_model)?;
        log::info!("groq client initialized with model: {}", config.groq_model);
        Ok(Some(client))
    }

    async fn send(&self, request: &ChatRequest, stream: bool) -> Result<reqwest::Response> {
        let body = CompletionBody {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream,
        };
        let res = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("completion request failed")?
            .error_for_status()?;
        Ok(res)
    }
}

#[async_trait]
impl LlmClient for GroqClient {
    async fn stream_chat(&self, request: ChatRequest) -> Result<TextStream> {
        let res = self.send(&request, true).await?;
        let mut bytes = res.bytes_stream();

        let stream = async_stream::try_stream! {
            // raw bytes until a full line is in, chunks can end mid character
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.context("completion stream interrupted")?;
                buffer.extend_from_slice(&chunk);

                while let Some(line) = take_line(&mut buffer) {
                    let line = decode_line(&line)?;
                    if let Some(fragment) = parse_stream_line(line)? {
                        yield fragment;
                    }
                }
            }
            let rest = decode_line(&buffer)?;
            if let Some(fragment) = parse_stream_line(rest)? {
                yield fragment;
            }
        };
        Ok(stream.boxed())
    }

    async fn chat(&self, request: ChatRequest) -> Result<String> {
        let res = self.send(&request, false).await?;
        let body = res.bytes().await.context("failed to read completion body")?;
        let parsed: CompletionResponse =
            serde_json::from_slice(&body).context("completion body is not valid json")?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

/// Removes and returns the first complete line, newline included.
fn take_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let pos = buffer.iter().position(|b| *b == b'\n')?;
    Some(buffer.drain(..=pos).collect())
}

fn decode_line(line: &[u8]) -> Result<&str> {
    std::str::from_utf8(line).context("completion stream is not valid utf-8")
}

/// Parses one line of an SSE completion stream into its text delta, if any.
fn parse_stream_line(line: &str) -> Result<Option<String>> {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }
    let parsed: StreamResponse =
        serde_json::from_str(data).context("invalid completion stream chunk")?;
    Ok(parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|c| !c.is_empty()))
}
