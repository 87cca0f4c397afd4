use futures::{FutureExt, StreamExt};
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::answer::get_answer;
use crate::config::Config;
use crate::context::build_context;
use crate::data_models::StreamEvent;
use crate::llm::LlmClient;
use crate::relevant::get_relevant_questions;
use crate::scrapper::{PageFetcher, populate_sources};
use crate::sources::{SearchProvider, get_sources};

pub const ERROR_MESSAGE: &str = "We are currently experiencing some issues. Please try again later.";

const EVENT_BUFFER: usize = 32;

/// One validated `/search` request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub date_context: String,
    pub stored_location: Option<String>,
    pub pro_mode: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub scrape_count: usize,
    pub scrape_max_chars: usize,
    pub followup_context_chars: usize,
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        PipelineOptions {
            scrape_count: config.scrape_count,
            scrape_max_chars: config.scrape_max_chars,
            followup_context_chars: config.followup_context_chars,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions::from(&Config::default())
    }
}

#[derive(Error, Debug)]
#[error("event receiver dropped")]
pub struct Disconnected;

/// Sequences one request: sources, optional enrichment, context, streamed
/// answer, follow-ups, finished. Every stage pushes its events as soon as
/// they exist.
pub struct SearchPipeline {
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn PageFetcher>,
    llm: Option<Arc<dyn LlmClient>>,
    options: PipelineOptions,
}

impl SearchPipeline {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn PageFetcher>,
        llm: Option<Arc<dyn LlmClient>>,
        options: PipelineOptions,
    ) -> SearchPipeline {
        SearchPipeline {
            search,
            fetcher,
            llm,
            options,
        }
    }

    /// Runs the request on its own task and hands back the event stream.
    pub fn stream(self: &Arc<Self>, request: SearchRequest) -> ReceiverStream<StreamEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.run(request, tx).await });
        ReceiverStream::new(rx)
    }

    /// Drives the request to completion. Anything that blows up along the way
    /// ends the stream with a single `error` event.
    pub async fn run(&self, request: SearchRequest, tx: mpsc::Sender<StreamEvent>) {
        let outcome = AssertUnwindSafe(self.execute(&request, &tx))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(Disconnected)) => {
                log::debug!("client went away during {:?}", request.query);
            }
            Err(panic) => {
                log::error!(
                    "search pipeline failed for {:?}: {}",
                    request.query,
                    panic_message(panic.as_ref())
                );
                let _ = tx
                    .send(StreamEvent::Error {
                        data: ERROR_MESSAGE.to_string(),
                    })
                    .await;
            }
        }
    }

    async fn execute(
        &self,
        request: &SearchRequest,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> Result<(), Disconnected> {
        let mut sources = get_sources(
            self.search.as_ref(),
            &request.query,
            request.pro_mode,
            request.stored_location.as_deref(),
        )
        .await;
        emit(
            tx,
            StreamEvent::Sources {
                data: sources.clone(),
            },
        )
        .await?;

        if request.pro_mode {
            if let Some(organic) = sources.organic.as_mut() {
                let populated = populate_sources(
                    self.fetcher.as_ref(),
                    organic,
                    self.options.scrape_count,
                    self.options.scrape_max_chars,
                )
                .await;
                log::info!("scraped {populated} sources");
            }
        }

        let context = build_context(&sources);

        let mut answer = get_answer(
            self.llm.clone(),
            &request.query,
            &context,
            &request.date_context,
        );
        while let Some(text) = answer.next().await {
            emit(tx, StreamEvent::Llm { text }).await?;
        }

        let relevant = get_relevant_questions(
            self.llm.as_deref(),
            &context,
            &request.query,
            self.options.followup_context_chars,
        )
        .await;
        // the answer is already out, a bad follow-up payload must not turn into an error
        let data = serde_json::from_str::<Value>(&relevant).unwrap_or_else(|e| {
            log::error!("json decode error in relevant questions: {e}, raw: {relevant}");
            Value::Array(Vec::new())
        });
        emit(tx, StreamEvent::Relevant { data }).await?;

        emit(
            tx,
            StreamEvent::Finished {
                data: String::new(),
            },
        )
        .await
    }
}

async fn emit(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> Result<(), Disconnected> {
    tx.send(event).await.map_err(|_| Disconnected)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
