use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use perplex::api::create_router;
use perplex::config::CONFIG;
use perplex::llm::{GroqClient, LlmClient};
use perplex::pipeline::{PipelineOptions, SearchPipeline};
use perplex::scrapper::HttpPageFetcher;
use perplex::sources::SerperClient;

#[derive(Parser, Debug)]
#[command(about = "Streams web-grounded answers over server-sent events")]
struct Args {
    /// Address to listen on, overrides BIND_ADDR
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber (handles both tracing and log crate)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let args = Args::parse();
    let config = &*CONFIG;

    let search = SerperClient::new(&config.serper_api_url, config.serper_api_key.clone())?;
    let fetcher = HttpPageFetcher::new()?;
    let llm = GroqClient::from_config(config)?.map(|c| Arc::new(c) as Arc<dyn LlmClient>);

    let pipeline = Arc::new(SearchPipeline::new(
        Arc::new(search),
        Arc::new(fetcher),
        llm,
        PipelineOptions::from(config),
    ));
    let app = create_router(pipeline);

    let addr = args.bind.unwrap_or_else(|| config.bind_addr.clone());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
