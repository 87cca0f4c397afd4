use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use futures::StreamExt;
use futures::stream;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use perplex::api::create_router;
use perplex::data_models::{OrganicResult, SearchBundle};
use perplex::error::{DegradedReason, StageResult};
use perplex::llm::{ChatRequest, LlmClient, TextStream};
use perplex::pipeline::{ERROR_MESSAGE, PipelineOptions, SearchPipeline};
use perplex::scrapper::PageFetcher;
use perplex::sources::{SearchProvider, SearchQuery};

mod test_helpers {
    use super::*;

    pub enum Search {
        Bundle(SearchBundle),
        Fail,
        Panic,
    }

    pub struct FakeSearch {
        pub behaviour: Search,
        pub queries: Mutex<Vec<SearchQuery>>,
    }

    #[async_trait]
    impl SearchProvider for FakeSearch {
        async fn search(&self, query: &SearchQuery) -> StageResult<SearchBundle> {
            self.queries.lock().unwrap().push(query.clone());
            match &self.behaviour {
                Search::Bundle(bundle) => Ok(bundle.clone()),
                Search::Fail => Err(DegradedReason::Status(500)),
                Search::Panic => panic!("search provider exploded"),
            }
        }
    }

    pub struct FakeFetcher;

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch_text(&self, url: &str) -> Result<String> {
            Ok(format!("{url} ").repeat(40))
        }
    }

    pub struct FakeLlm {
        pub fragments: Vec<&'static str>,
        pub follow_up: &'static str,
        pub prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmClient for FakeLlm {
        async fn stream_chat(&self, request: ChatRequest) -> Result<TextStream> {
            self.prompts
                .lock()
                .unwrap()
                .push(request.messages[1].content.clone());
            let items: Vec<Result<String>> =
                self.fragments.iter().map(|f| Ok(f.to_string())).collect();
            Ok(stream::iter(items).boxed())
        }

        async fn chat(&self, _request: ChatRequest) -> Result<String> {
            Ok(self.follow_up.to_string())
        }
    }

    pub fn weather_bundle() -> SearchBundle {
        SearchBundle {
            organic: Some(vec![OrganicResult {
                title: Some("Weather".into()),
                link: Some("https://weather.example".into()),
                snippet: Some("Sunny and 25C".into()),
                date: None,
                html: None,
            }]),
            top_stories: Some(vec![]),
            images: Some(vec![]),
            knowledge_graph: None,
            answer_box: None,
        }
    }

    pub fn fake_search(behaviour: Search) -> Arc<FakeSearch> {
        Arc::new(FakeSearch {
            behaviour,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn fake_llm() -> Arc<FakeLlm> {
        Arc::new(FakeLlm {
            fragments: vec!["It is ", "sunny."],
            follow_up: r#"Sure: {"followUp": ["Will it rain tomorrow?"]}"#,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn router(search: Arc<FakeSearch>, llm: Option<Arc<FakeLlm>>) -> Router {
        let llm = llm.map(|l| l as Arc<dyn LlmClient>);
        let pipeline = SearchPipeline::new(
            search,
            Arc::new(FakeFetcher),
            llm,
            PipelineOptions::default(),
        );
        create_router(Arc::new(pipeline))
    }

    pub async fn get(app: Router, uri: &str) -> Result<(StatusCode, Option<String>, String)> {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty())?)
            .await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, content_type, String::from_utf8(body.to_vec())?))
    }

    /// One parsed SSE frame: the optional `event:` name and its data.
    #[derive(Debug)]
    pub struct Frame {
        pub event: Option<String>,
        pub data: Value,
    }

    pub fn parse_frames(body: &str) -> Vec<Frame> {
        body.split("\n\n")
            .filter_map(|block| {
                let mut event = None;
                let mut data = None;
                for line in block.lines() {
                    if let Some(name) = line.strip_prefix("event:") {
                        event = Some(name.trim().to_string());
                    } else if let Some(payload) = line.strip_prefix("data:") {
                        data = Some(serde_json::from_str(payload.trim()).expect("json data"));
                    }
                }
                data.map(|data| Frame { event, data })
            })
            .collect()
    }

    pub fn kinds(frames: &[Frame]) -> Vec<String> {
        frames
            .iter()
            .map(|f| match &f.event {
                Some(name) => name.clone(),
                None => f.data["type"].as_str().unwrap_or("?").to_string(),
            })
            .collect()
    }
}

use test_helpers::*;

#[tokio::test]
async fn test_health_endpoints() -> Result<()> {
    let app = router(fake_search(Search::Fail), None);

    let (status, _, body) = get(app.clone(), "/").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_str::<Value>(&body)?,
        json!({"message": "hello world perplexity alternative v1"})
    );

    let (status, _, body) = get(app, "/up_test").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body)?, json!({"status": "ok"}));
    Ok(())
}

#[tokio::test]
async fn test_empty_query_is_rejected() -> Result<()> {
    for uri in ["/search?query=", "/search?query=%20%20", "/search", "/search?date_context=today"] {
        let search = fake_search(Search::Fail);
        let app = router(search.clone(), None);

        let (status, content_type, body) = get(app, uri).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_ne!(content_type.as_deref(), Some("text/event-stream"));
        assert_eq!(
            serde_json::from_str::<Value>(&body)?,
            json!({"detail": "Query cannot be empty"})
        );
        assert!(search.queries.lock().unwrap().is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn test_weather_today_streams_in_order() -> Result<()> {
    let search = fake_search(Search::Bundle(weather_bundle()));
    let llm = fake_llm();
    let app = router(search.clone(), Some(llm.clone()));

    let (status, content_type, body) = get(
        app,
        "/search?query=weather%20today&date_context=Monday&stored_location=us&pro_mode=false",
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap_or_default().starts_with("text/event-stream"));

    let frames = parse_frames(&body);
    assert_eq!(
        kinds(&frames),
        vec!["sources", "llm", "llm", "relevant", "finished", "end-of-stream"]
    );
    assert_eq!(frames[0].data["data"]["organic"][0]["snippet"], "Sunny and 25C");
    assert_eq!(frames[1].data, json!({"type": "llm", "text": "It is "}));
    assert_eq!(frames[2].data["text"], "sunny.");
    assert_eq!(
        frames[3].data,
        json!({"type": "relevant", "data": {"followUp": ["Will it rain tomorrow?"]}})
    );
    assert_eq!(frames[4].data, json!({"type": "finished", "data": ""}));
    assert_eq!(frames[5].data, Value::Null);

    // the context handed to the model is built from the snippet
    let prompts = llm.prompts.lock().unwrap();
    assert!(prompts[0].starts_with("User Question: weather today"));
    assert!(prompts[0].contains("Sunny and 25C"));

    let queries = search.queries.lock().unwrap();
    assert_eq!(queries[0].num, 20);
    assert_eq!(queries[0].gl, "us");
    Ok(())
}

#[tokio::test]
async fn test_unavailable_llm_falls_back() -> Result<()> {
    let app = router(fake_search(Search::Bundle(weather_bundle())), None);

    let (status, _, body) = get(app, "/search?query=weather%20today").await?;
    assert_eq!(status, StatusCode::OK);

    let frames = parse_frames(&body);
    assert_eq!(
        kinds(&frames),
        vec!["sources", "llm", "relevant", "finished", "end-of-stream"]
    );
    let answer = frames[1].data["text"].as_str().unwrap_or_default();
    assert!(answer.contains("weather today"));
    assert!(answer.contains("Sunny and 25C"));

    let questions = frames[2].data["data"]["followUp"].as_array().cloned().unwrap_or_default();
    assert_eq!(questions.len(), 3);
    assert!(
        questions
            .iter()
            .all(|q| q.as_str().unwrap_or_default().contains("weather today"))
    );
    Ok(())
}

#[tokio::test]
async fn test_search_failure_still_answers() -> Result<()> {
    let app = router(fake_search(Search::Fail), Some(fake_llm()));

    let (_, _, body) = get(app, "/search?query=rust").await?;
    let frames = parse_frames(&body);

    assert_eq!(frames[0].data, json!({"type": "sources", "data": {}}));
    assert!(!kinds(&frames).contains(&"error".to_string()));
    assert_eq!(kinds(&frames).last().map(String::as_str), Some("end-of-stream"));
    Ok(())
}

#[tokio::test]
async fn test_internal_failure_ends_with_single_error() -> Result<()> {
    let app = router(fake_search(Search::Panic), Some(fake_llm()));

    let (status, _, body) = get(app, "/search?query=rust").await?;
    assert_eq!(status, StatusCode::OK);

    let frames = parse_frames(&body);
    assert_eq!(kinds(&frames), vec!["error"]);
    assert_eq!(frames[0].data, json!({"type": "error", "data": ERROR_MESSAGE}));
    Ok(())
}

#[tokio::test]
async fn test_pro_mode_scrapes_top_results() -> Result<()> {
    let mut bundle = weather_bundle();
    bundle.organic = Some(
        (0..4)
            .map(|i| OrganicResult {
                link: Some(format!("https://site{i}.example")),
                snippet: Some(format!("snippet {i}")),
                ..Default::default()
            })
            .collect(),
    );
    let search = fake_search(Search::Bundle(bundle));
    let llm = fake_llm();
    let app = router(search.clone(), Some(llm.clone()));

    let (_, _, body) = get(app, "/search?query=rust&pro_mode=true&stored_location=DE").await?;
    let frames = parse_frames(&body);

    // sources go out before enrichment, so the client never sees scraped text
    assert!(frames[0].data["data"]["organic"][0].get("html").is_none());

    let prompts = llm.prompts.lock().unwrap();
    assert!(prompts[0].contains("https://site0.example"));
    assert!(prompts[0].contains("https://site1.example"));
    assert!(!prompts[0].contains("https://site2.example https://site2.example"));

    let queries = search.queries.lock().unwrap();
    assert_eq!(queries[0].num, 10);
    assert_eq!(queries[0].gl, "de");
    Ok(())
}
