use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use perplex::data_models::OrganicResult;
use perplex::scrapper::{HttpPageFetcher, PageFetcher, populate_sources};

mod test_helpers {
    use super::*;

    pub fn result(link: Option<&str>) -> OrganicResult {
        OrganicResult {
            title: Some("title".to_string()),
            link: link.map(String::from),
            snippet: Some("snippet".to_string()),
            date: None,
            html: None,
        }
    }

    pub fn long_page(word: &str) -> String {
        format!(
            "<html><body><article>{}</article><script>var x = 1;</script></body></html>",
            format!("{word} ").repeat(100)
        )
    }

    pub async fn serve_page(server: &MockServer, route: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(server)
            .await;
    }

    /// Records every url it is asked for and returns a fixed page.
    pub struct RecordingFetcher {
        pub seen: Mutex<Vec<String>>,
        pub text: String,
    }

    #[async_trait]
    impl PageFetcher for RecordingFetcher {
        async fn fetch_text(&self, url: &str) -> Result<String> {
            self.seen.lock().unwrap().push(url.to_string());
            Ok(self.text.clone())
        }
    }
}

use test_helpers::*;

#[tokio::test]
async fn test_only_first_n_entries_are_enriched() -> Result<()> {
    let fetcher = RecordingFetcher {
        seen: Mutex::new(Vec::new()),
        text: "x".repeat(300),
    };
    let mut sources: Vec<OrganicResult> = (0..5)
        .map(|i| result(Some(&format!("https://site{i}.example"))))
        .collect();
    let untouched = sources.clone();

    let populated = populate_sources(&fetcher, &mut sources, 2, 4000).await;

    assert_eq!(populated, 2);
    assert_eq!(
        *fetcher.seen.lock().unwrap(),
        vec!["https://site0.example", "https://site1.example"]
    );
    assert_eq!(sources[0].html.as_deref(), Some("x".repeat(300).as_str()));
    assert_eq!(sources[1].html.as_deref(), Some("x".repeat(300).as_str()));
    assert_eq!(&sources[2..], &untouched[2..]);
    Ok(())
}

#[tokio::test]
async fn test_entry_without_link_is_skipped() -> Result<()> {
    let fetcher = RecordingFetcher {
        seen: Mutex::new(Vec::new()),
        text: "y".repeat(300),
    };
    let mut sources = vec![result(None), result(Some("https://ok.example"))];

    let populated = populate_sources(&fetcher, &mut sources, 2, 4000).await;

    assert_eq!(populated, 1);
    assert_eq!(sources[0], result(None));
    assert!(sources[1].html.is_some());
    assert_eq!(fetcher.seen.lock().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_n_larger_than_list_is_fine() -> Result<()> {
    let fetcher = RecordingFetcher {
        seen: Mutex::new(Vec::new()),
        text: "short".to_string(),
    };
    let mut sources = vec![result(Some("https://a.example"))];

    populate_sources(&fetcher, &mut sources, 10, 4000).await;

    // too short to be useful, but still marked as scraped
    assert_eq!(sources[0].html.as_deref(), Some(""));
    Ok(())
}

#[tokio::test]
async fn test_failed_fetch_does_not_abort_batch() -> Result<()> {
    let server = MockServer::start().await;
    serve_page(&server, "/broken", ResponseTemplate::new(500)).await;
    serve_page(
        &server,
        "/good",
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html")
            .set_body_string(long_page("rustacean")),
    )
    .await;

    let fetcher = HttpPageFetcher::new()?;
    let mut sources = vec![
        result(Some(&format!("{}/broken", server.uri()))),
        result(Some(&format!("{}/good", server.uri()))),
    ];

    let populated = populate_sources(&fetcher, &mut sources, 2, 4000).await;

    assert_eq!(populated, 1);
    assert!(sources[0].html.is_none());
    let html = sources[1].html.as_deref().unwrap_or_default();
    assert!(html.starts_with("rustacean rustacean"));
    assert!(!html.contains("var x"));
    Ok(())
}

#[tokio::test]
async fn test_scraped_text_is_capped() -> Result<()> {
    let server = MockServer::start().await;
    serve_page(
        &server,
        "/long",
        ResponseTemplate::new(200).set_body_string(long_page("abcdefghij")),
    )
    .await;

    let fetcher = HttpPageFetcher::new()?;
    let mut sources = vec![result(Some(&format!("{}/long", server.uri())))];

    populate_sources(&fetcher, &mut sources, 1, 150).await;

    assert_eq!(sources[0].html.as_ref().map(|h| h.chars().count()), Some(150));
    Ok(())
}

#[tokio::test]
async fn test_unreachable_host_is_isolated() -> Result<()> {
    let fetcher = HttpPageFetcher::new()?;
    let mut sources = vec![result(Some("http://127.0.0.1:9/nothing-here"))];

    let populated = populate_sources(&fetcher, &mut sources, 1, 4000).await;

    assert_eq!(populated, 0);
    assert!(sources[0].html.is_none());
    Ok(())
}
