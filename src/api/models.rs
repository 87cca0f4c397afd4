use serde::{Deserialize, Deserializer, Serialize};

use crate::pipeline::SearchRequest;

/// Query string of `GET /search`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub date_context: Option<String>,
    #[serde(default)]
    pub stored_location: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub pro_mode: bool,
}

impl SearchParams {
    /// `None` when there is nothing to search for.
    pub fn into_request(self) -> Option<SearchRequest> {
        if self.query.trim().is_empty() {
            return None;
        }
        let date_context = self
            .date_context
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(today);
        Some(SearchRequest {
            query: self.query,
            date_context,
            stored_location: self.stored_location,
            pro_mode: self.pro_mode,
        })
    }
}

fn today() -> String {
    chrono::Local::now().format("%A, %B %-d, %Y").to_string()
}

// accepts the spellings browsers and curl users actually send
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "invalid boolean value: {other}"
        ))),
    }
}

#[derive(Debug, Serialize)]
pub struct HelloResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}
