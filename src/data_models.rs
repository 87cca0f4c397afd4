use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const MAX_IMAGES: usize = 6;

/// One web hit from the search provider. Only allow-listed fields survive
/// deserialization, everything else the provider sends is dropped.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct OrganicResult {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub link: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub snippet: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<String>,
    /// Scraped page text, set only by the content populator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

/// Top story and image entries share the same shape.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MediaResult {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,
    #[serde(
        rename = "imageUrl",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct KnowledgeGraph {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AnswerBox {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub answer: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub snippet: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Normalized search results for a single request.
///
/// The empty bundle (every field `None`) serializes to `{}` and means
/// "no sources".
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SearchBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organic: Option<Vec<OrganicResult>>,
    #[serde(rename = "topStories", default, skip_serializing_if = "Option::is_none")]
    pub top_stories: Option<Vec<MediaResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<MediaResult>>,
    #[serde(rename = "graph", default, skip_serializing_if = "Option::is_none")]
    pub knowledge_graph: Option<KnowledgeGraph>,
    #[serde(rename = "answerBox", default, skip_serializing_if = "Option::is_none")]
    pub answer_box: Option<AnswerBox>,
}

impl SearchBundle {
    pub fn is_empty(&self) -> bool {
        self == &SearchBundle::default()
    }
}

/// Raw provider response, before it is trimmed into a `SearchBundle`.
#[derive(Deserialize, Debug, Default)]
pub struct ProviderResponse {
    #[serde(default, deserialize_with = "lenient_items")]
    pub organic: Vec<OrganicResult>,
    #[serde(rename = "topStories", default, deserialize_with = "lenient_items")]
    pub top_stories: Vec<MediaResult>,
    #[serde(default, deserialize_with = "lenient_items")]
    pub images: Vec<MediaResult>,
    #[serde(rename = "knowledgeGraph", default, deserialize_with = "lenient_item")]
    pub knowledge_graph: Option<KnowledgeGraph>,
    #[serde(rename = "answerBox", default, deserialize_with = "lenient_item")]
    pub answer_box: Option<AnswerBox>,
}

// numbers and bools become their text, anything else is dropped
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Keeps every entry that parses, so one odd result does not cost the rest.
fn lenient_items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                log::warn!("dropping unreadable search result: {e}");
                None
            }
        })
        .collect())
}

fn lenient_item<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(serde_json::from_value(Value::deserialize(deserializer)?).ok())
}

impl From<ProviderResponse> for SearchBundle {
    fn from(res: ProviderResponse) -> Self {
        let mut organic = res.organic;
        // the provider never hands us scraped text
        for item in organic.iter_mut() {
            item.html = None;
        }
        let mut images = res.images;
        images.truncate(MAX_IMAGES);

        SearchBundle {
            organic: Some(organic),
            top_stories: Some(res.top_stories),
            images: Some(images),
            knowledge_graph: res.knowledge_graph,
            answer_box: res.answer_box,
        }
    }
}

/// `{"followUp": [...]}` as produced by the follow-up generator.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FollowUps {
    #[serde(rename = "followUp")]
    pub follow_up: Vec<String>,
}

/// Wire contract with the client: one JSON object per SSE `data:` frame.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Sources { data: SearchBundle },
    Llm { text: String },
    Relevant { data: Value },
    Finished { data: String },
    Error { data: String },
}

impl StreamEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Sources { .. } => "sources",
            StreamEvent::Llm { .. } => "llm",
            StreamEvent::Relevant { .. } => "relevant",
            StreamEvent::Finished { .. } => "finished",
            StreamEvent::Error { .. } => "error",
        }
    }
}
