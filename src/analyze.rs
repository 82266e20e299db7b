//! Tag, keyword and structured-field extraction.
//!
//! The [`Analyzer`] sends one chat-completion request per document through a
//! [`CompletionClient`] and validates the JSON it gets back. Extraction never
//! fails: a transport error, a non-2xx status, a reply without a JSON object
//! or a reply with the wrong shape all degrade to a local keyword heuristic.
//!
//! # Reply handling
//!
//! - The first `{` through the last `}` of the reply is parsed as JSON.
//! - Each field is read with a safe default: wrong types are dropped, strings
//!   are trimmed, lists accept a bare string, numbers are stringified.
//! - A reply without a `fields` object leaves the structured data unset.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::config::AnalysisConfig;
use crate::models::{Analysis, Detail, ParsedDocument, StructuredFields};
use crate::parse::truncate_chars;

pub const DEFAULT_COLLECTION: &str = "general";
const FALLBACK_SUMMARY_CHARS: usize = 200;

const SYSTEM_PROMPT: &str =
    "You are a document analysis expert. Always answer with valid JSON only.";

/// Label → keywords used by the fallback tagger (title and headings only).
const TAG_RULES: &[(&str, &[&str])] = &[
    ("IR", &["ir", "investor", "투자", "재무"]),
    ("education", &["education", "교육", "학습", "교과서"]),
    ("technology", &["tech", "ai", "api", "기술", "개발"]),
    ("business", &["business", "비즈니스", "사업", "매출"]),
    ("marketing", &["marketing", "마케팅", "광고"]),
    ("design", &["design", "ui", "ux", "디자인"]),
    ("entertainment", &["anime", "아니메", "게임", "영화", "음악"]),
];

/// Ordered collection guesses over title and body; first match wins.
const COLLECTION_RULES: &[(&str, &[&str])] = &[
    ("IR materials", &["ir", "investor", "투자"]),
    ("education", &["교육", "학습"]),
    ("technical docs", &["api", "tech", "개발"]),
    ("marketing", &["marketing", "마케팅"]),
    ("entertainment", &["anime", "게임", "영화"]),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Chat-completion request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Transport(String),
    #[error("completion endpoint returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed completion response: {0}")]
    Malformed(String),
}

/// A chat-completion backend.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the content of the first choice.
    async fn complete(&self, request: &ChatRequest) -> Result<String, CompletionError>;
}

/// Posts requests to a chat-completion endpoint (normally the local proxy).
pub struct HttpCompletionClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCompletionClient {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, CompletionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(CompletionError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let json: Value =
            serde_json::from_str(&body).map_err(|e| CompletionError::Malformed(e.to_string()))?;
        json.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CompletionError::Malformed("missing choices[0].message.content".into()))
    }
}

/// Pull a readable message out of an error body: `error.message`, a string
/// `error`, or the raw text.
fn error_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    json.pointer("/error/message")
        .and_then(Value::as_str)
        .or_else(|| json.get("error").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

/// Runs extraction for one parsed document at a time.
pub struct Analyzer {
    client: Option<Box<dyn CompletionClient>>,
    model: String,
    temperature: f64,
    max_tokens: u32,
    max_prompt_chars: usize,
}

impl Analyzer {
    /// Build from config: an HTTP client when analysis is enabled, the
    /// heuristic only otherwise.
    pub fn from_config(config: &AnalysisConfig) -> anyhow::Result<Self> {
        if !config.enabled {
            return Ok(Self::offline(config));
        }
        let client = HttpCompletionClient::new(&config.endpoint, config.timeout_secs)?;
        Ok(Self::with_client(config, Box::new(client)))
    }

    pub fn with_client(config: &AnalysisConfig, client: Box<dyn CompletionClient>) -> Self {
        Self {
            client: Some(client),
            ..Self::offline(config)
        }
    }

    pub fn offline(config: &AnalysisConfig) -> Self {
        Self {
            client: None,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_prompt_chars: config.max_prompt_chars,
        }
    }

    pub async fn analyze(&self, parsed: &ParsedDocument) -> Analysis {
        let Some(client) = &self.client else {
            return fallback(parsed);
        };

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(build_prompt(parsed, self.max_prompt_chars)),
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        match client.complete(&request).await {
            Ok(content) => match parse_reply(&content) {
                Some(analysis) => analysis,
                None => {
                    tracing::warn!(title = %parsed.title, "no usable JSON in reply, using fallback");
                    fallback(parsed)
                }
            },
            Err(e) => {
                tracing::warn!(title = %parsed.title, error = %e, "extraction failed, using fallback");
                fallback(parsed)
            }
        }
    }
}

fn or_none(s: &str) -> &str {
    if s.is_empty() {
        "none"
    } else {
        s
    }
}

pub fn build_prompt(parsed: &ParsedDocument, max_chars: usize) -> String {
    let headings = parsed.headings.join(", ");
    format!(
        r#"Analyze the following HTML document.

Title: {title}
Meta description: {description}
Main headings: {headings}

Body:
{body}

Answer only with JSON of the following shape. Extract only information stated explicitly in the document; use null or an empty array when it is absent:
{{
  "title": "core title of the document",
  "summary": "2-3 sentence summary of the key content",
  "tags": ["tag1", "tag2", "tag3"],
  "collection": "one of IR materials / technical docs / marketing / education / general",
  "keywords": ["keyword1", "keyword2", "keyword3"],
  "fields": {{
    "companyName": "company name or null",
    "oneLiner": "one-line pitch or null",
    "problem": "problem addressed or null",
    "solution": "proposed solution or null",
    "products": ["product or service"],
    "targetMarket": "target market or customers or null",
    "marketSize": "market size (TAM/SAM/SOM) or null",
    "businessModel": "revenue model or null",
    "competitors": ["competitor"],
    "differentiators": ["differentiator"],
    "team": ["member / role"],
    "financials": "financial figures (revenue, growth) or null",
    "fundingAsk": "requested investment or null",
    "fundingUse": ["use of funds"],
    "milestones": ["milestone"],
    "traction": ["customer or result"]
  }}
}}

Always include the "fields" object; use null or [] for anything the document does not state."#,
        title = or_none(&parsed.title),
        description = or_none(&parsed.description),
        headings = or_none(&headings),
        body = truncate_chars(&parsed.text, max_chars),
    )
}

/// The first `{` through the last `}` of the reply, if any.
pub fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

/// Validate a model reply into an [`Analysis`]. `None` when the reply holds
/// no JSON object.
pub fn parse_reply(content: &str) -> Option<Analysis> {
    let json: Value = serde_json::from_str(extract_json_object(content)?).ok()?;
    let obj = json.as_object()?;

    let fields = obj
        .get("fields")
        .and_then(Value::as_object)
        .map(structured_fields);

    Some(Analysis {
        title: obj.get("title").and_then(text),
        summary: obj.get("summary").and_then(text),
        tags: obj.get("tags").map(text_list).unwrap_or_default(),
        collection: obj.get("collection").and_then(text),
        keywords: obj.get("keywords").map(text_list).unwrap_or_default(),
        fields,
        fallback: false,
    })
}

fn structured_fields(obj: &serde_json::Map<String, Value>) -> StructuredFields {
    let t = |key: &str| obj.get(key).and_then(text);
    let l = |key: &str| obj.get(key).map(text_list).unwrap_or_default();
    let d = |key: &str| obj.get(key).and_then(detail);

    StructuredFields {
        company_name: t("companyName"),
        one_liner: t("oneLiner"),
        problem: t("problem"),
        solution: t("solution"),
        products: l("products"),
        target_market: t("targetMarket"),
        market_size: d("marketSize"),
        business_model: t("businessModel"),
        competitors: l("competitors"),
        differentiators: l("differentiators"),
        team: l("team"),
        financials: d("financials"),
        funding_ask: t("fundingAsk"),
        funding_use: l("fundingUse"),
        milestones: l("milestones"),
        traction: l("traction"),
    }
}

fn text(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty() && s != "null").then_some(s)
}

fn text_list(value: &Value) -> Vec<String> {
    let items: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(text).collect(),
        other => text(other).into_iter().collect(),
    };
    dedup(items)
}

fn detail(value: &Value) -> Option<Detail> {
    match value {
        Value::Object(map) => {
            let entries: BTreeMap<String, String> = map
                .iter()
                .filter_map(|(k, v)| text(v).map(|v| (k.clone(), v)))
                .collect();
            (!entries.is_empty()).then_some(Detail::Map(entries))
        }
        other => text(other).map(Detail::Text),
    }
}

/// Drop repeated entries, keeping first occurrences in order.
pub(crate) fn dedup(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// Local heuristic used whenever the completion call cannot be used.
pub fn fallback(parsed: &ParsedDocument) -> Analysis {
    let summary = if parsed.description.trim().is_empty() {
        format!(
            "{}...",
            truncate_chars(&parsed.text, FALLBACK_SUMMARY_CHARS)
        )
    } else {
        parsed.description.trim().to_string()
    };

    Analysis {
        title: Some(parsed.title.clone()).filter(|t| !t.is_empty()),
        summary: Some(summary),
        tags: simple_tags(parsed),
        collection: Some(guess_collection(&parsed.title, &parsed.text)),
        keywords: Vec::new(),
        fields: None,
        fallback: true,
    }
}

pub fn simple_tags(parsed: &ParsedDocument) -> Vec<String> {
    let haystack = format!("{} {}", parsed.title, parsed.headings.join(" ")).to_lowercase();
    let tags: Vec<String> = TAG_RULES
        .iter()
        .filter(|(_, words)| words.iter().any(|w| mentions(&haystack, w)))
        .map(|(label, _)| label.to_string())
        .collect();

    if tags.is_empty() {
        vec![DEFAULT_COLLECTION.to_string()]
    } else {
        tags
    }
}

pub fn guess_collection(title: &str, content: &str) -> String {
    let haystack = format!("{} {}", title, content).to_lowercase();
    COLLECTION_RULES
        .iter()
        .find(|(_, words)| words.iter().any(|w| mentions(&haystack, w)))
        .map(|(label, _)| label.to_string())
        .unwrap_or_else(|| DEFAULT_COLLECTION.to_string())
}

/// Keyword containment. Short ASCII keywords ("ir", "ai", "api") must be a
/// whole token; longer ones and non-ASCII keywords match as substrings.
fn mentions(haystack: &str, keyword: &str) -> bool {
    if keyword.is_ascii() && keyword.len() <= 3 {
        haystack
            .split(|c: char| !c.is_alphanumeric())
            .any(|token| token == keyword)
    } else {
        haystack.contains(keyword)
    }
}
