//! Core data models.
//!
//! [`Document`] is the only persisted record; the index, collections and
//! similarity edges are all derived from the document array.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One ingested file plus its derived metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    /// Path relative to the ingest root.
    pub filename: String,
    #[serde(default)]
    pub raw_title: String,
    /// Cleaned body text, kept so the document can be re-analyzed.
    #[serde(default)]
    pub raw_content: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// `None` until an extraction call returned structured data.
    #[serde(default)]
    pub fields: Option<StructuredFields>,
    #[serde(default)]
    pub favorite: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub analyzing: bool,
    #[serde(default)]
    pub error: bool,
}

impl Document {
    /// Placeholder pushed as soon as a file is picked up, before analysis.
    pub fn placeholder(filename: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            filename: filename.to_string(),
            raw_title: String::new(),
            raw_content: String::new(),
            title: filename.to_string(),
            summary: "analyzing...".to_string(),
            tags: Vec::new(),
            collection: None,
            keywords: Vec::new(),
            fields: None,
            favorite: false,
            created_at: Utc::now(),
            analyzing: true,
            error: false,
        }
    }

    /// Collection label with empty strings treated as unset.
    pub fn collection_label(&self) -> Option<&str> {
        self.collection.as_deref().filter(|c| !c.is_empty())
    }

    /// True when no extraction call has produced structured data. A record
    /// whose fields all came back empty is not missing.
    pub fn missing_fields(&self) -> bool {
        self.fields.is_none()
    }
}

/// Free text or a small string map, used for market size and financials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Detail {
    Text(String),
    Map(BTreeMap<String, String>),
}

/// Business-document attributes extracted from the text. All optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructuredFields {
    pub company_name: Option<String>,
    pub one_liner: Option<String>,
    pub problem: Option<String>,
    pub solution: Option<String>,
    pub products: Vec<String>,
    pub target_market: Option<String>,
    pub market_size: Option<Detail>,
    pub business_model: Option<String>,
    pub competitors: Vec<String>,
    pub differentiators: Vec<String>,
    pub team: Vec<String>,
    pub financials: Option<Detail>,
    pub funding_ask: Option<String>,
    pub funding_use: Vec<String>,
    pub milestones: Vec<String>,
    pub traction: Vec<String>,
}

/// Borrowed view of one structured field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Missing,
    Text(&'a str),
    List(&'a [String]),
    Detail(&'a Detail),
}

impl StructuredFields {
    /// Look up a field by its camelCase key.
    pub fn value(&self, key: &str) -> FieldValue<'_> {
        fn text(v: &Option<String>) -> FieldValue<'_> {
            v.as_deref().map_or(FieldValue::Missing, FieldValue::Text)
        }
        fn list(v: &[String]) -> FieldValue<'_> {
            if v.is_empty() {
                FieldValue::Missing
            } else {
                FieldValue::List(v)
            }
        }
        fn detail(v: &Option<Detail>) -> FieldValue<'_> {
            v.as_ref().map_or(FieldValue::Missing, FieldValue::Detail)
        }

        match key {
            "companyName" => text(&self.company_name),
            "oneLiner" => text(&self.one_liner),
            "problem" => text(&self.problem),
            "solution" => text(&self.solution),
            "products" => list(&self.products),
            "targetMarket" => text(&self.target_market),
            "marketSize" => detail(&self.market_size),
            "businessModel" => text(&self.business_model),
            "competitors" => list(&self.competitors),
            "differentiators" => list(&self.differentiators),
            "team" => list(&self.team),
            "financials" => detail(&self.financials),
            "fundingAsk" => text(&self.funding_ask),
            "fundingUse" => list(&self.funding_use),
            "milestones" => list(&self.milestones),
            "traction" => list(&self.traction),
            _ => FieldValue::Missing,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Derived neighbor relation; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimilarityEdge<'a> {
    pub source_id: &'a str,
    pub target_id: &'a str,
    pub score: u8,
}

/// Output of the markup parser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    pub title: String,
    pub description: String,
    pub text: String,
    pub headings: Vec<String>,
}

/// Validated result of one extraction call (or of the local fallback).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analysis {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub collection: Option<String>,
    pub keywords: Vec<String>,
    pub fields: Option<StructuredFields>,
    /// Set when the local heuristic produced this result.
    pub fallback: bool,
}
