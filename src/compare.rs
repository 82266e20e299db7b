//! Side-by-side comparison of structured fields across documents.

use anyhow::{bail, Result};
use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::models::{Detail, Document, FieldValue};
use crate::view::ellipsize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Scalar,
    List,
    Object,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

const fn field(key: &'static str, label: &'static str, kind: FieldKind) -> FieldDescriptor {
    FieldDescriptor { key, label, kind }
}

pub static FIELDS: [FieldDescriptor; 16] = [
    field("companyName", "Company", FieldKind::Scalar),
    field("oneLiner", "One-liner", FieldKind::Scalar),
    field("problem", "Problem", FieldKind::Scalar),
    field("solution", "Solution", FieldKind::Scalar),
    field("products", "Products", FieldKind::List),
    field("targetMarket", "Target market", FieldKind::Scalar),
    field("marketSize", "Market size", FieldKind::Object),
    field("businessModel", "Business model", FieldKind::Scalar),
    field("competitors", "Competitors", FieldKind::List),
    field("differentiators", "Differentiators", FieldKind::List),
    field("team", "Team", FieldKind::List),
    field("financials", "Financials", FieldKind::Object),
    field("fundingAsk", "Funding ask", FieldKind::Scalar),
    field("fundingUse", "Use of funds", FieldKind::List),
    field("milestones", "Milestones", FieldKind::List),
    field("traction", "Traction", FieldKind::List),
];

const SHORT_TEXT_CHARS: usize = 30;
const SHORT_TITLE_CHARS: usize = 15;

/// Canonical string used for equality: missing is `""`, lists are sorted and
/// joined with `,`, maps are JSON with sorted keys.
pub fn normalize(value: FieldValue<'_>) -> String {
    match value {
        FieldValue::Missing => String::new(),
        FieldValue::Text(text) => text.to_string(),
        FieldValue::List(items) => {
            let mut sorted: Vec<&str> = items.iter().map(String::as_str).collect();
            sorted.sort_unstable();
            sorted.join(",")
        }
        FieldValue::Detail(Detail::Text(text)) => text.clone(),
        FieldValue::Detail(Detail::Map(map)) => serde_json::to_string(map).unwrap_or_default(),
    }
}

/// Full display value, `-` when missing.
pub fn display(value: FieldValue<'_>) -> String {
    match value {
        FieldValue::Missing => "-".to_string(),
        FieldValue::Text(text) => text.to_string(),
        FieldValue::List(items) => items.join(", "),
        FieldValue::Detail(Detail::Text(text)) => text.clone(),
        FieldValue::Detail(Detail::Map(map)) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join("; "),
    }
}

/// Abbreviated value for the difference summary.
pub fn short(value: FieldValue<'_>) -> String {
    match value {
        FieldValue::Missing => "none".to_string(),
        FieldValue::Text(text) => ellipsize(text, SHORT_TEXT_CHARS),
        FieldValue::Detail(Detail::Text(text)) => ellipsize(text, SHORT_TEXT_CHARS),
        FieldValue::List(items) => {
            let head = items.iter().take(2).cloned().collect::<Vec<_>>().join(", ");
            if items.len() > 2 {
                format!("{}...", head)
            } else {
                head
            }
        }
        FieldValue::Detail(Detail::Map(map)) => map
            .iter()
            .take(2)
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn value_of<'a>(doc: &'a Document, key: &str) -> FieldValue<'a> {
    doc.fields
        .as_ref()
        .map_or(FieldValue::Missing, |f| f.value(key))
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldComparison<'a> {
    pub descriptor: &'static FieldDescriptor,
    /// One value per compared document, in selection order.
    pub values: Vec<FieldValue<'a>>,
    pub different: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison<'a> {
    pub documents: Vec<&'a Document>,
    pub fields: Vec<FieldComparison<'a>>,
    pub common_tags: Vec<String>,
    pub common_keywords: Vec<String>,
    /// Per document, tags no other selected document carries in full.
    pub unique_tags: Vec<Vec<String>>,
    pub unique_keywords: Vec<Vec<String>>,
    /// Documents without structured data; they need re-analysis.
    pub missing_fields: Vec<String>,
}

impl<'a> Comparison<'a> {
    pub fn differences(&self) -> impl Iterator<Item = &FieldComparison<'a>> + '_ {
        self.fields.iter().filter(|f| f.different)
    }
}

/// Compare two or more documents. Documents without structured data are
/// listed in `missing_fields` and left out of the difference check.
pub fn compare<'a>(documents: &[&'a Document]) -> Result<Comparison<'a>> {
    if documents.len() < 2 {
        bail!("Select at least two documents to compare");
    }

    let fields = FIELDS
        .iter()
        .map(|descriptor| {
            let values: Vec<FieldValue<'a>> =
                documents.iter().map(|d| value_of(*d, descriptor.key)).collect();
            let normalized: Vec<String> = documents
                .iter()
                .zip(&values)
                .filter(|(d, _)| !d.missing_fields())
                .map(|(_, v)| normalize(*v))
                .collect();
            let different = normalized.windows(2).any(|w| w[0] != w[1]);
            FieldComparison {
                descriptor,
                values,
                different,
            }
        })
        .collect();

    let (common_tags, unique_tags) = split_common(documents, |d| &d.tags);
    let (common_keywords, unique_keywords) = split_common(documents, |d| &d.keywords);

    let missing_fields = documents
        .iter()
        .filter(|d| d.missing_fields())
        .map(|d| d.id.clone())
        .collect();

    Ok(Comparison {
        documents: documents.to_vec(),
        fields,
        common_tags,
        common_keywords,
        unique_tags,
        unique_keywords,
        missing_fields,
    })
}

fn split_common<'a, F>(documents: &[&'a Document], get: F) -> (Vec<String>, Vec<Vec<String>>)
where
    F: Fn(&'a Document) -> &'a Vec<String>,
{
    let sets: Vec<BTreeSet<&str>> = documents
        .iter()
        .map(|d| get(*d).iter().map(String::as_str).collect())
        .collect();

    let common: BTreeSet<&str> = match sets.split_first() {
        Some((first, rest)) => first
            .iter()
            .filter(|item| rest.iter().all(|s| s.contains(*item)))
            .copied()
            .collect(),
        None => BTreeSet::new(),
    };

    let common_ordered: Vec<String> = documents
        .first()
        .map(|d| {
            get(*d)
                .iter()
                .filter(|t| common.contains(t.as_str()))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let unique = documents
        .iter()
        .map(|d| {
            get(*d)
                .iter()
                .filter(|t| !common.contains(t.as_str()))
                .cloned()
                .collect()
        })
        .collect();

    (common_ordered, unique)
}

fn list_or_none(items: &[String], prefix: &str) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items
            .iter()
            .map(|i| format!("{}{}", prefix, i))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Text report: documents, field table, differences, tags and keywords,
/// re-analysis notice, summaries.
pub fn render_report(cmp: &Comparison<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Comparing {} documents", cmp.documents.len());
    for (i, doc) in cmp.documents.iter().enumerate() {
        let _ = writeln!(
            out,
            "  [{}] {}  ({}, {})",
            i + 1,
            doc.title,
            doc.filename,
            doc.collection_label().unwrap_or("general")
        );
    }
    out.push('\n');

    let _ = writeln!(out, "Structured fields (* = differs)");
    for fc in &cmp.fields {
        let _ = writeln!(
            out,
            "{} {}",
            if fc.different { "*" } else { " " },
            fc.descriptor.label
        );
        for (i, value) in fc.values.iter().enumerate() {
            let _ = writeln!(out, "    [{}] {}", i + 1, display(*value));
        }
    }
    out.push('\n');

    let diffs: Vec<&FieldComparison<'_>> = cmp.differences().collect();
    let _ = writeln!(out, "Differences ({})", diffs.len());
    if diffs.is_empty() {
        let _ = writeln!(
            out,
            "  No differing fields. The documents are alike or lack structured data."
        );
    }
    for fc in diffs {
        let parts: Vec<String> = cmp
            .documents
            .iter()
            .zip(&fc.values)
            .map(|(d, v)| {
                format!(
                    "{}=\"{}\"",
                    d.title.chars().take(SHORT_TITLE_CHARS).collect::<String>(),
                    short(*v)
                )
            })
            .collect();
        let _ = writeln!(out, "  - {}: {}", fc.descriptor.label, parts.join(" vs "));
    }
    out.push('\n');

    let _ = writeln!(out, "Tags & keywords");
    let _ = writeln!(out, "  common tags:     {}", list_or_none(&cmp.common_tags, "#"));
    let _ = writeln!(out, "  common keywords: {}", list_or_none(&cmp.common_keywords, ""));
    for (i, _) in cmp.documents.iter().enumerate() {
        let _ = writeln!(
            out,
            "  [{}] tags: {} | keywords: {}",
            i + 1,
            list_or_none(&cmp.unique_tags[i], "#"),
            list_or_none(&cmp.unique_keywords[i], "")
        );
    }

    if !cmp.missing_fields.is_empty() {
        out.push('\n');
        let _ = writeln!(out, "No structured data ({} documents):", cmp.missing_fields.len());
        for doc in cmp.documents.iter().filter(|d| d.missing_fields()) {
            let _ = writeln!(out, "  {}  {}", doc.id, doc.title);
        }
        let _ = writeln!(
            out,
            "  Re-run with --reanalyze-missing or use `docscan reanalyze <ID>...`."
        );
    }

    out.push('\n');
    let _ = writeln!(out, "Summaries");
    for (i, doc) in cmp.documents.iter().enumerate() {
        let _ = writeln!(out, "  [{}] {}", i + 1, doc.summary);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StructuredFields;
    use std::collections::BTreeMap;

    fn doc(id: &str, fields: Option<StructuredFields>) -> Document {
        let mut d = Document::placeholder(&format!("{}.html", id));
        d.id = id.to_string();
        d.title = format!("Deck {}", id);
        d.fields = fields;
        d
    }

    fn fields(company: &str, competitors: &[&str]) -> StructuredFields {
        StructuredFields {
            company_name: Some(company.to_string()),
            competitors: competitors.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn row<'a>(cmp: &'a Comparison<'_>, key: &str) -> &'a FieldComparison<'a> {
        cmp.fields.iter().find(|f| f.descriptor.key == key).unwrap()
    }

    #[test]
    fn requires_two_documents() {
        let a = doc("a", None);
        assert!(compare(&[&a]).is_err());
        assert!(compare(&[]).is_err());
    }

    #[test]
    fn detects_scalar_differences() {
        let a = doc("a", Some(fields("Acme", &[])));
        let b = doc("b", Some(fields("Globex", &[])));
        let cmp = compare(&[&a, &b]).unwrap();
        assert!(row(&cmp, "companyName").different);
        assert!(!row(&cmp, "problem").different);
        assert_eq!(cmp.differences().count(), 1);
    }

    #[test]
    fn list_order_does_not_matter() {
        let a = doc("a", Some(fields("Acme", &["X", "Y"])));
        let b = doc("b", Some(fields("Acme", &["Y", "X"])));
        let cmp = compare(&[&a, &b]).unwrap();
        assert!(!row(&cmp, "competitors").different);
        assert_eq!(cmp.differences().count(), 0);
    }

    #[test]
    fn objects_compare_by_content() {
        let mut one = BTreeMap::new();
        one.insert("TAM".to_string(), "10B".to_string());
        one.insert("SAM".to_string(), "1B".to_string());
        let mut two = one.clone();
        let a = doc(
            "a",
            Some(StructuredFields {
                market_size: Some(Detail::Map(one)),
                ..Default::default()
            }),
        );
        let b = doc(
            "b",
            Some(StructuredFields {
                market_size: Some(Detail::Map(two.clone())),
                ..Default::default()
            }),
        );
        assert!(!row(&compare(&[&a, &b]).unwrap(), "marketSize").different);

        two.insert("SOM".to_string(), "100M".to_string());
        let c = doc(
            "c",
            Some(StructuredFields {
                market_size: Some(Detail::Map(two)),
                ..Default::default()
            }),
        );
        assert!(row(&compare(&[&a, &c]).unwrap(), "marketSize").different);
    }

    #[test]
    fn missing_documents_are_flagged_not_compared() {
        let a = doc("a", Some(fields("Acme", &[])));
        let b = doc("b", None);
        let cmp = compare(&[&a, &b]).unwrap();
        assert_eq!(cmp.missing_fields, vec!["b"]);
        assert_eq!(cmp.differences().count(), 0);

        let report = render_report(&cmp);
        assert!(report.contains("No structured data (1 documents)"));
        assert!(report.contains("--reanalyze-missing"));
    }

    #[test]
    fn empty_record_is_not_missing() {
        let a = doc("a", Some(StructuredFields::default()));
        let b = doc("b", Some(fields("Acme", &[])));
        let cmp = compare(&[&a, &b]).unwrap();
        assert!(cmp.missing_fields.is_empty());
        assert!(row(&cmp, "companyName").different);
    }

    #[test]
    fn common_and_unique_tags() {
        let mut a = doc("a", None);
        a.tags = vec!["IR".into(), "finance".into(), "saas".into()];
        a.keywords = vec!["seed".into()];
        let mut b = doc("b", None);
        b.tags = vec!["finance".into(), "IR".into()];
        b.keywords = vec!["seed".into(), "b2b".into()];
        let cmp = compare(&[&a, &b]).unwrap();
        assert_eq!(cmp.common_tags, vec!["IR", "finance"]);
        assert_eq!(cmp.unique_tags, vec![vec!["saas".to_string()], vec![]]);
        assert_eq!(cmp.common_keywords, vec!["seed"]);
        assert_eq!(cmp.unique_keywords[1], vec!["b2b"]);
    }

    #[test]
    fn short_values() {
        let long = "x".repeat(40);
        assert_eq!(short(FieldValue::Text(&long)), format!("{}...", "x".repeat(30)));
        let items = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(short(FieldValue::List(&items)), "a, b...");
        assert_eq!(short(FieldValue::Missing), "none");
    }

    #[test]
    fn report_marks_differing_rows() {
        let a = doc("a", Some(fields("Acme", &[])));
        let b = doc("b", Some(fields("Globex", &[])));
        let report = render_report(&compare(&[&a, &b]).unwrap());
        assert!(report.contains("* Company"));
        assert!(report.contains("  Problem"));
        assert!(report.contains("Differences (1)"));
        assert!(report.contains(r#"Deck a="Acme" vs Deck b="Globex""#));
    }
}
