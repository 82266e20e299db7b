//! Export the filtered document set.
//!
//! | Format | Output |
//! |--------|--------|
//! | `json` | pretty array of filename, title, summary, tags, collection, keywords |
//! | `csv` | header plus one quoted row per document |
//! | `notion` | flat Markdown sections for Notion's Markdown import |
//! | `obsidian` | Markdown with `[[collection]]` and `[[related]]` backlinks |
//! | `toc` | Markdown table of contents grouped by collection |
//!
//! Output goes to a file (parent directories created) or stdout.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

use crate::analyze::DEFAULT_COLLECTION;
use crate::index::Index;
use crate::models::Document;
use crate::similarity::SimilarityTable;
use crate::view::ellipsize;

const RELATED_LINKS: usize = 3;
const TOC_EXCERPT_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Notion,
    Obsidian,
    Toc,
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "json" => ExportFormat::Json,
            "csv" => ExportFormat::Csv,
            "notion" => ExportFormat::Notion,
            "obsidian" => ExportFormat::Obsidian,
            "toc" | "markdown" => ExportFormat::Toc,
            other => bail!(
                "Unknown export format: '{}'. Use json, csv, notion, obsidian or toc.",
                other
            ),
        })
    }
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    filename: &'a str,
    title: &'a str,
    summary: &'a str,
    tags: &'a [String],
    collection: Option<&'a str>,
    keywords: &'a [String],
}

/// Corpus-wide context some formats need beyond the selected documents.
pub struct ExportContext<'a> {
    pub corpus: &'a [Document],
    pub index: &'a Index,
    pub similarity: &'a SimilarityTable,
}

pub fn render(format: ExportFormat, docs: &[&Document], ctx: &ExportContext<'_>) -> Result<String> {
    match format {
        ExportFormat::Json => to_json(docs),
        ExportFormat::Csv => Ok(to_csv(docs)),
        ExportFormat::Notion => Ok(to_notion(docs)),
        ExportFormat::Obsidian => Ok(to_obsidian(docs, ctx)),
        ExportFormat::Toc => Ok(to_toc(docs, ctx)),
    }
}

pub fn to_json(docs: &[&Document]) -> Result<String> {
    let records: Vec<ExportDocument<'_>> = docs
        .iter()
        .map(|d| ExportDocument {
            filename: &d.filename,
            title: &d.title,
            summary: &d.summary,
            tags: &d.tags,
            collection: d.collection_label(),
            keywords: &d.keywords,
        })
        .collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

/// One record per line: line breaks inside a value become spaces.
fn csv_field(value: &str) -> String {
    let flat = value.replace("\r\n", " ").replace(['\r', '\n'], " ");
    format!("\"{}\"", flat.replace('"', "\"\""))
}

/// Every field is quoted and inner quotes doubled; lines joined with `\n`.
pub fn to_csv(docs: &[&Document]) -> String {
    let mut lines = vec!["filename,title,summary,tags,collection,keywords".to_string()];
    for d in docs {
        let row = [
            csv_field(&d.filename),
            csv_field(&d.title),
            csv_field(&d.summary),
            csv_field(&d.tags.join(", ")),
            csv_field(d.collection_label().unwrap_or("")),
            csv_field(&d.keywords.join(", ")),
        ];
        lines.push(row.join(","));
    }
    lines.join("\n")
}

fn hashtags(tags: &[String]) -> String {
    tags.iter()
        .map(|t| format!("#{}", t))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn to_notion(docs: &[&Document]) -> String {
    let mut out = String::from("# DocScan documents\n");
    for d in docs {
        let _ = write!(
            out,
            "\n## {}\n\n- **File**: {}\n- **Collection**: {}\n- **Tags**: {}\n\n{}\n\n---\n",
            d.title,
            d.filename,
            d.collection_label().unwrap_or(DEFAULT_COLLECTION),
            hashtags(&d.tags),
            d.summary
        );
    }
    out
}

pub fn to_obsidian(docs: &[&Document], ctx: &ExportContext<'_>) -> String {
    docs.iter()
        .map(|d| {
            let mut note = format!(
                "# {}\n\n**File**: {}\n**Collection**: [[{}]]\n**Tags**: {}\n\n## Summary\n{}\n\n## Related\n",
                d.title,
                d.filename,
                d.collection_label().unwrap_or(DEFAULT_COLLECTION),
                hashtags(&d.tags),
                d.summary
            );
            for nb in ctx.similarity.neighbors(&d.id).iter().take(RELATED_LINKS) {
                let related = ctx
                    .similarity
                    .id_at(nb.index)
                    .and_then(|id| ctx.corpus.iter().find(|c| c.id == id));
                if let Some(other) = related {
                    let _ = writeln!(note, "- [[{}]] ({}% similar)", other.title, nb.score);
                }
            }
            note
        })
        .collect::<Vec<_>>()
        .join("\n---\n\n")
}

/// Grouped by collection in index order, limited to the selected documents.
pub fn to_toc(docs: &[&Document], ctx: &ExportContext<'_>) -> String {
    let mut out = String::from("# Table of contents\n");
    for (collection, ids) in ctx.index.collections() {
        let members: Vec<&Document> = ids
            .iter()
            .filter_map(|id| docs.iter().find(|d| &d.id == id).copied())
            .collect();
        if members.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n## {}\n", collection);
        for d in members {
            let _ = writeln!(
                out,
                "- **{}** - {}",
                d.title,
                ellipsize(&d.summary, TOC_EXCERPT_CHARS)
            );
        }
    }
    out
}

/// Write to `output` when given, creating parent directories; stdout otherwise.
pub fn write_output(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, title: &str, summary: &str, tags: &[&str], collection: Option<&str>) -> Document {
        let mut d = Document::placeholder(&format!("{}.html", id));
        d.id = id.to_string();
        d.title = title.to_string();
        d.summary = summary.to_string();
        d.tags = tags.iter().map(|s| s.to_string()).collect();
        d.collection = collection.map(str::to_string);
        d.analyzing = false;
        d
    }

    fn corpus() -> Vec<Document> {
        vec![
            doc("a", "Acme deck", "Seed round for Acme", &["IR", "finance"], Some("IR materials")),
            doc("b", "Say \"hi\"", "Quoted \"summary\"", &["IR", "finance"], Some("IR materials")),
            doc("c", "Course notes", "Lecture one", &["education"], None),
        ]
    }

    #[test]
    fn csv_has_header_and_one_line_per_document() {
        let docs = corpus();
        let refs: Vec<&Document> = docs.iter().collect();
        let csv = to_csv(&refs);
        let lines: Vec<&str> = csv.split('\n').collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "filename,title,summary,tags,collection,keywords");
        assert_eq!(
            lines[2],
            r#""b.html","Say ""hi""","Quoted ""summary""","IR, finance","IR materials","""#
        );
        assert!(lines[3].ends_with(r#""education","","""#));
    }

    #[test]
    fn csv_keeps_multi_line_summaries_on_one_line() {
        let mut docs = corpus();
        for d in &mut docs {
            d.summary = "First line.\nSecond line.\r\nThird.".to_string();
        }
        let refs: Vec<&Document> = docs.iter().collect();
        let csv = to_csv(&refs);
        assert_eq!(csv.lines().count(), 4);
        assert!(csv.contains("\"First line. Second line. Third.\""));
    }

    #[test]
    fn json_keeps_selected_fields() {
        let docs = corpus();
        let refs: Vec<&Document> = docs.iter().take(1).collect();
        let value: serde_json::Value = serde_json::from_str(&to_json(&refs).unwrap()).unwrap();
        let record = &value[0];
        assert_eq!(record["filename"], "a.html");
        assert_eq!(record["collection"], "IR materials");
        assert!(record.get("id").is_none());
        assert!(record.get("rawContent").is_none());
    }

    #[test]
    fn obsidian_links_collection_and_related_titles() {
        let docs = corpus();
        let index = Index::build(&docs);
        let similarity = SimilarityTable::compute(&docs, 30, 5);
        let ctx = ExportContext {
            corpus: &docs,
            index: &index,
            similarity: &similarity,
        };
        let refs: Vec<&Document> = docs.iter().take(1).collect();
        let md = to_obsidian(&refs, &ctx);
        assert!(md.contains("**Collection**: [[IR materials]]"));
        assert!(md.contains("- [[Say \"hi\"]] (65% similar)"));
    }

    #[test]
    fn toc_groups_by_collection_in_index_order() {
        let docs = corpus();
        let index = Index::build(&docs);
        let similarity = SimilarityTable::default();
        let ctx = ExportContext {
            corpus: &docs,
            index: &index,
            similarity: &similarity,
        };
        let refs: Vec<&Document> = docs.iter().collect();
        let toc = to_toc(&refs, &ctx);
        let ir = toc.find("## IR materials").unwrap();
        let general = toc.find("## general").unwrap();
        assert!(ir < general);
        assert!(toc.contains("- **Course notes** - Lecture one"));

        let only_c: Vec<&Document> = docs.iter().filter(|d| d.id == "c").collect();
        let toc = to_toc(&only_c, &ctx);
        assert!(!toc.contains("IR materials"));
    }

    #[test]
    fn notion_uses_general_for_unset_collection() {
        let docs = corpus();
        let refs: Vec<&Document> = docs.iter().skip(2).collect();
        let md = to_notion(&refs);
        assert!(md.starts_with("# DocScan documents"));
        assert!(md.contains("- **Collection**: general"));
        assert!(md.contains("- **Tags**: #education"));
    }

    #[test]
    fn write_output_creates_parent_dirs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("out/nested/export.csv");
        write_output("a,b", Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "a,b");
    }

    #[test]
    fn parses_format_names() {
        assert_eq!("toc".parse::<ExportFormat>().unwrap(), ExportFormat::Toc);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }
}
