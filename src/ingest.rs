//! Ingestion pipeline.
//!
//! Discovers HTML files, then for each file in order: push a placeholder and
//! persist, parse, analyze, fill the document and persist again. A file that
//! cannot be parsed becomes an error document and the batch continues. The
//! similarity table is recomputed once the batch is done.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::analyze::{guess_collection, Analyzer};
use crate::app::App;
use crate::config::IngestConfig;
use crate::models::{Analysis, Document, ParsedDocument};
use crate::parse::read_document;
use crate::progress::{IngestEvent, ProgressReporter};

const ERROR_LABEL: &str = "error";
const UNTITLED: &str = "Untitled";
const NO_SUMMARY: &str = "No summary available.";

/// A discovered input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the scanned root; stored as the document filename.
    pub relative: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub analyzed: u64,
    pub failed: u64,
    /// Analyzed documents that used the local heuristic.
    pub fallback: u64,
}

fn has_html_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
        .unwrap_or(false)
}

/// Expand files and directories into a sorted list of HTML files.
pub fn scan_paths(paths: &[PathBuf], config: &IngestConfig) -> Result<Vec<SourceFile>> {
    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();
    for root in paths {
        if root.is_file() {
            if has_html_extension(root) {
                let name = root
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                files.push(SourceFile {
                    path: root.clone(),
                    relative: name,
                });
            } else {
                tracing::debug!(path = %root.display(), "skipping non-HTML file");
            }
            continue;
        }
        if !root.exists() {
            bail!("Input path does not exist: {}", root.display());
        }

        let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
        for entry in walker {
            let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
                continue;
            }

            files.push(SourceFile {
                path: path.to_path_buf(),
                relative: rel_str,
            });
        }
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative).then_with(|| a.path.cmp(&b.path)));
    files.dedup_by(|a, b| a.path == b.path);

    if files.is_empty() {
        bail!("no HTML files found");
    }
    tracing::debug!(files = files.len(), "scan complete");
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

/// Fill a freshly parsed document from its analysis.
fn apply_analysis(doc: &mut Document, parsed: &ParsedDocument, analysis: Analysis) {
    doc.raw_title = parsed.title.clone();
    doc.raw_content = parsed.text.clone();
    doc.title = analysis
        .title
        .or_else(|| Some(parsed.title.clone()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| UNTITLED.to_string());
    doc.summary = analysis.summary.unwrap_or_else(|| NO_SUMMARY.to_string());
    doc.tags = analysis.tags;
    doc.collection = Some(
        analysis
            .collection
            .unwrap_or_else(|| guess_collection(&doc.title, &doc.raw_content)),
    );
    doc.keywords = analysis.keywords;
    doc.fields = analysis.fields;
    doc.analyzing = false;
    doc.error = false;
}

/// Merge a re-analysis: non-empty values replace, fields always replace.
fn merge_analysis(doc: &mut Document, analysis: Analysis) {
    if let Some(title) = analysis.title {
        doc.title = title;
    }
    if let Some(summary) = analysis.summary {
        doc.summary = summary;
    }
    if !analysis.tags.is_empty() {
        doc.tags = analysis.tags;
    }
    if analysis.collection.is_some() {
        doc.collection = analysis.collection;
    }
    if !analysis.keywords.is_empty() {
        doc.keywords = analysis.keywords;
    }
    doc.fields = analysis.fields;
    doc.analyzing = false;
}

fn mark_failed(doc: &mut Document, filename: &str, message: &str) {
    doc.title = Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| filename.to_string());
    doc.summary = format!("error: {}", message);
    doc.tags = vec![ERROR_LABEL.to_string()];
    doc.collection = Some(ERROR_LABEL.to_string());
    doc.keywords.clear();
    doc.fields = None;
    doc.analyzing = false;
    doc.error = true;
}

impl App {
    /// Ingest files sequentially. Each step is persisted so an interrupted
    /// batch keeps everything processed so far.
    pub async fn ingest(
        &mut self,
        files: &[SourceFile],
        analyzer: &Analyzer,
        reporter: &dyn ProgressReporter,
    ) -> Result<IngestReport> {
        let total = files.len() as u64;
        let max_body_chars = self.config.ingest.max_body_chars;
        let mut report = IngestReport::default();

        for (i, file) in files.iter().enumerate() {
            reporter.report(IngestEvent::Analyzing {
                n: i as u64 + 1,
                total,
                filename: file.relative.clone(),
            });

            self.documents.push(Document::placeholder(&file.relative));
            let pos = self.documents.len() - 1;
            self.persist().await?;

            match read_document(&file.path, max_body_chars) {
                Ok(parsed) => {
                    let analysis = analyzer.analyze(&parsed).await;
                    if analysis.fallback {
                        report.fallback += 1;
                    }
                    apply_analysis(&mut self.documents[pos], &parsed, analysis);
                    report.analyzed += 1;
                    tracing::debug!(filename = %file.relative, "document analyzed");
                }
                Err(e) => {
                    tracing::warn!(filename = %file.relative, error = %e, "failed to parse document");
                    mark_failed(&mut self.documents[pos], &file.relative, &e.to_string());
                    report.failed += 1;
                }
            }

            self.index.update(&self.documents[pos]);
            self.persist().await?;
        }

        self.recompute_similarity();
        reporter.report(IngestEvent::Done {
            analyzed: report.analyzed,
            failed: report.failed,
        });
        tracing::info!(
            analyzed = report.analyzed,
            failed = report.failed,
            fallback = report.fallback,
            "ingest complete"
        );
        Ok(report)
    }

    /// Re-run extraction on stored content. Fails before doing any work when
    /// a selected document has no stored content.
    pub async fn reanalyze(&mut self, ids: &[String], analyzer: &Analyzer) -> Result<usize> {
        let mut positions = Vec::new();
        for id in ids {
            let pos = self.position(id)?;
            if !positions.contains(&pos) {
                positions.push(pos);
            }
        }
        if positions.is_empty() {
            bail!("No documents to re-analyze");
        }

        let without_content: Vec<&str> = positions
            .iter()
            .map(|&p| &self.documents[p])
            .filter(|d| d.raw_content.is_empty())
            .map(|d| d.filename.as_str())
            .collect();
        if !without_content.is_empty() {
            bail!(
                "{} document(s) have no stored content; remove and ingest them again: {}",
                without_content.len(),
                without_content.join(", ")
            );
        }

        for &pos in &positions {
            let doc = &mut self.documents[pos];
            doc.analyzing = true;
            let parsed = ParsedDocument {
                title: if doc.raw_title.is_empty() {
                    doc.title.clone()
                } else {
                    doc.raw_title.clone()
                },
                description: String::new(),
                text: doc.raw_content.clone(),
                headings: Vec::new(),
            };
            tracing::debug!(title = %doc.title, chars = parsed.text.chars().count(), "re-analyzing");
            let analysis = analyzer.analyze(&parsed).await;
            merge_analysis(&mut self.documents[pos], analysis);
        }

        self.index.rebuild(&self.documents);
        self.recompute_similarity();
        self.persist().await?;
        Ok(positions.len())
    }
}
