//! Filtered, sorted projections of the corpus.
//!
//! | View | Output |
//! |------|--------|
//! | `card` | one block per document with summary and top similarity |
//! | `table` | sortable table, one row per document |
//! | `graph` | SVG drawing of the radial similarity graph |
//! | `timeline` | documents grouped by ingestion date, newest first |

use anyhow::bail;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt::Write as _;
use std::str::FromStr;

use crate::analyze::DEFAULT_COLLECTION;
use crate::config::ViewConfig;
use crate::models::Document;
use crate::similarity::SimilarityTable;

const NODE_RADIUS: f64 = 25.0;
const GRAPH_MARGIN: f64 = 80.0;
const GRAPH_LABEL_CHARS: usize = 20;
const TABLE_TITLE_CHARS: usize = 38;
const EMPTY: &str = "No documents to display.";

/// Node colors by collection; anything else uses the `general` color.
const COLLECTION_COLORS: &[(&str, &str)] = &[
    ("IR materials", "#3b82f6"),
    ("technical docs", "#8b5cf6"),
    ("education", "#10b981"),
    ("marketing", "#f59e0b"),
    ("entertainment", "#ef4444"),
    ("general", "#64748b"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CollectionFilter {
    #[default]
    All,
    Favorites,
    Named(String),
}

#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub collection: CollectionFilter,
    pub tag: Option<String>,
    /// Case-insensitive substring over title, summary, filename and tags.
    pub search: Option<String>,
}

impl Filter {
    pub fn matches(&self, doc: &Document) -> bool {
        match &self.collection {
            CollectionFilter::All => {}
            CollectionFilter::Favorites => {
                if !doc.favorite {
                    return false;
                }
            }
            CollectionFilter::Named(name) => {
                if doc.collection_label().unwrap_or(DEFAULT_COLLECTION) != name {
                    return false;
                }
            }
        }

        if let Some(tag) = &self.tag {
            if !doc.tags.iter().any(|t| t == tag) {
                return false;
            }
        }

        if let Some(query) = self.search.as_deref().filter(|q| !q.is_empty()) {
            let haystack = format!(
                "{} {} {} {}",
                doc.title,
                doc.summary,
                doc.filename,
                doc.tags.join(" ")
            )
            .to_lowercase();
            if !haystack.contains(&query.to_lowercase()) {
                return false;
            }
        }

        true
    }

    pub fn apply<'a>(&self, documents: &'a [Document]) -> Vec<&'a Document> {
        documents.iter().filter(|d| self.matches(d)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Title,
    Filename,
    Collection,
    Created,
    Similarity,
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Ok(match s {
            "title" => SortKey::Title,
            "filename" => SortKey::Filename,
            "collection" => SortKey::Collection,
            "created" | "date" => SortKey::Created,
            "similarity" => SortKey::Similarity,
            other => bail!(
                "Unknown sort key: '{}'. Use title, filename, collection, created or similarity.",
                other
            ),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            key: SortKey::Title,
            direction: SortDirection::Asc,
        }
    }
}

impl Sort {
    /// Same key flips the direction; a new key starts ascending.
    pub fn toggle(&mut self, key: SortKey) {
        if self.key == key {
            self.direction = match self.direction {
                SortDirection::Asc => SortDirection::Desc,
                SortDirection::Desc => SortDirection::Asc,
            };
        } else {
            self.key = key;
            self.direction = SortDirection::Asc;
        }
    }

    pub fn apply(&self, docs: &mut [&Document], similarity: &SimilarityTable) {
        docs.sort_by(|a, b| {
            let ord = match self.key {
                SortKey::Title => text_cmp(&a.title, &b.title),
                SortKey::Filename => text_cmp(&a.filename, &b.filename),
                SortKey::Collection => text_cmp(
                    a.collection.as_deref().unwrap_or(""),
                    b.collection.as_deref().unwrap_or(""),
                ),
                SortKey::Created => a.created_at.cmp(&b.created_at),
                SortKey::Similarity => similarity
                    .top_score(&a.id)
                    .cmp(&similarity.top_score(&b.id)),
            };
            match self.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
    }
}

fn text_cmp(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Card,
    Table,
    Graph,
    Timeline,
}

impl FromStr for ViewKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Ok(match s {
            "card" | "cards" => ViewKind::Card,
            "table" => ViewKind::Table,
            "graph" => ViewKind::Graph,
            "timeline" => ViewKind::Timeline,
            other => bail!(
                "Unknown view: '{}'. Use card, table, graph or timeline.",
                other
            ),
        })
    }
}

/// One document as shown in the card and table views.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: String,
    pub title: String,
    pub filename: String,
    pub collection: Option<String>,
    pub summary: String,
    pub tags: Vec<String>,
    pub top_score: Option<u8>,
    pub favorite: bool,
    pub analyzing: bool,
    pub error: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineGroup {
    pub date: NaiveDate,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub label: String,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub from: usize,
    pub to: usize,
    pub score: u8,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphLayout {
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Cards(Vec<Row>),
    Table(Vec<Row>),
    Graph(GraphLayout),
    Timeline(Vec<TimelineGroup>),
}

/// Filter, sort (table view only) and project the corpus.
pub fn project(
    kind: ViewKind,
    documents: &[Document],
    filter: &Filter,
    sort: &Sort,
    similarity: &SimilarityTable,
    config: &ViewConfig,
) -> Projection {
    let mut docs = filter.apply(documents);
    match kind {
        ViewKind::Card => Projection::Cards(docs.iter().map(|d| row(d, similarity)).collect()),
        ViewKind::Table => {
            sort.apply(&mut docs, similarity);
            Projection::Table(docs.iter().map(|d| row(d, similarity)).collect())
        }
        ViewKind::Graph => Projection::Graph(graph_layout(
            &docs,
            similarity,
            f64::from(config.graph_width),
            f64::from(config.graph_height),
        )),
        ViewKind::Timeline => Projection::Timeline(timeline(&docs, similarity)),
    }
}

fn row(doc: &Document, similarity: &SimilarityTable) -> Row {
    let top = similarity.top_score(&doc.id);
    Row {
        id: doc.id.clone(),
        title: doc.title.clone(),
        filename: doc.filename.clone(),
        collection: doc.collection_label().map(str::to_string),
        summary: doc.summary.clone(),
        tags: doc.tags.clone(),
        top_score: (top > 0).then_some(top),
        favorite: doc.favorite,
        analyzing: doc.analyzing,
        error: doc.error,
    }
}

fn timeline(docs: &[&Document], similarity: &SimilarityTable) -> Vec<TimelineGroup> {
    let mut groups: Vec<TimelineGroup> = Vec::new();
    for doc in docs {
        let date = doc.created_at.with_timezone(&chrono::Local).date_naive();
        match groups.iter_mut().find(|g| g.date == date) {
            Some(group) => group.rows.push(row(doc, similarity)),
            None => groups.push(TimelineGroup {
                date,
                rows: vec![row(doc, similarity)],
            }),
        }
    }
    groups.sort_by(|a, b| b.date.cmp(&a.date));
    groups
}

pub fn collection_color(collection: Option<&str>) -> &'static str {
    let label = collection.unwrap_or(DEFAULT_COLLECTION);
    COLLECTION_COLORS
        .iter()
        .find(|(name, _)| *name == label)
        .or_else(|| COLLECTION_COLORS.iter().find(|(name, _)| *name == DEFAULT_COLLECTION))
        .map(|(_, color)| *color)
        .unwrap_or("#64748b")
}

/// Nodes evenly spaced on a circle starting at twelve o'clock.
pub fn graph_layout(
    docs: &[&Document],
    similarity: &SimilarityTable,
    width: f64,
    height: f64,
) -> GraphLayout {
    let cx = width / 2.0;
    let cy = height / 2.0;
    let radius = cx.min(cy) - GRAPH_MARGIN;
    let n = docs.len();

    let nodes: Vec<GraphNode> = docs
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            let angle = (i as f64 / n as f64) * PI * 2.0 - PI / 2.0;
            GraphNode {
                id: doc.id.clone(),
                x: cx + angle.cos() * radius,
                y: cy + angle.sin() * radius,
                label: ellipsize(&doc.title, GRAPH_LABEL_CHARS),
                color: collection_color(doc.collection_label()),
            }
        })
        .collect();

    let positions: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id.as_str(), i))
        .collect();

    let mut edges = Vec::new();
    for (from, doc) in docs.iter().enumerate() {
        for nb in similarity.neighbors(&doc.id) {
            let Some(to) = similarity
                .id_at(nb.index)
                .and_then(|id| positions.get(id).copied())
            else {
                continue;
            };
            edges.push(GraphEdge {
                from,
                to,
                score: nb.score,
                opacity: f64::from(nb.score) / 100.0 * 0.5,
            });
        }
    }

    GraphLayout {
        width,
        height,
        nodes,
        edges,
    }
}

pub(crate) fn ellipsize(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}

impl Projection {
    /// Text for card, table and timeline views; SVG for the graph.
    pub fn render(&self) -> String {
        match self {
            Projection::Cards(rows) => render_cards(rows),
            Projection::Table(rows) => render_table(rows),
            Projection::Graph(layout) => render_svg(layout),
            Projection::Timeline(groups) => render_timeline(groups),
        }
    }
}

fn marker(row: &Row) -> &'static str {
    if row.error {
        "!"
    } else if row.analyzing {
        "~"
    } else if row.favorite {
        "*"
    } else {
        " "
    }
}

fn hashtags(tags: &[String], limit: usize) -> String {
    tags.iter()
        .take(limit)
        .map(|t| format!("#{}", t))
        .collect::<Vec<_>>()
        .join(" ")
}

/// First eight bytes of an id, or the whole id when that is not a char boundary.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn render_cards(rows: &[Row]) -> String {
    if rows.is_empty() {
        return format!("{}\n", EMPTY);
    }
    let mut out = String::new();
    for r in rows {
        let _ = writeln!(out, "{} {}  [{}]", marker(r), r.title, short_id(&r.id));
        let _ = writeln!(
            out,
            "    {}{}",
            r.filename,
            r.collection
                .as_deref()
                .map(|c| format!("  ({})", c))
                .unwrap_or_default()
        );
        let _ = writeln!(out, "    {}", r.summary);
        let mut footer = hashtags(&r.tags, 3);
        if let Some(score) = r.top_score {
            if !footer.is_empty() {
                footer.push_str("  ");
            }
            let _ = write!(footer, "similar {}%", score);
        }
        if !footer.is_empty() {
            let _ = writeln!(out, "    {}", footer);
        }
        out.push('\n');
    }
    out
}

fn render_table(rows: &[Row]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "  {:<8} {:<40} {:<18} {:<24} {:>5}",
        "ID", "TITLE", "COLLECTION", "TAGS", "SIM"
    );
    let _ = writeln!(out, "  {}", "-".repeat(99));
    if rows.is_empty() {
        let _ = writeln!(out, "  {}", EMPTY);
        return out;
    }
    for r in rows {
        let sim = r
            .top_score
            .map(|s| format!("{}%", s))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{} {:<8} {:<40} {:<18} {:<24} {:>5}",
            marker(r),
            short_id(&r.id),
            ellipsize(&r.title, TABLE_TITLE_CHARS),
            r.collection.as_deref().unwrap_or(DEFAULT_COLLECTION),
            ellipsize(&hashtags(&r.tags, 2), 22),
            sim
        );
    }
    out
}

fn render_timeline(groups: &[TimelineGroup]) -> String {
    if groups.is_empty() {
        return format!("{}\n", EMPTY);
    }
    let mut out = String::new();
    for group in groups {
        let _ = writeln!(out, "{}", group.date.format("%Y-%m-%d"));
        for r in &group.rows {
            let tags = hashtags(&r.tags, 3);
            let _ = writeln!(
                out,
                "  {} {}  ({}){}",
                marker(r),
                r.title,
                r.filename,
                if tags.is_empty() {
                    String::new()
                } else {
                    format!("  {}", tags)
                }
            );
        }
        out.push('\n');
    }
    out
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_svg(layout: &GraphLayout) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="Inter, sans-serif">"#,
        w = layout.width,
        h = layout.height
    );
    let _ = writeln!(out, r##"<rect width="100%" height="100%" fill="#ffffff"/>"##);

    if layout.nodes.is_empty() {
        let _ = writeln!(
            out,
            r##"<text x="{:.1}" y="{:.1}" font-size="16" fill="#64748b" text-anchor="middle">{}</text>"##,
            layout.width / 2.0,
            layout.height / 2.0,
            EMPTY
        );
        out.push_str("</svg>\n");
        return out;
    }

    let _ = writeln!(out, r##"<g stroke="#94a3b8" stroke-width="1">"##);
    for edge in &layout.edges {
        let a = &layout.nodes[edge.from];
        let b = &layout.nodes[edge.to];
        let _ = writeln!(
            out,
            r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke-opacity="{:.2}"/>"#,
            a.x, a.y, b.x, b.y, edge.opacity
        );
    }
    out.push_str("</g>\n<g>\n");

    for node in &layout.nodes {
        let _ = writeln!(
            out,
            r#"<circle cx="{:.1}" cy="{:.1}" r="{}" fill="{}"/>"#,
            node.x, node.y, NODE_RADIUS, node.color
        );
        let _ = writeln!(
            out,
            r##"<text x="{:.1}" y="{:.1}" font-size="11" fill="#1e293b" text-anchor="middle">{}</text>"##,
            node.x,
            node.y + NODE_RADIUS + 15.0,
            xml_escape(&node.label)
        );
    }
    out.push_str("</g>\n<g font-size=\"12\">\n");

    for (i, (name, color)) in COLLECTION_COLORS.iter().enumerate() {
        let y = 20.0 + i as f64 * 18.0;
        let _ = writeln!(
            out,
            r##"<circle cx="16" cy="{:.1}" r="5" fill="{}"/><text x="28" y="{:.1}" fill="#1e293b">{}</text>"##,
            y,
            color,
            y + 4.0,
            xml_escape(name)
        );
    }
    out.push_str("</g>\n</svg>\n");
    out
}
