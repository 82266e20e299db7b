//! # DocScan CLI (`docscan`)
//!
//! The `docscan` binary is the interface to the document scanner: store
//! initialization, ingestion, views, comparisons, exports, chat and the
//! completion proxy.
//!
//! ## Usage
//!
//! ```bash
//! docscan --config ./docscan.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docscan init` | Create the SQLite store |
//! | `docscan ingest <PATH>...` | Parse and analyze HTML files |
//! | `docscan list` | Card, table, timeline or graph view of the corpus |
//! | `docscan show <ID>` | Document detail |
//! | `docscan similar <ID>` | Most similar documents |
//! | `docscan compare <ID> <ID>...` | Compare structured fields |
//! | `docscan reanalyze <ID>...` | Re-run extraction on stored content |
//! | `docscan favorite <ID>` | Toggle the favorite flag |
//! | `docscan remove <ID>` | Delete a document |
//! | `docscan export <FORMAT>` | json, csv, notion, obsidian or toc |
//! | `docscan stats` | Corpus statistics |
//! | `docscan ask "<question>"` | Ask about the scanned documents |
//! | `docscan serve` | Start the chat-completion proxy |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (e.g. `RUST_LOG=docscan=debug`).

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docscan::analyze::{Analyzer, HttpCompletionClient};
use docscan::app::App;
use docscan::compare::{self, FIELDS};
use docscan::config::{self, Config};
use docscan::export::{self, ExportFormat};
use docscan::ingest;
use docscan::migrate;
use docscan::progress::{IngestEvent, ProgressMode};
use docscan::server;
use docscan::stats;
use docscan::view::{self, CollectionFilter, Filter, Sort, SortDirection, SortKey, ViewKind};

/// DocScan — scan folders of HTML documents, tag and group them, and find
/// the ones that belong together.
#[derive(Parser)]
#[command(
    name = "docscan",
    about = "DocScan — AI tagging, similarity graph and exports for folders of HTML documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./docscan.toml`. A missing file means built-in defaults.
    #[arg(long, global = true, default_value = "./docscan.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Filters shared by `list` and `export`.
#[derive(Args)]
struct FilterArgs {
    /// Only documents in this collection (`general` includes unset ones).
    #[arg(long, conflicts_with = "favorites")]
    collection: Option<String>,

    /// Only favorite documents.
    #[arg(long)]
    favorites: bool,

    /// Only documents carrying this tag.
    #[arg(long)]
    tag: Option<String>,

    /// Case-insensitive text search over title, summary, filename and tags.
    #[arg(long)]
    search: Option<String>,
}

impl FilterArgs {
    fn to_filter(&self) -> Filter {
        let collection = if self.favorites {
            CollectionFilter::Favorites
        } else {
            match &self.collection {
                Some(name) => CollectionFilter::Named(name.clone()),
                None => CollectionFilter::All,
            }
        };
        Filter {
            collection,
            tag: self.tag.clone(),
            search: self.search.clone(),
        }
    }
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the document store.
    ///
    /// Creates the SQLite file and the key-value table. Idempotent.
    Init,

    /// Parse and analyze HTML files.
    ///
    /// Accepts files and directories; directories are walked recursively
    /// using `[ingest]` include and exclude globs. Files are processed one
    /// at a time and every step is persisted.
    Ingest {
        /// Files or directories to scan.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Progress output on stderr: `auto`, `human`, `json` or `off`.
        #[arg(long, default_value = "auto")]
        progress: ProgressMode,
    },

    /// Show the corpus as cards, a table, a timeline or a similarity graph.
    List {
        /// `card`, `table`, `timeline` or `graph` (SVG).
        #[arg(long, default_value = "card")]
        view: ViewKind,

        #[command(flatten)]
        filter: FilterArgs,

        /// Table sort key: `title`, `filename`, `collection`, `created`, `similarity`.
        #[arg(long, default_value = "title")]
        sort: SortKey,

        /// Sort descending.
        #[arg(long)]
        desc: bool,

        /// Write to a file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show one document: metadata, summary, structured fields, neighbors.
    Show {
        /// Document id or unique id prefix.
        id: String,

        /// Print the stored record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List the documents most similar to one document.
    Similar {
        /// Document id or unique id prefix.
        id: String,
    },

    /// Compare the structured fields of two or more documents.
    Compare {
        /// Document ids or unique id prefixes.
        #[arg(required = true, num_args = 2..)]
        ids: Vec<String>,

        /// Re-analyze selected documents that have no structured data first.
        #[arg(long)]
        reanalyze_missing: bool,
    },

    /// Re-run extraction on the stored content of documents.
    Reanalyze {
        /// Document ids or unique id prefixes.
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Toggle the favorite flag of a document.
    Favorite {
        /// Document id or unique id prefix.
        id: String,
    },

    /// Delete a document from the store.
    Remove {
        /// Document id or unique id prefix.
        id: String,
    },

    /// Export the (filtered) corpus.
    Export {
        /// `json`, `csv`, `notion`, `obsidian` or `toc`.
        format: ExportFormat,

        #[command(flatten)]
        filter: FilterArgs,

        /// Write to a file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show corpus statistics.
    Stats,

    /// Ask a question about the scanned documents.
    ///
    /// The conversation is kept between calls; `--reset` clears it.
    Ask {
        /// The question.
        question: Vec<String>,

        /// Clear the conversation history.
        #[arg(long)]
        reset: bool,
    },

    /// Start the chat-completion proxy.
    ///
    /// Binds `[proxy].bind` and forwards `POST /api/chat` to the upstream
    /// with the API key from `[proxy].api_key_env`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docscan=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg.store).await?;
            println!("Store initialized at {}", cfg.store.path.display());
        }
        Commands::Serve => {
            server::run_proxy(&cfg.proxy).await?;
        }
        command => run_command(cfg, command).await?,
    }

    Ok(())
}

/// Commands that work on the loaded corpus.
async fn run_command(cfg: Config, command: Commands) -> anyhow::Result<()> {
    let mut app = App::open(cfg).await?;

    match command {
        Commands::Ingest { paths, progress } => {
            let reporter = progress.reporter();
            reporter.report(IngestEvent::Discovering { paths: paths.len() });
            let files = ingest::scan_paths(&paths, &app.config().ingest)?;
            let analyzer = Analyzer::from_config(&app.config().analysis)?;
            let report = app.ingest(&files, &analyzer, reporter.as_ref()).await?;

            println!("ingest");
            println!("  files found: {}", files.len());
            println!("  analyzed: {}", report.analyzed);
            println!("  failed: {}", report.failed);
            println!("  heuristic fallback: {}", report.fallback);
            println!("  documents in store: {}", app.documents().len());
            println!("ok");
        }
        Commands::List {
            view: kind,
            filter,
            sort,
            desc,
            output,
        } => {
            let sort = Sort {
                key: sort,
                direction: if desc {
                    SortDirection::Desc
                } else {
                    SortDirection::Asc
                },
            };
            warn_unknown_tag(&app, &filter);
            let rendered = view::project(
                kind,
                app.documents(),
                &filter.to_filter(),
                &sort,
                app.similarity(),
                &app.config().view,
            )
            .render();
            export::write_output(rendered.trim_end(), output.as_deref())?;
        }
        Commands::Show { id, json } => {
            let doc = app.find(&id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(doc)?);
            } else {
                print_document(&app, doc);
            }
        }
        Commands::Similar { id } => {
            let doc = app.find(&id)?;
            let neighbors = app.similarity().neighbors(&doc.id);
            println!("Similar to: {}", doc.title);
            if neighbors.is_empty() {
                println!("  No similar documents.");
            }
            for nb in neighbors {
                let Some(other) = app
                    .similarity()
                    .id_at(nb.index)
                    .and_then(|nid| app.documents().iter().find(|d| d.id == nid))
                else {
                    continue;
                };
                println!(
                    "  {:>3}%  {}  {}",
                    nb.score,
                    view::short_id(&other.id),
                    other.title
                );
            }
        }
        Commands::Compare {
            ids,
            reanalyze_missing,
        } => {
            let mut full_ids = Vec::with_capacity(ids.len());
            for id in &ids {
                full_ids.push(app.find(id)?.id.clone());
            }

            if reanalyze_missing {
                let missing: Vec<String> = full_ids
                    .iter()
                    .filter(|id| app.find(id).map(|d| d.missing_fields()).unwrap_or(false))
                    .cloned()
                    .collect();
                if !missing.is_empty() {
                    let analyzer = Analyzer::from_config(&app.config().analysis)?;
                    let n = app.reanalyze(&missing, &analyzer).await?;
                    eprintln!("Re-analyzed {} document(s).", n);
                }
            }

            let mut docs = Vec::with_capacity(full_ids.len());
            for id in &full_ids {
                docs.push(app.find(id)?);
            }
            let comparison = compare::compare(&docs)?;
            print!("{}", compare::render_report(&comparison));
        }
        Commands::Reanalyze { ids } => {
            let analyzer = Analyzer::from_config(&app.config().analysis)?;
            let n = app.reanalyze(&ids, &analyzer).await?;
            println!("Re-analyzed {} document(s).", n);
        }
        Commands::Favorite { id } => {
            let favorite = app.toggle_favorite(&id).await?;
            let doc = app.find(&id)?;
            println!(
                "{} {}",
                if favorite { "Starred" } else { "Unstarred" },
                doc.title
            );
        }
        Commands::Remove { id } => {
            let removed = app.remove(&id).await?;
            println!("Removed {} ({})", removed.title, removed.filename);
        }
        Commands::Export {
            format,
            filter,
            output,
        } => {
            warn_unknown_tag(&app, &filter);
            let docs = app.filtered(&filter.to_filter());
            let content = export::render(format, &docs, &app.export_context())?;
            export::write_output(&content, output.as_deref())?;
        }
        Commands::Stats => {
            let summary = stats::compute(&app);
            print!("{}", stats::render(&summary, &app.config().store.path));
        }
        Commands::Ask { question, reset } => {
            if reset {
                app.reset_chat().await?;
                eprintln!("Conversation cleared.");
            }
            let question = question.join(" ");
            if question.trim().is_empty() {
                if !reset {
                    bail!("Ask a question, e.g. docscan ask \"Which decks mention SaaS?\"");
                }
            } else {
                let client = HttpCompletionClient::new(
                    &app.config().analysis.endpoint,
                    app.config().analysis.timeout_secs,
                )
                .context("Failed to build HTTP client")?;
                let answer = app.ask(&client, question.trim()).await?;
                println!("{}", answer);
            }
        }
        Commands::Init | Commands::Serve => {}
    }

    app.close().await;
    Ok(())
}

fn warn_unknown_tag(app: &App, filter: &FilterArgs) {
    if let Some(tag) = &filter.tag {
        if app.index().tag_count(tag) == 0 {
            eprintln!("No document is tagged #{}; see `docscan stats` for the tag cloud.", tag);
        }
    }
}

fn print_document(app: &App, doc: &docscan::models::Document) {
    println!("{}", doc.title);
    println!("{}", "=".repeat(doc.title.chars().count().clamp(3, 80)));
    println!("  id:         {}", doc.id);
    println!("  file:       {}", doc.filename);
    println!(
        "  collection: {}",
        doc.collection_label().unwrap_or("general")
    );
    println!("  tags:       {}", doc.tags.join(", "));
    println!("  keywords:   {}", doc.keywords.join(", "));
    println!("  created:    {}", doc.created_at.format("%Y-%m-%d %H:%M"));
    if doc.favorite {
        println!("  favorite:   yes");
    }
    if doc.error {
        println!("  status:     failed");
    }
    println!();
    println!("{}", doc.summary);

    match &doc.fields {
        Some(fields) if !fields.is_empty() => {
            println!();
            for descriptor in FIELDS.iter() {
                let value = fields.value(descriptor.key);
                if value != docscan::models::FieldValue::Missing {
                    println!("  {:<16} {}", descriptor.label, compare::display(value));
                }
            }
        }
        Some(_) => {}
        None => {
            println!();
            println!(
                "  No structured data. Run `docscan reanalyze {}`.",
                view::short_id(&doc.id)
            );
        }
    }

    let neighbors = app.similarity().neighbors(&doc.id);
    if !neighbors.is_empty() {
        println!();
        println!("  Similar:");
        for nb in neighbors {
            if let Some(other) = app
                .similarity()
                .id_at(nb.index)
                .and_then(|nid| app.documents().iter().find(|d| d.id == nid))
            {
                println!("    {:>3}%  {}", nb.score, other.title);
            }
        }
    }
}
