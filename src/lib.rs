//! # DocScan
//!
//! A local document scanner for folders of HTML files.
//!
//! DocScan parses each file, asks a chat-completion endpoint for a title,
//! summary, tags, collection, keywords and structured business fields
//! (falling back to a keyword heuristic when the call fails), scores how
//! related every pair of documents is, and presents the corpus as filtered
//! and sorted views, a similarity graph, comparisons and exports.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────────┐
//! │  Parser  │──▶│ Analyzer │──▶│  Index   │──▶│  Similarity  │
//! │ (HTML)   │   │ LLM/heur │   │ tags/col │   │  top-k table │
//! └──────────┘   └────┬─────┘   └──────────┘   └──────┬───────┘
//!                     │                               │
//!                     ▼                               ▼
//!               ┌──────────┐                ┌──────────────────┐
//!               │  Proxy   │                │ Views / Compare  │
//!               │ (axum)   │                │ Exports / Stats  │
//!               └──────────┘                └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docscan serve &                 # completion proxy holding the API key
//! docscan init                    # create the store
//! docscan ingest ./decks          # parse and analyze every HTML file
//! docscan list --view table --sort similarity --desc
//! docscan list --view graph --output graph.svg
//! docscan export csv --collection "IR materials" --output ir.csv
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`parse`] | HTML parsing |
//! | [`analyze`] | Tag, keyword and structured-field extraction |
//! | [`index`] | Tag, collection and keyword indexes |
//! | [`similarity`] | Pairwise scoring and neighbor lists |
//! | [`view`] | Filters, sorting and view projections |
//! | [`compare`] | Structured-field comparison |
//! | [`ingest`] | File discovery and the ingest pipeline |
//! | [`app`] | Application state |
//! | [`export`] | JSON, CSV and Markdown exports |
//! | [`chat`] | Questions over the corpus |
//! | [`server`] | Chat-completion proxy |
//! | [`stats`] | Corpus statistics |
//! | [`progress`] | Ingest progress reporting |
//! | [`store`] | Key-value persistence |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema setup |

pub mod analyze;
pub mod app;
pub mod chat;
pub mod compare;
pub mod config;
pub mod db;
pub mod export;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod parse;
pub mod progress;
pub mod server;
pub mod similarity;
pub mod stats;
pub mod store;
pub mod view;
