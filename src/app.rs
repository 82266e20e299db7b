//! Application state.
//!
//! [`App`] owns the configuration, the store, the document vector and the
//! structures derived from it. Every mutation persists the whole document
//! array before returning; the index and similarity table are never stored.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::export::ExportContext;
use crate::index::Index;
use crate::models::Document;
use crate::similarity::SimilarityTable;
use crate::store::DocumentStore;
use crate::view::Filter;

pub struct App {
    pub(crate) config: Config,
    pub(crate) store: DocumentStore,
    pub(crate) documents: Vec<Document>,
    pub(crate) index: Index,
    pub(crate) similarity: SimilarityTable,
}

impl App {
    /// Load the persisted corpus and rebuild the derived structures.
    pub async fn open(config: Config) -> Result<Self> {
        let store = DocumentStore::open(&config.store).await?;
        let documents = store.load_documents().await?;
        let index = Index::build(&documents);
        let similarity = SimilarityTable::compute(
            &documents,
            config.similarity.min_score,
            config.similarity.top_k,
        );
        tracing::debug!(documents = documents.len(), "corpus loaded");
        Ok(Self {
            config,
            store,
            documents,
            index,
            similarity,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn similarity(&self) -> &SimilarityTable {
        &self.similarity
    }

    pub fn export_context(&self) -> ExportContext<'_> {
        ExportContext {
            corpus: &self.documents,
            index: &self.index,
            similarity: &self.similarity,
        }
    }

    /// Look up by full id or a unique id prefix.
    pub fn find(&self, id_or_prefix: &str) -> Result<&Document> {
        let pos = self.position(id_or_prefix)?;
        Ok(&self.documents[pos])
    }

    pub(crate) fn position(&self, id_or_prefix: &str) -> Result<usize> {
        if let Some(pos) = self.documents.iter().position(|d| d.id == id_or_prefix) {
            return Ok(pos);
        }
        if id_or_prefix.is_empty() {
            bail!("Document id must not be empty");
        }
        let matches: Vec<usize> = self
            .documents
            .iter()
            .enumerate()
            .filter(|(_, d)| d.id.starts_with(id_or_prefix))
            .map(|(i, _)| i)
            .collect();
        match matches.as_slice() {
            [pos] => Ok(*pos),
            [] => bail!("No document matches '{}'", id_or_prefix),
            _ => bail!(
                "'{}' matches {} documents; use a longer prefix",
                id_or_prefix,
                matches.len()
            ),
        }
    }

    pub fn filtered(&self, filter: &Filter) -> Vec<&Document> {
        filter.apply(&self.documents)
    }

    /// Flip the favorite flag; returns the new value.
    pub async fn toggle_favorite(&mut self, id_or_prefix: &str) -> Result<bool> {
        let pos = self.position(id_or_prefix)?;
        let doc = &mut self.documents[pos];
        doc.favorite = !doc.favorite;
        let favorite = doc.favorite;
        self.persist().await?;
        Ok(favorite)
    }

    pub async fn remove(&mut self, id_or_prefix: &str) -> Result<Document> {
        let pos = self.position(id_or_prefix)?;
        let removed = self.documents.remove(pos);
        self.index.rebuild(&self.documents);
        self.recompute_similarity();
        self.persist().await?;
        tracing::info!(id = %removed.id, filename = %removed.filename, "document removed");
        Ok(removed)
    }

    pub(crate) async fn persist(&self) -> Result<()> {
        self.store.save_documents(&self.documents).await
    }

    pub(crate) fn recompute_similarity(&mut self) {
        self.similarity = SimilarityTable::compute(
            &self.documents,
            self.config.similarity.min_score,
            self.config.similarity.top_k,
        );
    }

    pub async fn close(self) {
        self.store.close().await;
    }
}
