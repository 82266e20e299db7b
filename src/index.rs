//! Tag, collection and keyword indexes.
//!
//! Purely derived from the document array. [`Index::update`] is additive and
//! must run once per document; after any bulk change use [`Index::rebuild`].

use std::collections::BTreeMap;

use crate::analyze::DEFAULT_COLLECTION;
use crate::models::Document;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Index {
    tags: BTreeMap<String, usize>,
    /// Collection buckets in first-appearance order.
    collections: Vec<(String, Vec<String>)>,
    keywords: BTreeMap<String, usize>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(documents: &[Document]) -> Self {
        let mut index = Self::new();
        index.rebuild(documents);
        index
    }

    pub fn update(&mut self, doc: &Document) {
        for tag in &doc.tags {
            *self.tags.entry(tag.clone()).or_insert(0) += 1;
        }

        let label = doc.collection_label().unwrap_or(DEFAULT_COLLECTION);
        match self.collections.iter_mut().find(|(name, _)| name == label) {
            Some((_, ids)) => ids.push(doc.id.clone()),
            None => self
                .collections
                .push((label.to_string(), vec![doc.id.clone()])),
        }

        for keyword in &doc.keywords {
            *self.keywords.entry(keyword.clone()).or_insert(0) += 1;
        }
    }

    pub fn rebuild(&mut self, documents: &[Document]) {
        self.tags.clear();
        self.collections.clear();
        self.keywords.clear();
        for doc in documents {
            self.update(doc);
        }
    }

    pub fn tag_count(&self, tag: &str) -> usize {
        self.tags.get(tag).copied().unwrap_or(0)
    }

    pub fn collections(&self) -> &[(String, Vec<String>)] {
        &self.collections
    }

    pub fn tag_total(&self) -> usize {
        self.tags.len()
    }

    /// Tags by count descending, then label.
    pub fn top_tags(&self, limit: usize) -> Vec<(&str, usize)> {
        ranked(&self.tags, limit)
    }

    /// Keywords by count descending, then label.
    pub fn top_keywords(&self, limit: usize) -> Vec<(&str, usize)> {
        ranked(&self.keywords, limit)
    }
}

fn ranked(counts: &BTreeMap<String, usize>, limit: usize) -> Vec<(&str, usize)> {
    let mut entries: Vec<(&str, usize)> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    // Stable sort over BTreeMap order: equal counts stay alphabetical.
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries.truncate(limit);
    entries
}
