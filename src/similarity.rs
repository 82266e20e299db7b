//! Heuristic pairwise similarity.
//!
//! ```text
//! score(a, b) = 20 × |tags ∩|
//!             + 25 × [same collection]
//!             + 15 × |keywords ∩|
//!             + 10 × |title words ∩|   (words longer than 2 chars)
//! clamped to 100
//! ```
//!
//! The table is always recomputed for the whole corpus. Each unordered pair
//! is scored once and the score is used in both directions, so `score(a, b)`
//! and `score(b, a)` can never drift apart. Neighbor lists are still
//! per-document top-k and need not be mutual.

use std::collections::{HashMap, HashSet};

use crate::models::{Document, SimilarityEdge};

pub const MAX_SCORE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    /// Position of the neighbor in the corpus the table was computed from.
    pub index: usize,
    pub score: u8,
}

#[derive(Debug, Clone, Default)]
pub struct SimilarityTable {
    ids: Vec<String>,
    neighbors: Vec<Vec<Neighbor>>,
    positions: HashMap<String, usize>,
}

pub fn score(a: &Document, b: &Document) -> u8 {
    let tags = overlap(&a.tags, &b.tags);
    let keywords = overlap(&a.keywords, &b.keywords);
    let same_collection = a.collection_label() == b.collection_label();

    let words_a = title_words(&a.title);
    let words_b = title_words(&b.title);
    let title = words_a.intersection(&words_b).count();

    let total = tags * 20 + usize::from(same_collection) * 25 + keywords * 15 + title * 10;
    total.min(MAX_SCORE as usize) as u8
}

fn overlap(a: &[String], b: &[String]) -> usize {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    a.intersection(&b).count()
}

fn title_words(title: &str) -> HashSet<String> {
    title
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

impl SimilarityTable {
    /// Score every pair and keep, per document, the `top_k` neighbors scoring
    /// strictly above `min_score`, best first. Ties keep corpus order.
    pub fn compute(documents: &[Document], min_score: u8, top_k: usize) -> Self {
        let n = documents.len();
        let mut neighbors: Vec<Vec<Neighbor>> = vec![Vec::new(); n];

        for i in 0..n {
            for j in (i + 1)..n {
                let s = score(&documents[i], &documents[j]);
                if s > min_score {
                    neighbors[i].push(Neighbor { index: j, score: s });
                    neighbors[j].push(Neighbor { index: i, score: s });
                }
            }
        }

        for list in &mut neighbors {
            // Rows are filled in increasing index order, so a stable sort
            // keeps corpus order among equal scores.
            list.sort_by(|a, b| b.score.cmp(&a.score));
            list.truncate(top_k);
        }

        let ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
        let positions = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        tracing::debug!(documents = n, "similarity table recomputed");
        Self {
            ids,
            neighbors,
            positions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.iter().all(Vec::is_empty)
    }

    pub fn neighbors(&self, id: &str) -> &[Neighbor] {
        self.positions
            .get(id)
            .map(|&i| self.neighbors[i].as_slice())
            .unwrap_or(&[])
    }

    /// Id of the document at a neighbor position.
    pub fn id_at(&self, index: usize) -> Option<&str> {
        self.ids.get(index).map(String::as_str)
    }

    /// Best neighbor score, 0 without neighbors.
    pub fn top_score(&self, id: &str) -> u8 {
        self.neighbors(id).first().map_or(0, |nb| nb.score)
    }

    pub fn edges(&self) -> Vec<SimilarityEdge<'_>> {
        self.neighbors
            .iter()
            .enumerate()
            .flat_map(|(i, list)| {
                list.iter().map(move |nb| SimilarityEdge {
                    source_id: &self.ids[i],
                    target_id: &self.ids[nb.index],
                    score: nb.score,
                })
            })
            .collect()
    }

    /// Documents with at least one neighbor scoring `threshold` or more.
    pub fn near_duplicates(&self, threshold: u8) -> usize {
        self.neighbors
            .iter()
            .filter(|list| list.iter().any(|nb| nb.score >= threshold))
            .count()
    }
}
