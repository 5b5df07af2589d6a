use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tracing::debug;

use crate::{
    error::{Error, Result},
    kb::KnowledgeBase,
    model::{Candidate, EntityType},
    name_index::{NameIndex, TieBreak, check_query},
    text,
};

/// Character n-gram index scored by summed inverse document frequency.
///
/// Names are lowercased, stripped of punctuation, joined with `_` and
/// padded with `_` on both sides, so word boundaries produce their own
/// grams. A query keeps every name whose IDF mass is above half of the
/// best name's mass, then reports each entity once with its best score.
pub struct NgramIndex {
    kb: Arc<KnowledgeBase>,
    size: usize,
    /// KB position of the entity each indexed name belongs to.
    names: Vec<usize>,
    postings: HashMap<String, Vec<usize>>,
    unique_names: usize,
    tie_break: TieBreak,
}

fn format_name(name: &str) -> String {
    let joined = text::normalize_name(name)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    format!("_{joined}_")
}

fn unique_ngrams(name: &str, size: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    text::ngrams(&format_name(name), size)
        .into_iter()
        .filter(|g| seen.insert(g.clone()))
        .collect()
}

impl NgramIndex {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self::index(kb, text::DEFAULT_NGRAM_SIZE, TieBreak::default())
    }

    /// Fails with [`Error::Config`] when `size` is zero, since no name
    /// would have any gram to match on.
    pub fn build(
        kb: Arc<KnowledgeBase>,
        size: usize,
        tie_break: TieBreak,
    ) -> Result<Self> {
        if size == 0 {
            return Err(Error::Config(
                "n-gram size must be at least 1".to_string(),
            ));
        }
        Ok(Self::index(kb, size, tie_break))
    }

    fn index(kb: Arc<KnowledgeBase>, size: usize, tie_break: TieBreak) -> Self {
        let mut names = Vec::new();
        let mut postings: HashMap<String, Vec<usize>> = HashMap::new();
        let mut distinct = HashSet::new();

        for (pos, entity) in kb.all_entities().enumerate() {
            for name in &entity.names {
                distinct.insert(name.to_lowercase());
                let name_idx = names.len();
                names.push(pos);
                for gram in unique_ngrams(name, size) {
                    postings.entry(gram).or_default().push(name_idx);
                }
            }
        }
        debug!(
            names = names.len(),
            ngrams = postings.len(),
            size,
            "built ngram index"
        );

        Self {
            kb,
            size,
            names,
            postings,
            unique_names: distinct.len(),
            tie_break,
        }
    }

    fn idf(&self, df: usize) -> f64 {
        (self.unique_names as f64 / df as f64).ln_1p()
    }
}

impl NameIndex for NgramIndex {
    fn query(
        &self,
        name: &str,
        entity_type: Option<EntityType>,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        check_query(name)?;
        let entities = self.kb.entities();
        let type_matches = |name_idx: usize| {
            entity_type
                .is_none_or(|t| entities[self.names[name_idx]].entity_type == t)
        };

        let mut mass: HashMap<usize, f64> = HashMap::new();
        for gram in unique_ngrams(name, self.size) {
            let Some(name_ids) = self.postings.get(&gram) else {
                continue;
            };
            let idf = self.idf(name_ids.len());
            for &name_idx in name_ids {
                if type_matches(name_idx) {
                    *mass.entry(name_idx).or_insert(0.0) += idf;
                }
            }
        }

        let Some(best) = mass.values().copied().reduce(f64::max) else {
            return Ok(Vec::new());
        };
        let threshold = best / 2.0;

        let mut by_entity: HashMap<usize, f64> = HashMap::new();
        for (name_idx, score) in mass {
            if score <= threshold {
                continue;
            }
            let slot = by_entity.entry(self.names[name_idx]).or_insert(score);
            *slot = slot.max(score);
        }

        let mut candidates: Vec<Candidate> = by_entity
            .into_iter()
            .map(|(pos, score)| {
                Candidate::scored(entities[pos].id.clone(), score as f32)
            })
            .collect();
        self.tie_break.sort(&self.kb, &mut candidates);
        candidates.truncate(limit);
        Ok(candidates)
    }
}
