//! Name → candidate entity lookup.
//!
//! Every index is built once from a [`KnowledgeBase`] and is read-only
//! afterwards. Whatever the matching strategy, a query returns only ids
//! of the backing KB, returns an empty list (not an error) when nothing
//! matches, and returns the same ordering every time it is asked the same
//! question.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tracing::debug;

use crate::{
    error::{Error, Result},
    kb::KnowledgeBase,
    model::{Candidate, EntityType},
    text,
};

/// A name lookup strategy.
pub trait NameIndex: Send + Sync {
    /// At most `limit` candidates for `name`, best first.
    ///
    /// When `entity_type` is given, only entities of that type are
    /// returned. Fails with [`Error::InvalidQuery`] if the name has no
    /// content once punctuation and whitespace are removed.
    fn query(
        &self,
        name: &str,
        entity_type: Option<EntityType>,
        limit: usize,
    ) -> Result<Vec<Candidate>>;
}

/// Reject queries with nothing left to match on.
pub(crate) fn check_query(name: &str) -> Result<()> {
    if text::normalize_name(name).is_empty() {
        return Err(Error::InvalidQuery(name.to_string()));
    }
    Ok(())
}

/// How results of equal rank are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TieBreak {
    /// Order in which entities were loaded into the KB.
    #[default]
    InsertionOrder,
    /// Lexicographic entity id.
    EntityId,
}

impl TieBreak {
    fn compare(
        self,
        kb: &KnowledgeBase,
        a: &Candidate,
        b: &Candidate,
    ) -> Ordering {
        match self {
            Self::InsertionOrder => {
                let pos = |c: &Candidate| {
                    kb.position(&c.entity_id).unwrap_or(usize::MAX)
                };
                pos(a).cmp(&pos(b))
            }
            Self::EntityId => a.entity_id.cmp(&b.entity_id),
        }
    }

    /// Sort by descending [`Candidate::rank_score`], so unscored
    /// candidates come after scored ones. Equal scores fall back to the
    /// policy.
    pub fn sort(self, kb: &KnowledgeBase, candidates: &mut [Candidate]) {
        candidates.sort_by(|a, b| {
            b.rank_score()
                .total_cmp(&a.rank_score())
                .then_with(|| self.compare(kb, a, b))
        });
    }
}

/// Case-insensitive, whitespace-collapsed exact name match.
pub struct ExactMatchIndex {
    kb: Arc<KnowledgeBase>,
    names: HashMap<String, Vec<usize>>,
    tie_break: TieBreak,
}

impl ExactMatchIndex {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self::with_tie_break(kb, TieBreak::default())
    }

    pub fn with_tie_break(
        kb: Arc<KnowledgeBase>,
        tie_break: TieBreak,
    ) -> Self {
        let mut names: HashMap<String, Vec<usize>> = HashMap::new();
        for (pos, entity) in kb.all_entities().enumerate() {
            for name in &entity.names {
                let slot = names.entry(text::name_key(name)).or_default();
                if slot.last() != Some(&pos) {
                    slot.push(pos);
                }
            }
        }
        debug!(names = names.len(), "built exact match index");
        Self {
            kb,
            names,
            tie_break,
        }
    }
}

impl NameIndex for ExactMatchIndex {
    fn query(
        &self,
        name: &str,
        entity_type: Option<EntityType>,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        check_query(name)?;
        let Some(positions) = self.names.get(&text::name_key(name)) else {
            return Ok(Vec::new());
        };

        let entities = self.kb.entities();
        let mut seen = HashSet::new();
        let mut candidates: Vec<Candidate> = positions
            .iter()
            .map(|&pos| &entities[pos])
            .filter(|e| entity_type.is_none_or(|t| e.entity_type == t))
            .filter(|e| seen.insert(&e.id))
            .map(|e| Candidate::new(e.id.clone()))
            .collect();

        self.tie_break.sort(&self.kb, &mut candidates);
        candidates.truncate(limit);
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ids::EntityId,
        kb::{AltNameRecord, EntityRecord},
    };

    fn kb() -> Arc<KnowledgeBase> {
        Arc::new(
            KnowledgeBase::from_records(
                vec![
                    EntityRecord::new("Q9", "GPE", "Addis Ababa"),
                    EntityRecord::new("Q1", "ORG", "Addis Ababa"),
                    EntityRecord::new("Q5", "PER", "Abebe Bikila"),
                ],
                vec![
                    AltNameRecord::new("Q9", "AA"),
                    AltNameRecord::new("Q9", "aa"),
                ],
            )
            .unwrap(),
        )
    }

    fn ids(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.entity_id.as_str()).collect()
    }

    #[test]
    fn exact_match_ignores_case_and_spacing() {
        let index = ExactMatchIndex::new(kb());
        let hits = index.query("  addis   ABABA ", None, 10).unwrap();
        assert_eq!(ids(&hits), vec!["Q9", "Q1"]);
    }

    #[test]
    fn alternate_names_resolve_once() {
        let index = ExactMatchIndex::new(kb());
        let hits = index.query("AA", None, 10).unwrap();
        assert_eq!(ids(&hits), vec!["Q9"]);
    }

    #[test]
    fn type_restricts_results() {
        let index = ExactMatchIndex::new(kb());
        let hits = index
            .query("Addis Ababa", Some(EntityType::Organization), 10)
            .unwrap();
        assert_eq!(ids(&hits), vec!["Q1"]);
    }

    #[test]
    fn entity_id_tie_break() {
        let index = ExactMatchIndex::with_tie_break(kb(), TieBreak::EntityId);
        let hits = index.query("Addis Ababa", None, 10).unwrap();
        assert_eq!(ids(&hits), vec!["Q1", "Q9"]);
    }

    #[test]
    fn limit_bounds_results() {
        let index = ExactMatchIndex::new(kb());
        assert_eq!(index.query("Addis Ababa", None, 1).unwrap().len(), 1);
        assert!(index.query("Addis Ababa", None, 0).unwrap().is_empty());
    }

    #[test]
    fn no_match_is_empty_not_error() {
        let index = ExactMatchIndex::new(kb());
        assert!(index.query("Unknown City", None, 10).unwrap().is_empty());
    }

    #[test]
    fn punctuation_only_query_is_invalid() {
        let index = ExactMatchIndex::new(kb());
        let err = index.query("!!!", None, 10).unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));
    }

    #[test]
    fn tie_break_sort_prefers_score() {
        let kb = kb();
        let mut candidates = vec![
            Candidate::scored(EntityId::new("Q9"), 1.0),
            Candidate::scored(EntityId::new("Q5"), 2.0),
            Candidate::scored(EntityId::new("Q1"), 1.0),
        ];
        TieBreak::InsertionOrder.sort(&kb, &mut candidates);
        assert_eq!(ids(&candidates), vec!["Q5", "Q9", "Q1"]);
    }

    #[test]
    fn unscored_candidates_sort_after_scored() {
        let kb = kb();
        let mut candidates = vec![
            Candidate::new(EntityId::new("Q9")),
            Candidate::scored(EntityId::new("Q5"), 0.0),
            Candidate::scored(EntityId::new("Q1"), -1.0),
        ];
        TieBreak::InsertionOrder.sort(&kb, &mut candidates);
        assert_eq!(ids(&candidates), vec!["Q5", "Q1", "Q9"]);
    }
}
