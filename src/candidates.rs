use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tracing::debug;

use crate::{
    error::Result,
    ids::EntityId,
    model::{Candidate, Document, EntityType},
    name_index::NameIndex,
    stage::CandidateGenerator,
};

/// Default bound on candidates per chain.
pub const DEFAULT_LIMIT: usize = 25;

/// Finds candidates for one name.
pub trait CandidateSource {
    fn find(
        &mut self,
        name: &str,
        entity_type: EntityType,
        limit: usize,
    ) -> Result<Vec<Candidate>>;
}

/// Queries a name index.
pub struct IndexSource {
    index: Arc<dyn NameIndex>,
    typed: bool,
}

impl IndexSource {
    /// Restricts results to the mention's type.
    pub fn new(index: Arc<dyn NameIndex>) -> Self {
        Self { index, typed: true }
    }

    /// Ignores the mention's type.
    pub fn untyped(index: Arc<dyn NameIndex>) -> Self {
        Self {
            index,
            typed: false,
        }
    }
}

impl CandidateSource for IndexSource {
    fn find(
        &mut self,
        name: &str,
        entity_type: EntityType,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let filter = self.typed.then_some(entity_type);
        self.index.query(name, filter, limit)
    }
}

/// Adds unseen candidates from `found` to `into`, keeping first-seen
/// order.
fn merge_unique(
    into: &mut Vec<Candidate>,
    seen: &mut HashSet<EntityId>,
    found: Vec<Candidate>,
) {
    for candidate in found {
        if seen.insert(candidate.entity_id.clone()) {
            into.push(candidate);
        }
    }
}

/// Union of every source's candidates, in first-seen order.
pub struct CombiningSource {
    sources: Vec<Box<dyn CandidateSource>>,
}

impl CombiningSource {
    pub fn new(sources: Vec<Box<dyn CandidateSource>>) -> Self {
        Self { sources }
    }
}

impl CandidateSource for CombiningSource {
    fn find(
        &mut self,
        name: &str,
        entity_type: EntityType,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let mut all = Vec::new();
        let mut seen = HashSet::new();
        for source in &mut self.sources {
            let found = source.find(name, entity_type, limit)?;
            merge_unique(&mut all, &mut seen, found);
        }
        all.truncate(limit);
        Ok(all)
    }
}

/// Asks each source in turn until `limit` candidates are collected.
pub struct CascadeSource {
    sources: Vec<Box<dyn CandidateSource>>,
}

impl CascadeSource {
    pub fn new(sources: Vec<Box<dyn CandidateSource>>) -> Self {
        Self { sources }
    }
}

impl CandidateSource for CascadeSource {
    fn find(
        &mut self,
        name: &str,
        entity_type: EntityType,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let mut all = Vec::new();
        let mut seen = HashSet::new();
        for source in &mut self.sources {
            if all.len() >= limit {
                break;
            }
            let found = source.find(name, entity_type, limit)?;
            merge_unique(&mut all, &mut seen, found);
        }
        all.truncate(limit);
        Ok(all)
    }
}

/// Memoizes another source by lowercased name and type.
///
/// The cache lives for the whole run and holds query results only.
pub struct CachingSource {
    inner: Box<dyn CandidateSource>,
    cache: HashMap<(String, EntityType, usize), Vec<Candidate>>,
    hits: u64,
}

impl CachingSource {
    pub fn new(inner: Box<dyn CandidateSource>) -> Self {
        Self {
            inner,
            cache: HashMap::new(),
            hits: 0,
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }
}

impl CandidateSource for CachingSource {
    fn find(
        &mut self,
        name: &str,
        entity_type: EntityType,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let key = (name.to_lowercase(), entity_type, limit);
        if let Some(cached) = self.cache.get(&key) {
            self.hits += 1;
            return Ok(cached.clone());
        }
        let found = self.inner.find(name, entity_type, limit)?;
        self.cache.insert(key, found.clone());
        Ok(found)
    }
}

/// Generates candidates once per coreference chain.
///
/// The chain's first mention is the query; every member receives a copy
/// of the resulting list.
pub struct ChainGenerator {
    source: Box<dyn CandidateSource>,
    limit: usize,
}

impl ChainGenerator {
    pub fn new(source: Box<dyn CandidateSource>, limit: usize) -> Self {
        Self { source, limit }
    }

    /// Query a name index directly, restricted to the mention type.
    pub fn from_index(index: Arc<dyn NameIndex>, limit: usize) -> Self {
        Self::new(Box::new(IndexSource::new(index)), limit)
    }
}

impl CandidateGenerator for ChainGenerator {
    fn generate(&mut self, mut doc: Document) -> Result<Document> {
        for chain in doc.chains() {
            let rep = &doc.mentions()[chain.representative()];
            let (name, entity_type) = (rep.text.clone(), rep.entity_type);
            let mut found =
                self.source.find(&name, entity_type, self.limit)?;
            found.truncate(self.limit);
            debug!(
                name = %name,
                entity_type = %entity_type,
                candidates = found.len(),
                "generated candidates"
            );
            for &member in &chain.members {
                doc.mentions_mut()[member].candidates = found.clone();
            }
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Error,
        coref::ExactMatchCoref,
        ids::{DocumentId, MentionId},
        kb::{AltNameRecord, EntityRecord, KnowledgeBase},
        model::{Mention, Span},
        name_index::ExactMatchIndex,
        stage::CoReferencer,
    };

    /// Returns a fixed list of ids.
    struct Fixed {
        ids: Vec<&'static str>,
    }

    impl Fixed {
        fn boxed(ids: &[&'static str]) -> Box<dyn CandidateSource> {
            Box::new(Self { ids: ids.to_vec() })
        }
    }

    impl CandidateSource for Fixed {
        fn find(
            &mut self,
            _name: &str,
            _entity_type: EntityType,
            limit: usize,
        ) -> Result<Vec<Candidate>> {
            Ok(self
                .ids
                .iter()
                .take(limit)
                .map(|id| Candidate::new(EntityId::new(*id)))
                .collect())
        }
    }

    fn ids(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.entity_id.as_str()).collect()
    }

    fn index() -> Arc<dyn NameIndex> {
        let kb = KnowledgeBase::from_records(
            vec![
                EntityRecord::new("Q1", "GPE", "Addis Ababa"),
                EntityRecord::new("Q2", "PER", "Addis Ababa"),
            ],
            vec![AltNameRecord::new("Q1", "AA")],
        )
        .unwrap();
        Arc::new(ExactMatchIndex::new(Arc::new(kb)))
    }

    fn doc(texts: &[&str]) -> Document {
        let mentions = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                Mention::new(
                    MentionId::new(format!("M{}", i + 1)),
                    t,
                    Span::new(i * 20, i * 20 + t.len()),
                    EntityType::GeoPolitical,
                )
            })
            .collect();
        Document::new(DocumentId::new("d"), mentions, Vec::new())
    }

    #[test]
    fn index_source_uses_type() {
        let mut typed = IndexSource::new(index());
        let mut untyped = IndexSource::untyped(index());
        let gpe = EntityType::GeoPolitical;
        assert_eq!(ids(&typed.find("Addis Ababa", gpe, 10).unwrap()), ["Q1"]);
        assert_eq!(
            ids(&untyped.find("Addis Ababa", gpe, 10).unwrap()),
            ["Q1", "Q2"]
        );
    }

    #[test]
    fn combining_source_unions_in_order() {
        let mut source = CombiningSource::new(vec![
            Fixed::boxed(&["a", "b"]),
            Fixed::boxed(&["b", "c"]),
        ]);
        let found = source.find("x", EntityType::Person, 10).unwrap();
        assert_eq!(ids(&found), ["a", "b", "c"]);
    }

    #[test]
    fn cascade_source_stops_when_full() {
        let mut source = CascadeSource::new(vec![
            Fixed::boxed(&["a", "b"]),
            Fixed::boxed(&["c"]),
        ]);
        let found = source.find("x", EntityType::Person, 2).unwrap();
        assert_eq!(ids(&found), ["a", "b"]);
        let found = source.find("x", EntityType::Person, 3).unwrap();
        assert_eq!(ids(&found), ["a", "b", "c"]);
    }

    #[test]
    fn caching_source_reuses_results() {
        let mut source = CachingSource::new(Fixed::boxed(&["a"]));
        source.find("Addis", EntityType::Person, 5).unwrap();
        source.find("ADDIS", EntityType::Person, 5).unwrap();
        source.find("Addis", EntityType::Location, 5).unwrap();
        assert_eq!(source.hits(), 1);
    }

    #[test]
    fn chain_members_share_candidates() {
        let d = ExactMatchCoref.coref(doc(&["AA", "Gondar", "aa"])).unwrap();
        let mut generator = ChainGenerator::from_index(index(), 10);
        let d = generator.generate(d).unwrap();
        assert_eq!(ids(&d.mentions()[0].candidates), ["Q1"]);
        assert_eq!(d.mentions()[0].candidates, d.mentions()[2].candidates);
        assert!(d.mentions()[1].candidates.is_empty());
    }

    #[test]
    fn limit_bounds_chain_candidates() {
        let d = doc(&["x"]);
        let mut generator =
            ChainGenerator::new(Fixed::boxed(&["a", "b", "c"]), 2);
        let d = generator.generate(d).unwrap();
        assert_eq!(d.mentions()[0].candidates.len(), 2);
    }

    #[test]
    fn malformed_query_fails_generation() {
        let mut generator = ChainGenerator::from_index(index(), 10);
        let err = generator.generate(doc(&["!!!"])).unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));
    }
}
