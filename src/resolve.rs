//! Entity resolution.
//!
//! Most strategies here are partial: they decide the chains they are sure
//! about, may narrow the candidate lists of others, and leave the rest
//! undecided for the next resolver of a [`CascadeResolver`]. Narrowing
//! only ever removes candidates, and a link always names an entity taken
//! from the mention's own candidate list.

use std::{collections::HashSet, sync::Arc};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::debug;

use crate::{
    error::Result,
    ids::EntityId,
    kb::KnowledgeBase,
    lang::Lang,
    model::{Chain, Document, Entity, EntityType, Link},
    stage::Resolver,
};

/// Resolution of a single coreference chain.
///
/// Every `ChainResolver` is also a [`Resolver`] that visits each chain
/// still undecided.
pub trait ChainResolver {
    fn resolve_chain(
        &mut self,
        doc: &mut Document,
        chain: &Chain,
    ) -> Result<()>;
}

impl<R: ChainResolver> Resolver for R {
    fn resolve(&mut self, mut doc: Document) -> Result<Document> {
        for chain in doc.chains() {
            if is_undecided(&doc, &chain) {
                self.resolve_chain(&mut doc, &chain)?;
            }
        }
        Ok(doc)
    }
}

fn is_undecided(doc: &Document, chain: &Chain) -> bool {
    doc.mentions()[chain.representative()].link.is_none()
}

/// Link every member whose candidates include `id`.
fn link_chain(doc: &mut Document, chain: &Chain, id: &EntityId) {
    for &m in &chain.members {
        let mention = &mut doc.mentions_mut()[m];
        if mention.candidates.iter().any(|c| &c.entity_id == id) {
            mention.link = Some(Link::Entity(id.clone()));
        }
    }
}

/// Keep only the candidates in `keep`, preserving order.
fn narrow_chain(
    doc: &mut Document,
    chain: &Chain,
    keep: &HashSet<&EntityId>,
) {
    for &m in &chain.members {
        doc.mentions_mut()[m]
            .candidates
            .retain(|c| keep.contains(&c.entity_id));
    }
}

/// Candidate ids of the chain's representative whose entity satisfies
/// `matches`, in candidate order.
fn matching_candidates(
    kb: &KnowledgeBase,
    doc: &Document,
    chain: &Chain,
    mut matches: impl FnMut(&Entity) -> bool,
) -> Vec<EntityId> {
    doc.mentions()[chain.representative()]
        .candidates
        .iter()
        .filter(|c| kb.get(&c.entity_id).is_some_and(&mut matches))
        .map(|c| c.entity_id.clone())
        .collect()
}

/// One match links; several narrow the list; none leaves it alone.
fn link_or_narrow(doc: &mut Document, chain: &Chain, matches: &[EntityId]) {
    match matches {
        [] => {}
        [only] => link_chain(doc, chain, only),
        several => {
            let keep: HashSet<&EntityId> = several.iter().collect();
            narrow_chain(doc, chain, &keep);
        }
    }
}

/// Every surface string of a chain.
fn chain_texts(doc: &Document, chain: &Chain) -> Vec<String> {
    chain
        .members
        .iter()
        .map(|&m| doc.mentions()[m].text.clone())
        .collect()
}

/// Takes the highest scoring candidate of each mention, the first one on
/// ties or when candidates are unscored. A mention without candidates is
/// NIL.
#[derive(Debug, Default, Clone, Copy)]
pub struct BestMatchResolver;

impl ChainResolver for BestMatchResolver {
    fn resolve_chain(
        &mut self,
        doc: &mut Document,
        chain: &Chain,
    ) -> Result<()> {
        for &m in &chain.members {
            let mention = &mut doc.mentions_mut()[m];
            let mut best: Option<(f32, &EntityId)> = None;
            for candidate in &mention.candidates {
                let score = candidate.rank_score();
                if best.is_none_or(|(top, _)| score > top) {
                    best = Some((score, &candidate.entity_id));
                }
            }
            let link = match best {
                Some((_, id)) => Link::Entity(id.clone()),
                None => Link::Nil,
            };
            mention.link = Some(link);
        }
        Ok(())
    }
}

/// Picks the candidate with a KB name equal (ignoring case) to any mention
/// string of the chain.
pub struct ExactNameResolver {
    kb: Arc<KnowledgeBase>,
}

impl ExactNameResolver {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }
}

impl ChainResolver for ExactNameResolver {
    fn resolve_chain(
        &mut self,
        doc: &mut Document,
        chain: &Chain,
    ) -> Result<()> {
        let texts = chain_texts(doc, chain);
        let matches = matching_candidates(&self.kb, doc, chain, |entity| {
            texts.iter().any(|t| entity.has_name(t))
        });
        link_or_narrow(doc, chain, &matches);
        Ok(())
    }
}

/// Characters left alone when building a Wikipedia page URL.
const WIKI_TITLE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

/// English Wikipedia page URL for a title, without the scheme.
pub fn wikipedia_page(title: &str) -> String {
    let title = title.trim().replace(' ', "_").replace('\u{2019}', "'");
    format!(
        "en.wikipedia.org/wiki/{}",
        utf8_percent_encode(&title, WIKI_TITLE)
    )
}

fn strip_scheme(url: &str) -> &str {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
}

/// Picks the candidate whose external links include the English Wikipedia
/// page named by a mention string.
///
/// Does not handle pages qualified by a region, such as
/// `Columbia,_Maryland`.
pub struct WikipediaResolver {
    kb: Arc<KnowledgeBase>,
}

impl WikipediaResolver {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }
}

impl ChainResolver for WikipediaResolver {
    fn resolve_chain(
        &mut self,
        doc: &mut Document,
        chain: &Chain,
    ) -> Result<()> {
        let pages: HashSet<String> = chain_texts(doc, chain)
            .iter()
            .map(|t| wikipedia_page(t).to_lowercase())
            .collect();
        let matches = matching_candidates(&self.kb, doc, chain, |entity| {
            entity
                .urls
                .iter()
                .any(|u| pages.contains(&strip_scheme(u).to_lowercase()))
        });
        link_or_narrow(doc, chain, &matches);
        Ok(())
    }
}

/// Default cut-off for [`EditDistanceResolver`].
pub const DEFAULT_EDIT_THRESHOLD: f64 = 0.1;

/// Picks the candidate with the smallest length-normalized edit distance
/// between any of its names and any chain string, if that distance is
/// below the threshold.
pub struct EditDistanceResolver {
    kb: Arc<KnowledgeBase>,
    threshold: f64,
}

impl EditDistanceResolver {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self::with_threshold(kb, DEFAULT_EDIT_THRESHOLD)
    }

    pub fn with_threshold(kb: Arc<KnowledgeBase>, threshold: f64) -> Self {
        Self { kb, threshold }
    }
}

impl ChainResolver for EditDistanceResolver {
    fn resolve_chain(
        &mut self,
        doc: &mut Document,
        chain: &Chain,
    ) -> Result<()> {
        let texts: Vec<String> = chain_texts(doc, chain)
            .iter()
            .map(|t| t.to_lowercase())
            .collect();

        let mut best: Option<(f64, EntityId)> = None;
        for candidate in &doc.mentions()[chain.representative()].candidates {
            let Some(entity) = self.kb.get(&candidate.entity_id) else {
                continue;
            };
            for name in &entity.names {
                let name = name.to_lowercase();
                for text in &texts {
                    let d = 1.0 - strsim::normalized_levenshtein(text, &name);
                    if best.as_ref().is_none_or(|(top, _)| d < *top) {
                        best = Some((d, candidate.entity_id.clone()));
                    }
                }
            }
        }

        if let Some((distance, id)) = best
            && distance < self.threshold
        {
            debug!(entity = %id, distance, "edit distance match");
            link_chain(doc, chain, &id);
        }
        Ok(())
    }
}

/// Runs a resolver only on chains of the given types.
pub struct TypeSpecificResolver {
    inner: Box<dyn ChainResolver>,
    types: Vec<EntityType>,
}

impl TypeSpecificResolver {
    pub fn new(inner: Box<dyn ChainResolver>, types: &[EntityType]) -> Self {
        Self {
            inner,
            types: types.to_vec(),
        }
    }
}

impl ChainResolver for TypeSpecificResolver {
    fn resolve_chain(
        &mut self,
        doc: &mut Document,
        chain: &Chain,
    ) -> Result<()> {
        let entity_type = doc.mentions()[chain.representative()].entity_type;
        if self.types.contains(&entity_type) {
            self.inner.resolve_chain(doc, chain)?;
        }
        Ok(())
    }
}

/// Runs a resolver only on documents in one of the given languages.
pub struct LanguageSpecificResolver {
    inner: Box<dyn ChainResolver>,
    langs: Vec<Lang>,
}

impl LanguageSpecificResolver {
    pub fn new(inner: Box<dyn ChainResolver>, langs: &[Lang]) -> Self {
        Self {
            inner,
            langs: langs.to_vec(),
        }
    }
}

impl ChainResolver for LanguageSpecificResolver {
    fn resolve_chain(
        &mut self,
        doc: &mut Document,
        chain: &Chain,
    ) -> Result<()> {
        if doc.lang().is_some_and(|lang| self.langs.contains(&lang)) {
            self.inner.resolve_chain(doc, chain)?;
        }
        Ok(())
    }
}

/// Runs resolvers in order on the chains still undecided; whatever no
/// resolver decides becomes NIL.
pub struct CascadeResolver {
    resolvers: Vec<Box<dyn ChainResolver>>,
}

impl CascadeResolver {
    pub fn new(resolvers: Vec<Box<dyn ChainResolver>>) -> Self {
        Self { resolvers }
    }
}

impl Default for CascadeResolver {
    fn default() -> Self {
        Self::new(vec![Box::new(BestMatchResolver)])
    }
}

impl Resolver for CascadeResolver {
    fn resolve(&mut self, mut doc: Document) -> Result<Document> {
        let chains = doc.chains();
        for resolver in &mut self.resolvers {
            for chain in &chains {
                if is_undecided(&doc, chain) {
                    resolver.resolve_chain(&mut doc, chain)?;
                }
            }
        }
        for mention in doc.mentions_mut() {
            if mention.link.is_none() {
                mention.link = Some(Link::Nil);
            }
        }
        Ok(doc)
    }
}
