//! In-document coreference.
//!
//! Chains never cross documents: every strategy works on the mentions of
//! the document it was handed and mints chain ids through
//! [`Document::assign_chains`], which scopes them to that document.

use std::collections::HashMap;

use tracing::debug;

use crate::{
    error::Result,
    lang::Lang,
    model::{Document, EntityType},
    stage::CoReferencer,
    text,
};

/// Every mention is its own chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnchainedCoref;

impl CoReferencer for UnchainedCoref {
    fn coref(&mut self, mut doc: Document) -> Result<Document> {
        doc.assign_chains(Vec::new());
        Ok(doc)
    }
}

/// Chains mentions of the same type whose text matches ignoring case and
/// extra whitespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactMatchCoref;

impl CoReferencer for ExactMatchCoref {
    fn coref(&mut self, mut doc: Document) -> Result<Document> {
        let mut sets = DisjointSets::new(doc.mentions().len());
        ExactMatchSieve.apply(&doc, &mut sets);
        doc.assign_chains(sets.groups());
        Ok(doc)
    }
}

/// Union-find over mention indices.
#[derive(Debug, Clone)]
pub struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    pub fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// Merge the sets of `a` and `b`. The smaller index stays the root so
    /// results do not depend on merge order.
    pub fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }

    pub fn same(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    /// Members of every set with more than one element, ascending.
    pub fn groups(&mut self) -> Vec<Vec<usize>> {
        let mut by_root: HashMap<usize, Vec<usize>> = HashMap::new();
        for i in 0..self.parent.len() {
            let root = self.find(i);
            by_root.entry(root).or_default().push(i);
        }
        let mut groups: Vec<Vec<usize>> =
            by_root.into_values().filter(|g| g.len() > 1).collect();
        groups.sort_by_key(|g| g[0]);
        groups
    }
}

/// One pass of a sieve: merges sets of mentions it believes corefer.
/// Set indices are positions in `doc.mentions()`.
pub trait CorefSieve: Send {
    fn apply(&self, doc: &Document, sets: &mut DisjointSets);
}

/// Multi-pass sieve coreference. Every mention starts alone and each
/// sieve, in order, may merge chains. Put high-precision sieves first.
pub struct SieveCoref {
    sieves: Vec<Box<dyn CorefSieve>>,
}

impl SieveCoref {
    pub fn new(sieves: Vec<Box<dyn CorefSieve>>) -> Self {
        Self { sieves }
    }
}

impl Default for SieveCoref {
    fn default() -> Self {
        Self::new(vec![
            Box::new(ExactMatchSieve),
            Box::new(AcronymSieve::new(2)),
            Box::new(TypeSpecificSieve::new(
                Box::new(SingleTokenSieve::new(TokenPosition::Last)),
                &[EntityType::Person],
            )),
        ])
    }
}

impl CoReferencer for SieveCoref {
    fn coref(&mut self, mut doc: Document) -> Result<Document> {
        let mut sets = DisjointSets::new(doc.mentions().len());
        for sieve in &self.sieves {
            sieve.apply(&doc, &mut sets);
        }
        let groups = sets.groups();
        debug!(
            document = %doc.id(),
            mentions = doc.mentions().len(),
            merged_chains = groups.len(),
            "sieve coreference"
        );
        doc.assign_chains(groups);
        Ok(doc)
    }
}

/// Same type and same text, ignoring case and extra whitespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactMatchSieve;

impl CorefSieve for ExactMatchSieve {
    fn apply(&self, doc: &Document, sets: &mut DisjointSets) {
        let mut first: HashMap<(EntityType, String), usize> = HashMap::new();
        for (i, mention) in doc.mentions().iter().enumerate() {
            let key = (mention.entity_type, text::name_key(&mention.text));
            match first.get(&key) {
                Some(&j) => sets.union(j, i),
                None => {
                    first.insert(key, i);
                }
            }
        }
    }
}

/// Links an all-caps mention such as "AU" to the first multi-word mention
/// of the same type whose initials spell it ("African Union").
///
/// Only works for scripts with case, and does not skip words like "of".
#[derive(Debug, Clone, Copy)]
pub struct AcronymSieve {
    min_len: usize,
}

impl AcronymSieve {
    pub fn new(min_len: usize) -> Self {
        Self { min_len }
    }
}

impl CorefSieve for AcronymSieve {
    fn apply(&self, doc: &Document, sets: &mut DisjointSets) {
        let mentions = doc.mentions();
        for (i, mention) in mentions.iter().enumerate() {
            let acronym: String =
                mention.text.chars().filter(|&c| c != '.').collect();
            if !text::looks_like_acronym(&acronym, self.min_len) {
                continue;
            }
            let expansion = mentions.iter().enumerate().find(|(j, other)| {
                *j != i
                    && other.entity_type == mention.entity_type
                    && other.text.split_whitespace().count() > 1
                    && text::initials(&other.text) == acronym
            });
            if let Some((j, _)) = expansion {
                sets.union(i, j);
            }
        }
    }
}

/// Which token of a multi-word name a single-token mention is compared to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPosition {
    First,
    Last,
}

/// Merges a single-token mention with every multi-word mention of the same
/// type whose first (or last) token matches it, ignoring case.
///
/// Aggressive: two people sharing a surname end up in one chain, so it
/// is usually wrapped in a [`TypeSpecificSieve`].
#[derive(Debug, Clone, Copy)]
pub struct SingleTokenSieve {
    position: TokenPosition,
}

impl SingleTokenSieve {
    pub fn new(position: TokenPosition) -> Self {
        Self { position }
    }

    fn token<'a>(&self, name: &'a str) -> Option<&'a str> {
        let mut tokens = name.split_whitespace();
        match self.position {
            TokenPosition::First => tokens.next(),
            TokenPosition::Last => tokens.next_back(),
        }
    }
}

impl CorefSieve for SingleTokenSieve {
    fn apply(&self, doc: &Document, sets: &mut DisjointSets) {
        let mentions = doc.mentions();
        for (i, single) in mentions.iter().enumerate() {
            if single.text.split_whitespace().count() != 1 {
                continue;
            }
            let needle = single.text.trim().to_lowercase();
            for (j, other) in mentions.iter().enumerate() {
                if other.entity_type != single.entity_type
                    || other.text.split_whitespace().count() < 2
                {
                    continue;
                }
                if self
                    .token(&other.text)
                    .is_some_and(|t| t.to_lowercase() == needle)
                {
                    sets.union(i, j);
                }
            }
        }
    }
}

/// Runs its sieve only on documents in one of the given languages.
/// Documents of unknown language are left alone.
pub struct LanguageSpecificSieve {
    sieve: Box<dyn CorefSieve>,
    langs: Vec<Lang>,
}

impl LanguageSpecificSieve {
    pub fn new(sieve: Box<dyn CorefSieve>, langs: &[Lang]) -> Self {
        Self {
            sieve,
            langs: langs.to_vec(),
        }
    }
}

impl CorefSieve for LanguageSpecificSieve {
    fn apply(&self, doc: &Document, sets: &mut DisjointSets) {
        if doc.lang().is_some_and(|lang| self.langs.contains(&lang)) {
            self.sieve.apply(doc, sets);
        }
    }
}

/// Runs its sieve on the mentions of the given types only, as if the
/// document held nothing else.
pub struct TypeSpecificSieve {
    sieve: Box<dyn CorefSieve>,
    types: Vec<EntityType>,
}

impl TypeSpecificSieve {
    pub fn new(sieve: Box<dyn CorefSieve>, types: &[EntityType]) -> Self {
        Self {
            sieve,
            types: types.to_vec(),
        }
    }
}

impl CorefSieve for TypeSpecificSieve {
    fn apply(&self, doc: &Document, sets: &mut DisjointSets) {
        let picked: Vec<usize> = doc
            .mentions()
            .iter()
            .enumerate()
            .filter(|(_, m)| self.types.contains(&m.entity_type))
            .map(|(i, _)| i)
            .collect();
        if picked.is_empty() {
            return;
        }

        let mentions = picked.iter().map(|&i| doc.mentions()[i].clone());
        let view = Document::new(
            doc.id().clone(),
            mentions.collect(),
            doc.tokens().to_vec(),
        )
        .with_lang(doc.lang());
        let mut local = DisjointSets::new(picked.len());
        self.sieve.apply(&view, &mut local);
        for group in local.groups() {
            for pair in group.windows(2) {
                sets.union(picked[pair[0]], picked[pair[1]]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ids::{DocumentId, MentionId},
        model::{
            EntityType::{
                GeoPolitical as Gpe,
                Organization as Org,
                Person as Per,
            },
            Mention,
            Span,
        },
    };

    fn doc(id: &str, texts: &[(&str, EntityType)]) -> Document {
        let mentions = texts
            .iter()
            .enumerate()
            .map(|(i, (t, ty))| {
                Mention::new(
                    MentionId::new(format!("M{}", i + 1)),
                    t,
                    Span::new(i * 20, i * 20 + t.len()),
                    *ty,
                )
            })
            .collect();
        Document::new(DocumentId::new(id), mentions, Vec::new())
    }

    fn member_groups(doc: &Document) -> Vec<Vec<usize>> {
        doc.chains().into_iter().map(|c| c.members).collect()
    }

    #[test]
    fn unchained_gives_every_mention_a_chain() {
        let d = UnchainedCoref
            .coref(doc("d", &[("Ed", Per), ("Ed", Per)]))
            .unwrap();
        assert_eq!(member_groups(&d), vec![vec![0], vec![1]]);
        assert!(d.mentions().iter().all(|m| m.chain.is_some()));
    }

    #[test]
    fn exact_match_respects_type() {
        let d = ExactMatchCoref
            .coref(doc(
                "d",
                &[("Jordan", Per), ("Jordan", Gpe), ("JORDAN", Per)],
            ))
            .unwrap();
        assert_eq!(member_groups(&d), vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn acronym_links_first_expansion() {
        let d = SieveCoref::new(vec![Box::new(AcronymSieve::new(2))])
            .coref(doc(
                "d",
                &[
                    ("AU", Org),
                    ("African Union", Org),
                    ("Addis University", Org),
                ],
            ))
            .unwrap();
        assert_eq!(member_groups(&d), vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn acronym_ignores_dots_and_other_types() {
        let d = SieveCoref::new(vec![Box::new(AcronymSieve::new(2))])
            .coref(doc("d", &[("U.S.", Gpe), ("United States", Org)]))
            .unwrap();
        assert_eq!(member_groups(&d), vec![vec![0], vec![1]]);
    }

    #[test]
    fn single_token_matches_last_name() {
        let sieve = SingleTokenSieve::new(TokenPosition::Last);
        let d = SieveCoref::new(vec![Box::new(sieve)])
            .coref(doc(
                "d",
                &[("Abebe Bikila", Per), ("Meskel", Per), ("bikila", Per)],
            ))
            .unwrap();
        assert_eq!(member_groups(&d), vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn single_token_first_position() {
        let sieve = SingleTokenSieve::new(TokenPosition::First);
        let d = SieveCoref::new(vec![Box::new(sieve)])
            .coref(doc("d", &[("Abebe", Per), ("Abebe Bikila", Per)]))
            .unwrap();
        assert_eq!(member_groups(&d), vec![vec![0, 1]]);
    }

    #[test]
    fn chain_ids_are_scoped_to_document() {
        let a = ExactMatchCoref.coref(doc("a", &[("Ed", Per)])).unwrap();
        let b = ExactMatchCoref.coref(doc("b", &[("Ed", Per)])).unwrap();
        assert_ne!(a.mentions()[0].chain, b.mentions()[0].chain);
    }

    #[test]
    fn default_sieve_chains_transitively() {
        let d = SieveCoref::default()
            .coref(doc(
                "d",
                &[
                    ("Abebe Bikila", Per),
                    ("Bikila", Per),
                    ("bikila", Per),
                    ("Addis Ababa", Gpe),
                ],
            ))
            .unwrap();
        assert_eq!(member_groups(&d), vec![vec![0, 1, 2], vec![3]]);
    }

    #[test]
    fn disjoint_sets_roots_are_smallest() {
        let mut sets = DisjointSets::new(4);
        sets.union(3, 1);
        sets.union(1, 2);
        assert!(sets.same(2, 3));
        assert_eq!(sets.find(3), 1);
        assert_eq!(sets.groups(), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn type_specific_sieve_skips_other_types() {
        let sieve = TypeSpecificSieve::new(
            Box::new(SingleTokenSieve::new(TokenPosition::Last)),
            &[Per],
        );
        let d = SieveCoref::new(vec![Box::new(sieve)])
            .coref(doc(
                "d",
                &[
                    ("Addis Ababa", Gpe),
                    ("Abebe Bikila", Per),
                    ("Ababa", Gpe),
                    ("Bikila", Per),
                ],
            ))
            .unwrap();
        assert_eq!(member_groups(&d), vec![vec![0], vec![1, 3], vec![2]]);
    }

    #[test]
    fn language_specific_sieve_needs_a_known_language() {
        let amharic = Lang::from_code("am").unwrap();
        let sieve = || {
            let exact: Box<dyn CorefSieve> = Box::new(ExactMatchSieve);
            Box::new(LanguageSpecificSieve::new(exact, &[amharic]))
                as Box<dyn CorefSieve>
        };
        let mentions: &[(&str, EntityType)] = &[("Ed", Per), ("Ed", Per)];

        let unknown = SieveCoref::new(vec![sieve()])
            .coref(doc("d", mentions))
            .unwrap();
        assert_eq!(member_groups(&unknown), vec![vec![0], vec![1]]);

        let english = doc("d", mentions).with_lang(Some(Lang::ENGLISH));
        let english = SieveCoref::new(vec![sieve()]).coref(english).unwrap();
        assert_eq!(member_groups(&english), vec![vec![0], vec![1]]);

        let tagged = doc("d", mentions).with_lang(Some(amharic));
        let tagged = SieveCoref::new(vec![sieve()]).coref(tagged).unwrap();
        assert_eq!(member_groups(&tagged), vec![vec![0, 1]]);
    }
}
