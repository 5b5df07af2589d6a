use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    ids::{ChainId, DocumentId, EntityId, MentionId},
    lang::Lang,
};

/// Coarse entity categories shared by KB entries and mentions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
pub enum EntityType {
    #[serde(rename = "PER")]
    Person,
    #[serde(rename = "ORG")]
    Organization,
    #[serde(rename = "GPE")]
    GeoPolitical,
    #[serde(rename = "LOC")]
    Location,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        EntityType::Person,
        EntityType::Organization,
        EntityType::GeoPolitical,
        EntityType::Location,
    ];

    /// Parse a type label case-insensitively (`per`, `ORG`, ...).
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "PER" => Some(Self::Person),
            "ORG" => Some(Self::Organization),
            "GPE" => Some(Self::GeoPolitical),
            "LOC" => Some(Self::Location),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Person => "PER",
            Self::Organization => "ORG",
            Self::GeoPolitical => "GPE",
            Self::Location => "LOC",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A knowledge base record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub entity_type: EntityType,
    /// Canonical name. Always the first element of `names`.
    pub name: String,
    /// Canonical plus alternate names, duplicates removed, load order kept.
    pub names: Vec<String>,
    pub origin: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub country_code: Option<String>,
    pub population: Option<u64>,
    pub urls: Vec<String>,
}

impl Entity {
    pub fn new(
        id: impl Into<EntityId>,
        entity_type: EntityType,
        name: &str,
    ) -> Self {
        Self {
            id: id.into(),
            entity_type,
            name: name.to_string(),
            names: vec![name.to_string()],
            origin: String::new(),
            latitude: None,
            longitude: None,
            country_code: None,
            population: None,
            urls: Vec::new(),
        }
    }

    /// Add an alternate name. Returns false if it was already present.
    pub fn add_name(&mut self, name: &str) -> bool {
        if name.is_empty() || self.names.iter().any(|n| n == name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    /// Case-insensitive check against every known name.
    pub fn has_name(&self, name: &str) -> bool {
        let needle = name.to_lowercase();
        self.names.iter().any(|n| n.to_lowercase() == needle)
    }
}

/// Half-open `[start, end)` offsets, in characters or tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A KB entity proposed for a mention.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub entity_id: EntityId,
    /// Strategy-specific match score; higher is better.
    pub score: Option<f32>,
}

impl Candidate {
    pub fn new(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            score: None,
        }
    }

    pub fn scored(entity_id: EntityId, score: f32) -> Self {
        Self {
            entity_id,
            score: Some(score),
        }
    }

    /// The score used for ranking. Unscored candidates rank below every
    /// scored one.
    pub fn rank_score(&self) -> f32 {
        self.score.unwrap_or(f32::NEG_INFINITY)
    }
}

/// Final decision for a mention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    Entity(EntityId),
    Nil,
}

impl Link {
    pub fn entity_id(&self) -> Option<&EntityId> {
        match self {
            Link::Entity(id) => Some(id),
            Link::Nil => None,
        }
    }
}

/// One occurrence of an entity reference inside a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Mention {
    pub id: MentionId,
    /// Working surface string; preprocessors may rewrite it.
    pub text: String,
    /// Surface string as read; written to output unchanged.
    pub original_text: String,
    pub span: Span,
    pub token_span: Span,
    pub entity_type: EntityType,
    pub chain: Option<ChainId>,
    pub candidates: Vec<Candidate>,
    /// `None` until a resolver decides.
    pub link: Option<Link>,
}

impl Mention {
    pub fn new(
        id: MentionId,
        text: &str,
        span: Span,
        entity_type: EntityType,
    ) -> Self {
        Self {
            id,
            text: text.to_string(),
            original_text: text.to_string(),
            span,
            token_span: Span::new(0, 0),
            entity_type,
            chain: None,
            candidates: Vec::new(),
            link: None,
        }
    }

    pub fn with_token_span(mut self, token_span: Span) -> Self {
        self.token_span = token_span;
        self
    }

    pub fn is_linked(&self) -> bool {
        matches!(self.link, Some(Link::Entity(_)))
    }
}

/// Mentions of one document that share a coreference chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub id: Option<ChainId>,
    /// Indices into the document's mentions, ascending. Never empty.
    pub members: Vec<usize>,
}

impl Chain {
    /// The mention that stands for the chain (its first member).
    pub fn representative(&self) -> usize {
        self.members[0]
    }
}

/// Genre of a source document, encoded in LoReHLT document ids such as
/// `IL5_NW_020595_20160501_H0040NHRF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocType {
    News,
    SocialNetwork,
    DiscussionForum,
    Weblog,
    Reference,
}

impl DocType {
    pub fn detect(id: &DocumentId) -> Option<Self> {
        id.as_str().split('_').nth(1).and_then(Self::parse)
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "NW" => Some(Self::News),
            "SN" => Some(Self::SocialNetwork),
            "DF" => Some(Self::DiscussionForum),
            "WL" => Some(Self::Weblog),
            "RF" => Some(Self::Reference),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::News => "NW",
            Self::SocialNetwork => "SN",
            Self::DiscussionForum => "DF",
            Self::Weblog => "WL",
            Self::Reference => "RF",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered list of mentions from one source text.
///
/// The mention list can be edited in place but never grown, shrunk or
/// replaced, so stages can only enrich mentions.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: DocumentId,
    mentions: Vec<Mention>,
    tokens: Vec<String>,
    lang: Option<Lang>,
    doc_type: Option<DocType>,
}

impl Document {
    /// The document type is taken from the id; the language starts out
    /// unknown.
    pub fn new(
        id: DocumentId,
        mentions: Vec<Mention>,
        tokens: Vec<String>,
    ) -> Self {
        let doc_type = DocType::detect(&id);
        Self {
            id,
            mentions,
            tokens,
            lang: None,
            doc_type,
        }
    }

    pub fn with_lang(mut self, lang: Option<Lang>) -> Self {
        self.lang = lang;
        self
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn lang(&self) -> Option<Lang> {
        self.lang
    }

    pub fn doc_type(&self) -> Option<DocType> {
        self.doc_type
    }

    pub fn mentions(&self) -> &[Mention] {
        &self.mentions
    }

    pub fn mentions_mut(&mut self) -> &mut [Mention] {
        &mut self.mentions
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Group mentions by chain id, ordered by each chain's first mention.
    ///
    /// Mentions that have no chain yet each form their own group.
    pub fn chains(&self) -> Vec<Chain> {
        let mut chains: Vec<Chain> = Vec::new();
        let mut by_id: HashMap<&ChainId, usize> = HashMap::new();
        for (idx, mention) in self.mentions.iter().enumerate() {
            match &mention.chain {
                Some(chain_id) => {
                    if let Some(&pos) = by_id.get(chain_id) {
                        chains[pos].members.push(idx);
                    } else {
                        by_id.insert(chain_id, chains.len());
                        chains.push(Chain {
                            id: Some(chain_id.clone()),
                            members: vec![idx],
                        });
                    }
                }
                None => chains.push(Chain {
                    id: None,
                    members: vec![idx],
                }),
            }
        }
        chains
    }

    /// Mint chain ids from groups of mention indices.
    ///
    /// Indices not covered by any group become singletons; out-of-range
    /// indices are ignored, and an index listed twice stays in the first
    /// group that claimed it. Ordinals follow first-mention order.
    pub fn assign_chains(&mut self, groups: Vec<Vec<usize>>) {
        let n = self.mentions.len();
        let mut owner: Vec<Option<usize>> = vec![None; n];
        for (g, group) in groups.iter().enumerate() {
            for &idx in group {
                if idx < n && owner[idx].is_none() {
                    owner[idx] = Some(g);
                }
            }
        }

        let mut ordinal_of_group: HashMap<usize, usize> = HashMap::new();
        let mut next = 1;
        for (idx, slot) in owner.iter().enumerate() {
            let ordinal = match slot {
                Some(g) => *ordinal_of_group.entry(*g).or_insert_with(|| {
                    let o = next;
                    next += 1;
                    o
                }),
                None => {
                    let o = next;
                    next += 1;
                    o
                }
            };
            self.mentions[idx].chain = Some(ChainId::new(&self.id, ordinal));
        }
    }

    pub fn mention_ids(&self) -> Vec<MentionId> {
        self.mentions.iter().map(|m| m.id.clone()).collect()
    }

    pub fn linked_count(&self) -> usize {
        self.mentions.iter().filter(|m| m.is_linked()).count()
    }

    pub fn nil_count(&self) -> usize {
        self.mentions.len() - self.linked_count()
    }
}
