use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a knowledge base entity, as given by the KB source.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Identifier of a source document (the doc id column of the input).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifier of a single mention, unique across a corpus run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MentionId(String);

impl MentionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MentionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a coreference chain.
///
/// Chain ids embed the owning document id, so two documents can never
/// produce the same chain id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainId {
    document: DocumentId,
    ordinal: usize,
}

impl ChainId {
    pub(crate) fn new(document: &DocumentId, ordinal: usize) -> Self {
        Self {
            document: document.clone(),
            ordinal,
        }
    }

    pub fn document(&self) -> &DocumentId {
        &self.document
    }

    /// Position of the chain within its document (1-indexed, in order of
    /// first mention).
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:C{}", self.document, self.ordinal)
    }
}

/// Hands out sequential mention ids (`M1`, `M2`, ...) for one run.
///
/// Not shared between readers; each reader owns its assigner.
#[derive(Debug)]
pub struct MentionIdAssigner {
    next: u64,
}

impl Default for MentionIdAssigner {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl MentionIdAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self) -> MentionId {
        let id = MentionId(format!("M{}", self.next));
        self.next += 1;
        id
    }
}
