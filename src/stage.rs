//! The four stage roles a pipeline is composed of.
//!
//! Each role has one method that takes ownership of a [`Document`] and
//! hands it back enriched. Implementations may edit mention fields but
//! cannot add, drop or reorder mentions; the executor checks this after
//! every stage.

use std::fmt;

use crate::{error::Result, model::Document};

/// Position of a document in the stage chain, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Read,
    Preprocess,
    CoRef,
    CandidateGen,
    Resolve,
    Write,
}

impl StageKind {
    /// The stages a pipeline owns, in execution order.
    pub const TRANSFORMS: [StageKind; 4] = [
        StageKind::Preprocess,
        StageKind::CoRef,
        StageKind::CandidateGen,
        StageKind::Resolve,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Preprocess => "preprocess",
            Self::CoRef => "coref",
            Self::CandidateGen => "candidate generation",
            Self::Resolve => "resolve",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cleans mention surface text before coreference.
pub trait Preprocessor {
    fn preprocess(&mut self, doc: Document) -> Result<Document>;
}

/// Groups the mentions of one document into coreference chains.
///
/// Must depend on the document alone; nothing may carry over from one
/// document to the next.
pub trait CoReferencer {
    fn coref(&mut self, doc: Document) -> Result<Document>;
}

/// Fills in a bounded, ordered candidate list for every mention.
///
/// Zero matches is not an error; only a malformed query is.
pub trait CandidateGenerator {
    fn generate(&mut self, doc: Document) -> Result<Document>;
}

/// Picks at most one candidate per mention, or decides NIL.
pub trait Resolver {
    fn resolve(&mut self, doc: Document) -> Result<Document>;
}
