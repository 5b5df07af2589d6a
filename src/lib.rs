//! elink - a pluggable entity linking pipeline.
//!
//! elink reads mention-tagged CoNLL documents, groups co-referring
//! mentions into chains, looks up candidate entities in a knowledge base
//! loaded from GeoNames-style TSV files, and decides one entity (or NIL)
//! per chain. Each of those steps is a stage trait with several
//! interchangeable implementations.
//!
//! # Quick start
//!
//! ```no_run
//! use std::{path::Path, sync::Arc};
//!
//! use elink::{
//!     KnowledgeBase, Pipeline,
//!     candidates::ChainGenerator,
//!     coref::ExactMatchCoref,
//!     input::ConllReader,
//!     kb_source,
//!     name_index::ExactMatchIndex,
//!     output::TabWriter,
//!     preprocess::PassThrough,
//!     resolve::BestMatchResolver,
//! };
//!
//! let kb = kb_source::load_kb(
//!     &KnowledgeBase::builder(),
//!     Path::new("entities.tab"),
//!     Path::new("alternate_names.tab"),
//! )
//! .unwrap();
//! let index = Arc::new(ExactMatchIndex::new(Arc::new(kb)));
//!
//! let mut pipeline = Pipeline::builder()
//!     .preprocessor(Box::new(PassThrough))
//!     .coref(Box::new(ExactMatchCoref))
//!     .candidates(Box::new(ChainGenerator::from_index(index, 25)))
//!     .resolver(Box::new(BestMatchResolver))
//!     .build()
//!     .unwrap();
//!
//! let documents = ConllReader::open(Path::new("input.conll")).unwrap();
//! let mut writer = TabWriter::new(std::io::stdout(), "elink");
//! let report = pipeline.run(documents, &mut writer).unwrap();
//! eprintln!("{report}");
//! ```

pub mod candidates;
pub mod coref;
pub mod data_dir;
pub mod error;
pub mod eval;
pub mod fuzzy_index;
pub mod ids;
pub mod input;
pub mod kb;
pub mod kb_cache;
pub mod kb_source;
pub mod lang;
pub mod model;
pub mod name_index;
pub mod ngram_index;
pub mod output;
pub mod pipeline;
pub mod preprocess;
pub mod resolve;
pub mod stage;
pub mod text;

pub use data_dir::DataDir;
pub use error::{Error, Result};
pub use ids::{DocumentId, EntityId, MentionId};
pub use kb::KnowledgeBase;
pub use lang::Lang;
pub use model::{DocType, Document, Entity, EntityType, Link, Mention};
pub use pipeline::{Pipeline, PipelineBuilder, RunReport};
