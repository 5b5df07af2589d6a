use std::{collections::HashMap, sync::Arc};

use tantivy::{
    Index,
    IndexReader,
    IndexWriter,
    TantivyDocument,
    Term,
    collector::TopDocs,
    doc,
    query::{BooleanQuery, BoostQuery, FuzzyTermQuery, Occur, Query, TermQuery},
    schema::*,
    tokenizer::{
        LowerCaser,
        RemoveLongFilter,
        TextAnalyzer,
        WhitespaceTokenizer,
    },
};
use tracing::debug;

use crate::{
    error::Result,
    kb::KnowledgeBase,
    model::{Candidate, EntityType},
    name_index::{NameIndex, TieBreak, check_query},
    text,
};

/// Field names used in the schema.
pub mod fields {
    pub const POSITION: &str = "position";
    pub const ENTITY_TYPE: &str = "entity_type";
    pub const NAME: &str = "name";
    pub const NAME_KEY: &str = "name_key";
}

const NAME_TOKENIZER: &str = "kb_name";
const WRITER_MEMORY: usize = 50_000_000;

/// Tokens shorter than this are matched exactly.
const MIN_FUZZY_LEN: usize = 4;
const EXACT_NAME_BOOST: f32 = 2.0;

/// Resolved field handles for the schema.
#[derive(Clone, Copy)]
struct SchemaFields {
    position: Field,
    entity_type: Field,
    name: Field,
    name_key: Field,
}

fn build_schema() -> (Schema, SchemaFields) {
    let mut builder = Schema::builder();

    let position = builder.add_u64_field(fields::POSITION, STORED | FAST);
    let entity_type = builder.add_text_field(fields::ENTITY_TYPE, STRING);
    let name_opts = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(NAME_TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    );
    let name = builder.add_text_field(fields::NAME, name_opts);
    let name_key = builder.add_text_field(fields::NAME_KEY, STRING);

    let schema = builder.build();
    let fields = SchemaFields {
        position,
        entity_type,
        name,
        name_key,
    };

    (schema, fields)
}

fn register_tokenizers(index: &Index) {
    let analyzer = TextAnalyzer::builder(WhitespaceTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .build();
    index.tokenizers().register(NAME_TOKENIZER, analyzer);
}

/// Edit-distance name index backed by an in-memory Tantivy index.
///
/// Every KB name is one Tantivy document. Query tokens of at least four
/// characters match within Levenshtein distance 1 (a transposition
/// counts as one edit); shorter tokens must match exactly. A name equal
/// to the whole query gets an extra boost. Results are deduplicated by
/// entity, keeping the best scoring name.
pub struct FuzzyNameIndex {
    kb: Arc<KnowledgeBase>,
    reader: IndexReader,
    fields: SchemaFields,
    tie_break: TieBreak,
}

impl FuzzyNameIndex {
    pub fn new(kb: Arc<KnowledgeBase>) -> Result<Self> {
        Self::with_tie_break(kb, TieBreak::default())
    }

    pub fn with_tie_break(
        kb: Arc<KnowledgeBase>,
        tie_break: TieBreak,
    ) -> Result<Self> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);
        register_tokenizers(&index);

        let mut writer: IndexWriter =
            index.writer_with_num_threads(1, WRITER_MEMORY)?;
        let mut count = 0usize;
        for (pos, entity) in kb.all_entities().enumerate() {
            for name in &entity.names {
                let normalized = text::normalize_name(name);
                if normalized.is_empty() {
                    continue;
                }
                writer.add_document(doc!(
                    fields.position => pos as u64,
                    fields.entity_type => entity.entity_type.as_str(),
                    fields.name => normalized.as_str(),
                    fields.name_key => normalized.as_str(),
                ))?;
                count += 1;
            }
        }
        writer.commit()?;
        debug!(names = count, "built fuzzy name index");

        let reader = index.reader()?;
        reader.reload()?;

        Ok(Self {
            kb,
            reader,
            fields,
            tie_break,
        })
    }

    fn build_query(
        &self,
        normalized: &str,
        entity_type: Option<EntityType>,
    ) -> Box<dyn Query> {
        let f = self.fields;
        let mut should: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        for token in normalized.split_whitespace() {
            let term = Term::from_field_text(f.name, token);
            let clause: Box<dyn Query> =
                if token.chars().count() >= MIN_FUZZY_LEN {
                    Box::new(FuzzyTermQuery::new(term, 1, true))
                } else {
                    Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs))
                };
            should.push((Occur::Should, clause));
        }

        let whole = TermQuery::new(
            Term::from_field_text(f.name_key, normalized),
            IndexRecordOption::Basic,
        );
        should.push((
            Occur::Should,
            Box::new(BoostQuery::new(Box::new(whole), EXACT_NAME_BOOST)),
        ));

        let matched: Box<dyn Query> = Box::new(BooleanQuery::new(should));
        match entity_type {
            Some(t) => {
                let type_query = TermQuery::new(
                    Term::from_field_text(f.entity_type, t.as_str()),
                    IndexRecordOption::Basic,
                );
                Box::new(BooleanQuery::new(vec![
                    (Occur::Must, matched),
                    (Occur::Must, Box::new(type_query)),
                ]))
            }
            None => matched,
        }
    }
}

impl NameIndex for FuzzyNameIndex {
    fn query(
        &self,
        name: &str,
        entity_type: Option<EntityType>,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        check_query(name)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let normalized = text::normalize_name(name);
        let query = self.build_query(&normalized, entity_type);

        // Several names can belong to one entity, so over-fetch before
        // deduplicating.
        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(&*query, &TopDocs::with_limit(limit.saturating_mul(4)))?;

        let mut best: HashMap<u64, f32> = HashMap::new();
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            let Some(pos) =
                doc.get_first(self.fields.position).and_then(|v| v.as_u64())
            else {
                continue;
            };
            let slot = best.entry(pos).or_insert(score);
            *slot = slot.max(score);
        }

        let entities = self.kb.entities();
        let mut candidates: Vec<Candidate> = best
            .into_iter()
            .filter_map(|(pos, score)| {
                let entity = entities.get(pos as usize)?;
                Some(Candidate::scored(entity.id.clone(), score))
            })
            .collect();
        self.tie_break.sort(&self.kb, &mut candidates);
        candidates.truncate(limit);
        Ok(candidates)
    }
}

impl std::fmt::Debug for FuzzyNameIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuzzyNameIndex").finish_non_exhaustive()
    }
}
