use std::sync::Arc;

use elink::{
    Document,
    DocumentId,
    EntityType,
    KnowledgeBase,
    Link,
    Mention,
    MentionId,
    Pipeline,
    candidates::ChainGenerator,
    coref::{ExactMatchCoref, SieveCoref},
    fuzzy_index::FuzzyNameIndex,
    kb::{AltNameRecord, EntityRecord},
    model::Span,
    name_index::{ExactMatchIndex, NameIndex},
    ngram_index::NgramIndex,
    output::VecSink,
    preprocess::PassThrough,
    resolve::{
        BestMatchResolver,
        CascadeResolver,
        ChainResolver,
        EditDistanceResolver,
        ExactNameResolver,
    },
    stage::{CandidateGenerator, CoReferencer, Resolver},
};
use proptest::prelude::*;

const NAMES: [&str; 8] = [
    "Addis Ababa",
    "AA",
    "Gondar",
    "Harar",
    "Abebe Bikila",
    "Bikila",
    "Ethiopian Airlines",
    "Ethiopia",
];

fn kb() -> Arc<KnowledgeBase> {
    let entities = vec![
        EntityRecord::new("Q1", "GPE", "Addis Ababa"),
        EntityRecord::new("Q2", "GPE", "Gondar"),
        EntityRecord::new("Q3", "GPE", "Harar"),
        EntityRecord::new("Q4", "PER", "Abebe Bikila"),
        EntityRecord::new("Q5", "ORG", "Ethiopian Airlines"),
        EntityRecord::new("Q6", "GPE", "Ethiopia"),
        EntityRecord::new("Q7", "LOC", "Gondar"),
    ];
    let names = vec![
        AltNameRecord::new("Q1", "AA"),
        AltNameRecord::new("Q1", "Finfinne"),
        AltNameRecord::new("Q4", "Bikila"),
        AltNameRecord::new("Q5", "ET"),
    ];
    Arc::new(KnowledgeBase::from_records(entities, names).unwrap())
}

fn name() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(NAMES.to_vec()).prop_map(String::from),
        "[A-Za-z]{1,8}( [A-Za-z]{1,8})?",
    ]
}

fn entity_type() -> impl Strategy<Value = EntityType> {
    prop::sample::select(EntityType::ALL.to_vec())
}

fn document(id: &'static str) -> impl Strategy<Value = Document> {
    prop::collection::vec((name(), entity_type()), 1..8).prop_map(
        move |mentions| {
            let mentions = mentions
                .into_iter()
                .enumerate()
                .map(|(i, (text, entity_type))| {
                    Mention::new(
                        MentionId::new(format!("{id}-M{i}")),
                        &text,
                        Span::new(i * 20, i * 20 + text.len()),
                        entity_type,
                    )
                })
                .collect();
            Document::new(DocumentId::new(id), mentions, Vec::new())
        },
    )
}

fn indexes(kb: &Arc<KnowledgeBase>) -> Vec<Arc<dyn NameIndex>> {
    vec![
        Arc::new(ExactMatchIndex::new(kb.clone())),
        Arc::new(NgramIndex::new(kb.clone())),
        Arc::new(FuzzyNameIndex::new(kb.clone()).unwrap()),
    ]
}

fn cascade(kb: &Arc<KnowledgeBase>) -> CascadeResolver {
    let resolvers: Vec<Box<dyn ChainResolver>> = vec![
        Box::new(ExactNameResolver::new(kb.clone())),
        Box::new(EditDistanceResolver::new(kb.clone())),
        Box::new(BestMatchResolver),
    ];
    CascadeResolver::new(resolvers)
}

fn check_links(doc: &Document) -> Result<(), TestCaseError> {
    for mention in doc.mentions() {
        match &mention.link {
            Some(Link::Entity(id)) => prop_assert!(
                mention.candidates.iter().any(|c| &c.entity_id == id),
                "{} linked outside its candidates",
                mention.id
            ),
            Some(Link::Nil) => {}
            None => prop_assert!(false, "{} left undecided", mention.id),
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn index_results_are_bounded_kb_ids(
        query in name(),
        filter in prop::option::of(entity_type()),
        limit in 1usize..6,
    ) {
        let kb = kb();
        for index in indexes(&kb) {
            let first = index.query(&query, filter, limit).unwrap();
            prop_assert!(first.len() <= limit);
            for candidate in &first {
                let entity = kb.lookup(&candidate.entity_id).unwrap();
                if let Some(t) = filter {
                    prop_assert_eq!(entity.entity_type, t);
                }
            }
            let again = index.query(&query, filter, limit).unwrap();
            prop_assert_eq!(first, again);
        }
    }

    #[test]
    fn pipeline_keeps_mention_order(
        a in document("d1"),
        b in document("d2"),
    ) {
        let kb = kb();
        let index = Arc::new(ExactMatchIndex::new(kb.clone()));
        let mut pipeline = Pipeline::builder()
            .preprocessor(Box::new(PassThrough))
            .coref(Box::new(SieveCoref::default()))
            .candidates(Box::new(ChainGenerator::from_index(index, 3)))
            .resolver(Box::new(cascade(&kb)))
            .build()
            .unwrap();

        let input = vec![a.clone(), b.clone()];
        let mut sink = VecSink::default();
        let report = pipeline
            .run(input.iter().cloned().map(Ok), &mut sink)
            .unwrap();

        prop_assert_eq!(report.failed, 0);
        prop_assert_eq!(sink.documents.len(), 2);
        for (before, after) in input.iter().zip(&sink.documents) {
            prop_assert_eq!(before.id(), after.id());
            prop_assert_eq!(before.mention_ids(), after.mention_ids());
            for (m, n) in before.mentions().iter().zip(after.mentions()) {
                prop_assert_eq!(m.span, n.span);
                prop_assert_eq!(&m.original_text, &n.original_text);
                prop_assert!(n.candidates.len() <= 3);
            }
            check_links(after)?;
        }
        prop_assert_eq!(
            report.mentions_linked + report.mentions_nil,
            a.mentions().len() + b.mentions().len()
        );
    }

    #[test]
    fn chains_stay_inside_their_document(doc in document("d7")) {
        let corefs: Vec<Box<dyn CoReferencer>> =
            vec![Box::new(ExactMatchCoref), Box::new(SieveCoref::default())];
        for mut coref in corefs {
            let out = coref.coref(doc.clone()).unwrap();
            let chains = out.chains();
            let members: usize = chains.iter().map(|c| c.members.len()).sum();
            prop_assert_eq!(members, out.mentions().len());
            for mention in out.mentions() {
                let chain = mention.chain.as_ref().unwrap();
                prop_assert_eq!(chain.document(), out.id());
            }
        }
    }

    #[test]
    fn best_match_links_a_candidate(doc in document("d9")) {
        let kb = kb();
        let index = Arc::new(NgramIndex::new(kb.clone()));
        let doc = ExactMatchCoref.coref(doc).unwrap();
        let mut generator = ChainGenerator::from_index(index, 5);
        let doc = generator.generate(doc).unwrap();
        let resolved = BestMatchResolver.resolve(doc).unwrap();
        check_links(&resolved)?;
    }
}
