use std::collections::HashMap;

use tracing::debug;

use crate::{
    error::Result,
    model::{Document, EntityType},
    stage::Preprocessor,
    text,
};

/// Leaves every mention as read.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl Preprocessor for PassThrough {
    fn preprocess(&mut self, doc: Document) -> Result<Document> {
        Ok(doc)
    }
}

/// Runs several preprocessors in order.
pub struct CascadePreprocessor {
    stages: Vec<Box<dyn Preprocessor>>,
}

impl CascadePreprocessor {
    pub fn new(stages: Vec<Box<dyn Preprocessor>>) -> Self {
        Self { stages }
    }
}

impl Preprocessor for CascadePreprocessor {
    fn preprocess(&mut self, mut doc: Document) -> Result<Document> {
        for stage in &mut self.stages {
            doc = stage.preprocess(doc)?;
        }
        Ok(doc)
    }
}

/// Rewrites mention text to NFKC with punctuation turned into spaces and
/// whitespace collapsed. The original text is kept for output.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextNormalizer;

impl Preprocessor for TextNormalizer {
    fn preprocess(&mut self, mut doc: Document) -> Result<Document> {
        for mention in doc.mentions_mut() {
            mention.text = text::normalize_surface(&mention.text);
        }
        Ok(doc)
    }
}

/// Corrects the type of mentions whose surface text is known to be
/// mistagged, e.g. a country tagged as a person.
#[derive(Debug, Default, Clone)]
pub struct TypeOverride {
    corrections: HashMap<String, EntityType>,
}

impl TypeOverride {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mentions reading `surface` (case-insensitive) become `entity_type`.
    pub fn with(mut self, surface: &str, entity_type: EntityType) -> Self {
        self.corrections.insert(text::name_key(surface), entity_type);
        self
    }
}

impl Preprocessor for TypeOverride {
    fn preprocess(&mut self, mut doc: Document) -> Result<Document> {
        for mention in doc.mentions_mut() {
            let Some(&corrected) =
                self.corrections.get(&text::name_key(&mention.text))
            else {
                continue;
            };
            if corrected != mention.entity_type {
                debug!(
                    mention = %mention.id,
                    from = %mention.entity_type,
                    to = %corrected,
                    "corrected mention type"
                );
                mention.entity_type = corrected;
            }
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ids::{DocumentId, MentionId},
        model::{Mention, Span},
    };

    fn doc(texts: &[(&str, EntityType)]) -> Document {
        let mentions = texts
            .iter()
            .enumerate()
            .map(|(i, (t, ty))| {
                Mention::new(
                    MentionId::new(format!("M{}", i + 1)),
                    t,
                    Span::new(i * 10, i * 10 + t.len()),
                    *ty,
                )
            })
            .collect();
        Document::new(DocumentId::new("d"), mentions, Vec::new())
    }

    #[test]
    fn pass_through_changes_nothing() {
        let before = doc(&[("Addis Ababa", EntityType::GeoPolitical)]);
        let after = PassThrough.preprocess(before.clone()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn normalizer_rewrites_text_only() {
        let d = doc(&[("«Addis-Ababa»", EntityType::GeoPolitical)]);
        let d = TextNormalizer.preprocess(d).unwrap();
        let m = &d.mentions()[0];
        assert_eq!(m.text, "Addis Ababa");
        assert_eq!(m.original_text, "«Addis-Ababa»");
    }

    #[test]
    fn type_override_matches_case_insensitively() {
        let d = doc(&[
            ("ethiopia", EntityType::Person),
            ("Abebe", EntityType::Person),
        ]);
        let mut stage =
            TypeOverride::new().with("Ethiopia", EntityType::GeoPolitical);
        let d = stage.preprocess(d).unwrap();
        assert_eq!(d.mentions()[0].entity_type, EntityType::GeoPolitical);
        assert_eq!(d.mentions()[1].entity_type, EntityType::Person);
    }

    #[test]
    fn cascade_runs_in_order() {
        let d = doc(&[("U.S.A", EntityType::Person)]);
        let mut stage = CascadePreprocessor::new(vec![
            Box::new(TextNormalizer),
            Box::new(
                TypeOverride::new().with("U S A", EntityType::GeoPolitical),
            ),
        ]);
        let d = stage.preprocess(d).unwrap();
        assert_eq!(d.mentions()[0].text, "U S A");
        assert_eq!(d.mentions()[0].entity_type, EntityType::GeoPolitical);
    }
}
