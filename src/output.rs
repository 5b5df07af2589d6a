//! Writing link decisions and reading them back as ground truth.
//!
//! Both directions use the LoReHLT submission format, one tab-separated
//! line per mention:
//!
//! ```text
//! system  mention_id  text  doc:start-end  kb_id|NIL  type  NAM  confidence
//! ```

use std::{
    collections::HashMap,
    io::{BufRead, BufReader, Write},
    path::Path,
};

use tracing::debug;

use crate::{
    error::{Error, Result},
    ids::{DocumentId, EntityId},
    model::{Document, EntityType, Link, Span},
};

/// Column positions of the submission format.
pub mod columns {
    pub const SYSTEM: usize = 0;
    pub const MENTION_ID: usize = 1;
    pub const MENTION_TEXT: usize = 2;
    pub const DOC_AND_OFFSETS: usize = 3;
    pub const KB_ID: usize = 4;
    pub const ENTITY_TYPE: usize = 5;
    pub const MENTION_TYPE: usize = 6;
    pub const CONFIDENCE: usize = 7;
}

pub const HEADER: [&str; 8] = [
    "system_run_id",
    "mention_id",
    "mention_text",
    "extents",
    "kb_id",
    "entity_type",
    "mention_type",
    "confidence",
];

pub const NIL: &str = "NIL";
pub const DEFAULT_CONFIDENCE: f64 = 0.1;

/// Receives finished documents, one at a time, in input order.
pub trait DocumentSink {
    fn write(&mut self, doc: &Document) -> Result<()>;

    /// Called once after the last document.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Keeps every document it is given.
#[derive(Debug, Default)]
pub struct VecSink {
    pub documents: Vec<Document>,
}

impl DocumentSink for VecSink {
    fn write(&mut self, doc: &Document) -> Result<()> {
        self.documents.push(doc.clone());
        Ok(())
    }
}

/// Writes the submission format.
///
/// Mentions without a decision are written as NIL, so every mention of a
/// written document produces exactly one line.
pub struct TabWriter<W: Write> {
    out: W,
    system: String,
    confidence: f64,
    header: bool,
    lines: usize,
}

impl<W: Write> TabWriter<W> {
    pub fn new(out: W, system: &str) -> Self {
        Self {
            out,
            system: clean_field(system),
            confidence: DEFAULT_CONFIDENCE,
            header: false,
            lines: 0,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Emit the column header before the first line.
    pub fn with_header(mut self) -> Self {
        self.header = true;
        self
    }

    /// Mention lines written so far.
    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_header(&mut self) -> Result<()> {
        if self.header {
            writeln!(self.out, "{}", HEADER.join("\t"))?;
            self.header = false;
        }
        Ok(())
    }
}

impl<W: Write> DocumentSink for TabWriter<W> {
    fn write(&mut self, doc: &Document) -> Result<()> {
        self.write_header()?;
        for mention in doc.mentions() {
            let kb_id = match &mention.link {
                Some(Link::Entity(id)) => id.as_str(),
                Some(Link::Nil) | None => NIL,
            };
            writeln!(
                self.out,
                "{}\t{}\t{}\t{}:{}\t{}\t{}\tNAM\t{}",
                self.system,
                mention.id,
                clean_field(&mention.original_text),
                doc.id(),
                mention.span,
                kb_id,
                mention.entity_type,
                self.confidence,
            )?;
            self.lines += 1;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.write_header()?;
        self.out.flush()?;
        Ok(())
    }
}

/// Tabs and newlines would break the line format.
fn clean_field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

/// The gold decision for one mention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoldTarget {
    /// Not in the KB; mentions sharing the cluster id corefer.
    Nil(String),
    /// Any of these entities is a correct link.
    Entities(Vec<EntityId>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoldLink {
    pub text: String,
    /// `None` when the gold type label is not one we model.
    pub entity_type: Option<EntityType>,
    pub target: GoldTarget,
}

impl GoldLink {
    /// Identifier of the gold coreference cluster: the NIL cluster id, or
    /// the linked ids joined with `|`.
    pub fn cluster(&self) -> String {
        match &self.target {
            GoldTarget::Nil(cluster) => cluster.clone(),
            GoldTarget::Entities(ids) => ids
                .iter()
                .map(EntityId::as_str)
                .collect::<Vec<_>>()
                .join("|"),
        }
    }

    pub fn entities(&self) -> &[EntityId] {
        match &self.target {
            GoldTarget::Nil(_) => &[],
            GoldTarget::Entities(ids) => ids,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self.target, GoldTarget::Nil(_))
    }
}

/// Gold links keyed by document and mention span.
#[derive(Debug, Default, Clone)]
pub struct GroundTruth {
    documents: HashMap<DocumentId, HashMap<Span, GoldLink>>,
}

impl GroundTruth {
    pub fn read(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(BufReader::new(file), &path.display().to_string())
    }

    /// Parse a submission-format stream. The header row is required.
    pub fn from_reader<R: BufRead>(
        reader: R,
        source_name: &str,
    ) -> Result<Self> {
        let mut lines = reader.lines();
        let header = lines.next().transpose()?.unwrap_or_default();
        if header.split('\t').next() != Some(HEADER[columns::SYSTEM]) {
            return Err(Error::malformed(
                source_name,
                1,
                format!("expected a header starting with {}", HEADER[0]),
            ));
        }

        let mut truth = Self::default();
        let mut count = 0usize;
        for (i, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let line_no = i + 2;
            let (doc, span, gold) =
                parse_gold_line(source_name, line_no, &line)?;
            truth.documents.entry(doc).or_default().insert(span, gold);
            count += 1;
        }
        debug!(
            documents = truth.documents.len(),
            mentions = count,
            "read ground truth"
        );
        Ok(truth)
    }

    pub fn document(
        &self,
        id: &DocumentId,
    ) -> Option<&HashMap<Span, GoldLink>> {
        self.documents.get(id)
    }

    pub fn get(&self, id: &DocumentId, span: Span) -> Option<&GoldLink> {
        self.documents.get(id)?.get(&span)
    }

    pub fn len(&self) -> usize {
        self.documents.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_gold_line(
    source_name: &str,
    line: usize,
    raw: &str,
) -> Result<(DocumentId, Span, GoldLink)> {
    let cols: Vec<&str> = raw.split('\t').collect();
    if cols.len() <= columns::ENTITY_TYPE {
        return Err(Error::malformed(
            source_name,
            line,
            format!("expected at least 6 columns, found {}", cols.len()),
        ));
    }
    let (doc, span) = parse_extent(cols[columns::DOC_AND_OFFSETS])
        .ok_or_else(|| {
            Error::malformed(
                source_name,
                line,
                format!("bad extent {:?}", cols[columns::DOC_AND_OFFSETS]),
            )
        })?;

    let kb_id = cols[columns::KB_ID].trim();
    let target = if kb_id.starts_with(NIL) {
        GoldTarget::Nil(kb_id.to_string())
    } else {
        let ids: Vec<EntityId> = kb_id
            .split('|')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(EntityId::new)
            .collect();
        if ids.is_empty() {
            return Err(Error::malformed(source_name, line, "empty kb_id"));
        }
        GoldTarget::Entities(ids)
    };

    let gold = GoldLink {
        text: cols[columns::MENTION_TEXT].to_string(),
        entity_type: EntityType::parse(cols[columns::ENTITY_TYPE]),
        target,
    };
    Ok((doc, span, gold))
}

/// Split `doc:start-end`. The document id may itself contain colons.
fn parse_extent(extent: &str) -> Option<(DocumentId, Span)> {
    let (doc, offsets) = extent.trim().rsplit_once(':')?;
    let (start, end) = offsets.split_once('-')?;
    let span = Span::new(start.parse().ok()?, end.parse().ok()?);
    (!doc.is_empty()).then(|| (DocumentId::new(doc), span))
}
