//! Reading mention-tagged CoNLL files into documents.
//!
//! Each data row is `token  tag  token  doc_id  start  stop  sentence`,
//! tab-separated. The token is taken from the third column. Rows with
//! fewer than six columns are sentence breaks. Consecutive rows with the
//! same document id form one document, and BIO tags (`B-PER`, `I-PER`,
//! `O`) mark the mentions. With gold mentions the tags are ignored and
//! mentions come from the ground truth offsets instead.

use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader, Split},
    iter::Enumerate,
    path::Path,
    sync::Arc,
};

use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    ids::{DocumentId, MentionIdAssigner},
    lang::LanguageDetector,
    model::{Document, EntityType, Mention, Span},
    output::{GoldLink, GroundTruth},
};

/// Column positions of a data row.
pub mod columns {
    pub const TAG: usize = 1;
    pub const TOKEN: usize = 2;
    pub const DOC_ID: usize = 3;
    pub const START: usize = 4;
    pub const STOP: usize = 5;
}

const MIN_COLUMNS: usize = 6;

#[derive(Debug)]
struct Row {
    line: usize,
    token: String,
    tag: String,
    span: Span,
}

/// One input line. `valid` is false when the bytes were not UTF-8 and
/// `text` is a lossy decoding.
struct RawLine {
    number: usize,
    text: String,
    valid: bool,
}

impl RawLine {
    fn decode(number: usize, mut bytes: Vec<u8>) -> Self {
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        match String::from_utf8(bytes) {
            Ok(text) => Self {
                number,
                text,
                valid: true,
            },
            Err(e) => Self {
                number,
                text: String::from_utf8_lossy(e.as_bytes()).into_owned(),
                valid: false,
            },
        }
    }
}

/// Rows of one document collected so far.
#[derive(Default)]
struct Batch {
    doc_id: Option<String>,
    rows: Vec<Row>,
    error: Option<Error>,
}

/// Token offsets of the mentions making up one document.
type Found = Vec<(EntityType, Vec<usize>)>;

/// Yields one [`Document`] per document id, in file order.
///
/// A malformed row, including one that is not valid UTF-8, fails its
/// whole document; the reader then carries on with the next document id.
/// A read error fails the document being read and ends the stream.
/// Documents without any mention are skipped. Mention ids are assigned
/// in corpus order by the reader's own [`MentionIdAssigner`].
pub struct ConllReader<R: BufRead> {
    lines: Enumerate<Split<R>>,
    source_name: String,
    ids: MentionIdAssigner,
    pending: Option<RawLine>,
    done: bool,
    lang_detector: Option<Box<dyn LanguageDetector>>,
    gold: Option<Arc<GroundTruth>>,
}

impl ConllReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), &path.display().to_string()))
    }
}

impl<R: BufRead> ConllReader<R> {
    pub fn new(reader: R, source_name: &str) -> Self {
        Self {
            lines: reader.split(b'\n').enumerate(),
            source_name: source_name.to_string(),
            ids: MentionIdAssigner::new(),
            pending: None,
            done: false,
            lang_detector: None,
            gold: None,
        }
    }

    /// Tag each document with the language the detector finds in its
    /// tokens.
    pub fn with_lang_detector(
        mut self,
        detector: Box<dyn LanguageDetector>,
    ) -> Self {
        self.lang_detector = Some(detector);
        self
    }

    /// Take mentions from the gold offsets instead of the BIO tags.
    /// Documents absent from the ground truth are skipped.
    pub fn with_gold_mentions(mut self, gold: Arc<GroundTruth>) -> Self {
        self.gold = Some(gold);
        self
    }

    /// Add a line to the batch. Returns false if the line starts the next
    /// document, in which case it is kept for the next batch.
    fn accept(&mut self, raw: RawLine, batch: &mut Batch) -> bool {
        let cols: Vec<&str> = raw.text.split('\t').collect();
        if cols.len() < MIN_COLUMNS {
            if !raw.valid {
                let error =
                    self.invalid_utf8(raw.number, batch.doc_id.as_deref());
                match &batch.doc_id {
                    Some(_) => {
                        batch.error.get_or_insert(error);
                    }
                    None => warn!(%error, "skipping line outside a document"),
                }
            }
            return true;
        }
        let doc_id = cols[columns::DOC_ID];
        match &batch.doc_id {
            Some(current) if current != doc_id => {
                self.pending = Some(raw);
                return false;
            }
            Some(_) => {}
            None => batch.doc_id = Some(doc_id.to_string()),
        }
        let row = if raw.valid {
            parse_row(&self.source_name, raw.number, &cols)
        } else {
            Err(self.invalid_utf8(raw.number, Some(doc_id)))
        };
        match row {
            Ok(row) => batch.rows.push(row),
            Err(e) => {
                batch.error.get_or_insert(e);
            }
        }
        true
    }

    fn invalid_utf8(&self, line: usize, doc_id: Option<&str>) -> Error {
        let reason = match doc_id {
            Some(doc_id) => format!("document {doc_id}: invalid UTF-8"),
            None => "invalid UTF-8".to_string(),
        };
        Error::malformed(&self.source_name, line, reason)
    }

    /// Rows of the next document, or the first error found in them.
    fn next_batch(&mut self) -> Option<Result<(String, Vec<Row>)>> {
        let mut batch = Batch::default();
        if let Some(raw) = self.pending.take() {
            self.accept(raw, &mut batch);
        }
        while let Some((i, bytes)) = self.lines.next() {
            let bytes = match bytes {
                Ok(bytes) => bytes,
                // The underlying reader may fail the same way forever, so
                // a read error ends the stream after the current document.
                Err(e) => {
                    self.done = true;
                    if batch.doc_id.is_none() {
                        return Some(Err(e.into()));
                    }
                    batch.error.get_or_insert(e.into());
                    break;
                }
            };
            let raw = RawLine::decode(i + 1, bytes);
            if raw.number == 1 && raw.valid && is_header(&raw.text) {
                self.done = true;
                return Some(Err(Error::malformed(
                    &self.source_name,
                    raw.number,
                    "header rows are not supported",
                )));
            }
            if !self.accept(raw, &mut batch) {
                break;
            }
        }

        let doc_id = batch.doc_id?;
        Some(match batch.error {
            Some(e) => Err(e),
            None => Ok((doc_id, batch.rows)),
        })
    }

    /// Mentions marked by BIO tags.
    fn tagged_mentions(&self, rows: &[Row]) -> Result<Found> {
        let mut found: Found = Vec::new();
        let mut open = false;
        for (i, row) in rows.iter().enumerate() {
            match row.tag.chars().next() {
                Some('I') if open => {
                    if let Some((_, members)) = found.last_mut() {
                        members.push(i);
                    }
                }
                Some('B') => {
                    let entity_type =
                        parse_tag_type(&row.tag).ok_or_else(|| {
                            Error::malformed(
                                &self.source_name,
                                row.line,
                                format!("unknown entity type {:?}", row.tag),
                            )
                        })?;
                    found.push((entity_type, vec![i]));
                    open = true;
                }
                _ => open = false,
            }
        }
        Ok(found)
    }

    /// Turn the rows of one document into mentions. `None` if the
    /// document has no mention.
    fn prepare(
        &mut self,
        doc_id: String,
        rows: Vec<Row>,
    ) -> Result<Option<Document>> {
        let id = DocumentId::new(doc_id);
        let found = match &self.gold {
            Some(gold) => match gold.document(&id) {
                Some(links) => gold_mentions(&id, links, &rows),
                None => {
                    debug!(document = %id, "skipping document without gold");
                    return Ok(None);
                }
            },
            None => self.tagged_mentions(&rows)?,
        };
        if found.is_empty() {
            debug!(document = %id, "skipping document without mentions");
            return Ok(None);
        }

        let mentions = found
            .into_iter()
            .map(|(entity_type, members)| {
                let first = &rows[members[0]];
                let last = &rows[members[members.len() - 1]];
                let text = members
                    .iter()
                    .map(|&i| rows[i].token.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                let span = Span::new(first.span.start, last.span.end);
                let tokens = Span::new(members[0], members[0] + members.len());
                Mention::new(self.ids.assign(), &text, span, entity_type)
                    .with_token_span(tokens)
            })
            .collect();
        let tokens: Vec<String> = rows.into_iter().map(|r| r.token).collect();
        let lang = self
            .lang_detector
            .as_ref()
            .and_then(|detector| detector.detect(&id, &tokens));
        Ok(Some(Document::new(id, mentions, tokens).with_lang(lang)))
    }
}

impl<R: BufRead> Iterator for ConllReader<R> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            let (doc_id, rows) = match self.next_batch()? {
                Ok(batch) => batch,
                Err(e) => return Some(Err(e)),
            };
            match self.prepare(doc_id, rows) {
                Ok(Some(doc)) => return Some(Ok(doc)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Mentions whose offsets are in the ground truth. A gold mention opens
/// on the row starting at its start offset and closes on the first row
/// reaching its end offset; one still open when another starts is
/// dropped.
fn gold_mentions(
    doc_id: &DocumentId,
    links: &HashMap<Span, GoldLink>,
    rows: &[Row],
) -> Found {
    let starts: HashMap<usize, (usize, Option<EntityType>)> = links
        .iter()
        .map(|(span, link)| (span.start, (span.end, link.entity_type)))
        .collect();
    let mut found: Found = Vec::new();
    let mut open: Option<(usize, EntityType, Vec<usize>)> = None;
    for (i, row) in rows.iter().enumerate() {
        if let Some(&(end, entity_type)) = starts.get(&row.span.start) {
            if open.is_some() {
                debug!(
                    document = %doc_id,
                    line = row.line,
                    "dropping unterminated gold mention"
                );
            }
            open = match entity_type {
                Some(entity_type) => Some((end, entity_type, Vec::new())),
                None => {
                    debug!(
                        document = %doc_id,
                        line = row.line,
                        "skipping gold mention of an unknown type"
                    );
                    None
                }
            };
        }
        if let Some((end, entity_type, mut members)) = open.take() {
            members.push(i);
            if row.span.end >= end {
                found.push((entity_type, members));
            } else {
                open = Some((end, entity_type, members));
            }
        }
    }
    found
}

fn is_header(raw: &str) -> bool {
    let first = raw.split('\t').next().unwrap_or("").to_lowercase();
    first == "token" || first == "tok"
}

fn parse_row(source_name: &str, line: usize, cols: &[&str]) -> Result<Row> {
    let malformed = |reason: String| {
        Error::malformed(
            source_name,
            line,
            format!("document {}: {reason}", cols[columns::DOC_ID]),
        )
    };
    let tag = cols[columns::TAG].trim();
    if tag.is_empty() {
        return Err(malformed("empty tag".to_string()));
    }
    let offset = |i: usize| {
        cols[i]
            .trim()
            .parse::<usize>()
            .map_err(|_| malformed(format!("bad offset {:?}", cols[i])))
    };
    let (start, stop) = (offset(columns::START)?, offset(columns::STOP)?);
    if stop < start {
        return Err(malformed(format!("offsets {start}-{stop} are reversed")));
    }
    Ok(Row {
        line,
        token: cols[columns::TOKEN].to_string(),
        tag: tag.to_string(),
        span: Span::new(start, stop),
    })
}

/// `B-PER` → `PER`.
fn parse_tag_type(tag: &str) -> Option<EntityType> {
    EntityType::parse(tag.get(2..)?)
}
