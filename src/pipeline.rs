//! Composing stages into a pipeline and running it over a corpus.
//!
//! Every document moves through
//! `Read → Preprocess → CoRef → CandidateGen → Resolve → Write`. A stage
//! error fails that one document and the run moves on; only a failing
//! sink aborts the run.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{error, info, warn};

use crate::{
    error::{Error, Result},
    eval::Scorecard,
    ids::{DocumentId, MentionId},
    model::Document,
    output::{DocumentSink, GroundTruth},
    stage::{
        CandidateGenerator,
        CoReferencer,
        Preprocessor,
        Resolver,
        StageKind,
    },
};

/// Collects the stages and run options, then checks that nothing is
/// missing.
#[derive(Default)]
pub struct PipelineBuilder {
    preprocessor: Option<Box<dyn Preprocessor>>,
    coref: Option<Box<dyn CoReferencer>>,
    generator: Option<Box<dyn CandidateGenerator>>,
    resolver: Option<Box<dyn Resolver>>,
    profile: bool,
    progress_every: usize,
    gold: Option<Arc<GroundTruth>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preprocessor(mut self, stage: Box<dyn Preprocessor>) -> Self {
        self.preprocessor = Some(stage);
        self
    }

    pub fn coref(mut self, stage: Box<dyn CoReferencer>) -> Self {
        self.coref = Some(stage);
        self
    }

    pub fn candidates(mut self, stage: Box<dyn CandidateGenerator>) -> Self {
        self.generator = Some(stage);
        self
    }

    pub fn resolver(mut self, stage: Box<dyn Resolver>) -> Self {
        self.resolver = Some(stage);
        self
    }

    /// Record time spent in each stage.
    pub fn profile(mut self, enabled: bool) -> Self {
        self.profile = enabled;
        self
    }

    /// Log progress every `n` documents; 0 disables it.
    pub fn progress_every(mut self, n: usize) -> Self {
        self.progress_every = n;
        self
    }

    /// Score every run against this ground truth. Takes an `Arc` when the
    /// same ground truth also feeds the reader.
    pub fn gold(mut self, gold: impl Into<Arc<GroundTruth>>) -> Self {
        self.gold = Some(gold.into());
        self
    }

    /// Fails with [`Error::Config`] if any stage role is unfilled.
    pub fn build(self) -> Result<Pipeline> {
        fn require<T>(stage: Option<T>, kind: StageKind) -> Result<T> {
            stage.ok_or_else(|| {
                Error::Config(format!("pipeline has no {kind} stage"))
            })
        }

        Ok(Pipeline {
            preprocessor: require(self.preprocessor, StageKind::Preprocess)?,
            coref: require(self.coref, StageKind::CoRef)?,
            generator: require(self.generator, StageKind::CandidateGen)?,
            resolver: require(self.resolver, StageKind::Resolve)?,
            profile: self.profile,
            progress_every: self.progress_every,
            gold: self.gold,
        })
    }
}

/// One filled stage of each role.
pub struct Pipeline {
    preprocessor: Box<dyn Preprocessor>,
    coref: Box<dyn CoReferencer>,
    generator: Box<dyn CandidateGenerator>,
    resolver: Box<dyn Resolver>,
    profile: bool,
    progress_every: usize,
    gold: Option<Arc<GroundTruth>>,
}

/// A document that could not be processed.
#[derive(Debug)]
pub struct DocumentFailure {
    /// Zero-based position in the input sequence.
    pub position: usize,
    /// `None` when the reader failed before the id was known.
    pub document: Option<DocumentId>,
    pub stage: StageKind,
    pub error: Error,
}

impl fmt::Display for DocumentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.document {
            Some(doc) => write!(f, "document {doc}")?,
            None => write!(f, "document #{}", self.position + 1)?,
        }
        write!(f, " failed at {}: {}", self.stage, self.error)
    }
}

/// Result of running the stage chain over one document.
#[derive(Debug)]
pub enum DocumentOutcome {
    Success(Document),
    Failure(DocumentFailure),
}

/// Wall time per stage, summed over the run.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct StageTimings {
    pub total: Duration,
    pub read: Duration,
    pub preprocess: Duration,
    pub coref: Duration,
    pub candidates: Duration,
    pub resolve: Duration,
    pub write: Duration,
}

impl StageTimings {
    pub fn get(&self, stage: StageKind) -> Duration {
        match stage {
            StageKind::Read => self.read,
            StageKind::Preprocess => self.preprocess,
            StageKind::CoRef => self.coref,
            StageKind::CandidateGen => self.candidates,
            StageKind::Resolve => self.resolve,
            StageKind::Write => self.write,
        }
    }

    fn add(&mut self, stage: StageKind, elapsed: Duration) {
        let slot = match stage {
            StageKind::Read => &mut self.read,
            StageKind::Preprocess => &mut self.preprocess,
            StageKind::CoRef => &mut self.coref,
            StageKind::CandidateGen => &mut self.candidates,
            StageKind::Resolve => &mut self.resolve,
            StageKind::Write => &mut self.write,
        };
        *slot += elapsed;
    }
}

impl fmt::Display for StageTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Timing Profile")?;
        writeln!(f, "--------------")?;
        writeln!(f, "{:<15} {:.2}s", "overall:", self.total.as_secs_f64())?;
        for stage in [StageKind::Read]
            .into_iter()
            .chain(StageKind::TRANSFORMS)
            .chain([StageKind::Write])
        {
            let label = format!("{stage}:");
            writeln!(f, "{label:<15} {:.2}s", self.get(stage).as_secs_f64())?;
        }
        Ok(())
    }
}

/// How a run ended when no fatal error stopped it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    CompletedWithErrors,
}

/// Counts and failures of a finished run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub processed: usize,
    pub failed: usize,
    pub mentions_linked: usize,
    pub mentions_nil: usize,
    pub failures: Vec<DocumentFailure>,
    pub timings: Option<StageTimings>,
    pub scorecard: Option<Scorecard>,
}

impl RunReport {
    pub fn status(&self) -> RunStatus {
        if self.failed == 0 {
            RunStatus::Success
        } else {
            RunStatus::CompletedWithErrors
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Processed {} documents ({} failed): {} mentions linked, {} NIL",
            self.processed, self.failed, self.mentions_linked, self.mentions_nil
        )?;
        for failure in &self.failures {
            writeln!(f, "  {failure}")?;
        }
        if let Some(timings) = &self.timings {
            write!(f, "\n{timings}")?;
        }
        if let Some(scorecard) = &self.scorecard {
            write!(f, "\n{scorecard}")?;
        }
        Ok(())
    }
}

/// Per-run bookkeeping threaded through the stages.
struct RunState {
    timings: Option<StageTimings>,
    scorecard: Option<Scorecard>,
}

impl RunState {
    fn timed<T>(&mut self, stage: StageKind, f: impl FnOnce() -> T) -> T {
        match &mut self.timings {
            Some(timings) => {
                let started = Instant::now();
                let out = f();
                timings.add(stage, started.elapsed());
                out
            }
            None => f(),
        }
    }
}

/// Fails if a stage added, dropped, reordered or renamed mentions, or
/// swapped the document.
fn check_invariant(
    stage: StageKind,
    id: &DocumentId,
    before: &[MentionId],
    doc: &Document,
) -> Result<()> {
    let reason = if doc.id() != id {
        format!("document id changed from {id} to {}", doc.id())
    } else if doc.mentions().len() != before.len() {
        format!(
            "mention count changed from {} to {}",
            before.len(),
            doc.mentions().len()
        )
    } else if let Some((was, now)) = before
        .iter()
        .zip(doc.mentions())
        .map(|(was, m)| (was, &m.id))
        .find(|(was, now)| was != now)
    {
        format!("mention {was} was replaced by {now}")
    } else {
        return Ok(());
    };
    Err(Error::Invariant { stage, reason })
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Run the stage chain over one document, outside of a run.
    pub fn process(
        &mut self,
        position: usize,
        doc: Document,
    ) -> DocumentOutcome {
        let mut state = RunState {
            timings: None,
            scorecard: None,
        };
        self.process_in(position, doc, &mut state)
    }

    fn process_in(
        &mut self,
        position: usize,
        doc: Document,
        state: &mut RunState,
    ) -> DocumentOutcome {
        let id = doc.id().clone();
        match self.run_stages(doc, &id, state) {
            Ok(doc) => DocumentOutcome::Success(doc),
            Err((stage, error)) => DocumentOutcome::Failure(DocumentFailure {
                position,
                document: Some(id),
                stage,
                error,
            }),
        }
    }

    fn run_stages(
        &mut self,
        mut doc: Document,
        id: &DocumentId,
        state: &mut RunState,
    ) -> std::result::Result<Document, (StageKind, Error)> {
        let before = doc.mention_ids();
        // Tallies for this document only; merged once every stage passed.
        let mut pending = state.scorecard.as_ref().map(Scorecard::empty);
        for stage in StageKind::TRANSFORMS {
            doc = state
                .timed(stage, || match stage {
                    StageKind::Preprocess => self.preprocessor.preprocess(doc),
                    StageKind::CoRef => self.coref.coref(doc),
                    StageKind::CandidateGen => self.generator.generate(doc),
                    _ => self.resolver.resolve(doc),
                })
                .and_then(|doc| {
                    check_invariant(stage, id, &before, &doc)?;
                    Ok(doc)
                })
                .map_err(|e| (stage, e))?;

            if let Some(card) = &mut pending {
                match stage {
                    StageKind::CoRef => card.score_coref(&doc),
                    StageKind::CandidateGen => card.score_candidates(&doc),
                    StageKind::Resolve => card.score_resolution(&doc),
                    _ => {}
                }
            }
        }
        if let (Some(card), Some(scored)) = (&mut state.scorecard, &pending) {
            card.merge(scored);
        }
        Ok(doc)
    }

    /// Process every document in input order and hand the successful ones
    /// to `sink`.
    ///
    /// Reader errors and stage errors fail only their document and are
    /// listed in the report. An error from the sink ends the run with
    /// `Err`, since the output can no longer be trusted.
    pub fn run<I>(
        &mut self,
        documents: I,
        sink: &mut dyn DocumentSink,
    ) -> Result<RunReport>
    where
        I: IntoIterator<Item = Result<Document>>,
    {
        let started = Instant::now();
        let mut state = RunState {
            timings: self.profile.then(StageTimings::default),
            scorecard: self.gold.clone().map(Scorecard::new),
        };
        let mut report = RunReport::default();
        let mut documents = documents.into_iter();

        let mut position = 0;
        while let Some(next) = state.timed(StageKind::Read, || documents.next())
        {
            let outcome = match next {
                Ok(doc) => self.process_in(position, doc, &mut state),
                Err(error) => DocumentOutcome::Failure(DocumentFailure {
                    position,
                    document: None,
                    stage: StageKind::Read,
                    error,
                }),
            };

            match outcome {
                DocumentOutcome::Success(doc) => {
                    if let Err(e) =
                        state.timed(StageKind::Write, || sink.write(&doc))
                    {
                        error!(
                            document = %doc.id(),
                            error = %e,
                            "write failed"
                        );
                        return Err(e);
                    }
                    report.processed += 1;
                    report.mentions_linked += doc.linked_count();
                    report.mentions_nil += doc.nil_count();
                }
                DocumentOutcome::Failure(failure) => {
                    let document =
                        failure.document.as_ref().map(DocumentId::as_str);
                    warn!(
                        position = failure.position,
                        document = ?document,
                        stage = %failure.stage,
                        error = %failure.error,
                        "document failed"
                    );
                    report.failed += 1;
                    report.failures.push(failure);
                }
            }

            position += 1;
            if self.progress_every > 0 && position % self.progress_every == 0 {
                info!(
                    documents = position,
                    failed = report.failed,
                    "progress"
                );
            }
        }
        sink.finish()?;

        if let Some(timings) = &mut state.timings {
            timings.total = started.elapsed();
        }
        report.timings = state.timings;
        report.scorecard = state.scorecard;
        info!(
            processed = report.processed,
            failed = report.failed,
            linked = report.mentions_linked,
            nil = report.mentions_nil,
            "run complete"
        );
        Ok(report)
    }
}
