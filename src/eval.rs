//! Scoring a run against ground truth.
//!
//! The executor scores each document after coreference, candidate
//! generation and resolution into a per-document [`Scorecard`], and folds
//! that into the run's scorecard only once the document has made it
//! through every stage. Documents absent from the ground truth are not
//! scored.

use std::{collections::HashMap, fmt, hash::Hash, sync::Arc};

use crate::{
    model::{Document, EntityType, Span},
    output::{GoldLink, GroundTruth},
};

/// Precision, recall and their harmonic mean.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Prf {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl Prf {
    pub fn new(precision: f64, recall: f64) -> Self {
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        Self {
            precision,
            recall,
            f1,
        }
    }
}

impl fmt::Display for Prf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P: {:.3}  R: {:.3}  F1: {:.3}",
            self.precision, self.recall, self.f1
        )
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { num / den }
}

type Tally = HashMap<EntityType, usize>;

fn total(tally: &Tally) -> usize {
    tally.values().sum()
}

fn count(tally: &Tally, entity_type: EntityType) -> usize {
    tally.get(&entity_type).copied().unwrap_or(0)
}

fn add_tally(into: &mut Tally, from: &Tally) {
    for (&entity_type, &n) in from {
        *into.entry(entity_type).or_default() += n;
    }
}

/// B-cubed contribution of `clusters` scored against `reference`.
///
/// For every cluster with more than one member, counts how its members
/// are spread over the reference clusters. Returns the numerator (sum over
/// clusters of `Σ count² / size`) and the denominator (total size).
/// Members missing from `reference` add nothing to the numerator.
pub fn b_cubed<K: Hash + Eq>(
    clusters: &[Vec<Span>],
    reference: &HashMap<Span, K>,
) -> (f64, usize) {
    let (mut num, mut den) = (0.0, 0);
    for cluster in clusters.iter().filter(|c| c.len() > 1) {
        let mut counts: HashMap<&K, usize> = HashMap::new();
        for span in cluster {
            if let Some(key) = reference.get(span) {
                *counts.entry(key).or_default() += 1;
            }
        }
        let correct: usize = counts.values().map(|c| c * c).sum();
        num += correct as f64 / cluster.len() as f64;
        den += cluster.len();
    }
    (num, den)
}

/// In-document coreference scored with B-cubed.
#[derive(Debug, Default, Clone)]
pub struct CorefScore {
    precision_num: f64,
    precision_den: usize,
    recall_num: f64,
    recall_den: usize,
}

impl CorefScore {
    pub fn update(&mut self, doc: &Document, gold: &HashMap<Span, GoldLink>) {
        let mentions = doc.mentions();
        let predicted: Vec<Vec<Span>> = doc
            .chains()
            .iter()
            .map(|c| c.members.iter().map(|&i| mentions[i].span).collect())
            .collect();
        let predicted_map: HashMap<Span, usize> = predicted
            .iter()
            .enumerate()
            .flat_map(|(i, c)| c.iter().map(move |&s| (s, i)))
            .collect();

        let gold_map: HashMap<Span, String> = gold
            .iter()
            .map(|(&span, link)| (span, link.cluster()))
            .collect();
        let mut by_cluster: HashMap<&str, Vec<Span>> = HashMap::new();
        for (span, cluster) in &gold_map {
            by_cluster.entry(cluster.as_str()).or_default().push(*span);
        }
        let gold_clusters: Vec<Vec<Span>> = by_cluster.into_values().collect();

        let (p_num, p_den) = b_cubed(&predicted, &gold_map);
        let (r_num, r_den) = b_cubed(&gold_clusters, &predicted_map);
        self.precision_num += p_num;
        self.precision_den += p_den;
        self.recall_num += r_num;
        self.recall_den += r_den;
    }

    pub fn merge(&mut self, other: &Self) {
        self.precision_num += other.precision_num;
        self.precision_den += other.precision_den;
        self.recall_num += other.recall_num;
        self.recall_den += other.recall_den;
    }

    pub fn scores(&self) -> Prf {
        Prf::new(
            ratio(self.precision_num, self.precision_den as f64),
            ratio(self.recall_num, self.recall_den as f64),
        )
    }
}

impl fmt::Display for CorefScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Indoc Coref")?;
        writeln!(f, "-----------")?;
        writeln!(f, "{}", self.scores())
    }
}

/// How often the candidate list contains a gold entity.
#[derive(Debug, Default, Clone)]
pub struct CandidateRecall {
    with_links: Tally,
    with_correct: Tally,
}

impl CandidateRecall {
    pub fn update(&mut self, doc: &Document, gold: &HashMap<Span, GoldLink>) {
        for mention in doc.mentions() {
            let Some(link) = gold.get(&mention.span) else {
                continue;
            };
            if link.is_nil() {
                continue;
            }
            let entity_type = link.entity_type.unwrap_or(mention.entity_type);
            *self.with_links.entry(entity_type).or_default() += 1;
            if mention
                .candidates
                .iter()
                .any(|c| link.entities().contains(&c.entity_id))
            {
                *self.with_correct.entry(entity_type).or_default() += 1;
            }
        }
    }

    pub fn merge(&mut self, other: &Self) {
        add_tally(&mut self.with_links, &other.with_links);
        add_tally(&mut self.with_correct, &other.with_correct);
    }

    pub fn recall(&self) -> f64 {
        ratio(
            total(&self.with_correct) as f64,
            total(&self.with_links) as f64,
        )
    }

    pub fn recall_for(&self, entity_type: EntityType) -> f64 {
        ratio(
            count(&self.with_correct, entity_type) as f64,
            count(&self.with_links, entity_type) as f64,
        )
    }
}

impl fmt::Display for CandidateRecall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Candidate Generation")?;
        writeln!(f, "--------------------")?;
        writeln!(f, "R: {:.3}", self.recall())?;
        for t in EntityType::ALL {
            writeln!(
                f,
                "  {t} R: {:.3}  {}",
                self.recall_for(t),
                count(&self.with_links, t)
            )?;
        }
        Ok(())
    }
}

/// Resolver precision and recall.
///
/// Precision is over every linked mention. Recall is over gold-linked
/// mentions whose candidate list held a gold entity, so it measures the
/// resolver apart from candidate generation.
#[derive(Debug, Default, Clone)]
pub struct ResolverScore {
    correct: Tally,
    with_correct_candidate: Tally,
    with_links: Tally,
    false_alarms: usize,
}

impl ResolverScore {
    pub fn update(&mut self, doc: &Document, gold: &HashMap<Span, GoldLink>) {
        for mention in doc.mentions() {
            let chosen = mention.link.as_ref().and_then(|l| l.entity_id());
            if chosen.is_some() {
                *self.with_links.entry(mention.entity_type).or_default() += 1;
            }
            let Some(link) = gold.get(&mention.span) else {
                continue;
            };
            if link.is_nil() {
                if chosen.is_some() {
                    self.false_alarms += 1;
                }
                continue;
            }
            let in_candidates = mention
                .candidates
                .iter()
                .any(|c| link.entities().contains(&c.entity_id));
            if !in_candidates {
                continue;
            }
            let entity_type = link.entity_type.unwrap_or(mention.entity_type);
            *self.with_correct_candidate.entry(entity_type).or_default() += 1;
            if chosen.is_some_and(|id| link.entities().contains(id)) {
                *self.correct.entry(entity_type).or_default() += 1;
            }
        }
    }

    pub fn merge(&mut self, other: &Self) {
        add_tally(&mut self.correct, &other.correct);
        add_tally(
            &mut self.with_correct_candidate,
            &other.with_correct_candidate,
        );
        add_tally(&mut self.with_links, &other.with_links);
        self.false_alarms += other.false_alarms;
    }

    /// Linked mentions that are NIL in the ground truth.
    pub fn false_alarms(&self) -> usize {
        self.false_alarms
    }

    pub fn scores(&self) -> Prf {
        let correct = total(&self.correct) as f64;
        Prf::new(
            ratio(correct, total(&self.with_links) as f64),
            ratio(correct, total(&self.with_correct_candidate) as f64),
        )
    }

    pub fn scores_for(&self, entity_type: EntityType) -> Prf {
        let correct = count(&self.correct, entity_type) as f64;
        Prf::new(
            ratio(correct, count(&self.with_links, entity_type) as f64),
            ratio(
                correct,
                count(&self.with_correct_candidate, entity_type) as f64,
            ),
        )
    }
}

impl fmt::Display for ResolverScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Entity Resolution")?;
        writeln!(f, "-----------------")?;
        writeln!(f, "{}", self.scores())?;
        for t in EntityType::ALL {
            writeln!(
                f,
                "  {t} {}  {}",
                self.scores_for(t),
                count(&self.with_links, t)
            )?;
        }
        writeln!(f, "NIL mentions linked: {}", self.false_alarms)
    }
}

/// All scores for one run.
#[derive(Debug, Clone)]
pub struct Scorecard {
    gold: Arc<GroundTruth>,
    pub coref: CorefScore,
    pub candidates: CandidateRecall,
    pub resolver: ResolverScore,
}

impl Scorecard {
    pub fn new(gold: Arc<GroundTruth>) -> Self {
        Self {
            gold,
            coref: CorefScore::default(),
            candidates: CandidateRecall::default(),
            resolver: ResolverScore::default(),
        }
    }

    /// An empty scorecard against the same ground truth, for tallying one
    /// document before it is known to succeed.
    pub fn empty(&self) -> Self {
        Self::new(self.gold.clone())
    }

    /// Add every tally of `other` to this scorecard.
    pub fn merge(&mut self, other: &Self) {
        self.coref.merge(&other.coref);
        self.candidates.merge(&other.candidates);
        self.resolver.merge(&other.resolver);
    }

    pub fn score_coref(&mut self, doc: &Document) {
        if let Some(gold) = self.gold.document(doc.id()) {
            self.coref.update(doc, gold);
        }
    }

    pub fn score_candidates(&mut self, doc: &Document) {
        if let Some(gold) = self.gold.document(doc.id()) {
            self.candidates.update(doc, gold);
        }
    }

    pub fn score_resolution(&mut self, doc: &Document) {
        if let Some(gold) = self.gold.document(doc.id()) {
            self.resolver.update(doc, gold);
        }
    }
}

impl fmt::Display for Scorecard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.coref)?;
        writeln!(f, "{}", self.candidates)?;
        write!(f, "{}", self.resolver)
    }
}
