//! BatchRunner — drives one batch through the full stage sequence.
//!
//! Researching → Scoring → Selecting → GeneratingPerItem → Done,
//! strictly sequential (one capability call at a time, matching
//! external rate limits). Every capability call goes through the
//! quality gate; a stage-local failure degrades the affected prospect
//! and never aborts the batch. The runner always returns one result
//! per prospect, in intake order.

use std::time::Instant;

use super::gate::{Evaluation, GateOutcome, QualityGate};
use super::traits::Capabilities;
use super::types::{
    Batch, MessageVariant, OutreachResult, Prospect, ResearchContext, ScoreOutcome,
    SelectedMessage,
};

pub struct BatchRunner {
    capabilities: Box<dyn Capabilities>,
    gate: QualityGate,
}

impl BatchRunner {
    pub fn new(capabilities: Box<dyn Capabilities>, gate: QualityGate) -> Self {
        Self { capabilities, gate }
    }

    /// Run a batch to completion. Never fails: capability trouble
    /// degrades individual prospects through their `error` field.
    pub fn process(&self, batch: &Batch) -> Vec<OutreachResult> {
        let started = Instant::now();
        let mut prospects = batch.prospects.clone();

        let context = self.research(batch);
        self.score_all(&mut prospects, &context);
        apply_selection(&mut prospects, batch.max_selected, batch.min_score_threshold);
        self.generate_all(&mut prospects, &context);

        tracing::info!(
            batch_id = %batch.id,
            company = %batch.company,
            prospects = prospects.len(),
            selected = prospects.iter().filter(|p| p.selected).count(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Batch pipeline complete"
        );

        prospects.iter().map(OutreachResult::from_prospect).collect()
    }

    /// Researching stage — one shared context per batch, computed
    /// before any prospect is scored.
    fn research(&self, batch: &Batch) -> ResearchContext {
        let outcome = self.gate.run(
            "research",
            |feedback| self.capabilities.research(&batch.company, feedback),
            |findings: &String| {
                if findings.trim().is_empty() {
                    Evaluation::reject("research findings were empty", 0)
                } else {
                    Evaluation::accept()
                }
            },
        );

        match outcome {
            GateOutcome::Accepted { output, .. } => ResearchContext {
                company: batch.company.clone(),
                findings: output,
            },
            GateOutcome::Escalated { output, reason, .. } => {
                tracing::warn!(batch_id = %batch.id, reason = %reason, "Using unverified research findings");
                ResearchContext {
                    company: batch.company.clone(),
                    findings: output,
                }
            }
            GateOutcome::Exhausted { reason, .. } => {
                tracing::warn!(batch_id = %batch.id, reason = %reason, "Research failed, continuing with empty context");
                ResearchContext::empty(&batch.company)
            }
        }
    }

    /// Scoring stage — every prospect in intake order. One prospect's
    /// score never depends on another's.
    fn score_all(&self, prospects: &mut [Prospect], context: &ResearchContext) {
        for prospect in prospects.iter_mut() {
            let outcome = self.gate.run(
                "score",
                |feedback| self.capabilities.score_prospect(prospect, context, feedback),
                |o: &ScoreOutcome| score_evaluation(o),
            );

            match outcome {
                GateOutcome::Accepted { output, .. } => {
                    prospect.score = Some(output.score as u8);
                    prospect.selection_reasoning = output.reasoning;
                }
                GateOutcome::Escalated { output, reason, .. } => {
                    tracing::warn!(prospect_id = %prospect.id, reason = %reason, "Using unverified score");
                    prospect.score = Some(output.score.clamp(0, 100) as u8);
                    prospect.selection_reasoning = output.reasoning;
                }
                GateOutcome::Exhausted { reason, .. } => {
                    tracing::warn!(prospect_id = %prospect.id, reason = %reason, "Scoring failed");
                    prospect.error = format!("scoring failed: {reason}");
                }
            }
        }
    }

    /// GeneratingPerItem stage — selected prospects only, in order.
    fn generate_all(&self, prospects: &mut [Prospect], context: &ResearchContext) {
        for prospect in prospects.iter_mut().filter(|p| p.selected) {
            self.generate_for(prospect, context);
        }
    }

    /// A terminal failure here never revokes the selection made by the
    /// scoring stage; it only leaves `message` empty and `error` set.
    fn generate_for(&self, prospect: &mut Prospect, context: &ResearchContext) {
        let variants_outcome = self.gate.run(
            "generate_variants",
            |feedback| self.capabilities.generate_variants(prospect, context, feedback),
            |v: &Vec<MessageVariant>| variants_evaluation(v),
        );

        let variants = match variants_outcome {
            GateOutcome::Accepted { output, .. } => output,
            GateOutcome::Escalated { output, reason, .. } => {
                tracing::warn!(prospect_id = %prospect.id, reason = %reason, "Using unverified message variants");
                output
            }
            GateOutcome::Exhausted { reason, .. } => {
                tracing::warn!(
                    prospect_id = %prospect.id,
                    reason = %reason,
                    "Variant generation failed, prospect keeps selection without a message"
                );
                prospect.error = format!("variant generation failed: {reason}");
                return;
            }
        };

        let selection_outcome = self.gate.run(
            "select_best",
            |feedback| {
                self.capabilities
                    .select_best(&variants, prospect, context, feedback)
            },
            |s: &SelectedMessage| selection_evaluation(s),
        );

        match selection_outcome {
            GateOutcome::Accepted { output, .. } => {
                prospect.message = output.message;
                prospect.message_score = output.score as u8;
            }
            GateOutcome::Escalated { output, reason, .. } => {
                if output.message.trim().is_empty() {
                    prospect.error = format!("message selection failed: {reason}");
                } else {
                    tracing::warn!(prospect_id = %prospect.id, reason = %reason, "Using unverified message");
                    prospect.message = output.message;
                    prospect.message_score = output.score.clamp(1, 10) as u8;
                }
            }
            GateOutcome::Exhausted { reason, .. } => {
                prospect.error = format!("message selection failed: {reason}");
            }
        }
    }
}

/// Evaluator for the scoring stage: score in range, reasoning present.
fn score_evaluation(outcome: &ScoreOutcome) -> Evaluation {
    if !(0..=100).contains(&outcome.score) {
        return Evaluation::reject(format!("score {} is outside 0-100", outcome.score), 0);
    }
    if outcome.reasoning.trim().is_empty() {
        return Evaluation::reject("score came with no reasoning", 1);
    }
    Evaluation::accept()
}

/// Evaluator for variant generation: at least one non-empty variant.
fn variants_evaluation(variants: &[MessageVariant]) -> Evaluation {
    let usable = variants.iter().filter(|v| !v.text.trim().is_empty()).count();
    if usable == 0 {
        Evaluation::reject("no non-empty message variants were produced", 0)
    } else {
        Evaluation::accept()
    }
}

/// Evaluator for best-variant selection: non-empty message, score 1-10.
fn selection_evaluation(selected: &SelectedMessage) -> Evaluation {
    if selected.message.trim().is_empty() {
        return Evaluation::reject("selected message was empty", 0);
    }
    if !(1..=10).contains(&selected.score) {
        return Evaluation::reject(
            format!("message score {} is outside 1-10", selected.score),
            1,
        );
    }
    Evaluation::accept()
}

/// Selecting stage — pure ranking, no capability calls.
///
/// Rank by score descending with a stable tie-break on intake order. A
/// prospect is selected iff it sits within the top `max_selected` ranks
/// AND meets the score threshold. Everyone else gets a reasoning naming
/// the disqualifier.
pub fn apply_selection(prospects: &mut [Prospect], max_selected: usize, min_score_threshold: u8) {
    let mut ranked: Vec<usize> = (0..prospects.len())
        .filter(|&i| prospects[i].score.is_some())
        .collect();
    // Stable sort: equal scores keep intake order.
    ranked.sort_by(|&a, &b| prospects[b].score.cmp(&prospects[a].score));

    let mut rank_of = vec![usize::MAX; prospects.len()];
    for (rank, &idx) in ranked.iter().enumerate() {
        rank_of[idx] = rank;
    }

    for (i, prospect) in prospects.iter_mut().enumerate() {
        let Some(score) = prospect.score else {
            prospect.selected = false;
            prospect.selection_reasoning = "Not selected: prospect could not be scored".to_string();
            continue;
        };

        let in_top = rank_of[i] < max_selected;
        let above = score >= min_score_threshold;
        let scoring_reasoning = std::mem::take(&mut prospect.selection_reasoning);

        if in_top && above {
            prospect.selected = true;
            prospect.selection_reasoning =
                format!("Score: {score}/100. {scoring_reasoning}").trim_end().to_string();
        } else {
            let mut reasons = Vec::new();
            if !above {
                reasons.push(format!("score {score} is below threshold {min_score_threshold}"));
            }
            if !in_top {
                reasons.push(format!("outside the top {max_selected} by rank"));
            }
            prospect.selected = false;
            prospect.selection_reasoning = format!(
                "Score: {score}/100. Not selected: {}. {scoring_reasoning}",
                reasons.join(" and ")
            )
            .trim_end()
            .to_string();
        }
    }
}
