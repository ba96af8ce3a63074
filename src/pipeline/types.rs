//! Core types for the outreach pipeline.
//!
//! These types model the full lifecycle:
//! Intake → Queue → Research → Scoring → Selection → Generation → Delivery.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ═══════════════════════════════════════════
// Batch (unit of queued work)
// ═══════════════════════════════════════════

/// One company's set of prospects, submitted together.
///
/// Immutable once enqueued. The runner works on its own copy of the
/// prospects, so a batch can be logged or inspected at any point
/// without seeing partial pipeline state.
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: Uuid,
    pub company: String,
    /// Intake order — also the processing and delivery order.
    pub prospects: Vec<Prospect>,
    pub callback_url: String,
    /// Top-N cap for selection.
    pub max_selected: usize,
    /// Minimum score (0-100) a prospect needs to qualify.
    pub min_score_threshold: u8,
}

/// One candidate person within a batch.
///
/// Mutated only by the runner, strictly left to right: scoring writes
/// `score` and the scoring rationale, selection writes `selected` and
/// the final `selection_reasoning`, generation writes `message`,
/// `message_score`, and `error`. No stage ever rewinds an earlier
/// stage's fields.
#[derive(Debug, Clone)]
pub struct Prospect {
    pub id: String,
    /// Display fields from intake (name, title, profile text, ...).
    pub fields: BTreeMap<String, String>,
    pub score: Option<u8>,
    pub selected: bool,
    pub selection_reasoning: String,
    pub message: String,
    pub message_score: u8,
    pub error: String,
}

impl Prospect {
    pub fn new(id: String, fields: BTreeMap<String, String>) -> Self {
        Self {
            id,
            fields,
            score: None,
            selected: false,
            selection_reasoning: String::new(),
            message: String::new(),
            message_score: 0,
            error: String::new(),
        }
    }

    fn field(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("")
    }

    /// Human-readable name, from `fullName` with `name` as fallback.
    pub fn display_name(&self) -> &str {
        let name = self.field("fullName");
        if name.is_empty() {
            self.field("name")
        } else {
            name
        }
    }

    pub fn title(&self) -> &str {
        self.field("title")
    }

    pub fn company(&self) -> &str {
        self.field("companyName")
    }

    /// Flatten the display fields into prompt-ready `key: value` lines.
    pub fn profile_text(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ═══════════════════════════════════════════
// Research Context (shared per batch)
// ═══════════════════════════════════════════

/// Shared findings about a batch's company.
///
/// Computed exactly once per batch, before any prospect is scored,
/// and read-only afterwards. May be empty when research exhausted its
/// retry budget — downstream stages tolerate that and degrade.
#[derive(Debug, Clone, Default)]
pub struct ResearchContext {
    pub company: String,
    pub findings: String,
}

impl ResearchContext {
    pub fn empty(company: &str) -> Self {
        Self {
            company: company.to_string(),
            findings: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.findings.trim().is_empty()
    }
}

// ═══════════════════════════════════════════
// Capability outputs (validated by gate evaluators)
// ═══════════════════════════════════════════

/// Raw scoring capability output. The gate evaluator checks the score
/// into 0..=100 before it is ever written to a prospect.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreOutcome {
    pub score: i64,
    #[serde(default)]
    pub reasoning: String,
}

/// One candidate message from verbalized sampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageVariant {
    #[serde(rename = "message")]
    pub text: String,
    /// Self-reported probability/creativity weight.
    #[serde(rename = "probability", default)]
    pub weight: f32,
    /// Rhetorical approach tag (e.g. "shared-interest", "pain-point").
    #[serde(rename = "hook_type", default)]
    pub tag: String,
}

/// The chosen variant plus the selector's justification. The gate
/// evaluator checks the score into 1..=10.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectedMessage {
    pub message: String,
    pub score: i64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub rejected_reasons: String,
}

// ═══════════════════════════════════════════
// Queue bookkeeping
// ═══════════════════════════════════════════

/// A batch wrapped with queue bookkeeping, used only for size/position
/// reporting.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub batch: Batch,
    /// Monotonically increasing enqueue counter (1-based).
    pub position: u64,
    pub enqueued_at: NaiveDateTime,
}

// ═══════════════════════════════════════════
// Delivery payload
// ═══════════════════════════════════════════

/// The per-prospect result posted to the batch's callback target.
/// Exactly one of these is delivered for every prospect in a batch,
/// whether or not any upstream stage succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutreachResult {
    pub id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub title: String,
    pub selected: bool,
    pub selection_reasoning: String,
    pub message: String,
    pub message_score: u8,
    pub error: String,
}

impl OutreachResult {
    /// Snapshot a prospect once the pipeline is done with it.
    pub fn from_prospect(prospect: &Prospect) -> Self {
        Self {
            id: prospect.id.clone(),
            display_name: prospect.display_name().to_string(),
            title: prospect.title().to_string(),
            selected: prospect.selected,
            selection_reasoning: prospect.selection_reasoning.clone(),
            message: prospect.message.clone(),
            message_score: prospect.message_score,
            error: prospect.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn display_name_prefers_full_name() {
        let p = Prospect::new(
            "p1".into(),
            fields(&[("fullName", "Sarah Chen"), ("name", "S. Chen")]),
        );
        assert_eq!(p.display_name(), "Sarah Chen");
    }

    #[test]
    fn display_name_falls_back_to_name() {
        let p = Prospect::new("p1".into(), fields(&[("name", "S. Chen")]));
        assert_eq!(p.display_name(), "S. Chen");
    }

    #[test]
    fn missing_fields_read_as_empty() {
        let p = Prospect::new("p1".into(), BTreeMap::new());
        assert_eq!(p.display_name(), "");
        assert_eq!(p.title(), "");
        assert_eq!(p.company(), "");
    }

    #[test]
    fn profile_text_joins_fields() {
        let p = Prospect::new(
            "p1".into(),
            fields(&[("fullName", "Sarah Chen"), ("title", "VP Engineering")]),
        );
        let text = p.profile_text();
        assert!(text.contains("fullName: Sarah Chen"));
        assert!(text.contains("title: VP Engineering"));
    }

    #[test]
    fn new_prospect_starts_unprocessed() {
        let p = Prospect::new("p1".into(), BTreeMap::new());
        assert_eq!(p.score, None);
        assert!(!p.selected);
        assert!(p.message.is_empty());
        assert_eq!(p.message_score, 0);
        assert!(p.error.is_empty());
    }

    #[test]
    fn empty_context_reports_empty() {
        let ctx = ResearchContext::empty("Acme");
        assert!(ctx.is_empty());
        assert_eq!(ctx.company, "Acme");

        let ctx = ResearchContext {
            company: "Acme".into(),
            findings: "   ".into(),
        };
        assert!(ctx.is_empty(), "whitespace-only findings count as empty");
    }

    #[test]
    fn result_serializes_with_wire_names() {
        let mut p = Prospect::new(
            "vm-1".into(),
            fields(&[("fullName", "Sarah Chen"), ("title", "CTO")]),
        );
        p.selected = true;
        p.message = "Hi Sarah".into();
        p.message_score = 8;

        let json = serde_json::to_value(OutreachResult::from_prospect(&p)).unwrap();
        assert_eq!(json["id"], "vm-1");
        assert_eq!(json["displayName"], "Sarah Chen");
        assert_eq!(json["title"], "CTO");
        assert_eq!(json["selected"], true);
        assert_eq!(json["message_score"], 8);
        assert_eq!(json["error"], "");
    }

    #[test]
    fn variant_deserializes_from_wire_names() {
        let v: MessageVariant = serde_json::from_str(
            r#"{"message": "Hi there", "probability": 0.3, "hook_type": "pain-point"}"#,
        )
        .unwrap();
        assert_eq!(v.text, "Hi there");
        assert_eq!(v.tag, "pain-point");
    }
}
