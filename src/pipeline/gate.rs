//! Quality gate — bounded retry-with-feedback around a single stage call.
//!
//! Wraps a stage function together with an evaluator of its output. A
//! rejected output (or a failed capability call) feeds its rejection
//! reason into the next attempt as feedback. When the budget runs out
//! the gate escalates: it returns the best output seen across attempts
//! instead of failing, so a single stage can never abort a batch. Only
//! when no attempt produced any output at all does the gate report
//! exhaustion, and even that is a value the caller degrades from, not
//! an error.

use super::error::CapabilityError;

/// Verdict from a stage evaluator.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub accepted: bool,
    /// Rejection reason, injected into the next attempt as feedback.
    pub feedback: String,
    /// Relative quality of a rejected output. Escalation returns the
    /// highest-merit output seen, ties broken toward the latest attempt.
    pub merit: u32,
}

impl Evaluation {
    pub fn accept() -> Self {
        Self {
            accepted: true,
            feedback: String::new(),
            merit: 0,
        }
    }

    pub fn reject(feedback: impl Into<String>, merit: u32) -> Self {
        Self {
            accepted: false,
            feedback: feedback.into(),
            merit,
        }
    }
}

/// Terminal outcome of a gated stage call.
#[derive(Debug)]
pub enum GateOutcome<T> {
    /// The evaluator accepted an output within budget.
    Accepted { output: T, attempts: u32 },
    /// Budget exhausted; the best rejected output is returned
    /// unverified, with the last rejection reason.
    Escalated {
        output: T,
        attempts: u32,
        reason: String,
    },
    /// Budget exhausted and no attempt produced any output (every call
    /// failed). Callers fall back to a stage-specific degraded default.
    Exhausted { attempts: u32, reason: String },
}

impl<T> GateOutcome<T> {
    /// The output, if any attempt produced one.
    pub fn into_output(self) -> Option<T> {
        match self {
            Self::Accepted { output, .. } | Self::Escalated { output, .. } => Some(output),
            Self::Exhausted { .. } => None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Bounded retry-with-feedback controller. One instance wraps every
/// gated stage call in a batch run.
#[derive(Debug, Clone, Copy)]
pub struct QualityGate {
    max_attempts: u32,
}

impl QualityGate {
    /// `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Drive `call` through up to `max_attempts` attempts, judging each
    /// output with `eval`. A capability error counts as a rejection
    /// with the error text as feedback.
    pub fn run<T, C, E>(&self, stage: &'static str, mut call: C, eval: E) -> GateOutcome<T>
    where
        C: FnMut(Option<&str>) -> Result<T, CapabilityError>,
        E: Fn(&T) -> Evaluation,
    {
        let mut feedback: Option<String> = None;
        let mut best: Option<(u32, T)> = None;

        for attempt in 1..=self.max_attempts {
            match call(feedback.as_deref()) {
                Ok(output) => {
                    let verdict = eval(&output);
                    if verdict.accepted {
                        if attempt > 1 {
                            tracing::debug!(stage, attempt, "Stage output accepted after retry");
                        }
                        return GateOutcome::Accepted {
                            output,
                            attempts: attempt,
                        };
                    }
                    tracing::warn!(
                        stage,
                        attempt,
                        feedback = %verdict.feedback,
                        "Stage output rejected"
                    );
                    // `>=` so later attempts win merit ties.
                    if best.as_ref().map_or(true, |(m, _)| verdict.merit >= *m) {
                        best = Some((verdict.merit, output));
                    }
                    feedback = Some(verdict.feedback);
                }
                Err(e) => {
                    tracing::warn!(stage, attempt, error = %e, "Capability call failed");
                    feedback = Some(e.to_string());
                }
            }
        }

        let reason = feedback.unwrap_or_else(|| "rejected with no feedback".to_string());
        match best {
            Some((_, output)) => {
                tracing::warn!(
                    stage,
                    attempts = self.max_attempts,
                    reason = %reason,
                    "Retry budget exhausted, escalating with best unverified output"
                );
                GateOutcome::Escalated {
                    output,
                    attempts: self.max_attempts,
                    reason,
                }
            }
            None => {
                tracing::error!(
                    stage,
                    attempts = self.max_attempts,
                    reason = %reason,
                    "Retry budget exhausted with no usable output"
                );
                GateOutcome::Exhausted {
                    attempts: self.max_attempts,
                    reason,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reject_all(output: &String) -> Evaluation {
        Evaluation::reject(format!("bad output: {output}"), output.len() as u32)
    }

    #[test]
    fn accepts_first_good_output() {
        let gate = QualityGate::new(3);
        let mut calls = 0;

        let outcome = gate.run(
            "stage",
            |_| {
                calls += 1;
                Ok("fine".to_string())
            },
            |_| Evaluation::accept(),
        );

        assert!(outcome.is_accepted());
        assert_eq!(calls, 1);
    }

    #[test]
    fn always_rejecting_evaluator_stops_at_max_attempts() {
        let gate = QualityGate::new(3);
        let mut calls = 0;

        let outcome = gate.run(
            "stage",
            |_| {
                calls += 1;
                Ok("junk".to_string())
            },
            reject_all,
        );

        assert_eq!(calls, 3, "exactly max_attempts calls, never unbounded");
        match outcome {
            GateOutcome::Escalated { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected escalation, got {other:?}"),
        }
    }

    #[test]
    fn feedback_from_rejection_reaches_next_attempt() {
        let gate = QualityGate::new(2);
        let mut seen: Vec<Option<String>> = Vec::new();

        gate.run(
            "stage",
            |feedback| {
                seen.push(feedback.map(String::from));
                Ok("junk".to_string())
            },
            |_| Evaluation::reject("too short", 0),
        );

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], None);
        assert_eq!(seen[1].as_deref(), Some("too short"));
    }

    #[test]
    fn capability_error_becomes_feedback() {
        let gate = QualityGate::new(2);
        let mut seen: Vec<Option<String>> = Vec::new();
        let mut calls = 0;

        let outcome = gate.run(
            "stage",
            |feedback| {
                seen.push(feedback.map(String::from));
                calls += 1;
                if calls == 1 {
                    Err(CapabilityError::Http("connection reset".into()))
                } else {
                    Ok("recovered".to_string())
                }
            },
            |_| Evaluation::accept(),
        );

        assert!(outcome.is_accepted());
        assert!(seen[1].as_deref().unwrap().contains("connection reset"));
    }

    #[test]
    fn escalation_returns_best_merit_output() {
        let gate = QualityGate::new(3);
        let outputs = ["aa", "aaaa", "a"]; // merit = length
        let mut calls = 0;

        let outcome = gate.run(
            "stage",
            |_| {
                let out = outputs[calls].to_string();
                calls += 1;
                Ok(out)
            },
            reject_all,
        );

        assert_eq!(outcome.into_output().as_deref(), Some("aaaa"));
    }

    #[test]
    fn escalation_merit_ties_prefer_latest_attempt() {
        let gate = QualityGate::new(2);
        let outputs = ["first", "later"]; // equal length, equal merit
        let mut calls = 0;

        let outcome = gate.run(
            "stage",
            |_| {
                let out = outputs[calls].to_string();
                calls += 1;
                Ok(out)
            },
            reject_all,
        );

        assert_eq!(outcome.into_output().as_deref(), Some("later"));
    }

    #[test]
    fn all_calls_failing_exhausts_with_reason() {
        let gate = QualityGate::new(3);
        let mut calls = 0;

        let outcome: GateOutcome<String> = gate.run(
            "stage",
            |_| {
                calls += 1;
                Err(CapabilityError::Timeout(30))
            },
            |_| Evaluation::accept(),
        );

        assert_eq!(calls, 3);
        match outcome {
            GateOutcome::Exhausted { attempts, reason } => {
                assert_eq!(attempts, 3);
                assert!(reason.contains("timed out"));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn zero_budget_clamps_to_one_attempt() {
        let gate = QualityGate::new(0);
        assert_eq!(gate.max_attempts(), 1);

        let mut calls = 0;
        gate.run(
            "stage",
            |_| {
                calls += 1;
                Ok(())
            },
            |_| Evaluation::accept(),
        );
        assert_eq!(calls, 1);
    }
}
