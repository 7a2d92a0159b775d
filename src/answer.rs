//! Grounded answer assembly.
//!
//! Turns fused evidence into a context block the generator can cite by
//! page, and handles the two degraded outcomes distinctly: retrieval that
//! found nothing yields a fixed "no evidence" answer without calling the
//! generator at all, while a generator failure is folded into the answer
//! text so the evidence list the user already has is not thrown away.

use std::sync::Arc;

use anyhow::Result;

use crate::models::FusedHit;
use crate::traits::{Answer, Generator};

/// Answer returned when retrieval produced no evidence.
pub const NO_EVIDENCE_ANSWER: &str =
    "No evidence found in the indexed documents for this question.";

/// Build the evidence context passed to the generator: one block per
/// fused hit, each prefixed with its page label so the model can cite it.
pub fn format_evidence(hits: &[FusedHit]) -> String {
    let mut out = String::new();
    for hit in hits {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&format!("[page {}] {}", hit.metadata.page, hit.metadata.text));
    }
    out
}

/// Answers questions strictly from retrieved evidence.
pub struct AnswerPipeline {
    generator: Arc<dyn Generator>,
}

impl AnswerPipeline {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Produce an answer from the fused evidence.
    ///
    /// Empty evidence short-circuits to [`NO_EVIDENCE_ANSWER`] without a
    /// generator call. A generator error becomes a textual answer with no
    /// usage attached, so callers can still render the evidence list.
    pub async fn answer(&self, question: &str, evidence: &[FusedHit]) -> Result<Answer> {
        if evidence.is_empty() {
            return Ok(Answer {
                text: NO_EVIDENCE_ANSWER.to_string(),
                usage: None,
            });
        }

        match self.generator.generate(question, evidence).await {
            Ok(answer) => Ok(answer),
            Err(e) => Ok(Answer {
                text: format!("Answer generation failed: {e:#}"),
                usage: None,
            }),
        }
    }
}
