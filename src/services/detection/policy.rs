// Safe-by-default policy
// The prompt asks the model to prefer SUSPICIOUS when unsure; this enforces it on the reply.

use crate::models::Verdict;
use tracing::info;

use super::validator::ValidatedReply;

/// A SAFE verdict at or above this score is treated as uncertain.
pub const SAFE_MAX_RISK_SCORE: f64 = 30.0;
/// A SAFE verdict carrying this many red flags is treated as uncertain.
pub const SAFE_MAX_INDICATORS: usize = 3;

/// Escalate an inconsistent SAFE verdict to SUSPICIOUS. Never lowers a verdict.
pub fn enforce_safe_by_default(mut reply: ValidatedReply) -> ValidatedReply {
    if reply.verdict != Verdict::Safe {
        return reply;
    }

    let score_too_high = reply.risk_score >= SAFE_MAX_RISK_SCORE;
    let too_many_flags = reply.indicators.len() >= SAFE_MAX_INDICATORS;
    if score_too_high || too_many_flags {
        info!(
            risk_score = reply.risk_score,
            indicators = reply.indicators.len(),
            "policy.safe_verdict_escalated"
        );
        reply.verdict = Verdict::Suspicious;
    }

    reply
}
