// Fail-Safe Generator
// Conservative stand-in result whenever a classification cannot be completed or trusted

use crate::models::{AnalysisResult, ContentType, Verdict};
use crate::services::sanitizer::truncate_chars;
use tracing::warn;

pub const FAIL_SAFE_RISK_SCORE: f64 = 50.0;
pub const FAIL_SAFE_INDICATOR: &str = "Technical Glitch";
pub const FAIL_SAFE_REASONING: &str = "We had a small trouble analyzing this specific message right now. To be safe, we've marked it as suspicious.";
pub const FAIL_SAFE_ADVICE: &str = "Don't click any links or reply to this message until you can check it with a person you trust.";
const FAIL_SAFE_PREVIEW_CHARS: usize = 100;

/// Build the fail-safe result. `reason` is only logged; the user always sees the same fixed text.
pub fn make_fail_safe(preview: &str, content_type: ContentType, reason: &str) -> AnalysisResult {
    warn!(reason = %reason, content_type = ?content_type, "classifier.fail_safe");

    AnalysisResult {
        id: format!("err-{}", uuid::Uuid::new_v4().simple()),
        timestamp: chrono::Utc::now().timestamp_millis(),
        content: format!("{}...", truncate_chars(preview, FAIL_SAFE_PREVIEW_CHARS)),
        content_type,
        verdict: Verdict::Suspicious,
        risk_score: FAIL_SAFE_RISK_SCORE,
        indicators: vec![FAIL_SAFE_INDICATOR.to_string()],
        reasoning: FAIL_SAFE_REASONING.to_string(),
        advice: FAIL_SAFE_ADVICE.to_string(),
        image_url: None,
        sources: None,
        is_deep_scan: false,
    }
}

pub fn is_fail_safe(result: &AnalysisResult) -> bool {
    result.verdict == Verdict::Suspicious
        && result.risk_score == FAIL_SAFE_RISK_SCORE
        && result.indicators.len() == 1
        && result.indicators[0] == FAIL_SAFE_INDICATOR
        && result.reasoning == FAIL_SAFE_REASONING
}
