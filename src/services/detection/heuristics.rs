// Heuristic Rules
// Fast local signatures for common scam patterns, blended with the remote verdict

use regex::Regex;
use std::sync::OnceLock;

use super::validator::ValidatedReply;

/// (pattern, indicator, weight)
const RULES: &[(&str, &str, u32)] = &[
    (
        r"(?i)\b(urgent|act now|immediate(ly)?|action required|suspended|locked|unauthorized)\b",
        "Urgent Pressure",
        20,
    ),
    (
        r"(?i)\b(winner|lottery|prize|gift card|inherit(ed|ance)|million|jackpot)\b",
        "Too Good To Be True",
        25,
    ),
    (
        r"(?i)(verify your account|update (your )?password|login here|confirm (your )?details)",
        "Asking For Account Details",
        30,
    ),
    (r"(?i)\b(bit\.ly|t\.co|tinyurl\.com|ow\.ly|is\.gd)/", "Hidden Link (Shortener)", 10),
    (r"\b\d{1,3}(\.\d{1,3}){3}\b", "Link To A Raw Number Address", 15),
];

static COMPILED: OnceLock<Vec<(Regex, &'static str, u32)>> = OnceLock::new();

fn rules() -> &'static [(Regex, &'static str, u32)] {
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .map(|(pattern, label, weight)| {
                (Regex::new(pattern).expect("valid heuristic pattern"), *label, *weight)
            })
            .collect()
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeuristicReport {
    /// Sum of matched weights, capped at 100.
    pub score: u32,
    pub indicators: Vec<String>,
}

pub fn run_heuristics(text: &str) -> HeuristicReport {
    let mut report = HeuristicReport::default();
    for (re, label, weight) in rules() {
        if re.is_match(text) {
            report.score += weight;
            report.indicators.push(label.to_string());
        }
    }
    report.score = report.score.min(100);
    report
}

/// Keep the more cautious score and add any local indicators the model did not mention.
pub fn merge_with_heuristics(mut reply: ValidatedReply, report: &HeuristicReport) -> ValidatedReply {
    reply.risk_score = reply.risk_score.max(report.score as f64);
    for indicator in &report.indicators {
        let seen = reply
            .indicators
            .iter()
            .any(|i| i.eq_ignore_ascii_case(indicator));
        if !seen {
            reply.indicators.push(indicator.clone());
        }
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Verdict;

    fn reply(score: f64, indicators: &[&str]) -> ValidatedReply {
        ValidatedReply {
            verdict: Verdict::Suspicious,
            risk_score: score,
            indicators: indicators.iter().map(|s| s.to_string()).collect(),
            reasoning: String::new(),
            advice: String::new(),
        }
    }

    #[test]
    fn test_locked_account_message() {
        let report = run_heuristics(
            "Your account is locked, click http://bad.example/ to verify your account",
        );
        assert_eq!(report.score, 50);
        assert_eq!(report.indicators, vec!["Urgent Pressure", "Asking For Account Details"]);
    }

    #[test]
    fn test_score_is_capped() {
        let report = run_heuristics(
            "URGENT winner! login here http://10.0.0.1/x or bit.ly/abc to claim your prize",
        );
        assert_eq!(report.indicators.len(), 5);
        assert_eq!(report.score, 100);
    }

    #[test]
    fn test_bare_ip_address_is_flagged() {
        let report = run_heuristics("Parcel held. Pay the fee at 192.168.4.20/pay");
        assert_eq!(report.indicators, vec!["Link To A Raw Number Address"]);
        assert_eq!(report.score, 15);
    }

    #[test]
    fn test_plain_message_has_no_signals() {
        let report = run_heuristics("See you at dinner tonight, bring the salad.");
        assert_eq!(report, HeuristicReport::default());
    }

    #[test]
    fn test_merge_keeps_higher_score_and_dedupes() {
        let report = HeuristicReport {
            score: 45,
            indicators: vec!["Urgent Pressure".to_string(), "Hidden Link (Shortener)".to_string()],
        };
        let merged = merge_with_heuristics(reply(30.0, &["urgent pressure"]), &report);
        assert_eq!(merged.risk_score, 45.0);
        assert_eq!(merged.indicators, vec!["urgent pressure", "Hidden Link (Shortener)"]);

        let merged = merge_with_heuristics(reply(90.0, &[]), &report);
        assert_eq!(merged.risk_score, 90.0);
    }
}
