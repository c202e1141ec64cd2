// Response Validator
// Parses the remote model's reply and checks it structurally before it is trusted

use crate::models::Verdict;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub const RISK_SCORE_MIN: f64 = 0.0;
pub const RISK_SCORE_MAX: f64 = 100.0;

/// Raw reply fields, typed loosely so the validator can report exactly what is wrong.
/// The risk score arrives as `riskScore` or `risk_score` depending on the prompt variant.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReply {
    #[serde(default)]
    pub verdict: Option<Value>,
    #[serde(default)]
    pub risk_score: Option<Value>,
    #[serde(default, rename = "risk_score")]
    pub risk_score_snake: Option<Value>,
    #[serde(default)]
    pub indicators: Option<Value>,
    #[serde(default)]
    pub reasoning: Option<Value>,
    #[serde(default)]
    pub advice: Option<Value>,
}

impl RawReply {
    /// `riskScore` wins when both spellings carry a value.
    pub fn score(&self) -> &Option<Value> {
        match &self.risk_score {
            Some(v) if !v.is_null() => &self.risk_score,
            _ => &self.risk_score_snake,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    Parsed(RawReply),
    ParseFailed(String),
}

/// A reply that passed every structural and range check.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedReply {
    pub verdict: Verdict,
    pub risk_score: f64,
    pub indicators: Vec<String>,
    pub reasoning: String,
    pub advice: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("reply could not be parsed as JSON")]
    Unparsed,
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("unrecognized verdict `{0}`")]
    UnknownVerdict(String),
    #[error("risk score is not a number")]
    NonNumericScore,
    #[error("risk score {0} outside [0, 100]")]
    ScoreOutOfRange(f64),
    #[error("field `{0}` has the wrong type")]
    WrongType(&'static str),
}

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```JSON"))
        .or_else(|| trimmed.strip_prefix("```"));

    match inner {
        Some(rest) => rest.strip_suffix("```").unwrap_or(rest).trim(),
        None => trimmed,
    }
}

pub fn parse_reply(raw_text: &str) -> ParsedReply {
    let cleaned = strip_code_fences(raw_text);
    match serde_json::from_str::<Value>(cleaned) {
        Ok(value @ Value::Object(_)) => match serde_json::from_value::<RawReply>(value) {
            Ok(reply) => ParsedReply::Parsed(reply),
            Err(_) => ParsedReply::ParseFailed(raw_text.to_string()),
        },
        _ => ParsedReply::ParseFailed(raw_text.to_string()),
    }
}

pub fn validate(parsed: &ParsedReply) -> bool {
    check(parsed).is_ok()
}

pub fn check(parsed: &ParsedReply) -> Result<ValidatedReply, ValidationError> {
    let reply = match parsed {
        ParsedReply::Parsed(reply) => reply,
        ParsedReply::ParseFailed(_) => return Err(ValidationError::Unparsed),
    };

    let verdict_raw = present(&reply.verdict, "verdict")?;
    let score_raw = present(reply.score(), "riskScore")?;
    let reasoning_raw = present(&reply.reasoning, "reasoning")?;
    let advice_raw = present(&reply.advice, "advice")?;
    let indicators_raw = present(&reply.indicators, "indicators")?;

    let verdict_str = verdict_raw.as_str().ok_or(ValidationError::WrongType("verdict"))?;
    let verdict = Verdict::parse(verdict_str)
        .ok_or_else(|| ValidationError::UnknownVerdict(verdict_str.to_string()))?;

    let risk_score = score_raw.as_f64().ok_or(ValidationError::NonNumericScore)?;
    if !(RISK_SCORE_MIN..=RISK_SCORE_MAX).contains(&risk_score) {
        return Err(ValidationError::ScoreOutOfRange(risk_score));
    }

    let reasoning = reasoning_raw
        .as_str()
        .ok_or(ValidationError::WrongType("reasoning"))?
        .to_string();
    let advice = advice_raw
        .as_str()
        .ok_or(ValidationError::WrongType("advice"))?
        .to_string();

    let indicators = indicators_raw
        .as_array()
        .ok_or(ValidationError::WrongType("indicators"))?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<Vec<String>>>()
        .ok_or(ValidationError::WrongType("indicators"))?;

    Ok(ValidatedReply {
        verdict,
        risk_score,
        indicators,
        reasoning,
        advice,
    })
}

fn present<'a>(field: &'a Option<Value>, name: &'static str) -> Result<&'a Value, ValidationError> {
    match field {
        Some(Value::Null) | None => Err(ValidationError::MissingField(name)),
        Some(v) => Ok(v),
    }
}
