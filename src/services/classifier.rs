// Classification Client
// Owns the contract with the remote model: request assembly, dispatch, validation and
// normalization into an AnalysisResult. Every failure past input checks becomes a fail-safe result.

use serde_json::{json, Value};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::models::{
    AnalysisResult, ContentType, GroundingSource, Language, ScanMode, IMAGE_CONTENT_PLACEHOLDER,
};
use crate::services::config_store::ClassifierSettings;
use crate::services::detection::{
    check, enforce_safe_by_default, make_fail_safe, merge_with_heuristics, parse_reply,
    run_heuristics, ValidatedReply,
};
use crate::services::providers::{ClassifierTransport, GenerateRequest, RequestPart, WebSource};
use crate::services::sanitizer::{parse_image_data_uri, sanitize, strip_tags, ImagePayload};

pub const UNTITLED_SOURCE_LABEL: &str = "Source";

const IMAGE_PROMPT: &str = "Please help me check if this screenshot shows a scam or a dangerous message. Respond only with JSON containing: verdict, riskScore, indicators, reasoning, advice.";

const SYSTEM_INSTRUCTION: &str = r#"You are ScamShield, a helpful and friendly digital safety assistant. Your job is to help regular people stay safe from scams, phishing and fake messages.

TONE & STYLE:
- Be calm, clear and reassuring. Never blame the person for receiving the message.
- Avoid technical jargon. Say "Fake Link" instead of "Obfuscated URL" and "Urgent Pressure" instead of "Social Engineering".

OUTPUT FIELDS:
1. verdict: exactly one of SAFE, SUSPICIOUS or SCAM.
2. riskScore: a number from 0 to 100 (0 is totally fine, 100 is definitely a scam).
3. indicators: 3-5 short red flags (e.g. "Mismatched sender", "Asking for password", "Too good to be true"). Use an empty list if there are none.
4. reasoning: a friendly explanation of why you reached that verdict.
5. advice: clear, simple steps the person should take.

SAFE-BY-DEFAULT POLICY: if a message looks slightly odd or you are unsure, mark it as SUSPICIOUS to keep the person safe.

Your response MUST be a single JSON object."#;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("Please enter some text or upload an image to check.")]
    EmptyContent,
    #[error("This picture can't be checked. Please use a JPEG, PNG or WebP image under 3 MB.")]
    InvalidImage,
    #[error("A check is already running. Please wait for it to finish.")]
    Busy,
}

/// Per-call progress, logged at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Sanitizing,
    Requesting,
    ParsingResponse,
    Validating,
    Succeeded,
    FailSafe,
}

enum ScanInput {
    Text(String),
    Image { payload: ImagePayload, data_uri: String },
}

impl ScanInput {
    fn content_type(&self) -> ContentType {
        match self {
            Self::Text(_) => ContentType::Text,
            Self::Image { .. } => ContentType::Image,
        }
    }

    /// What gets stored as `content` on the result.
    fn display_content(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Image { .. } => IMAGE_CONTENT_PLACEHOLDER,
        }
    }
}

pub fn system_instruction(language: Language) -> String {
    format!(
        "{}\n\nLANGUAGE: Write every string value in the JSON (indicators, reasoning and advice) in {}. Keep the verdict value itself in English (SAFE, SUSPICIOUS or SCAM).",
        SYSTEM_INSTRUCTION,
        language.display_name()
    )
}

/// Structured-output schema with the five required fields.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "verdict": { "type": "STRING", "enum": ["SAFE", "SUSPICIOUS", "SCAM"] },
            "riskScore": { "type": "NUMBER" },
            "indicators": { "type": "ARRAY", "items": { "type": "STRING" } },
            "reasoning": { "type": "STRING" },
            "advice": { "type": "STRING" }
        },
        "required": ["verdict", "riskScore", "indicators", "reasoning", "advice"]
    })
}

pub struct ScamClassifier<T> {
    transport: T,
    settings: ClassifierSettings,
}

impl<T: ClassifierTransport> ScamClassifier<T> {
    pub fn new(transport: T, settings: ClassifierSettings) -> Self {
        Self { transport, settings }
    }

    pub fn settings(&self) -> &ClassifierSettings {
        &self.settings
    }

    /// Image scans always use the image model; otherwise deep scans get the heavier model.
    pub fn select_model(&self, is_image: bool, mode: &ScanMode) -> &str {
        if is_image {
            &self.settings.image_model
        } else if mode.deep_scan {
            &self.settings.deep_model
        } else {
            &self.settings.text_model
        }
    }

    fn build_request(&self, input: &ScanInput, mode: &ScanMode) -> GenerateRequest {
        let is_image = matches!(input, ScanInput::Image { .. });
        let (parts, response_schema) = match input {
            ScanInput::Text(text) => (vec![RequestPart::Text(text.clone())], Some(response_schema())),
            // The image model rejects response schemas; the prompt carries the shape instead
            ScanInput::Image { payload, .. } => (
                vec![
                    RequestPart::InlineImage {
                        mime_type: payload.mime_type.clone(),
                        data: payload.data.clone(),
                    },
                    RequestPart::Text(IMAGE_PROMPT.to_string()),
                ],
                None,
            ),
        };

        GenerateRequest {
            model: self.select_model(is_image, mode).to_string(),
            system_instruction: system_instruction(mode.language),
            parts,
            response_schema,
            grounded_search: mode.deep_scan && !is_image,
        }
    }

    /// Classify one message or image.
    ///
    /// Returns `Err` only for usage errors (nothing to classify, rejected image).
    /// Transport, parse and validation failures all resolve to the fail-safe result.
    pub async fn classify(
        &self,
        content: &str,
        is_image: bool,
        mode: &ScanMode,
    ) -> Result<AnalysisResult, ScanError> {
        debug!(phase = ?ScanPhase::Sanitizing, is_image, "classifier.phase");
        let input = if is_image {
            let payload = parse_image_data_uri(content).ok_or(ScanError::InvalidImage)?;
            ScanInput::Image {
                payload,
                data_uri: content.to_string(),
            }
        } else {
            let clean = sanitize(content);
            if clean.is_empty() {
                return Err(ScanError::EmptyContent);
            }
            ScanInput::Text(clean)
        };

        let request = self.build_request(&input, mode);
        let content_type = input.content_type();
        info!(
            model = %request.model,
            language = mode.language.code(),
            deep_scan = mode.deep_scan,
            grounded = request.grounded_search,
            content_type = ?content_type,
            chars = input.display_content().chars().count(),
            "classifier.request"
        );

        debug!(phase = ?ScanPhase::Requesting, "classifier.phase");
        let started = Instant::now();
        let reply = match self.transport.generate(&request).await {
            Ok(reply) => reply,
            Err(e) => return Ok(self.fail_safe(&input, &format!("transport: {}", e))),
        };

        debug!(phase = ?ScanPhase::ParsingResponse, latency_ms = reply.latency_ms, "classifier.phase");
        let parsed = parse_reply(&reply.text);

        debug!(phase = ?ScanPhase::Validating, "classifier.phase");
        let validated = match check(&parsed) {
            Ok(v) => v,
            Err(e) => return Ok(self.fail_safe(&input, &format!("validation: {}", e))),
        };

        let mut validated = clean_reply_text(validated);
        if let ScanInput::Text(text) = &input {
            if self.settings.heuristics {
                validated = merge_with_heuristics(validated, &run_heuristics(text));
            }
        }
        let validated = enforce_safe_by_default(validated);

        let sources = collect_sources(&reply.grounding);
        let image_url = match &input {
            ScanInput::Image { data_uri, .. } => Some(data_uri.clone()),
            ScanInput::Text(_) => None,
        };

        info!(
            phase = ?ScanPhase::Succeeded,
            verdict = %validated.verdict,
            risk_score = validated.risk_score,
            sources = sources.as_ref().map_or(0, |s| s.len()),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "classifier.completed"
        );

        Ok(AnalysisResult {
            id: uuid::Uuid::new_v4().simple().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            content: input.display_content().to_string(),
            content_type,
            verdict: validated.verdict,
            risk_score: validated.risk_score,
            indicators: validated.indicators,
            reasoning: validated.reasoning,
            advice: validated.advice,
            image_url,
            sources,
            is_deep_scan: mode.deep_scan && content_type == ContentType::Text,
        })
    }

    fn fail_safe(&self, input: &ScanInput, reason: &str) -> AnalysisResult {
        debug!(phase = ?ScanPhase::FailSafe, "classifier.phase");
        make_fail_safe(input.display_content(), input.content_type(), reason)
    }
}

/// Model output is untrusted text headed for a UI; strip any markup it carries.
fn clean_reply_text(mut reply: ValidatedReply) -> ValidatedReply {
    reply.reasoning = strip_tags(&reply.reasoning).trim().to_string();
    reply.advice = strip_tags(&reply.advice).trim().to_string();
    reply.indicators = reply
        .indicators
        .iter()
        .map(|i| strip_tags(i).trim().to_string())
        .filter(|i| !i.is_empty())
        .collect();
    reply
}

/// Keep grounding entries with a usable http(s) URI; untitled ones get a generic label.
pub fn collect_sources(grounding: &[WebSource]) -> Option<Vec<GroundingSource>> {
    let sources: Vec<GroundingSource> = grounding
        .iter()
        .filter_map(|web| {
            let uri = web.uri.as_deref()?.trim();
            let parsed = Url::parse(uri).ok()?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return None;
            }

            let title = web
                .title
                .as_deref()
                .map(|t| strip_tags(t).trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| UNTITLED_SOURCE_LABEL.to_string());

            Some(GroundingSource {
                title,
                uri: uri.to_string(),
            })
        })
        .collect();

    if sources.is_empty() {
        None
    } else {
        Some(sources)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::Verdict;
    use crate::services::detection::{is_fail_safe, FAIL_SAFE_INDICATOR, FAIL_SAFE_RISK_SCORE};
    use crate::services::providers::{GenerateReply, ProviderError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    pub(crate) enum FakeBehavior {
        Reply(String),
        ReplyWithSources(String, Vec<WebSource>),
        Fail,
    }

    pub(crate) struct FakeTransport {
        behavior: FakeBehavior,
        pub(crate) requests: Mutex<Vec<GenerateRequest>>,
    }

    impl FakeTransport {
        pub(crate) fn new(behavior: FakeBehavior) -> Self {
            Self {
                behavior,
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn replying(json: Value) -> Self {
            Self::new(FakeBehavior::Reply(json.to_string()))
        }

        pub(crate) fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn last_request(&self) -> GenerateRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl ClassifierTransport for FakeTransport {
        async fn generate(&self, request: &GenerateRequest) -> Result<GenerateReply, ProviderError> {
            self.requests.lock().unwrap().push(request.clone());
            match &self.behavior {
                FakeBehavior::Reply(text) => Ok(GenerateReply {
                    text: text.clone(),
                    grounding: vec![],
                    latency_ms: 5,
                }),
                FakeBehavior::ReplyWithSources(text, sources) => Ok(GenerateReply {
                    text: text.clone(),
                    grounding: sources.clone(),
                    latency_ms: 5,
                }),
                FakeBehavior::Fail => Err(ProviderError::ApiError {
                    status: 503,
                    message: "unavailable".to_string(),
                }),
            }
        }
    }

    pub(crate) fn scam_reply() -> Value {
        json!({
            "verdict": "SCAM",
            "riskScore": 92,
            "indicators": ["Fake Link", "Urgent Pressure"],
            "reasoning": "The message pushes you to click a strange link.",
            "advice": "Delete it and call your bank using the number on your card."
        })
    }

    const PHISH: &str = "Your account is locked, click http://bad.example/?utm_source=x to verify";
    const TINY_PNG: &str = "data:image/png;base64,iVBORw0KGgo=";

    fn classifier(transport: FakeTransport) -> ScamClassifier<FakeTransport> {
        ScamClassifier::new(transport, ClassifierSettings::default())
    }

    #[tokio::test]
    async fn test_text_scan_end_to_end() {
        let c = classifier(FakeTransport::replying(scam_reply()));
        let result = c.classify(PHISH, false, &ScanMode::default()).await.unwrap();

        let request = c.transport.last_request();
        assert_eq!(request.model, "gemini-3-flash-preview");
        assert_eq!(
            request.parts,
            vec![RequestPart::Text(
                "Your account is locked, click http://bad.example/ to verify".to_string()
            )]
        );
        assert!(request.response_schema.is_some());
        assert!(!request.grounded_search);

        assert_eq!(result.verdict, Verdict::Scam);
        assert!((0.0..=100.0).contains(&result.risk_score));
        assert_eq!(result.content_type, ContentType::Text);
        assert!(!result.content.contains("utm_source"));
        assert!(result.image_url.is_none());
        assert!(result.sources.is_none());
        assert!(!result.is_deep_scan);
        assert!(!result.id.is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_fail_safe() {
        let c = classifier(FakeTransport::new(FakeBehavior::Fail));
        let result = c.classify(PHISH, false, &ScanMode::default()).await.unwrap();

        assert!(is_fail_safe(&result));
        assert_eq!(result.verdict, Verdict::Suspicious);
        assert_eq!(result.risk_score, FAIL_SAFE_RISK_SCORE);
        assert_eq!(result.indicators, vec![FAIL_SAFE_INDICATOR.to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_replies_are_fail_safe() {
        let mut out_of_range = scam_reply();
        out_of_range["riskScore"] = json!(140);
        let mut unknown_verdict = scam_reply();
        unknown_verdict["verdict"] = json!("MAYBE");
        let mut missing_advice = scam_reply();
        missing_advice.as_object_mut().unwrap().remove("advice");

        for reply in [out_of_range, unknown_verdict, missing_advice] {
            let c = classifier(FakeTransport::replying(reply));
            let result = c.classify(PHISH, false, &ScanMode::default()).await.unwrap();
            assert!(is_fail_safe(&result));
        }

        let c = classifier(FakeTransport::new(FakeBehavior::Reply("I think it's fine".to_string())));
        let result = c.classify(PHISH, false, &ScanMode::default()).await.unwrap();
        assert!(is_fail_safe(&result));
    }

    #[tokio::test]
    async fn test_empty_content_is_usage_error_without_remote_call() {
        let c = classifier(FakeTransport::replying(scam_reply()));
        let err = c
            .classify("\u{01}\u{02}\u{7F}  ", false, &ScanMode::default())
            .await
            .unwrap_err();
        assert_eq!(err, ScanError::EmptyContent);
        assert_eq!(c.transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_rejected_image_is_usage_error() {
        let c = classifier(FakeTransport::replying(scam_reply()));
        let err = c
            .classify("data:image/gif;base64,R0lGODlhAQABAAAAACw=", true, &ScanMode::default())
            .await
            .unwrap_err();
        assert_eq!(err, ScanError::InvalidImage);
        assert_eq!(c.transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_image_scan_uses_image_model_without_schema() {
        let fenced = format!("```json\n{}\n```", scam_reply());
        let c = classifier(FakeTransport::new(FakeBehavior::Reply(fenced)));
        let result = c.classify(TINY_PNG, true, &ScanMode::deep(Language::Fr)).await.unwrap();

        let request = c.transport.last_request();
        assert_eq!(request.model, "gemini-2.5-flash-image");
        assert!(request.response_schema.is_none());
        assert!(!request.grounded_search);
        assert_eq!(
            request.parts[0],
            RequestPart::InlineImage {
                mime_type: "image/png".to_string(),
                data: "iVBORw0KGgo=".to_string()
            }
        );
        assert!(request.system_instruction.contains("French"));

        assert_eq!(result.verdict, Verdict::Scam);
        assert_eq!(result.content, IMAGE_CONTENT_PLACEHOLDER);
        assert_eq!(result.content_type, ContentType::Image);
        assert_eq!(result.image_url.as_deref(), Some(TINY_PNG));
        assert!(!result.is_deep_scan);
    }

    #[tokio::test]
    async fn test_deep_scan_requests_grounding_and_keeps_sources() {
        let sources = vec![
            WebSource {
                title: Some("Bank <b>warning</b>".to_string()),
                uri: Some("https://bank.example/alert".to_string()),
            },
            WebSource { title: None, uri: Some("https://news.example/scam".to_string()) },
            WebSource { title: Some("No link".to_string()), uri: None },
            WebSource { title: Some("Script".to_string()), uri: Some("javascript:alert(1)".to_string()) },
        ];
        let c = classifier(FakeTransport::new(FakeBehavior::ReplyWithSources(
            scam_reply().to_string(),
            sources,
        )));
        let result = c
            .classify(PHISH, false, &ScanMode::deep(Language::Es))
            .await
            .unwrap();

        let request = c.transport.last_request();
        assert_eq!(request.model, "gemini-3-pro-preview");
        assert!(request.grounded_search);
        assert!(request.system_instruction.contains("Spanish"));

        assert!(result.is_deep_scan);
        let sources = result.sources.unwrap();
        assert_eq!(
            sources,
            vec![
                GroundingSource {
                    title: "Bank warning".to_string(),
                    uri: "https://bank.example/alert".to_string()
                },
                GroundingSource {
                    title: UNTITLED_SOURCE_LABEL.to_string(),
                    uri: "https://news.example/scam".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_safe_verdict_is_checked_against_local_signals() {
        let reply = json!({
            "verdict": "safe",
            "risk_score": 10,
            "indicators": [],
            "reasoning": "Looks <i>fine</i>.",
            "advice": "Nothing to do."
        });
        let c = classifier(FakeTransport::replying(reply));
        let result = c
            .classify(
                "URGENT: you are a lottery winner, verify your account at bit.ly/claim",
                false,
                &ScanMode::default(),
            )
            .await
            .unwrap();

        // urgency 20 + reward 25 + credentials 30 + shortener 10
        assert_eq!(result.risk_score, 85.0);
        assert_eq!(result.verdict, Verdict::Suspicious);
        assert_eq!(result.indicators.len(), 4);
        assert_eq!(result.reasoning, "Looks fine.");
    }

    #[test]
    fn test_model_selection() {
        let c = classifier(FakeTransport::replying(scam_reply()));
        let plain = ScanMode::default();
        let deep = ScanMode::deep(Language::En);
        assert_eq!(c.select_model(false, &plain), "gemini-3-flash-preview");
        assert_eq!(c.select_model(false, &deep), "gemini-3-pro-preview");
        assert_eq!(c.select_model(true, &plain), "gemini-2.5-flash-image");
        assert_eq!(c.select_model(true, &deep), "gemini-2.5-flash-image");
    }

    #[test]
    fn test_schema_requires_five_fields() {
        let schema = response_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(required, vec!["verdict", "riskScore", "indicators", "reasoning", "advice"]);
    }
}
