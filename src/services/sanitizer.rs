// Input Sanitizer
// Normalizes user-submitted text and validates image data URIs before anything leaves the process

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Upper bound on submitted text, counted in Unicode scalar values.
pub const MAX_INPUT_CHARS: usize = 5000;
/// Upper bound on the encoded data URI length.
pub const MAX_IMAGE_BYTES: usize = 3 * 1024 * 1024;

pub const ALLOWED_IMAGE_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];
pub const TRACKING_PARAMS: [&str; 5] = ["utm_source", "utm_medium", "clickid", "fbclid", "gclid"];

static TAG_RE: OnceLock<Regex> = OnceLock::new();
static URL_RE: OnceLock<Regex> = OnceLock::new();
static DATA_URI_RE: OnceLock<Regex> = OnceLock::new();

fn tag_re() -> &'static Regex {
    TAG_RE.get_or_init(|| Regex::new(r"<[^<>]*>").expect("valid tag regex"))
}

fn url_re() -> &'static Regex {
    URL_RE.get_or_init(|| Regex::new(r#"https?://[^\s<>"]+"#).expect("valid url regex"))
}

fn data_uri_re() -> &'static Regex {
    DATA_URI_RE.get_or_init(|| {
        Regex::new(r"^data:([a-zA-Z0-9]+/[a-zA-Z0-9\-.+]+);base64,(.+)$").expect("valid data uri regex")
    })
}

/// Sanitize raw message text.
///
/// Truncates to `MAX_INPUT_CHARS`, drops control characters (newline, tab and
/// carriage return survive), removes markup tags and tracking parameters, then
/// trims. Returns an empty string when nothing printable is left.
pub fn sanitize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut s = truncate_chars(text, MAX_INPUT_CHARS);
    s = strip_control_chars(&s);
    s = strip_tags(&s);
    s = normalize_urls(&s);

    // URL re-serialization can percent-encode characters, so enforce the bound again.
    truncate_chars(&s, MAX_INPUT_CHARS).trim().to_string()
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}')
}

pub fn strip_control_chars(text: &str) -> String {
    text.chars().filter(|c| !is_stripped_control(*c)).collect()
}

/// Remove anything shaped like a markup tag.
/// Repeats until nothing matches, since removing an inner tag can splice an outer one together.
pub fn strip_tags(text: &str) -> String {
    let mut out = text.to_string();
    while tag_re().is_match(&out) {
        out = tag_re().replace_all(&out, "").into_owned();
    }
    out
}

/// Strip known tracking parameters from every http(s) URL in `text`.
/// URLs that fail to parse, or that carry no tracking parameters, are left untouched.
pub fn normalize_urls(text: &str) -> String {
    url_re()
        .replace_all(text, |caps: &regex::Captures| strip_tracking_params(&caps[0]))
        .to_string()
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key)
}

fn strip_tracking_params(raw: &str) -> String {
    let mut parsed = match Url::parse(raw) {
        Ok(u) => u,
        Err(_) => return raw.to_string(),
    };

    if !parsed.query_pairs().any(|(k, _)| is_tracking_param(&k)) {
        return raw.to_string();
    }

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept.iter());
    }

    parsed.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    /// Base64 payload without the `data:...;base64,` prefix.
    pub data: String,
}

/// Parse a `data:<mime>;base64,<payload>` URI, enforcing the size bound,
/// the MIME allow-list and base64 well-formedness.
pub fn parse_image_data_uri(uri: &str) -> Option<ImagePayload> {
    if uri.is_empty() || uri.len() > MAX_IMAGE_BYTES {
        return None;
    }

    let caps = data_uri_re().captures(uri)?;
    let mime_type = caps.get(1)?.as_str().to_lowercase();
    if !ALLOWED_IMAGE_MIME_TYPES.contains(&mime_type.as_str()) {
        return None;
    }

    let data = caps.get(2)?.as_str();
    if BASE64.decode(data).is_err() {
        return None;
    }

    Some(ImagePayload {
        mime_type,
        data: data.to_string(),
    })
}

pub fn validate_image(uri: &str) -> bool {
    parse_image_data_uri(uri).is_some()
}
