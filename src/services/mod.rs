// ScamShield Core Services

pub mod sanitizer;
pub mod config_store;
pub mod providers;
pub mod detection;
pub mod classifier;
pub mod session;
pub mod history;
pub mod activity_log;
pub mod dashboard;

pub use sanitizer::{normalize_urls, parse_image_data_uri, sanitize, validate_image, ImagePayload};
pub use config_store::*;
pub use providers::*;
pub use classifier::{collect_sources, response_schema, system_instruction, ScamClassifier, ScanError};
pub use session::{ScanOutcome, ScanSession};
pub use history::{compute_stats, HistoryError, HistoryStore};
pub use activity_log::ActivityLog;
pub use dashboard::Dashboard;

// Re-export detection module functions
pub use detection::{
    check,
    enforce_safe_by_default,
    make_fail_safe,
    parse_reply,
    run_heuristics,
    validate,
    ParsedReply,
    ValidatedReply,
    ValidationError,
};
