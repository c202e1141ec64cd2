// Detection Module
// Verdict logic applied around the remote classifier:
// - validator: parses and structurally checks the model reply
// - fail_safe: conservative substitute result for every failure path
// - heuristics: local rule signatures blended into text verdicts
// - policy: safe-by-default enforcement on SAFE verdicts

pub mod validator;
pub mod fail_safe;
pub mod heuristics;
pub mod policy;

pub use validator::{
    check,
    parse_reply,
    strip_code_fences,
    validate,
    ParsedReply,
    RawReply,
    ValidatedReply,
    ValidationError,
};
pub use fail_safe::{is_fail_safe, make_fail_safe, FAIL_SAFE_INDICATOR, FAIL_SAFE_RISK_SCORE};
pub use heuristics::{merge_with_heuristics, run_heuristics, HeuristicReport};
pub use policy::enforce_safe_by_default;
