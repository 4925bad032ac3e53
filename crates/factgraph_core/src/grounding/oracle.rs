//! Offline verification oracle.

use super::{OracleError, VerificationOracle};
use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Accepts a claim when its value literally occurs in its evidence.
///
/// Comparison ignores case and collapses whitespace runs. Use it when no
/// model-backed oracle is available; it never paraphrases, so it rejects
/// claims a model would derive.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvidenceContainsOracle;

impl VerificationOracle for EvidenceContainsOracle {
    fn verify(&self, value: &str, evidence: &str) -> Result<bool, OracleError> {
        let value = normalize(value);
        if value.is_empty() {
            return Ok(false);
        }
        Ok(normalize(evidence).contains(value.as_str()))
    }
}

fn normalize(text: &str) -> String {
    WHITESPACE_RE
        .replace_all(text.trim(), " ")
        .to_lowercase()
}
