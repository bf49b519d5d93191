/// Failures of the reconciliation and computation core.
///
/// None of these are retryable: the arithmetic is deterministic, so the input
/// has to change before a second attempt can succeed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TaxError {
    #[error("tax rules for FY {0} not found - please seed/upload them")]
    RuleTableNotFound(String),
    #[error("malformed profile: {0}")]
    MalformedProfile(String),
    #[error("invalid regime '{0}': expected 'old' or 'new'")]
    InvalidRegime(String),
    #[error("invalid financial year '{0}': expected YYYY-YY")]
    InvalidFinancialYear(String),
    #[error("invalid rule table for FY {financial_year}: {reason}")]
    InvalidRuleTable {
        financial_year: String,
        reason: String,
    },
}
