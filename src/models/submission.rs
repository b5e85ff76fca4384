use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A normalized submission as published to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    pub id: String,
    pub company_uuid: String,
    pub sales_manager: String,
    pub expected_originations: f64,
    /// Resolved server creation time. None while the server timestamp is
    /// still pending, e.g. right after a local write.
    pub submitted_at: Option<DateTime<Utc>>,
    /// Formatted form of `submitted_at`, "N/A" while pending.
    pub submitted_at_display: String,
    pub submitted_by: Option<String>,
}

/// Raw form input as the user typed it. The numeric field is kept as text
/// and coerced during validation.
#[derive(Debug, Clone, Default)]
pub struct SubmissionInput {
    pub company_uuid: String,
    pub sales_manager: String,
    pub expected_originations: String,
}

impl SubmissionInput {
    pub fn new(
        company_uuid: impl Into<String>,
        sales_manager: impl Into<String>,
        expected_originations: impl Into<String>,
    ) -> Self {
        Self {
            company_uuid: company_uuid.into(),
            sales_manager: sales_manager.into(),
            expected_originations: expected_originations.into(),
        }
    }
}
