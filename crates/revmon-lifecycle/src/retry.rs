//! Retry policy guard

use crate::types::ReviewStatus;

/// Check if another review attempt is permitted
///
/// Gates both the retry command and whether a retry affordance is shown.
#[inline]
#[must_use]
pub fn can_retry(status: ReviewStatus, retry_count: u32, max_retries: u32) -> bool {
    status == ReviewStatus::Failed && retry_count < max_retries
}
