use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compliance::domain::{ControlVerification, VerificationStatus};

/// Whether the latest positive verification still covers the newest evidence link.
///
/// Uses only timestamp comparison against the link watermark, so the answer does not
/// depend on the order in which recomputations happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationFreshness {
    pub latest_verified_at: Option<DateTime<Utc>>,
    pub fresh: bool,
}

impl VerificationFreshness {
    pub fn assess(
        verifications: &[ControlVerification],
        latest_linked_at: Option<DateTime<Utc>>,
    ) -> Self {
        let latest_verified = verifications
            .iter()
            .filter(|record| record.status == VerificationStatus::Verified)
            .max_by_key(|record| record.verified_at);

        let fresh = match latest_verified {
            None => false,
            Some(record) => match latest_linked_at {
                None => true,
                Some(linked_at) => record
                    .evidence_snapshot_at
                    .is_some_and(|snapshot| snapshot >= linked_at),
            },
        };

        Self {
            latest_verified_at: latest_verified.map(|record| record.verified_at),
            fresh,
        }
    }
}
