//! Download verification record.
//!
//! A verification is the opaque token behind a buyer's download link. One is
//! minted per successful charge and is usable until `expires_at`.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{DownloadVerificationId, ProductId};

/// How long a download link stays live after purchase.
pub const DOWNLOAD_LINK_TTL_HOURS: i64 = 24;

/// A time-limited grant to download one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct DownloadVerification {
    pub id: DownloadVerificationId,
    pub product_id: ProductId,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl DownloadVerification {
    /// Mint a fresh verification for `product_id`, live for
    /// [`DOWNLOAD_LINK_TTL_HOURS`] from `now`.
    #[must_use]
    pub fn mint(product_id: ProductId, now: DateTime<Utc>) -> Self {
        Self {
            id: DownloadVerificationId::generate(),
            product_id,
            expires_at: Self::expiry_for(now),
            created_at: now,
        }
    }

    /// The expiry instant for a verification created at `created_at`.
    #[must_use]
    pub fn expiry_for(created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + TimeDelta::hours(DOWNLOAD_LINK_TTL_HOURS)
    }

    /// Whether the link may still be used at `now`. The expiry instant itself
    /// is already expired.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_sets_24h_window() {
        let now = Utc::now();
        let verification = DownloadVerification::mint(ProductId::generate(), now);
        assert_eq!(verification.expires_at - verification.created_at, TimeDelta::hours(24));
    }

    #[test]
    fn test_liveness_boundaries() {
        let now = Utc::now();
        let verification = DownloadVerification::mint(ProductId::generate(), now);

        assert!(verification.is_live(now));
        assert!(verification.is_live(now + TimeDelta::hours(23)));
        assert!(!verification.is_live(verification.expires_at));
        assert!(!verification.is_live(now + TimeDelta::hours(25)));
    }
}
