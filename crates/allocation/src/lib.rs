//! Voucher redemption: binds one voucher to one free seat of its cabin,
//! safely under concurrent redemptions.

use bookcabin_models::SeatAssignmentResult;
use sqlx::SqlitePool;

mod engine;
mod error;
mod picker;

pub use engine::{RetryPolicy, attempt_redeem, redeem};
pub use error::RedeemError;
pub use picker::{SeatCandidate, pick_seat};

/// Entry point for transports. Owns nothing but a pool handle and the retry
/// policy, so it is cheap to clone into every request.
#[derive(Debug, Clone)]
pub struct RedemptionService {
    pool: SqlitePool,
    policy: RetryPolicy,
}

impl RedemptionService {
    pub fn new(pool: SqlitePool, policy: RetryPolicy) -> Self {
        Self { pool, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn redeem(&self, voucher_code: &str) -> Result<SeatAssignmentResult, RedeemError> {
        let code = voucher_code.trim();
        if code.is_empty() {
            return Err(RedeemError::VoucherNotFound(voucher_code.to_string()));
        }
        redeem(&self.pool, &self.policy, code).await
    }
}
