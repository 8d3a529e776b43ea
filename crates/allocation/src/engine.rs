use std::time::Duration;

use bookcabin_models::{SeatAssignmentResult, Voucher};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::RedeemError;
use crate::picker::pick_seat;

/// Bounds on how hard a single redemption tries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wall-clock limit for one attempt's transaction.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

/// One redemption attempt in its own transaction.
///
/// The transaction opens with `BEGIN IMMEDIATE`, so SQLite hands out its write
/// lock before the voucher is read and concurrent attempts wait on the busy
/// timeout rather than failing on a stale snapshot. Whether the seat really
/// went to this voucher is still decided by the insert-or-ignore against
/// `UNIQUE (seat_id)` followed by a recount. Any early return drops `tx`,
/// which rolls it back.
pub async fn attempt_redeem(pool: &SqlitePool, code: &str) -> Result<SeatAssignmentResult, RedeemError> {
    let mut tx = pool.begin_with("BEGIN IMMEDIATE").await?;

    let voucher = sqlx::query_as::<_, Voucher>(
        "SELECT id, code, flight_id, cabin, redeemed, expires_at, redeemed_at FROM vouchers WHERE code = ?",
    )
    .bind(code)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| RedeemError::VoucherNotFound(code.to_string()))?;

    if voucher.redeemed {
        return Err(RedeemError::AlreadyRedeemed(voucher.code));
    }
    let now = Utc::now();
    if voucher.is_expired_at(now) {
        return Err(RedeemError::Expired(voucher.code));
    }

    let seat = pick_seat(&mut tx, voucher.flight_id, voucher.cabin)
        .await?
        .ok_or(RedeemError::NoSeatsAvailable {
            flight_id: voucher.flight_id,
            cabin: voucher.cabin,
        })?;
    debug!("Voucher {} picked seat {} (id={})", voucher.code, seat.label, seat.id);

    sqlx::query("INSERT INTO seat_assignments (voucher_id, seat_id) VALUES (?, ?) ON CONFLICT (seat_id) DO NOTHING")
        .bind(voucher.id)
        .bind(seat.id)
        .execute(&mut *tx)
        .await?;

    let assigned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seat_assignments WHERE voucher_id = ?")
        .bind(voucher.id)
        .fetch_one(&mut *tx)
        .await?;
    if assigned == 0 {
        return Err(RedeemError::SeatTakenConcurrently);
    }

    let seat_update = sqlx::query("UPDATE seats SET is_assigned = 1 WHERE id = ? AND is_assigned = 0")
        .bind(seat.id)
        .execute(&mut *tx)
        .await?;
    if seat_update.rows_affected() != 1 {
        return Err(RedeemError::SeatTakenConcurrently);
    }

    let voucher_update = sqlx::query("UPDATE vouchers SET redeemed = 1, redeemed_at = ? WHERE id = ? AND redeemed = 0")
        .bind(now)
        .bind(voucher.id)
        .execute(&mut *tx)
        .await?;
    if voucher_update.rows_affected() != 1 {
        return Err(RedeemError::AlreadyRedeemed(voucher.code));
    }

    tx.commit().await?;

    Ok(SeatAssignmentResult {
        voucher_code: voucher.code,
        flight_id: voucher.flight_id,
        cabin: voucher.cabin,
        seat_id: seat.id,
        seat_label: seat.label,
    })
}

/// Redeem `code`, retrying contention failures up to `policy.max_attempts`.
///
/// Terminal voucher states return straight away. Once the budget is spent the
/// last failure is returned; a full cabin stays `NoSeatsAvailable`, anything
/// else becomes `AllocationFailed`.
pub async fn redeem(pool: &SqlitePool, policy: &RetryPolicy, code: &str) -> Result<SeatAssignmentResult, RedeemError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let outcome = match tokio::time::timeout(policy.attempt_timeout, attempt_redeem(pool, code)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(RedeemError::AttemptTimedOut(policy.attempt_timeout)),
        };

        let err = match outcome {
            Ok(result) => {
                info!(
                    "Voucher {} redeemed: seat {} ({}) on flight {} [attempt {attempt}/{max_attempts}]",
                    result.voucher_code, result.seat_label, result.cabin, result.flight_id
                );
                return Ok(result);
            }
            Err(err) => err,
        };

        if err.is_terminal() {
            debug!("Voucher {code} rejected: {err}");
            return Err(err);
        }
        if attempt >= max_attempts {
            warn!("Voucher {code} gave up after {attempt} attempts: {err}");
            return Err(RedeemError::exhausted(attempt, err));
        }

        debug!("Voucher {code} attempt {attempt}/{max_attempts} failed, retrying: {err}");
        attempt += 1;
    }
}
