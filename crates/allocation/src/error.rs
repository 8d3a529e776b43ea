use std::time::Duration;

use bookcabin_models::Cabin;
use thiserror::Error;

/// Everything a redemption can end in, short of success.
///
/// Errors fall in three groups. Terminal ones describe the voucher itself and
/// can never improve on retry. Contention errors come from other redemptions
/// or the storage layer and are worth another attempt. `NoSeatsAvailable`
/// and `AllocationFailed` are what the caller sees once the attempt budget
/// is spent.
#[derive(Debug, Error)]
pub enum RedeemError {
    #[error("voucher '{0}' not found")]
    VoucherNotFound(String),

    #[error("voucher '{0}' has already been redeemed")]
    AlreadyRedeemed(String),

    #[error("voucher '{0}' has expired")]
    Expired(String),

    #[error("no seats available in {cabin} cabin on flight {flight_id}")]
    NoSeatsAvailable { flight_id: i64, cabin: Cabin },

    #[error("seat was taken by a concurrent redemption")]
    SeatTakenConcurrently,

    #[error("redemption attempt timed out after {0:?}")]
    AttemptTimedOut(Duration),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("seat allocation failed after {attempts} attempts: {last}")]
    AllocationFailed {
        attempts: u32,
        #[source]
        last: Box<RedeemError>,
    },
}

impl RedeemError {
    /// Whether retrying cannot change the outcome.
    pub fn is_terminal(&self) -> bool {
        match self {
            RedeemError::VoucherNotFound(_)
            | RedeemError::AlreadyRedeemed(_)
            | RedeemError::Expired(_)
            | RedeemError::AllocationFailed { .. } => true,
            // voucher or seat row vanished underneath the attempt
            RedeemError::Storage(sqlx::Error::Database(db)) => db.is_foreign_key_violation(),
            // stored rows that will not decode fail the same way every time
            RedeemError::Storage(
                sqlx::Error::ColumnDecode { .. }
                | sqlx::Error::Decode(_)
                | sqlx::Error::TypeNotFound { .. }
                | sqlx::Error::ColumnNotFound(_),
            ) => true,
            RedeemError::NoSeatsAvailable { .. }
            | RedeemError::SeatTakenConcurrently
            | RedeemError::AttemptTimedOut(_)
            | RedeemError::Storage(_) => false,
        }
    }

    /// Stable machine-readable code for transports.
    pub fn reason(&self) -> &'static str {
        match self {
            RedeemError::VoucherNotFound(_) => "VOUCHER_NOT_FOUND",
            RedeemError::AlreadyRedeemed(_) => "ALREADY_REDEEMED",
            RedeemError::Expired(_) => "EXPIRED",
            RedeemError::NoSeatsAvailable { .. } => "NO_SEATS_AVAILABLE",
            RedeemError::SeatTakenConcurrently => "SEAT_TAKEN_CONCURRENTLY",
            RedeemError::AttemptTimedOut(_) => "ATTEMPT_TIMED_OUT",
            RedeemError::Storage(_) => "STORAGE_ERROR",
            RedeemError::AllocationFailed { .. } => "ALLOCATION_FAILED",
        }
    }

    /// Fold the last failure of a spent retry budget into what the caller sees.
    /// A full cabin is a business outcome and is reported as is.
    pub(crate) fn exhausted(attempts: u32, last: RedeemError) -> RedeemError {
        match last {
            RedeemError::NoSeatsAvailable { .. } => last,
            other => RedeemError::AllocationFailed {
                attempts,
                last: Box::new(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voucher_state_errors_are_terminal() {
        assert!(RedeemError::VoucherNotFound("V".into()).is_terminal());
        assert!(RedeemError::AlreadyRedeemed("V".into()).is_terminal());
        assert!(RedeemError::Expired("V".into()).is_terminal());
    }

    #[test]
    fn contention_errors_are_retryable() {
        assert!(!RedeemError::SeatTakenConcurrently.is_terminal());
        assert!(!RedeemError::AttemptTimedOut(Duration::from_secs(5)).is_terminal());
        assert!(!RedeemError::Storage(sqlx::Error::PoolTimedOut).is_terminal());
        assert!(
            !RedeemError::NoSeatsAvailable {
                flight_id: 1,
                cabin: Cabin::Economy
            }
            .is_terminal()
        );
    }

    #[test]
    fn undecodable_rows_are_terminal() {
        let column = RedeemError::Storage(sqlx::Error::ColumnDecode {
            index: "\"expires_at\"".to_string(),
            source: "invalid datetime: 2020-01-01".into(),
        });
        assert!(column.is_terminal());
        assert_eq!(column.reason(), "STORAGE_ERROR");

        assert!(RedeemError::Storage(sqlx::Error::Decode("bad value".into())).is_terminal());
        assert!(RedeemError::Storage(sqlx::Error::ColumnNotFound("cabin".to_string())).is_terminal());
    }

    #[test]
    fn exhausted_full_cabin_stays_no_seats() {
        let last = RedeemError::NoSeatsAvailable {
            flight_id: 7,
            cabin: Cabin::First,
        };
        let err = RedeemError::exhausted(3, last);
        assert_eq!(err.reason(), "NO_SEATS_AVAILABLE");
    }

    #[test]
    fn exhausted_contention_wraps_last_error() {
        let err = RedeemError::exhausted(3, RedeemError::SeatTakenConcurrently);
        match &err {
            RedeemError::AllocationFailed { attempts, last } => {
                assert_eq!(*attempts, 3);
                assert_eq!(last.reason(), "SEAT_TAKEN_CONCURRENTLY");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "seat allocation failed after 3 attempts: seat was taken by a concurrent redemption"
        );
    }
}
