use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Seat class. Stored as `ECONOMY`, `BUSINESS` or `FIRST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum Cabin {
    Economy,
    Business,
    First,
}

impl Cabin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cabin::Economy => "ECONOMY",
            Cabin::Business => "BUSINESS",
            Cabin::First => "FIRST",
        }
    }
}

impl fmt::Display for Cabin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCabinError(String);

impl fmt::Display for ParseCabinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown cabin '{}' (expected ECONOMY, BUSINESS or FIRST)", self.0)
    }
}

impl std::error::Error for ParseCabinError {}

impl FromStr for Cabin {
    type Err = ParseCabinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ECONOMY" => Ok(Cabin::Economy),
            "BUSINESS" => Ok(Cabin::Business),
            "FIRST" => Ok(Cabin::First),
            _ => Err(ParseCabinError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Flight {
    pub id: i64,
    pub flight_no: String,
    pub dep_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Seat {
    pub id: i64,
    pub flight_id: i64,
    pub label: String,
    pub cabin: Cabin,
    pub is_assigned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Voucher {
    pub id: i64,
    pub code: String,
    pub flight_id: i64,
    pub cabin: Cabin,
    pub redeemed: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl Voucher {
    /// True when the voucher carries an expiry that lies before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }
}

/// A committed voucher → seat binding, joined with the labels needed to show it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SeatAssignment {
    pub voucher_id: i64,
    pub voucher_code: String,
    pub seat_id: i64,
    pub seat_label: String,
    pub flight_id: i64,
    pub cabin: Cabin,
    pub assigned_at: DateTime<Utc>,
}

/// What a successful redemption hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatAssignmentResult {
    pub voucher_code: String,
    pub flight_id: i64,
    pub cabin: Cabin,
    pub seat_id: i64,
    pub seat_label: String,
}
