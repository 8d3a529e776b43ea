use anyhow::{Result, bail};
use bookcabin_models::{Cabin, Voucher};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::flights::get_flight;

const VOUCHER_COLUMNS: &str = "id, code, flight_id, cabin, redeemed, expires_at, redeemed_at";

#[derive(Debug, Clone)]
pub struct NewVoucher {
    pub code: String,
    pub flight_id: i64,
    pub cabin: Cabin,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Issue an unredeemed voucher for a cabin on a flight.
pub async fn create_voucher(pool: &SqlitePool, new: &NewVoucher) -> Result<Voucher> {
    let code = new.code.trim();
    if code.is_empty() {
        bail!("voucher code must not be blank");
    }
    if get_flight(pool, new.flight_id).await?.is_none() {
        bail!("flight {} not found", new.flight_id);
    }

    let sql = format!(
        "INSERT INTO vouchers (code, flight_id, cabin, expires_at) VALUES (?, ?, ?, ?) RETURNING {VOUCHER_COLUMNS}"
    );
    let voucher = sqlx::query_as::<_, Voucher>(&sql)
        .bind(code)
        .bind(new.flight_id)
        .bind(new.cabin)
        .bind(new.expires_at)
        .fetch_one(pool)
        .await?;
    Ok(voucher)
}

pub async fn list_vouchers(pool: &SqlitePool) -> Result<Vec<Voucher>> {
    let sql = format!("SELECT {VOUCHER_COLUMNS} FROM vouchers ORDER BY id");
    let vouchers = sqlx::query_as::<_, Voucher>(&sql).fetch_all(pool).await?;
    Ok(vouchers)
}

pub async fn get_voucher_by_code(pool: &SqlitePool, code: &str) -> Result<Option<Voucher>> {
    let sql = format!("SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE code = ?");
    let voucher = sqlx::query_as::<_, Voucher>(&sql)
        .bind(code)
        .fetch_optional(pool)
        .await?;
    Ok(voucher)
}
