use anyhow::{Result, bail};
use bookcabin_models::{Cabin, Seat};
use sqlx::SqlitePool;

use crate::flights::get_flight;

const SEAT_COLUMNS: &str = "id, flight_id, label, cabin, is_assigned";

/// Add a batch of seats (e.g. `["1A", "1B"]`) to one cabin of a flight.
/// Labels are trimmed and upper-cased; a duplicate label fails the whole batch.
pub async fn add_seats(pool: &SqlitePool, flight_id: i64, cabin: Cabin, labels: &[String]) -> Result<Vec<Seat>> {
    if labels.is_empty() {
        bail!("at least one seat label is required");
    }
    if get_flight(pool, flight_id).await?.is_none() {
        bail!("flight {flight_id} not found");
    }

    let mut tx = pool.begin().await?;
    let sql = format!("INSERT INTO seats (flight_id, label, cabin) VALUES (?, ?, ?) RETURNING {SEAT_COLUMNS}");
    let mut seats = Vec::with_capacity(labels.len());
    for label in labels {
        let label = label.trim().to_uppercase();
        if label.is_empty() {
            bail!("seat label must not be blank");
        }
        let seat = sqlx::query_as::<_, Seat>(&sql)
            .bind(flight_id)
            .bind(&label)
            .bind(cabin)
            .fetch_one(&mut *tx)
            .await?;
        seats.push(seat);
    }
    tx.commit().await?;

    Ok(seats)
}

pub async fn list_seats(pool: &SqlitePool, flight_id: Option<i64>) -> Result<Vec<Seat>> {
    let seats = match flight_id {
        Some(id) => {
            let sql = format!("SELECT {SEAT_COLUMNS} FROM seats WHERE flight_id = ? ORDER BY cabin, label");
            sqlx::query_as::<_, Seat>(&sql).bind(id).fetch_all(pool).await?
        }
        None => {
            let sql = format!("SELECT {SEAT_COLUMNS} FROM seats ORDER BY flight_id, cabin, label");
            sqlx::query_as::<_, Seat>(&sql).fetch_all(pool).await?
        }
    };
    Ok(seats)
}
