use anyhow::{Result, bail};
use bookcabin_models::Flight;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

const FLIGHT_COLUMNS: &str = "id, flight_no, dep_date";

/// Insert one flight per number, all departing on `dep_date`. Either every
/// flight is created or none is.
pub async fn create_flights(
    pool: &SqlitePool,
    flight_numbers: &[String],
    dep_date: DateTime<Utc>,
) -> Result<Vec<Flight>> {
    if flight_numbers.is_empty() {
        bail!("at least one flight number is required");
    }

    let mut tx = pool.begin().await?;
    let sql = format!("INSERT INTO flights (flight_no, dep_date) VALUES (?, ?) RETURNING {FLIGHT_COLUMNS}");
    let mut flights = Vec::with_capacity(flight_numbers.len());
    for number in flight_numbers {
        let number = number.trim().to_uppercase();
        if number.is_empty() {
            bail!("flight number must not be blank");
        }
        let flight = sqlx::query_as::<_, Flight>(&sql)
            .bind(&number)
            .bind(dep_date)
            .fetch_one(&mut *tx)
            .await?;
        debug!("Flight {} created (id={})", flight.flight_no, flight.id);
        flights.push(flight);
    }
    tx.commit().await?;

    Ok(flights)
}

pub async fn list_flights(pool: &SqlitePool) -> Result<Vec<Flight>> {
    let sql = format!("SELECT {FLIGHT_COLUMNS} FROM flights ORDER BY dep_date, flight_no");
    let flights = sqlx::query_as::<_, Flight>(&sql).fetch_all(pool).await?;
    Ok(flights)
}

pub async fn get_flight(pool: &SqlitePool, flight_id: i64) -> Result<Option<Flight>> {
    let sql = format!("SELECT {FLIGHT_COLUMNS} FROM flights WHERE id = ?");
    let flight = sqlx::query_as::<_, Flight>(&sql)
        .bind(flight_id)
        .fetch_optional(pool)
        .await?;
    Ok(flight)
}
