use anyhow::Result;
use bookcabin_models::SeatAssignment;
use sqlx::SqlitePool;

pub async fn list_assignments(pool: &SqlitePool) -> Result<Vec<SeatAssignment>> {
    let assignments = sqlx::query_as::<_, SeatAssignment>(
        "SELECT sa.voucher_id, v.code AS voucher_code, sa.seat_id, s.label AS seat_label, \
            s.flight_id, s.cabin, sa.assigned_at \
         FROM seat_assignments sa \
         JOIN vouchers v ON v.id = sa.voucher_id \
         JOIN seats s ON s.id = sa.seat_id \
         ORDER BY sa.assigned_at, sa.voucher_id",
    )
    .fetch_all(pool)
    .await?;
    Ok(assignments)
}
