use bookcabin_models::Cabin;
use rand::Rng;
use rand::seq::SliceRandom;
use sqlx::{FromRow, SqliteConnection};

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SeatCandidate {
    pub id: i64,
    pub label: String,
}

/// Pick a free seat in `cabin` on `flight_id`, uniformly at random.
///
/// Reads through `conn`, which should be the redemption's open transaction so
/// the candidate set matches what that transaction will later write against.
/// Returns `None` when the cabin is full or has no seats at all.
pub async fn pick_seat(
    conn: &mut SqliteConnection,
    flight_id: i64,
    cabin: Cabin,
) -> Result<Option<SeatCandidate>, sqlx::Error> {
    let candidates = sqlx::query_as::<_, SeatCandidate>(
        "SELECT s.id, s.label FROM seats s \
         WHERE s.flight_id = ? AND s.cabin = ? AND s.is_assigned = 0 \
           AND NOT EXISTS (SELECT 1 FROM seat_assignments sa WHERE sa.seat_id = s.id)",
    )
    .bind(flight_id)
    .bind(cabin)
    .fetch_all(&mut *conn)
    .await?;

    Ok(choose_uniform(candidates, &mut rand::thread_rng()))
}

fn choose_uniform<T: Clone, R: Rng + ?Sized>(candidates: Vec<T>, rng: &mut R) -> Option<T> {
    candidates.choose(rng).cloned()
}
