use axum::{
    Json, Router,
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{FromRequest, FromRequestParts, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bookcabin_allocation::{RedeemError, RedemptionService};
use bookcabin_db::NewVoucher;
use bookcabin_models::{Cabin, Flight, Seat, SeatAssignment, SeatAssignmentResult, Voucher};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::version_string;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub redemptions: RedemptionService,
}

// --- Errors ---

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Redeem(RedeemError),
    Internal(anyhow::Error),
}

impl ApiError {
    fn bad_request(err: anyhow::Error) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<RedeemError> for ApiError {
    fn from(err: RedeemError) -> Self {
        ApiError::Redeem(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

fn redeem_status(err: &RedeemError) -> StatusCode {
    match err {
        RedeemError::VoucherNotFound(_) => StatusCode::NOT_FOUND,
        RedeemError::Expired(_) => StatusCode::GONE,
        RedeemError::AlreadyRedeemed(_)
        | RedeemError::NoSeatsAvailable { .. }
        | RedeemError::SeatTakenConcurrently
        | RedeemError::AllocationFailed { .. } => StatusCode::CONFLICT,
        RedeemError::AttemptTimedOut(_) => StatusCode::SERVICE_UNAVAILABLE,
        RedeemError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, reason, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Redeem(err) => {
                let status = redeem_status(&err);
                if status.is_server_error() {
                    error!("Redemption failed: {err}");
                }
                (status, err.reason(), err.to_string())
            }
            ApiError::Internal(err) => {
                error!("Internal Server Error: {err:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", "Internal Server Error".to_string())
            }
        };

        (status, Json(json!({ "error": message, "reason": reason }))).into_response()
    }
}

// --- Extractors ---

/// `Json` whose rejections come back as an [`ApiError`] body.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
struct ApiJson<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
struct ApiQuery<T>(T);

// --- Handlers ---

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": version_string()
    }))
}

#[derive(Deserialize)]
struct CreateFlightsRequest {
    flight_numbers: Vec<String>,
    dep_date: DateTime<Utc>,
}

async fn api_create_flights(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateFlightsRequest>,
) -> Result<(StatusCode, Json<Vec<Flight>>), ApiError> {
    let flights = bookcabin_db::create_flights(&state.pool, &body.flight_numbers, body.dep_date)
        .await
        .map_err(ApiError::bad_request)?;
    info!("{} flight(s) created for {}", flights.len(), body.dep_date);
    Ok((StatusCode::CREATED, Json(flights)))
}

async fn api_list_flights(State(state): State<AppState>) -> Result<Json<Vec<Flight>>, ApiError> {
    Ok(Json(bookcabin_db::list_flights(&state.pool).await?))
}

#[derive(Deserialize)]
struct AddSeatsRequest {
    flight_id: i64,
    cabin: Cabin,
    labels: Vec<String>,
}

async fn api_add_seats(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AddSeatsRequest>,
) -> Result<(StatusCode, Json<Vec<Seat>>), ApiError> {
    let seats = bookcabin_db::add_seats(&state.pool, body.flight_id, body.cabin, &body.labels)
        .await
        .map_err(ApiError::bad_request)?;
    info!("{} {} seat(s) added to flight {}", seats.len(), body.cabin, body.flight_id);
    Ok((StatusCode::CREATED, Json(seats)))
}

#[derive(Deserialize)]
struct SeatsQuery {
    flight_id: Option<i64>,
}

async fn api_list_seats(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SeatsQuery>,
) -> Result<Json<Vec<Seat>>, ApiError> {
    Ok(Json(bookcabin_db::list_seats(&state.pool, params.flight_id).await?))
}

#[derive(Deserialize)]
struct CreateVoucherRequest {
    code: String,
    flight_id: i64,
    cabin: Cabin,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

async fn api_create_voucher(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateVoucherRequest>,
) -> Result<(StatusCode, Json<Voucher>), ApiError> {
    let new = NewVoucher {
        code: body.code,
        flight_id: body.flight_id,
        cabin: body.cabin,
        expires_at: body.expires_at,
    };
    let voucher = bookcabin_db::create_voucher(&state.pool, &new)
        .await
        .map_err(ApiError::bad_request)?;
    info!("Voucher {} issued for {} on flight {}", voucher.code, voucher.cabin, voucher.flight_id);
    Ok((StatusCode::CREATED, Json(voucher)))
}

async fn api_list_vouchers(State(state): State<AppState>) -> Result<Json<Vec<Voucher>>, ApiError> {
    Ok(Json(bookcabin_db::list_vouchers(&state.pool).await?))
}

#[derive(Deserialize)]
struct RedeemRequest {
    voucher_code: String,
}

async fn api_redeem_voucher(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RedeemRequest>,
) -> Result<(StatusCode, Json<SeatAssignmentResult>), ApiError> {
    let result = state.redemptions.redeem(&body.voucher_code).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

async fn api_list_assignments(State(state): State<AppState>) -> Result<Json<Vec<SeatAssignment>>, ApiError> {
    Ok(Json(bookcabin_db::list_assignments(&state.pool).await?))
}

// --- Router ---

pub fn router(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/flights", get(api_list_flights).post(api_create_flights))
        .route("/seats", get(api_list_seats).post(api_add_seats))
        .route("/vouchers", get(api_list_vouchers).post(api_create_voucher))
        .route("/vouchers/redeem", post(api_redeem_voucher))
        .route("/assignments", get(api_list_assignments));

    let api_routes = Router::new().route("/health", get(health)).nest("/v1", v1);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

pub async fn run_server(port: u16, state: AppState) -> anyhow::Result<()> {
    info!("bookcabin v{}", version_string());

    let app = router(state);

    let addr = format!("0.0.0.0:{port}");
    info!("Listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use bookcabin_allocation::RetryPolicy;
    use bookcabin_db::PoolSettings;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn test_app() -> (TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("api.db").display());
        let pool = bookcabin_db::connect(&url, &PoolSettings::default()).await.unwrap();
        bookcabin_db::migrate(&pool).await.unwrap();
        let state = AppState {
            redemptions: RedemptionService::new(pool.clone(), RetryPolicy::default()),
            pool,
        };
        (dir, router(state))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn seed(app: &Router) -> i64 {
        let (status, flights) = call(
            app,
            "POST",
            "/api/v1/flights",
            Some(json!({ "flight_numbers": ["ga133"], "dep_date": "2030-07-01T06:00:00Z" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(flights[0]["flight_no"], "GA133");
        let flight_id = flights[0]["id"].as_i64().unwrap();

        let (status, seats) = call(
            app,
            "POST",
            "/api/v1/seats",
            Some(json!({ "flight_id": flight_id, "cabin": "ECONOMY", "labels": ["1A"] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(seats[0]["is_assigned"], false);

        flight_id
    }

    #[test]
    fn terminal_errors_are_client_errors() {
        for err in [
            RedeemError::VoucherNotFound("V".into()),
            RedeemError::AlreadyRedeemed("V".into()),
            RedeemError::Expired("V".into()),
            RedeemError::NoSeatsAvailable { flight_id: 1, cabin: Cabin::First },
            RedeemError::AllocationFailed {
                attempts: 3,
                last: Box::new(RedeemError::SeatTakenConcurrently),
            },
        ] {
            assert!(redeem_status(&err).is_client_error(), "{err:?}");
        }
    }

    #[test]
    fn corrupt_rows_are_server_errors() {
        let err = RedeemError::Storage(sqlx::Error::ColumnDecode {
            index: "\"expires_at\"".to_string(),
            source: "invalid datetime: 2020-01-01".into(),
        });
        assert_eq!(redeem_status(&err), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (_dir, app) = test_app().await;
        let (status, body) = call(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn redeem_flow_over_http() {
        let (_dir, app) = test_app().await;
        let flight_id = seed(&app).await;

        let (status, _) = call(
            &app,
            "POST",
            "/api/v1/vouchers",
            Some(json!({ "code": "V1", "flight_id": flight_id, "cabin": "ECONOMY" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, result) = call(&app, "POST", "/api/v1/vouchers/redeem", Some(json!({ "voucher_code": "V1" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(result["seat_label"], "1A");
        assert_eq!(result["cabin"], "ECONOMY");

        let (status, err) = call(&app, "POST", "/api/v1/vouchers/redeem", Some(json!({ "voucher_code": "V1" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["reason"], "ALREADY_REDEEMED");

        let (status, assignments) = call(&app, "GET", "/api/v1/assignments", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(assignments.as_array().unwrap().len(), 1);
        assert_eq!(assignments[0]["voucher_code"], "V1");
    }

    #[tokio::test]
    async fn redeem_failures_carry_reason_codes() {
        let (_dir, app) = test_app().await;
        let flight_id = seed(&app).await;

        call(
            &app,
            "POST",
            "/api/v1/vouchers",
            Some(json!({ "code": "OLD", "flight_id": flight_id, "cabin": "ECONOMY", "expires_at": "2020-01-01T00:00:00Z" })),
        )
        .await;
        call(
            &app,
            "POST",
            "/api/v1/vouchers",
            Some(json!({ "code": "BIZ", "flight_id": flight_id, "cabin": "BUSINESS" })),
        )
        .await;

        let (status, err) = call(&app, "POST", "/api/v1/vouchers/redeem", Some(json!({ "voucher_code": "OLD" }))).await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(err["reason"], "EXPIRED");

        let (status, err) = call(&app, "POST", "/api/v1/vouchers/redeem", Some(json!({ "voucher_code": "BIZ" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["reason"], "NO_SEATS_AVAILABLE");

        let (status, err) = call(&app, "POST", "/api/v1/vouchers/redeem", Some(json!({ "voucher_code": "GHOST" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["reason"], "VOUCHER_NOT_FOUND");

        let (_, seats) = call(&app, "GET", &format!("/api/v1/seats?flight_id={flight_id}"), None).await;
        assert_eq!(seats[0]["is_assigned"], false);
    }

    #[tokio::test]
    async fn malformed_bodies_get_json_bad_request() {
        let (_dir, app) = test_app().await;
        let flight_id = seed(&app).await;

        let (status, err) = call(
            &app,
            "POST",
            "/api/v1/seats",
            Some(json!({ "flight_id": flight_id, "cabin": "PREMIUM", "labels": ["9A"] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["reason"], "BAD_REQUEST");
        assert!(err["error"].as_str().unwrap().contains("PREMIUM"));

        let (status, err) = call(&app, "POST", "/api/v1/vouchers/redeem", Some(json!({ "voucher_code": 5 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["reason"], "BAD_REQUEST");

        let (status, err) = call(&app, "GET", "/api/v1/seats?flight_id=abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["reason"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn seats_for_unknown_flight_are_rejected() {
        let (_dir, app) = test_app().await;
        let (status, err) = call(
            &app,
            "POST",
            "/api/v1/seats",
            Some(json!({ "flight_id": 999, "cabin": "FIRST", "labels": ["1A"] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["reason"], "BAD_REQUEST");
    }
}
