use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use plantcare_sensors::{
    PotId, PotRecord, ReadingSeries, SensorEngine, SensorError, SensorReading, SkipReason,
    SyncOutcome, WateringStatus,
};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::db::Db;
use crate::state::SharedState;
use crate::weather::Weather;

pub type Engine = SensorEngine<Db, Weather>;

/// Everything the handlers share.  `ops` holds the sampling generator and
/// serializes every request that reads-then-writes the history.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub engine: Arc<Engine>,
    pub status: SharedState,
    pub ops: Arc<Mutex<fastrand::Rng>>,
}

impl AppState {
    pub fn new(db: Db, weather: Weather, status: SharedState, rng: fastrand::Rng) -> Self {
        Self {
            engine: Arc::new(SensorEngine::new(db.clone(), weather)),
            db,
            status,
            ops: Arc::new(Mutex::new(rng)),
        }
    }

    async fn pot(&self, pot_id: PotId) -> Result<PotRecord, ApiError> {
        self.db
            .get_pot(pot_id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or(ApiError::NotFound(pot_id))
    }

    async fn notify_error(&self, detail: String) {
        self.status.write().await.record_error(detail);
    }
}

/// Local wall-clock time at whole-second precision (the store keeps unix
/// seconds).  Falls back to UTC when the local offset is unknown.
fn now() -> OffsetDateTime {
    let t = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    t.replace_nanosecond(0).unwrap_or(t)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

pub enum ApiError {
    NotFound(PotId),
    Sensor(SensorError),
    Internal(anyhow::Error),
}

impl From<SensorError> for ApiError {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Sensor(e) if e.is_precondition() => StatusCode::CONFLICT,
            Self::Sensor(e) if e.is_configuration() => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Sensor(SensorError::TemperatureUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Sensor(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::NotFound(id) => format!("pot {id} not found"),
            Self::Sensor(e) => e.to_string(),
            Self::Internal(e) => format!("{e:#}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(%status, "{}", self.message());
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

/// User-facing notification text for a failed pot operation.
fn failure_notice(pot: &PotRecord, e: &SensorError) -> String {
    match e {
        SensorError::NoPriorReading { .. } => {
            format!("Please fetch sensor readings for {} before watering", pot.name)
        }
        SensorError::PotUnavailable { .. } if pot.is_empty_or_broken() => {
            format!("The pot {} is empty or broken", pot.name)
        }
        _ => format!("{}: {e}", pot.name),
    }
}

fn skip_notice(pot: &PotRecord, reason: SkipReason) -> String {
    match reason {
        SkipReason::EmptyOrBroken => format!("The pot {} is empty or broken", pot.name),
        SkipReason::Unconfigured => format!("The pot {} has no plant or setup yet", pot.name),
    }
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(untagged)]
enum SyncResponse {
    Recorded(SensorReading),
    Skipped { skipped: SkipReason },
}

#[derive(Serialize)]
struct SkippedPot {
    pot_id: PotId,
    reason: SkipReason,
}

#[derive(Serialize)]
struct FailedPotBody {
    pot_id: PotId,
    error: String,
}

#[derive(Serialize)]
struct SyncAllResponse {
    recorded: Vec<SensorReading>,
    skipped: Vec<SkippedPot>,
    failed: Vec<FailedPotBody>,
}

#[derive(Serialize)]
struct ReadingsResponse {
    rows: Vec<SensorReading>,
    columns: ReadingSeries,
}

#[derive(Serialize)]
struct WateringResponse {
    last_watering: Option<SensorReading>,
    status: WateringStatus,
    text: String,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(api_status))
        .route("/api/pots", get(api_pots))
        .route("/api/sync", post(api_sync_all))
        .route("/api/pots/{id}", delete(api_delete_pot))
        .route("/api/pots/{id}/sync", post(api_sync_pot))
        .route("/api/pots/{id}/water", post(api_water_pot))
        .route("/api/pots/{id}/readings", get(api_readings))
        .route("/api/pots/{id}/watering", get(api_watering))
        .with_state(state)
}

async fn api_status(State(state): State<AppState>) -> impl IntoResponse {
    let st = state.status.read().await;
    Json(st.to_status())
}

async fn api_pots(State(state): State<AppState>) -> Result<Json<Vec<PotRecord>>, ApiError> {
    let pots = state.db.load_pots().await.map_err(ApiError::Internal)?;
    Ok(Json(pots))
}

async fn api_sync_pot(
    State(state): State<AppState>,
    Path(pot_id): Path<PotId>,
) -> Result<Json<SyncResponse>, ApiError> {
    let pot = state.pot(pot_id).await?;
    let mut rng = state.ops.lock().await;

    match state.engine.sync_one(&pot, now(), &mut rng).await {
        Ok(SyncOutcome::Recorded(reading)) => {
            state.status.write().await.record_sync(format!(
                "Sensor readings for {} have been successfully synchronized",
                pot.name
            ));
            Ok(Json(SyncResponse::Recorded(reading)))
        }
        Ok(SyncOutcome::Skipped(reason)) => {
            state.status.write().await.record_sync(skip_notice(&pot, reason));
            Ok(Json(SyncResponse::Skipped { skipped: reason }))
        }
        Err(e) => {
            state.notify_error(failure_notice(&pot, &e)).await;
            Err(e.into())
        }
    }
}

async fn api_sync_all(State(state): State<AppState>) -> Result<Json<SyncAllResponse>, ApiError> {
    let pots = state.db.load_pots().await.map_err(ApiError::Internal)?;
    let mut rng = state.ops.lock().await;

    let report = state.engine.sync_all(&pots, now(), &mut rng).await;

    let name_of = |id: PotId| {
        pots.iter()
            .find(|p| p.id == id)
            .map_or_else(|| format!("pot {id}"), |p| p.name.clone())
    };

    {
        let mut st = state.status.write().await;
        for r in &report.recorded {
            st.record_sync(format!(
                "Sensor readings for {} have been successfully synchronized",
                name_of(r.pot_id)
            ));
        }
        for (pot_id, reason) in &report.skipped {
            if let Some(pot) = pots.iter().find(|p| p.id == *pot_id) {
                st.record_sync(skip_notice(pot, *reason));
            }
        }
        for f in &report.failed {
            st.record_error(format!("{}: {}", name_of(f.pot_id), f.error));
        }
    }

    Ok(Json(SyncAllResponse {
        skipped: report
            .skipped
            .iter()
            .map(|&(pot_id, reason)| SkippedPot { pot_id, reason })
            .collect(),
        failed: report
            .failed
            .iter()
            .map(|f| FailedPotBody {
                pot_id: f.pot_id,
                error: f.error.to_string(),
            })
            .collect(),
        recorded: report.recorded,
    }))
}

async fn api_water_pot(
    State(state): State<AppState>,
    Path(pot_id): Path<PotId>,
) -> Result<Json<SensorReading>, ApiError> {
    let pot = state.pot(pot_id).await?;
    let mut rng = state.ops.lock().await;

    match state.engine.water(&pot, now(), &mut rng).await {
        Ok(reading) => {
            state
                .status
                .write()
                .await
                .record_watering(format!("{} has been watered", pot.name));
            Ok(Json(reading))
        }
        Err(e) => {
            state.notify_error(failure_notice(&pot, &e)).await;
            Err(e.into())
        }
    }
}

async fn api_readings(
    State(state): State<AppState>,
    Path(pot_id): Path<PotId>,
) -> Result<Json<ReadingsResponse>, ApiError> {
    state.pot(pot_id).await?;
    let rows = state.engine.series(pot_id).await?;
    let columns = ReadingSeries::from_readings(&rows);
    Ok(Json(ReadingsResponse { rows, columns }))
}

async fn api_watering(
    State(state): State<AppState>,
    Path(pot_id): Path<PotId>,
) -> Result<Json<WateringResponse>, ApiError> {
    state.pot(pot_id).await?;
    let last = state.engine.most_recent_watering(pot_id).await?;
    let status = WateringStatus::from_last(last.as_ref(), now());
    Ok(Json(WateringResponse {
        text: status.to_string(),
        last_watering: last,
        status,
    }))
}

async fn api_delete_pot(
    State(state): State<AppState>,
    Path(pot_id): Path<PotId>,
) -> Result<StatusCode, ApiError> {
    let _ops = state.ops.lock().await;
    let deleted = state
        .db
        .delete_pot(pot_id)
        .await
        .map_err(ApiError::Internal)?;
    if !deleted {
        return Err(ApiError::NotFound(pot_id));
    }
    tracing::info!(pot = pot_id, "pot deleted");
    state
        .status
        .write()
        .await
        .record_system(format!("Pot {pot_id} and its readings were deleted"));
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Server entry-point
// ---------------------------------------------------------------------------

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind web port {port}"))?;

    tracing::info!("http api listening on http://{addr}");

    axum::serve(listener, router(state))
        .await
        .context("web server error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{pot, test_db};
    use crate::state::SystemState;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use plantcare_sensors::FixedTemperature;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn app() -> AppState {
        let db = test_db().await;
        db.upsert_pot(&pot(1, "Kitchen pot")).await.unwrap();
        db.upsert_pot(&pot(2, "Broken pot")).await.unwrap();
        AppState::new(
            db,
            Weather::Fixed(FixedTemperature(21.5)),
            SystemState::shared(),
            fastrand::Rng::with_seed(7),
        )
    }

    async fn call(state: &AppState, method: Method, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let resp = router(state.clone()).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn last_event(state: &AppState) -> Value {
        let (_, body) = call(state, Method::GET, "/api/status").await;
        body["events"][0].clone()
    }

    #[tokio::test]
    async fn lists_pots() {
        let state = app().await;
        let (status, body) = call(&state, Method::GET, "/api/pots").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[0]["name"], "Kitchen pot");
    }

    #[tokio::test]
    async fn sync_then_water() {
        let state = app().await;

        let (status, reading) = call(&state, Method::POST, "/api/pots/1/sync").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reading["soil_moisture"], 7.0);
        assert_eq!(reading["temperature_celsius"], 21.5);
        assert!(reading["watering_timestamp"].is_null());
        assert_eq!(last_event(&state).await["kind"], "sync");

        let (status, watered) = call(&state, Method::POST, "/api/pots/1/water").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(watered["soil_moisture"], 8.0);
        assert_eq!(watered["watering_timestamp"], watered["timestamp"]);
        assert_eq!(last_event(&state).await["detail"], "Kitchen pot has been watered");

        let (status, body) = call(&state, Method::GET, "/api/pots/1/watering").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"]["status"], "today");
        assert_eq!(body["text"], "today");

        let (_, body) = call(&state, Method::GET, "/api/pots/1/readings").await;
        assert_eq!(body["rows"].as_array().unwrap().len(), 2);
        assert_eq!(body["columns"]["soil_moisture"], serde_json::json!([7.0, 8.0]));
    }

    #[tokio::test]
    async fn watering_before_sync_conflicts() {
        let state = app().await;
        let (status, body) = call(&state, Method::POST, "/api/pots/1/water").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("no sensor reading"));

        let event = last_event(&state).await;
        assert_eq!(event["kind"], "error");
        assert_eq!(
            event["detail"],
            "Please fetch sensor readings for Kitchen pot before watering"
        );

        let (_, body) = call(&state, Method::GET, "/api/pots/1/watering").await;
        assert_eq!(body["text"], "no previous watering");
        assert!(body["last_watering"].is_null());
    }

    #[tokio::test]
    async fn broken_pot_is_skipped() {
        let state = app().await;
        let (status, body) = call(&state, Method::POST, "/api/pots/2/sync").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "skipped": "empty_or_broken" }));
        assert_eq!(last_event(&state).await["detail"], "The pot Broken pot is empty or broken");

        let (status, _) = call(&state, Method::POST, "/api/pots/2/water").await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_pot_is_not_found() {
        let state = app().await;
        for (method, uri) in [
            (Method::POST, "/api/pots/99/sync"),
            (Method::POST, "/api/pots/99/water"),
            (Method::GET, "/api/pots/99/readings"),
            (Method::GET, "/api/pots/99/watering"),
            (Method::DELETE, "/api/pots/99"),
        ] {
            let (status, body) = call(&state, method, uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body["error"], "pot 99 not found");
        }
    }

    #[tokio::test]
    async fn malformed_ph_is_unprocessable() {
        let state = app().await;
        let mut bad = pot(3, "Odd pot");
        bad.soil_ph = Some("seven".into());
        state.db.upsert_pot(&bad).await.unwrap();

        let (status, _) = call(&state, Method::POST, "/api/pots/3/sync").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(last_event(&state).await["kind"], "error");
    }

    #[tokio::test]
    async fn sync_all_reports_each_pot() {
        let state = app().await;
        let mut bad = pot(3, "Odd pot");
        bad.soil_ph = Some("seven".into());
        state.db.upsert_pot(&bad).await.unwrap();

        let (status, body) = call(&state, Method::POST, "/api/sync").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recorded"].as_array().unwrap().len(), 1);
        assert_eq!(body["recorded"][0]["pot_id"], 1);
        assert_eq!(
            body["skipped"],
            serde_json::json!([{ "pot_id": 2, "reason": "empty_or_broken" }])
        );
        assert_eq!(body["failed"][0]["pot_id"], 3);
    }

    #[tokio::test]
    async fn unconfigured_weather_is_unavailable() {
        let db = test_db().await;
        db.upsert_pot(&pot(1, "Kitchen pot")).await.unwrap();
        let state = AppState::new(
            db,
            Weather::Unconfigured(crate::weather::NoWeather),
            SystemState::shared(),
            fastrand::Rng::with_seed(1),
        );
        let (status, body) = call(&state, Method::POST, "/api/pots/1/sync").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("temperature unavailable"));
        assert!(state.engine.series(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_pot_and_readings() {
        let state = app().await;
        call(&state, Method::POST, "/api/pots/1/sync").await;

        let (status, _) = call(&state, Method::DELETE, "/api/pots/1").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(state.engine.series(1).await.unwrap().is_empty());

        let (status, _) = call(&state, Method::GET, "/api/pots/1/readings").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(last_event(&state).await["kind"], "system");
    }
}
