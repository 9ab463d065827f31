use crate::events::EventEmitter;
use crate::model::{AliasQuery, RoomCreator, RoomEvent};
use crate::storage::AppserviceStorage;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use mxd_logger::{SdkLevel, SdkLogSink};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

const SDK_MODULE: &str = "Appservice";

#[derive(Debug, Clone)]
pub(crate) struct AppState {
    pub hs_token: Arc<str>,
    pub creator: Arc<dyn RoomCreator>,
    pub storage: Arc<dyn AppserviceStorage>,
    pub log: Arc<dyn SdkLogSink>,
    pub alias_queries: EventEmitter<AliasQuery>,
    pub room_events: EventEmitter<RoomEvent>,
    pub started_at: Instant,
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/_matrix/app/v1/transactions/{txn_id}", put(push_transaction))
        .route("/transactions/{txn_id}", put(push_transaction))
        .route("/_matrix/app/v1/rooms/{alias}", get(query_alias))
        .route("/rooms/{alias}", get(query_alias))
        .route("/health", get(health))
        .with_state(state)
}

/// Matrix-style error body (`{"errcode", "error"}`).
#[derive(Debug)]
pub(crate) struct MatrixError {
    status: StatusCode,
    errcode: &'static str,
    error: Cow<'static, str>,
}

impl MatrixError {
    const fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            errcode: "M_UNAUTHORIZED",
            error: Cow::Borrowed("Missing access token"),
        }
    }

    const fn forbidden() -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            errcode: "M_FORBIDDEN",
            error: Cow::Borrowed("Bad access token"),
        }
    }

    const fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            errcode: "M_NOT_FOUND",
            error: Cow::Borrowed("Room alias not found"),
        }
    }

    fn internal(err: impl fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            errcode: "M_UNKNOWN",
            error: Cow::Owned(err.to_string()),
        }
    }
}

impl IntoResponse for MatrixError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "errcode": self.errcode, "error": self.error }))).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AuthQuery {
    access_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Transaction {
    events: Vec<Value>,
}

/// Checks the homeserver's `hs_token`, from the bearer header or `access_token`.
fn authorize(state: &AppState, headers: &HeaderMap, query: &AuthQuery) -> Result<(), MatrixError> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    match bearer.or(query.access_token.as_deref()) {
        None => Err(MatrixError::unauthorized()),
        Some(token) if token == &*state.hs_token => Ok(()),
        Some(_) => Err(MatrixError::forbidden()),
    }
}

async fn push_transaction(
    State(state): State<AppState>,
    Path(txn_id): Path<String>,
    Query(auth): Query<AuthQuery>,
    headers: HeaderMap,
    Json(transaction): Json<Transaction>,
) -> Result<Json<Value>, MatrixError> {
    authorize(&state, &headers, &auth)?;

    if state.storage.is_transaction_completed(&txn_id).await.map_err(MatrixError::internal)? {
        state.log.log(
            SdkLevel::Debug,
            SDK_MODULE,
            format!("Transaction {txn_id} already processed").into(),
        );
        return Ok(Json(json!({})));
    }

    state.log.log(
        SdkLevel::Info,
        SDK_MODULE,
        format!("Processing transaction {txn_id} ({} events)", transaction.events.len()).into(),
    );

    for raw in transaction.events {
        match RoomEvent::from_raw(raw) {
            Some(event) => state.room_events.emit(event).await.map_err(MatrixError::internal)?,
            None => debug!(%txn_id, "Skipping event without room_id"),
        }
    }

    state.storage.set_transaction_completed(&txn_id).await.map_err(MatrixError::internal)?;
    Ok(Json(json!({})))
}

async fn query_alias(
    State(state): State<AppState>,
    Path(alias): Path<String>,
    Query(auth): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, MatrixError> {
    authorize(&state, &headers, &auth)?;

    let (query, answer) = AliasQuery::new(alias.clone(), Arc::clone(&state.creator));
    if let Err(e) = state.alias_queries.emit(query).await {
        warn!(%alias, "Alias query not dispatched: {e}");
        return Err(MatrixError::not_found());
    }

    match answer.await {
        Ok(room_id) => {
            debug!(%alias, %room_id, "Alias provisioned");
            Ok(Json(json!({})))
        },
        Err(_) => Err(MatrixError::not_found()),
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime: u64,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let body = HealthResponse {
        status: "up",
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
    };

    (
        [
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(body),
    )
}
