// crushgames-server/src/routes.rs
//
// The HTTP surface. Field names (numeroGanador, esGanador, ...) are a
// stable contract with the deployed frontend and must not be renamed.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;
use uuid::Uuid;

use crushgames_core::models::IssuedCoupon;
use crushgames_core::services::CouponResult;
use crushgames_core::Error;

use crate::context::ServerContext;

pub fn build_router(ctx: ServerContext) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .route("/estado", get(estado))
        .route("/generar-ganador", post(generar_ganador))
        .route("/intentar", post(intentar))
        .route("/reclamar", post(reclamar))
        .route("/actualizar-entrega", post(actualizar_entrega))
        .route("/lista-ganadores", get(lista_ganadores))
        .route("/verificar/{numero}", get(verificar));

    if ctx.config.dev_routes {
        router = router
            .route("/__dev__/unlock", post(dev_unlock))
            .route("/__dev__/ftw/reset", post(dev_ftw_reset));
    }

    // The game frontend is served from another origin.
    router
        .with_state(ctx)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

// ------------------------------------------------------------------------
// Error mapping
// ------------------------------------------------------------------------

/// JSON error response. Storage and upstream failures become an opaque 500;
/// domain errors keep their machine-readable reason.
pub struct ApiError {
    status: StatusCode,
    body: Value,
}

impl ApiError {
    fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, json!({ "message": message }))
    }

    fn with_reason(status: StatusCode, reason: &str, message: &str) -> Self {
        Self::new(status, json!({ "reason": reason, "message": message }))
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::Locked { until } => Self::new(
                StatusCode::LOCKED,
                json!({
                    "reason": "LOCKED",
                    "lockedUntil": until,
                    "message": "Juego bloqueado temporalmente",
                }),
            ),
            Error::NoActiveRound => {
                Self::bad_request("No hay número ganador activo para reclamar")
            }
            Error::NotFound(message) => {
                Self::new(StatusCode::NOT_FOUND, json!({ "message": message }))
            }
            Error::InvalidInput(message) => {
                Self::with_reason(StatusCode::BAD_REQUEST, "INVALID_INPUT", &message)
            }
            other => {
                error!("Request failed: {:?}", other);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "Error interno del servidor" }),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ------------------------------------------------------------------------
// Request / response shapes
// ------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntentarRequest {
    game_id: Option<u32>,
    elapsed_ms: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReclamarRequest {
    contacto: Option<String>,
    game_id: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActualizarEntregaRequest {
    numero: Option<i32>,
    game_id: Option<u32>,
    winner_id: Option<Uuid>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EstadoResponse {
    numero_ganador: Option<i32>,
    locked_until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerarResponse {
    message: String,
    numero_ganador: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IntentarResponse {
    intento: i32,
    numero_ganador: i32,
    es_ganador: bool,
    locked_until: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TimingIntentarResponse {
    measured_ms: i64,
    delta_ms: i64,
    es_ganador: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    winner_id: Option<Uuid>,
    locked_until: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CouponJson {
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl From<IssuedCoupon> for CouponJson {
    fn from(c: IssuedCoupon) -> Self {
        Self { code: c.code, name: c.name, expires_at: c.expires_at }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReclamarResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    nuevo_numero_ganador: Option<i32>,
    coupon_issued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    coupon: Option<CouponJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    coupon_error: Option<String>,
}

impl ReclamarResponse {
    fn new(message: &str, nuevo_numero_ganador: Option<i32>, coupon: CouponResult) -> Self {
        Self {
            message: message.to_string(),
            nuevo_numero_ganador,
            coupon_issued: coupon.issued,
            coupon: coupon.coupon.map(CouponJson::from),
            coupon_error: coupon.error,
        }
    }
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListaQuery {
    game_id: Option<u32>,
}

#[derive(Serialize)]
struct GanadorItem {
    id: Uuid,
    numero: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TimingGanadorItem {
    id: Uuid,
    measured_ms: i64,
    delta_ms: i64,
    contacto: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerificarResponse {
    numero: i32,
    reclamado: bool,
    entregado: bool,
    contacto: Option<String>,
    reclamado_en: Option<DateTime<Utc>>,
}

// ------------------------------------------------------------------------
// Handlers
// ------------------------------------------------------------------------

async fn root() -> String {
    format!(
        "Servidor funcionando correctamente 🚀 ({})",
        Utc::now().to_rfc3339()
    )
}

async fn estado(State(ctx): State<ServerContext>) -> Result<Json<EstadoResponse>, ApiError> {
    let status = ctx.number_game.status().await?;
    Ok(Json(EstadoResponse {
        numero_ganador: status.target_value,
        locked_until: status.locked_until,
        now: status.now,
    }))
}

async fn generar_ganador(
    State(ctx): State<ServerContext>,
) -> Result<Json<GenerarResponse>, ApiError> {
    let round = ctx.number_game.generate_round().await?;
    Ok(Json(GenerarResponse {
        message: "Número ganador generado 🎉".to_string(),
        numero_ganador: round.target_value,
    }))
}

async fn intentar(
    State(ctx): State<ServerContext>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Option<Json<IntentarRequest>>,
) -> Result<Response, ApiError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let source_ip = Some(addr.ip().to_string());

    if req.game_id == Some(ctx.config.game_timing_id) {
        let elapsed = req.elapsed_ms.ok_or_else(|| {
            ApiError::with_reason(
                StatusCode::BAD_REQUEST,
                "INVALID_ELAPSED",
                "elapsedMs es obligatorio para Perfect Timing",
            )
        })?;

        let outcome = ctx
            .timing_game
            .submit(elapsed, source_ip)
            .await
            .map_err(|e| match e {
                Error::InvalidInput(m) => {
                    ApiError::with_reason(StatusCode::BAD_REQUEST, "INVALID_ELAPSED", &m)
                }
                other => other.into(),
            })?;

        return Ok(Json(TimingIntentarResponse {
            measured_ms: outcome.measured_ms,
            delta_ms: outcome.delta_ms,
            es_ganador: outcome.is_winner,
            winner_id: outcome.winner_id,
            locked_until: outcome.locked_until,
        })
        .into_response());
    }

    let outcome = ctx
        .number_game
        .attempt(source_ip)
        .await
        .map_err(|e| match e {
            Error::NoActiveRound => ApiError::bad_request("No hay número ganador generado aún"),
            other => other.into(),
        })?;

    Ok(Json(IntentarResponse {
        intento: outcome.attempt,
        numero_ganador: outcome.target_value,
        es_ganador: outcome.is_winner,
        locked_until: outcome.locked_until,
    })
    .into_response())
}

async fn reclamar(
    State(ctx): State<ServerContext>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Option<Json<ReclamarRequest>>,
) -> Result<Json<ReclamarResponse>, ApiError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let source_ip = Some(addr.ip().to_string());

    if req.game_id == Some(ctx.config.game_timing_id) {
        let outcome = ctx
            .timing_game
            .claim(req.contacto, source_ip)
            .await
            .map_err(|e| match e {
                Error::NoActiveRound => {
                    ApiError::bad_request("No hay premio activo para reclamar")
                }
                other => other.into(),
            })?;

        return Ok(Json(ReclamarResponse::new(
            "Premio reclamado 🎊",
            None,
            outcome.coupon,
        )));
    }

    let outcome = ctx.number_game.claim(req.contacto, source_ip).await?;

    Ok(Json(ReclamarResponse::new(
        "Premio reclamado y nuevo número generado 🎊",
        Some(outcome.next_target_value),
        outcome.coupon,
    )))
}

async fn actualizar_entrega(
    State(ctx): State<ServerContext>,
    body: Option<Json<ActualizarEntregaRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();

    if req.game_id == Some(ctx.config.game_timing_id) {
        let winner_id = req.winner_id.ok_or_else(|| {
            ApiError::bad_request("winnerId es obligatorio para Perfect Timing")
        })?;
        ctx.timing_game.mark_delivered(winner_id).await?;
    } else {
        let numero = req
            .numero
            .ok_or_else(|| ApiError::bad_request("numero es obligatorio"))?;
        ctx.number_game.mark_delivered(numero).await?;
    }

    Ok(Json(MessageResponse {
        message: "Premio marcado como entregado ✔".to_string(),
    }))
}

async fn lista_ganadores(
    State(ctx): State<ServerContext>,
    Query(query): Query<ListaQuery>,
) -> Result<Response, ApiError> {
    if query.game_id == Some(ctx.config.game_timing_id) {
        let winners = ctx.timing_game.list_pending().await?;
        let items: Vec<TimingGanadorItem> = winners
            .into_iter()
            .map(|w| TimingGanadorItem {
                id: w.winner_id,
                measured_ms: w.measured_ms,
                delta_ms: w.delta_ms,
                contacto: w.contact,
            })
            .collect();
        return Ok(Json(items).into_response());
    }

    let rounds = ctx.number_game.list_pending().await?;
    let items: Vec<GanadorItem> = rounds
        .into_iter()
        .map(|r| GanadorItem { id: r.round_id, numero: r.target_value })
        .collect();
    Ok(Json(items).into_response())
}

async fn verificar(
    State(ctx): State<ServerContext>,
    Path(numero): Path<i32>,
) -> Result<Json<VerificarResponse>, ApiError> {
    let round = ctx.number_game.verify(numero).await?;
    Ok(Json(VerificarResponse {
        numero: round.target_value,
        reclamado: round.claimed,
        entregado: round.delivered,
        contacto: round.contact,
        reclamado_en: round.claimed_at,
    }))
}

async fn dev_unlock(State(ctx): State<ServerContext>) -> Result<Json<MessageResponse>, ApiError> {
    ctx.number_game.dev_unlock().await?;
    ctx.timing_game.dev_unlock().await?;
    Ok(Json(MessageResponse { message: "Locks cleared".to_string() }))
}

async fn dev_ftw_reset(
    State(ctx): State<ServerContext>,
) -> Result<Json<MessageResponse>, ApiError> {
    ctx.number_game.dev_reset_counter().await?;
    Ok(Json(MessageResponse { message: "Forced-win counter reset".to_string() }))
}
