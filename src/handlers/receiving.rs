// src/handlers/receiving.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::po::{OpenPoSummary, PoLinesResponse},
    services::receive_service::{ReceiveDelta, ReceiveResult},
};

// ---
// Handler: lista de POs aguardando recebimento
// ---
#[utoipa::path(
    get,
    path = "/api/pos",
    responses((status = 200, description = "POs publicados ainda não totalmente recebidos", body = [OpenPoSummary])),
    security(("api_jwt" = [])),
    tag = "Receiving"
)]
pub async fn get_pos(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let pos = app_state.po_service.list_open_pos().await?;
    Ok((StatusCode::OK, Json(pos)))
}

// ---
// Query: po-lines
// ---
#[derive(Debug, Deserialize, IntoParams)]
pub struct PoLinesQuery {
    pub po_id: Uuid,
}

#[utoipa::path(
    get,
    path = "/api/po-lines",
    params(PoLinesQuery),
    responses(
        (status = 200, description = "Linhas do PO com totais recebidos", body = PoLinesResponse),
        (status = 404, description = "PO não encontrado"),
    ),
    security(("api_jwt" = [])),
    tag = "Receiving"
)]
pub async fn get_po_lines(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<PoLinesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let lines = app_state.po_service.get_po_lines(query.po_id).await?;
    Ok((StatusCode::OK, Json(lines)))
}

// ---
// Payload: Receive
// ---
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ReceiveLinePayload {
    pub po_line_id: String,
    pub add_qty: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReceivePayload {
    pub po_id: Uuid,
    pub po_number: Option<String>,
    #[validate(length(min = 1, message = "Envie ao menos uma linha."))]
    pub lines: Vec<ReceiveLinePayload>,
}

// ---
// Handler: receive (o caminho quente do recebimento)
// ---
#[utoipa::path(
    post,
    path = "/api/receive",
    request_body = ReceivePayload,
    responses(
        (status = 200, description = "Lote aplicado; estado recalculado", body = ReceiveResult),
        (status = 400, description = "Nenhuma linha válida no lote"),
        (status = 404, description = "PO não encontrado"),
    ),
    security(("api_jwt" = [])),
    tag = "Receiving"
)]
pub async fn receive(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ReceivePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    // Converte o payload cru em deltas tipados já na fronteira; linhas
    // inválidas caem em silêncio, o motor decide se o lote inteiro vale.
    let deltas: Vec<ReceiveDelta> = payload
        .lines
        .iter()
        .filter_map(|l| ReceiveDelta::sanitize(&l.po_line_id, l.add_qty))
        .collect();

    let result = app_state
        .receive_service
        .receive(payload.po_id, payload.po_number, deltas, user.0.id)
        .await?;

    Ok((StatusCode::OK, Json(result)))
}
