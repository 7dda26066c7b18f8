// src/handlers/lifecycle.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::po::LineKey,
    services::po_service::{DeleteOutcome, MarkOrderedSummary, PruneSummary, RunLineInput},
};

// ---
// Payload: item identificado por (code, color, size)
// ---
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ItemKeyPayload {
    pub code: String,
    pub color: String,
    pub size: String,
}

impl ItemKeyPayload {
    fn to_key(&self) -> LineKey {
        LineKey::new(&self.code, &self.color, &self.size)
    }
}

// ---
// Handler: marca o PO como ordered (publica)
// ---
#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkOrderedPayload {
    // Itens a manter; os demais voltam para a fila antes de publicar.
    #[serde(default)]
    pub keep_items: Vec<ItemKeyPayload>,
}

#[utoipa::path(
    post,
    path = "/api/pos/{po_id}/mark-ordered",
    request_body = MarkOrderedPayload,
    responses(
        (status = 200, description = "PO publicado (numeração idempotente)", body = MarkOrderedSummary),
        (status = 404, description = "PO não encontrado"),
        (status = 409, description = "Seleção removeria todos os itens"),
    ),
    security(("api_jwt" = [])),
    tag = "Lifecycle"
)]
pub async fn mark_ordered(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Path(po_id): Path<Uuid>,
    Json(payload): Json<MarkOrderedPayload>,
) -> Result<impl IntoResponse, AppError> {
    let keep = if payload.keep_items.is_empty() {
        None
    } else {
        Some(payload.keep_items.iter().map(|i| i.to_key()).collect())
    };

    let summary = app_state.po_service.mark_ordered(po_id, keep).await?;
    Ok((StatusCode::OK, Json(summary)))
}

// ---
// Handler: remove itens de um PO
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PrunePayload {
    #[validate(length(min = 1, message = "Informe ao menos um item para remover."))]
    pub items: Vec<ItemKeyPayload>,
}

#[utoipa::path(
    post,
    path = "/api/pos/{po_id}/prune",
    request_body = PrunePayload,
    responses(
        (status = 200, description = "Itens removidos; pedidos re-projetados", body = PruneSummary),
        (status = 404, description = "PO não encontrado"),
    ),
    security(("api_jwt" = [])),
    tag = "Lifecycle"
)]
pub async fn prune_items(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Path(po_id): Path<Uuid>,
    Json(payload): Json<PrunePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let remove = payload.items.iter().map(|i| i.to_key()).collect();
    let summary = app_state.po_service.prune_items(po_id, remove).await?;
    Ok((StatusCode::OK, Json(summary)))
}

// ---
// Handler: exclui (vazio) ou reverte (com linhas) um PO
// ---
#[utoipa::path(
    delete,
    path = "/api/pos/{po_id}",
    responses(
        (status = 200, description = "PO excluído ou revertido para a run aberta", body = DeleteOutcome),
        (status = 404, description = "PO não encontrado"),
    ),
    security(("api_jwt" = [])),
    tag = "Lifecycle"
)]
pub async fn delete_or_revert(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Path(po_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = app_state.po_service.delete_or_revert(po_id).await?;
    Ok((StatusCode::OK, Json(outcome)))
}

// ---
// Payload: adicionar linhas à run aberta do fornecedor
// ---
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RunLinePayload {
    pub order_id: Uuid,
    pub item: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub size: String,
    pub qty: i32,
    #[serde(default)]
    pub unit_cost: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddToRunPayload {
    #[validate(length(min = 1, message = "O fornecedor é obrigatório."))]
    pub vendor: String,
    #[validate(length(min = 1, message = "Envie ao menos uma linha."))]
    pub lines: Vec<RunLinePayload>,
}

#[utoipa::path(
    post,
    path = "/api/runs/lines",
    request_body = AddToRunPayload,
    responses(
        (status = 200, description = "Linhas fundidas na run aberta do fornecedor"),
        (status = 400, description = "Nenhuma linha válida"),
    ),
    security(("api_jwt" = [])),
    tag = "Lifecycle"
)]
pub async fn add_to_run(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Json(payload): Json<AddToRunPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let inputs: Vec<RunLineInput> = payload
        .lines
        .into_iter()
        .map(|l| RunLineInput {
            order_id: l.order_id,
            item: l.item,
            product: l.product,
            color: l.color,
            size: l.size,
            qty: l.qty,
            unit_cost: l.unit_cost,
        })
        .collect();

    let run_id = app_state
        .po_service
        .add_lines_to_run(&payload.vendor, inputs)
        .await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "ok": true, "po_id": run_id })),
    ))
}
