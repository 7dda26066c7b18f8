// src/handlers/workorders.rs

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{common::error::AppError, config::AppState, middleware::auth::AuthenticatedUser};

#[derive(Debug, Deserialize, IntoParams)]
pub struct WorkOrderQuery {
    // Paginação por lote para o cliente remontar o conjunto completo.
    #[serde(default)]
    pub chunk: usize,
    pub chunk_size: Option<usize>,
}

const DEFAULT_CHUNK_SIZE: usize = 8;

#[utoipa::path(
    get,
    path = "/api/workorders",
    params(WorkOrderQuery),
    responses(
        (status = 200, description = "PDF do lote de work orders"),
        (status = 400, description = "Chunk fora do intervalo"),
        (status = 404, description = "Nenhum pedido elegível"),
    ),
    security(("api_jwt" = [])),
    tag = "WorkOrders"
)]
pub async fn get_workorders(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<WorkOrderQuery>,
) -> Result<Response, AppError> {
    let chunk_size = query.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);

    let batch = app_state
        .workorder_service
        .render_workorders(query.chunk, chunk_size)
        .await?;

    // Headers para o navegador tratar o PDF + índices do lote para o
    // cliente saber quantos chunks ainda faltam.
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/pdf"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!(
            "attachment; filename=\"workorders-{}.pdf\"",
            batch.chunk_index
        ))
        .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?,
    );
    headers.insert(
        HeaderName::from_static("x-chunk-index"),
        HeaderValue::from(batch.chunk_index),
    );
    headers.insert(
        HeaderName::from_static("x-chunk-total"),
        HeaderValue::from(batch.chunk_total),
    );

    Ok((headers, batch.pdf).into_response())
}
