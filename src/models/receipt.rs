// src/models/receipt.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Evento de recebimento (livro-razão) ---
// Append-only: nunca sofre UPDATE nem DELETE. O total recebido de uma linha
// é sempre a soma dos eventos de (po_number, po_line_id).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ReceiptEvent {
    pub id: i64,
    pub po_number: String,
    pub po_line_id: String,
    pub received_qty: i32,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}
