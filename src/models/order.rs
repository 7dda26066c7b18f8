// src/models/order.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- 1. Status do pedido na loja ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    OnHold,     // aguardando compra (estado pré-recebimento)
    OnOrder,    // todos os POs do pedido foram enviados ao fornecedor
    Processing, // mercadoria recebida, em produção
    Completed,
    Cancelled,
}

// --- 2. Pedido (projeção local da plataforma da loja) ---
// `vendor_po_links` guarda, por fornecedor, o número do PO que cobre o
// pedido; `removed_lines` guarda as chaves de linha removidas de um PO para
// o próximo scan reconsiderar.
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub display_number: String,
    pub status: OrderStatus,
    pub ready_for_workorder: bool,
    pub missing_goods: bool,
    pub vendor_po_links: Json<HashMap<String, String>>,
    pub removed_lines: Json<HashMap<String, Vec<String>>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- 3. Item do pedido (insumo do work order) ---
#[derive(Debug, Clone, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_name: String,
    pub vendor_id: String,
    pub vendor_item_code: String,
    pub vendor_code: String,
    pub production: String,
    pub color: String,
    pub size: String,
    pub qty: i32,
    pub unit_cost: Decimal,
    pub artwork_url: String,
    pub special_instructions: String,
    pub created_at: DateTime<Utc>,
}

// --- 4. Prontidão por pedido (resposta do receive) ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderReadiness {
    pub ready: bool,
    pub missing: bool,
}
