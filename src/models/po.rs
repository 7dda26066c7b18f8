// src/models/po.rs

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- 1. Identidade composta da linha ---
// A chave é (item, color, size) normalizada: lowercase, trim, fallback para
// segmento vazio, e '|' embutido vira espaço para não colidir com o
// delimitador do formato "item|color|size".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineKey {
    item: String,
    color: String,
    size: String,
}

impl LineKey {
    pub fn new(item: &str, color: &str, size: &str) -> Self {
        Self {
            item: normalize_segment(item, "item"),
            color: normalize_segment(color, "n/a"),
            size: normalize_segment(size, "n/a"),
        }
    }

    /// Reconstrói a chave a partir do formato de fio "item|color|size".
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(3, '|');
        let item = parts.next()?;
        let color = parts.next()?;
        let size = parts.next()?;
        Some(Self::new(item, color, size))
    }

    pub fn item(&self) -> &str {
        &self.item
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn size(&self) -> &str {
        &self.size
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.item, self.color, self.size)
    }
}

fn normalize_segment(value: &str, fallback: &str) -> String {
    let value = value.trim().to_lowercase();
    if value.is_empty() {
        return fallback.to_string();
    }
    value.replace('|', " ")
}

// Grade de tamanhos para ordenação de impressão/listagem.
// Tamanhos fora da grade vão para o fim.
const SIZE_ORDER: [&str; 14] = [
    "NB", "06M", "12M", "18M", "24M", "XS", "S", "M", "L", "XL", "2XL", "3XL", "4XL", "5XL",
];

pub fn size_sort_value(size: &str) -> usize {
    let size = size.trim().to_uppercase();
    SIZE_ORDER
        .iter()
        .position(|s| *s == size)
        .unwrap_or(SIZE_ORDER.len() + 1)
}

// --- 2. Linha do PO (armazenada no blob JSONB `items`) ---
// Uma linha agrega demanda de vários pedidos: `order_ids` guarda os pedidos
// distintos e `order_qty` a quantidade demandada por cada um.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoLine {
    pub item: String,
    pub product: String,
    pub color: String,
    pub size: String,
    pub qty: i32,
    pub unit_cost: Decimal,
    pub line_total: Decimal,
    #[serde(default)]
    pub order_ids: Vec<Uuid>,
    #[serde(default)]
    pub order_qty: HashMap<Uuid, i32>,
}

impl PoLine {
    pub fn key(&self) -> LineKey {
        LineKey::new(&self.item, &self.color, &self.size)
    }
}

// --- 3. Status do PO ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "po_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoStatus {
    Open,     // run em rascunho, ainda não enviada ao fornecedor
    Ordered,  // publicada, aguardando recebimento
    Received, // totalmente recebida (fechada)
}

// --- 4. Purchase Order ---
#[derive(Debug, Clone, FromRow)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub vendor_id: String,
    pub po_number: Option<String>,
    pub po_date: Option<NaiveDate>,
    pub status: PoStatus,
    pub items: Json<Vec<PoLine>>,
    pub total_cost: Decimal,
    pub has_unordered: bool,
    pub ordered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseOrder {
    /// Número usado como chave do livro-razão. Preferimos o número real;
    /// sem ele caímos no id interno para nunca orfanar um recebimento
    /// (ao custo de fragmentar o histórico se o PO for renumerado depois).
    pub fn ledger_number(&self) -> String {
        match &self.po_number {
            Some(n) if !n.is_empty() => n.clone(),
            _ => self.id.to_string(),
        }
    }
}

// --- 5. Views de leitura (respostas da API) ---

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OpenPoSummary {
    pub po_id: Uuid,
    pub po_number: String,
    pub vendor: String,
    pub created: DateTime<Utc>,
    pub items_count: usize,
    pub status: PoStatus,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderRef {
    pub order_id: Uuid,
    pub order_number: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PoLineView {
    pub po_line_id: String,
    pub item: String,
    pub color: String,
    pub size: String,
    pub ordered_qty: i32,
    pub received_qty: i64,
    pub order_ids: Vec<Uuid>,
    pub orders: Vec<OrderRef>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PoLinesResponse {
    pub po_id: Uuid,
    pub po_number: String,
    pub lines: Vec<PoLineView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_key_normalizes_case_and_whitespace() {
        let a = LineKey::new(" PC54 ", "Black", "2XL");
        let b = LineKey::new("pc54", "black", "2xl");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "pc54|black|2xl");
    }

    #[test]
    fn line_key_falls_back_on_empty_segments() {
        let key = LineKey::new("", "", "");
        assert_eq!(key.to_string(), "item|n/a|n/a");
    }

    #[test]
    fn line_key_escapes_embedded_delimiter() {
        // Um atributo com '|' não pode produzir uma chave ambígua.
        let key = LineKey::new("996m|special", "black", "l");
        assert_eq!(key.to_string(), "996m special|black|l");
        assert_eq!(LineKey::parse(&key.to_string()), Some(key));
    }

    #[test]
    fn line_key_parse_roundtrip() {
        let key = LineKey::new("G500", "Navy Heather", "XL");
        let parsed = LineKey::parse(&key.to_string()).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn line_key_parse_rejects_incomplete() {
        assert_eq!(LineKey::parse("pc54|black"), None);
        assert_eq!(LineKey::parse("pc54"), None);
    }

    #[test]
    fn ledger_number_prefers_real_number() {
        let line: Vec<PoLine> = Vec::new();
        let mut po = PurchaseOrder {
            id: Uuid::new_v4(),
            vendor_id: "sanmar".into(),
            po_number: Some("BT-SANMAR-11062025-001".into()),
            po_date: None,
            status: PoStatus::Ordered,
            items: Json(line),
            total_cost: Decimal::ZERO,
            has_unordered: false,
            ordered_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(po.ledger_number(), "BT-SANMAR-11062025-001");

        po.po_number = None;
        assert_eq!(po.ledger_number(), po.id.to_string());

        po.po_number = Some(String::new());
        assert_eq!(po.ledger_number(), po.id.to_string());
    }
}
