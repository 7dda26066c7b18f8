// src/models/workorder.rs

use serde::Serialize;
use utoipa::ToSchema;

// Estrutura agrupada que o renderizador consome: SKU base -> cor -> tamanho.
// A ordem dos vetores já é a ordem de impressão (tamanhos em ordem de grade).

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SizeQty {
    pub size: String,
    pub qty: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ColorGroup {
    pub color: String,
    pub sizes: Vec<SizeQty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ItemGroup {
    pub item: String,
    pub product: String,
    pub vendor_code: String,
    pub production: String,
    pub colors: Vec<ColorGroup>,
}
