// src/services/workorder_service.rs

use genpdf::{elements, style, Alignment, Element, Scale};
use image::Luma;
use qrcode::QrCode;
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    db::OrderRepository,
    models::{
        order::{Order, OrderItem},
        po::size_sort_value,
        workorder::{ColorGroup, ItemGroup, SizeQty},
    },
};

// --- 1. Agrupamento puro (consumido pelo renderizador) ---

/// Agrupa os itens de um pedido por SKU base -> cor -> tamanho, com os
/// tamanhos na ordem da grade. `vendor_code`/`production` usam o primeiro
/// valor não vazio encontrado para o SKU.
pub fn group_items(items: &[OrderItem]) -> Vec<ItemGroup> {
    // Vetores indexados para preservar a ordem de primeira aparição.
    let mut groups: Vec<ItemGroup> = Vec::new();
    // Cores (e seus tamanhos) por grupo, também na ordem de aparição.
    let mut color_index: Vec<Vec<(String, Vec<SizeQty>)>> = Vec::new();

    for item in items {
        let code = if item.vendor_item_code.trim().is_empty() {
            item.product_name.clone()
        } else {
            item.vendor_item_code.clone()
        };
        let color = if item.color.trim().is_empty() {
            "N/A".to_string()
        } else {
            item.color.clone()
        };
        let size = if item.size.trim().is_empty() {
            "N/A".to_string()
        } else {
            item.size.clone()
        };
        let qty = item.qty.max(1);

        let gi = match groups.iter().position(|g| g.item == code) {
            Some(gi) => {
                if groups[gi].vendor_code.is_empty() && !item.vendor_code.is_empty() {
                    groups[gi].vendor_code = item.vendor_code.clone();
                }
                if groups[gi].production.is_empty() && !item.production.is_empty() {
                    groups[gi].production = item.production.clone();
                }
                gi
            }
            None => {
                groups.push(ItemGroup {
                    item: code,
                    product: item.product_name.clone(),
                    vendor_code: item.vendor_code.clone(),
                    production: item.production.clone(),
                    colors: Vec::new(),
                });
                color_index.push(Vec::new());
                groups.len() - 1
            }
        };

        let colors = &mut color_index[gi];
        let ci = match colors.iter().position(|(c, _)| *c == color) {
            Some(ci) => ci,
            None => {
                colors.push((color, Vec::new()));
                colors.len() - 1
            }
        };

        let sizes = &mut colors[ci].1;
        match sizes.iter_mut().find(|s| s.size == size) {
            Some(entry) => entry.qty += qty,
            None => sizes.push(SizeQty { size, qty }),
        }
    }

    for (gi, colors) in color_index.into_iter().enumerate() {
        groups[gi].colors = colors
            .into_iter()
            .map(|(color, mut sizes)| {
                sizes.sort_by(|a, b| {
                    size_sort_value(&a.size)
                        .cmp(&size_sort_value(&b.size))
                        .then(a.size.cmp(&b.size))
                });
                ColorGroup { color, sizes }
            })
            .collect();
    }

    groups
}

// --- 2. Lote renderizado ---

pub struct WorkOrderBatch {
    pub pdf: Vec<u8>,
    pub chunk_index: usize,
    pub chunk_total: usize,
}

// --- 3. Work Order Assembly ---
#[derive(Clone)]
pub struct WorkOrderService {
    order_repo: OrderRepository,
    pool: PgPool,
    fonts_dir: String,
}

impl WorkOrderService {
    pub fn new(order_repo: OrderRepository, pool: PgPool, fonts_dir: String) -> Self {
        Self {
            order_repo,
            pool,
            fonts_dir,
        }
    }

    /// Renderiza um lote (chunk) de work orders dos pedidos elegíveis.
    /// Elegível = ready_for_workorder; missing_goods vira só um aviso de
    /// remessa parcial no documento, nunca bloqueia a impressão.
    pub async fn render_workorders(
        &self,
        chunk: usize,
        chunk_size: usize,
    ) -> Result<WorkOrderBatch, AppError> {
        let orders = self.order_repo.list_ready_for_workorder(&self.pool).await?;
        if orders.is_empty() {
            return Err(AppError::NoWorkOrders);
        }

        let chunk_size = chunk_size.max(1);
        let chunk_total = orders.len().div_ceil(chunk_size);
        if chunk >= chunk_total {
            return Err(AppError::InvalidPayload(format!(
                "Chunk {} fora do intervalo (total {}).",
                chunk, chunk_total
            )));
        }

        let selected = &orders[chunk * chunk_size..((chunk + 1) * chunk_size).min(orders.len())];

        // 1. Configura o PDF
        let font_family = genpdf::fonts::from_files(&self.fonts_dir, "Roboto", None)
            .map_err(|_| {
                AppError::FontNotFound(format!("Fonte não encontrada em {}", self.fonts_dir))
            })?;

        // Busca os itens de cada pedido antes de montar o documento: o
        // `genpdf::Document` não é `Send`, então não pode atravessar um `.await`.
        let mut order_items = Vec::with_capacity(selected.len());
        for order in selected {
            let items = self.order_repo.list_items(&self.pool, order.id).await?;
            order_items.push(items);
        }

        let mut doc = genpdf::Document::new(font_family);
        doc.set_title("Work Orders");
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(10);
        doc.set_page_decorator(decorator);

        // 2. Um pedido por página
        for (idx, (order, items)) in selected.iter().zip(&order_items).enumerate() {
            if idx > 0 {
                doc.push(elements::PageBreak::new());
            }
            self.render_order(&mut doc, order, items)?;
        }

        // 3. Renderiza para buffer (memória)
        let mut buffer = Vec::new();
        doc.render(&mut buffer)
            .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?;

        Ok(WorkOrderBatch {
            pdf: buffer,
            chunk_index: chunk,
            chunk_total,
        })
    }

    fn render_order(
        &self,
        doc: &mut genpdf::Document,
        order: &Order,
        items: &[OrderItem],
    ) -> Result<(), AppError> {
        // --- CABEÇALHO ---
        doc.push(
            elements::Paragraph::new(format!("WORK ORDER #{}", order.display_number))
                .styled(style::Style::new().bold().with_font_size(18)),
        );
        doc.push(elements::Paragraph::new(format!(
            "Date: {}",
            order.created_at.format("%m/%d/%Y")
        )));

        // POs que cobrem o pedido, por fornecedor.
        let mut links: Vec<(&String, &String)> = order.vendor_po_links.0.iter().collect();
        links.sort();
        for (vendor, po_number) in links {
            doc.push(
                elements::Paragraph::new(format!("PO {} ({})", po_number, vendor))
                    .styled(style::Style::new().with_font_size(10)),
            );
        }

        // Remessa parcial é aviso, não bloqueio.
        if order.missing_goods {
            doc.push(elements::Break::new(0.5));
            doc.push(
                elements::Paragraph::new("PARTIAL SHIPMENT — some goods still on backorder")
                    .styled(style::Style::new().bold().with_font_size(12)),
            );
        }

        // QR Code com o número do pedido (leitura rápida no chão de fábrica)
        let code = QrCode::new(order.display_number.as_bytes())
            .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?;
        let image_buffer = code.render::<Luma<u8>>().build();
        let dynamic_image = image::DynamicImage::ImageLuma8(image_buffer);
        let pdf_image = elements::Image::from_dynamic_image(dynamic_image)
            .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?
            .with_scale(Scale::new(0.5, 0.5));
        doc.push(pdf_image);

        doc.push(elements::Break::new(1.5));

        // --- TABELA DE ITENS ---
        // Pesos das colunas: Item (4), Cor (2), Tamanho (1), Qtd (1)
        let groups = group_items(items);
        let mut table = elements::TableLayout::new(vec![4, 2, 1, 1]);
        table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));

        let style_bold = style::Style::new().bold();
        table
            .row()
            .element(elements::Paragraph::new("Item").styled(style_bold))
            .element(elements::Paragraph::new("Color").styled(style_bold))
            .element(elements::Paragraph::new("Size").styled(style_bold))
            .element(elements::Paragraph::new("Qty").styled(style_bold))
            .push()
            .expect("Table error");

        for group in &groups {
            let label = if group.vendor_code.is_empty() {
                group.item.clone()
            } else {
                format!("{} ({})", group.item, group.vendor_code)
            };
            for color in &group.colors {
                for size in &color.sizes {
                    table
                        .row()
                        .element(elements::Paragraph::new(label.clone()))
                        .element(elements::Paragraph::new(color.color.clone()))
                        .element(elements::Paragraph::new(size.size.clone()))
                        .element(elements::Paragraph::new(size.qty.to_string()))
                        .push()
                        .expect("Table row error");
                }
            }
        }
        doc.push(table);

        // --- INSTRUÇÕES ESPECIAIS ---
        let instructions: Vec<&str> = items
            .iter()
            .map(|i| i.special_instructions.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if !instructions.is_empty() {
            doc.push(elements::Break::new(1));
            doc.push(
                elements::Paragraph::new("Special Instructions")
                    .styled(style::Style::new().bold().with_font_size(12)),
            );
            for text in instructions {
                doc.push(elements::Paragraph::new(text.to_string()));
            }
        }

        // --- ARTE ---
        // Política de melhor esforço: uma arte ilegível não pode derrubar o
        // lote inteiro; entra um aviso no lugar.
        for item in items {
            let url = item.artwork_url.trim();
            if url.is_empty() {
                continue;
            }
            doc.push(elements::Break::new(1));
            match image::open(url) {
                Ok(art) => match elements::Image::from_dynamic_image(art) {
                    Ok(img) => doc.push(img.with_scale(Scale::new(0.5, 0.5))),
                    Err(e) => {
                        tracing::warn!("🖼️ Arte inválida para {}: {}", item.product_name, e);
                        doc.push(artwork_placeholder(&item.product_name));
                    }
                },
                Err(e) => {
                    tracing::warn!("🖼️ Arte inacessível para {}: {}", item.product_name, e);
                    doc.push(artwork_placeholder(&item.product_name));
                }
            }
        }

        let mut footer = elements::Paragraph::new(format!("Order #{}", order.display_number));
        footer.set_alignment(Alignment::Right);
        doc.push(elements::Break::new(1));
        doc.push(footer.styled(style::Style::new().italic().with_font_size(8)));

        Ok(())
    }
}

fn artwork_placeholder(product: &str) -> impl Element + use<> {
    elements::Paragraph::new(format!("Artwork unavailable: {}", product))
        .styled(style::Style::new().italic().with_font_size(10))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn item(code: &str, color: &str, size: &str, qty: i32) -> OrderItem {
        OrderItem {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_name: format!("Produto {}", code),
            vendor_id: "sanmar".to_string(),
            vendor_item_code: code.to_string(),
            vendor_code: String::new(),
            production: String::new(),
            color: color.to_string(),
            size: size.to_string(),
            qty,
            unit_cost: Decimal::ZERO,
            artwork_url: String::new(),
            special_instructions: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn groups_by_code_then_color_then_size() {
        let items = [
            item("pc54", "Black", "L", 2),
            item("pc54", "Black", "S", 1),
            item("pc54", "Navy", "M", 3),
            item("g500", "White", "XL", 1),
        ];

        let groups = group_items(&items);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].item, "pc54");
        assert_eq!(groups[0].colors.len(), 2);
        assert_eq!(groups[0].colors[0].color, "Black");
        // Tamanhos na ordem da grade: S antes de L.
        let sizes: Vec<&str> = groups[0].colors[0]
            .sizes
            .iter()
            .map(|s| s.size.as_str())
            .collect();
        assert_eq!(sizes, vec!["S", "L"]);
    }

    #[test]
    fn repeated_size_sums_quantity() {
        let items = [
            item("pc54", "Black", "L", 2),
            item("pc54", "Black", "L", 3),
        ];
        let groups = group_items(&items);
        assert_eq!(groups[0].colors[0].sizes[0].qty, 5);
    }

    #[test]
    fn falls_back_to_product_name_and_na() {
        let mut no_code = item("", "", "", 1);
        no_code.product_name = "Camiseta Lisa".to_string();

        let groups = group_items(&[no_code]);
        assert_eq!(groups[0].item, "Camiseta Lisa");
        assert_eq!(groups[0].colors[0].color, "N/A");
        assert_eq!(groups[0].colors[0].sizes[0].size, "N/A");
    }

    #[test]
    fn backfills_vendor_code_from_later_item() {
        let first = item("pc54", "Black", "L", 1);
        let mut second = item("pc54", "Black", "M", 1);
        second.vendor_code = "SanMar(PC54)".to_string();

        let groups = group_items(&[first, second]);
        assert_eq!(groups[0].vendor_code, "SanMar(PC54)");
    }

    #[test]
    fn unknown_sizes_sort_after_grade() {
        let items = [
            item("pc54", "Black", "OSFA", 1),
            item("pc54", "Black", "2XL", 1),
            item("pc54", "Black", "NB", 1),
        ];
        let groups = group_items(&items);
        let sizes: Vec<&str> = groups[0].colors[0]
            .sizes
            .iter()
            .map(|s| s.size.as_str())
            .collect();
        assert_eq!(sizes, vec!["NB", "2XL", "OSFA"]);
    }
}
