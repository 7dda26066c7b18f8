// src/services/po_service.rs

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{OrderRepository, PoRepository, ReceiptRepository},
    models::{
        order::OrderStatus,
        po::{size_sort_value, LineKey, OpenPoSummary, OrderRef, PoLine, PoLinesResponse,
             PoLineView, PoStatus, PurchaseOrder},
    },
};

// --- 1. Aritmética pura de prune/merge ---
// Separada do banco para os cenários serem testáveis sem Postgres.

#[derive(Debug, Clone)]
pub struct PruneOutcome {
    pub kept: Vec<PoLine>,
    // Chaves removidas agrupadas por pedido afetado.
    pub removed_by_order: HashMap<Uuid, Vec<String>>,
    // Quantidade ainda demandada por pedido entre as linhas mantidas.
    pub order_usage: HashMap<Uuid, i32>,
    pub total_cost: Decimal,
}

/// Remove do blob as linhas cujas chaves estão em `remove` e recomputa o
/// custo total e o conjunto de pedidos ainda referenciados.
pub fn prune_lines(items: &[PoLine], remove: &[LineKey]) -> PruneOutcome {
    let remove: HashSet<&LineKey> = remove.iter().collect();

    let mut kept = Vec::new();
    let mut removed_by_order: HashMap<Uuid, Vec<String>> = HashMap::new();
    let mut order_usage: HashMap<Uuid, i32> = HashMap::new();
    let mut total_cost = Decimal::ZERO;

    for line in items {
        let key = line.key();
        if remove.contains(&key) {
            for oid in &line.order_ids {
                removed_by_order
                    .entry(*oid)
                    .or_default()
                    .push(key.to_string());
            }
            continue; // descarta a linha inteira
        }

        total_cost += Decimal::from(line.qty) * line.unit_cost;
        if line.order_qty.is_empty() {
            // Blob antigo sem o mapa por pedido: atribui a linha toda.
            for oid in &line.order_ids {
                *order_usage.entry(*oid).or_default() += line.qty;
            }
        } else {
            for (oid, qty) in &line.order_qty {
                *order_usage.entry(*oid).or_default() += *qty;
            }
        }
        kept.push(line.clone());
    }

    PruneOutcome {
        kept,
        removed_by_order,
        order_usage,
        total_cost,
    }
}

/// Funde linhas de um PO em outro: quantidades somadas, referências de
/// pedido unificadas, chave (item|color|size) como identidade.
pub fn merge_lines(base: &[PoLine], incoming: &[PoLine]) -> Vec<PoLine> {
    let mut order: Vec<LineKey> = Vec::new();
    let mut map: HashMap<LineKey, PoLine> = HashMap::new();

    for line in base {
        let key = line.key();
        if !map.contains_key(&key) {
            order.push(key.clone());
        }
        map.insert(key, line.clone());
    }

    for line in incoming {
        if line.item.trim().is_empty() || line.qty <= 0 {
            continue;
        }
        let key = line.key();
        match map.get_mut(&key) {
            Some(existing) => {
                existing.qty += line.qty;
                for oid in &line.order_ids {
                    if !existing.order_ids.contains(oid) {
                        existing.order_ids.push(*oid);
                    }
                }
                for (oid, qty) in &line.order_qty {
                    *existing.order_qty.entry(*oid).or_default() += *qty;
                }
                existing.line_total = Decimal::from(existing.qty) * existing.unit_cost;
            }
            None => {
                order.push(key.clone());
                map.insert(key, line.clone());
            }
        }
    }

    let mut merged: Vec<PoLine> = order
        .into_iter()
        .map(|key| map.remove(&key).expect("chave inserida acima"))
        .collect();
    sort_lines(&mut merged);
    merged
}

/// Ordenação de exibição: item, cor, e tamanho pela grade.
pub fn sort_lines(lines: &mut [PoLine]) {
    lines.sort_by(|a, b| {
        a.item
            .to_lowercase()
            .cmp(&b.item.to_lowercase())
            .then(a.color.to_lowercase().cmp(&b.color.to_lowercase()))
            .then(size_sort_value(&a.size).cmp(&size_sort_value(&b.size)))
    });
}

pub fn total_cost(lines: &[PoLine]) -> Decimal {
    lines
        .iter()
        .map(|l| Decimal::from(l.qty) * l.unit_cost)
        .sum()
}

/// Monta o próximo número de PO: {prefix}-{VENDOR}-{MMDDYYYY}-{seq}.
pub fn format_po_number(prefix: &str, vendor_id: &str, date: NaiveDate, seq: i64) -> String {
    let safe_vendor: String = vendor_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let safe_vendor = if safe_vendor.is_empty() {
        "VENDOR".to_string()
    } else {
        safe_vendor.to_uppercase()
    };
    format!("{}-{}-{}-{:03}", prefix, safe_vendor, date.format("%m%d%Y"), seq)
}

// --- 2. Entradas e resumos ---

#[derive(Debug, Clone)]
pub struct RunLineInput {
    pub order_id: Uuid,
    pub item: String,
    pub product: String,
    pub color: String,
    pub size: String,
    pub qty: i32,
    pub unit_cost: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MarkOrderedSummary {
    pub ok: bool,
    pub po_id: Uuid,
    pub po_number: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PruneSummary {
    pub ok: bool,
    pub po_id: Uuid,
    pub total_cost: Decimal,
    pub total_items: i64,
    pub remaining: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeleteOutcome {
    pub ok: bool,
    // "deleted" quando o PO estava vazio; "reverted" quando as linhas
    // foram fundidas na run aberta do fornecedor.
    pub status: String,
    pub po_id: Uuid,
}

// --- 3. PO Lifecycle Controller ---
#[derive(Clone)]
pub struct PoService {
    po_repo: PoRepository,
    receipt_repo: ReceiptRepository,
    order_repo: OrderRepository,
    pool: PgPool,
    po_prefix: String,
}

impl PoService {
    pub fn new(
        po_repo: PoRepository,
        receipt_repo: ReceiptRepository,
        order_repo: OrderRepository,
        pool: PgPool,
        po_prefix: String,
    ) -> Self {
        Self {
            po_repo,
            receipt_repo,
            order_repo,
            pool,
            po_prefix,
        }
    }

    // ---
    // Leitura: lista de recebimento e linhas com totais
    // ---

    /// POs publicados que ainda precisam de recebimento. Um PO totalmente
    /// recebido (ou sem linhas com qty > 0) sai da lista.
    pub async fn list_open_pos(&self) -> Result<Vec<OpenPoSummary>, AppError> {
        let pos = self
            .po_repo
            .list_by_status(&self.pool, PoStatus::Ordered)
            .await?;

        let mut out = Vec::new();
        for po in pos {
            let sums = self
                .receipt_repo
                .sums_for_po(&self.pool, &po.ledger_number())
                .await?;

            let needs_receive = po.items.0.iter().any(|line| {
                if line.qty <= 0 {
                    return false;
                }
                let received = sums.get(&line.key().to_string()).copied().unwrap_or(0);
                received < i64::from(line.qty)
            });
            if !needs_receive {
                continue;
            }

            out.push(OpenPoSummary {
                po_id: po.id,
                po_number: po.ledger_number(),
                vendor: po.vendor_id.clone(),
                created: po.created_at,
                items_count: po.items.0.len(),
                status: po.status,
            });
        }
        Ok(out)
    }

    /// Linhas de um PO com os totais recebidos ao vivo e as referências de
    /// pedido (id + número de exibição).
    pub async fn get_po_lines(&self, po_id: Uuid) -> Result<PoLinesResponse, AppError> {
        let po = self
            .po_repo
            .find_by_id(&self.pool, po_id)
            .await?
            .ok_or(AppError::PoNotFound)?;

        let po_number = po.ledger_number();
        let sums = self.receipt_repo.sums_for_po(&self.pool, &po_number).await?;

        // Números de exibição de todos os pedidos referenciados, numa ida só.
        let all_order_ids: Vec<Uuid> = po
            .items
            .0
            .iter()
            .flat_map(|l| l.order_ids.iter().copied())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let numbers: HashMap<Uuid, String> = self
            .order_repo
            .display_numbers(&self.pool, &all_order_ids)
            .await?
            .into_iter()
            .collect();

        let lines = po
            .items
            .0
            .iter()
            .map(|line| {
                let key = line.key().to_string();
                let received = sums.get(&key).copied().unwrap_or(0);
                let orders = line
                    .order_ids
                    .iter()
                    .map(|oid| OrderRef {
                        order_id: *oid,
                        order_number: numbers
                            .get(oid)
                            .cloned()
                            .unwrap_or_else(|| oid.to_string()),
                    })
                    .collect();
                PoLineView {
                    po_line_id: key,
                    item: line.item.clone(),
                    color: line.color.clone(),
                    size: line.size.clone(),
                    ordered_qty: line.qty,
                    received_qty: received,
                    order_ids: line.order_ids.clone(),
                    orders,
                }
            })
            .collect();

        Ok(PoLinesResponse {
            po_id,
            po_number: po.po_number.clone().unwrap_or_default(),
            lines,
        })
    }

    // ---
    // Ciclo de vida
    // ---

    /// Publica o PO. `keep` opcional: itens fora da seleção voltam para a
    /// fila antes da publicação (recusando esvaziar o PO). A numeração é
    /// idempotente: um PO já numerado mantém o número.
    pub async fn mark_ordered(
        &self,
        po_id: Uuid,
        keep: Option<Vec<LineKey>>,
    ) -> Result<MarkOrderedSummary, AppError> {
        let mut tx = self.pool.begin().await?;

        let po = self
            .po_repo
            .find_by_id_for_update(&mut *tx, po_id)
            .await?
            .ok_or(AppError::PoNotFound)?;

        let mut has_unordered = po.has_unordered;
        let mut current_items = po.items.0.clone();

        // 1. Se veio uma seleção, remove o que ficou de fora.
        if let Some(keep) = keep.filter(|k| !k.is_empty()) {
            let keep: HashSet<&LineKey> = keep.iter().collect();
            let to_remove: Vec<LineKey> = current_items
                .iter()
                .map(|l| l.key())
                .filter(|k| !keep.contains(k))
                .collect();

            if to_remove.len() == current_items.len() {
                return Err(AppError::BusinessRule(
                    "Nenhum item selecionado para ordenar.".to_string(),
                ));
            }

            if !to_remove.is_empty() {
                current_items = self.apply_prune(&mut tx, &po, &to_remove).await?.kept;
                has_unordered = true; // itens desmarcados voltaram para a fila
            }
        }

        // 2. Número e data (só atribui se ainda não tiver).
        let today = Utc::now().date_naive();
        let po_number = match &po.po_number {
            Some(n) if !n.is_empty() => n.clone(),
            _ => {
                let seq = self
                    .po_repo
                    .count_for_vendor_on_date(&mut *tx, &po.vendor_id, today)
                    .await?
                    + 1;
                format_po_number(&self.po_prefix, &po.vendor_id, today, seq)
            }
        };

        self.po_repo
            .mark_ordered(&mut *tx, po_id, &po_number, po.po_date.unwrap_or(today), has_unordered)
            .await?;

        // 3. Vincula os pedidos ao número publicado e, quando todos os POs
        //    de um pedido estiverem publicados, move o pedido para ON_ORDER.
        let order_ids: HashSet<Uuid> = current_items
            .iter()
            .flat_map(|l| l.order_ids.iter().copied())
            .collect();
        for oid in &order_ids {
            self.order_repo
                .link_vendor_po(&mut *tx, *oid, &po.vendor_id, &po_number)
                .await?;
            self.maybe_set_on_order(&mut tx, *oid).await?;
        }

        tx.commit().await?;

        tracing::info!("🧾 PO {} publicado para {}", po_number, po.vendor_id);
        Ok(MarkOrderedSummary {
            ok: true,
            po_id,
            po_number,
        })
    }

    /// Remove linhas de um PO. Pedidos que ficarem sem nenhuma linha voltam
    /// ao estado de espera pré-recebimento; os demais recebem o marcador de
    /// linhas removidas para a próxima reconciliação reconsiderá-los.
    pub async fn prune_items(
        &self,
        po_id: Uuid,
        remove: Vec<LineKey>,
    ) -> Result<PruneSummary, AppError> {
        if remove.is_empty() {
            return Err(AppError::InvalidPayload("Nada para remover.".to_string()));
        }

        let mut tx = self.pool.begin().await?;
        let po = self
            .po_repo
            .find_by_id_for_update(&mut *tx, po_id)
            .await?
            .ok_or(AppError::PoNotFound)?;

        let outcome = self.apply_prune(&mut tx, &po, &remove).await?;
        tx.commit().await?;

        let total_items: i64 = outcome.kept.iter().map(|l| i64::from(l.qty)).sum();
        Ok(PruneSummary {
            ok: true,
            po_id,
            total_cost: outcome.total_cost,
            total_items,
            remaining: outcome.kept.len(),
        })
    }

    /// Exclui um PO vazio; um PO com linhas é revertido: as linhas são
    /// fundidas na run aberta do fornecedor (criada sob demanda — nunca uma
    /// segunda run aberta) e o registro publicado some.
    pub async fn delete_or_revert(&self, po_id: Uuid) -> Result<DeleteOutcome, AppError> {
        let mut tx = self.pool.begin().await?;
        let po = self
            .po_repo
            .find_by_id_for_update(&mut *tx, po_id)
            .await?
            .ok_or(AppError::PoNotFound)?;

        // PO vazio: pode sair direto.
        if po.items.0.is_empty() {
            self.po_repo.delete(&mut *tx, po_id).await?;
            tx.commit().await?;
            return Ok(DeleteOutcome {
                ok: true,
                status: "deleted".to_string(),
                po_id,
            });
        }

        // Run aberta do fornecedor (a própria, se for o caso).
        let target = match self
            .po_repo
            .find_open_by_vendor_for_update(&mut *tx, &po.vendor_id)
            .await?
        {
            Some(run) => run,
            None => self.po_repo.create_open_run(&mut *tx, &po.vendor_id).await?,
        };

        let order_ids: HashSet<Uuid> = po
            .items
            .0
            .iter()
            .flat_map(|l| l.order_ids.iter().copied())
            .collect();

        let final_id = if target.id != po.id {
            let merged = merge_lines(&target.items.0, &po.items.0);
            let cost = total_cost(&merged);
            self.po_repo
                .update_items(&mut *tx, target.id, &merged, cost)
                .await?;
            self.po_repo.delete(&mut *tx, po_id).await?;
            target.id
        } else {
            // O próprio registro volta a ser a run: perde número e data.
            self.po_repo.revert_to_open(&mut *tx, po_id).await?;
            po_id
        };

        // O número publicado deixou de existir: solta o vínculo dos pedidos.
        for oid in &order_ids {
            self.order_repo
                .clear_vendor_link(&mut *tx, *oid, &po.vendor_id)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(
            "♻️ PO {} revertido para a run aberta do fornecedor {}",
            po_id,
            po.vendor_id
        );
        Ok(DeleteOutcome {
            ok: true,
            status: "reverted".to_string(),
            po_id: final_id,
        })
    }

    /// Acrescenta linhas (vindas do scan de backorders) à run aberta do
    /// fornecedor, criando-a se não existir. Nunca cria uma segunda run
    /// aberta: a escrita é redirecionada para a existente.
    pub async fn add_lines_to_run(
        &self,
        vendor_id: &str,
        inputs: Vec<RunLineInput>,
    ) -> Result<Uuid, AppError> {
        let vendor_id = vendor_id.trim();
        if vendor_id.is_empty() {
            return Err(AppError::InvalidPayload(
                "Fornecedor é obrigatório.".to_string(),
            ));
        }

        let incoming: Vec<PoLine> = inputs
            .into_iter()
            .filter(|i| !i.item.trim().is_empty() && i.qty > 0)
            .map(|i| PoLine {
                item: i.item,
                product: i.product,
                color: i.color,
                size: i.size,
                qty: i.qty,
                unit_cost: i.unit_cost,
                line_total: Decimal::from(i.qty) * i.unit_cost,
                order_ids: vec![i.order_id],
                order_qty: HashMap::from([(i.order_id, i.qty)]),
            })
            .collect();
        if incoming.is_empty() {
            return Err(AppError::InvalidPayload(
                "Nenhuma linha válida para adicionar.".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        let run = match self
            .po_repo
            .find_open_by_vendor_for_update(&mut *tx, vendor_id)
            .await?
        {
            Some(run) => run,
            None => self.po_repo.create_open_run(&mut *tx, vendor_id).await?,
        };

        let merged = merge_lines(&run.items.0, &incoming);
        let cost = total_cost(&merged);
        self.po_repo
            .update_items(&mut *tx, run.id, &merged, cost)
            .await?;
        tx.commit().await?;

        Ok(run.id)
    }

    // ---
    // Helpers internos
    // ---

    /// Aplica um prune dentro da transação corrente: regrava o blob e
    /// projeta as consequências em cada pedido previamente referenciado.
    async fn apply_prune(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        po: &PurchaseOrder,
        remove: &[LineKey],
    ) -> Result<PruneOutcome, AppError> {
        let outcome = prune_lines(&po.items.0, remove);

        self.po_repo
            .update_items(&mut **tx, po.id, &outcome.kept, outcome.total_cost)
            .await?;

        let prev_orders: HashSet<Uuid> = po
            .items
            .0
            .iter()
            .flat_map(|l| l.order_ids.iter().copied())
            .collect();

        for oid in prev_orders {
            let still_used = outcome.order_usage.get(&oid).copied().unwrap_or(0) > 0;
            if !still_used {
                // Última linha do pedido saiu: volta ao estado de espera.
                self.order_repo
                    .revert_to_hold(&mut **tx, oid, &po.vendor_id)
                    .await?;
                continue;
            }

            if let Some(removed) = outcome.removed_by_order.get(&oid) {
                // Pedido pode ter sumido da loja nesse meio-tempo; aí não há
                // marcador a atualizar.
                if let Some(order) = self.order_repo.find_by_id(&mut **tx, oid).await? {
                    let mut keys = order
                        .removed_lines
                        .0
                        .get(&po.vendor_id)
                        .cloned()
                        .unwrap_or_default();
                    for key in removed {
                        if !keys.contains(key) {
                            keys.push(key.clone());
                        }
                    }
                    self.order_repo
                        .set_removed_lines(&mut **tx, oid, &po.vendor_id, &keys)
                        .await?;
                }
            }

            // Pedido segue no PO, mas com itens a menos: sai de ON_ORDER
            // até o PO ser republicado.
            if po.status == PoStatus::Ordered {
                self.order_repo
                    .set_status(&mut **tx, oid, OrderStatus::OnHold)
                    .await?;
            }
        }

        Ok(outcome)
    }

    /// Move o pedido para ON_ORDER quando todos os POs ativos que o
    /// referenciam já foram publicados (e nenhum ficou com itens de fora).
    async fn maybe_set_on_order(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        order_id: Uuid,
    ) -> Result<(), AppError> {
        let pos = self.po_repo.list_active(&mut **tx).await?;

        let mut referenced = false;
        let mut all_ordered = true;
        for po in &pos {
            let touches = po.items.0.iter().any(|l| l.order_ids.contains(&order_id));
            if !touches {
                continue;
            }
            referenced = true;
            if po.status != PoStatus::Ordered || po.has_unordered {
                all_ordered = false;
                break;
            }
        }

        if referenced && all_ordered {
            self.order_repo
                .set_status(&mut **tx, order_id, OrderStatus::OnOrder)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(item: &str, color: &str, size: &str, qty: i32, cost: i64, orders: &[Uuid]) -> PoLine {
        PoLine {
            item: item.to_string(),
            product: item.to_string(),
            color: color.to_string(),
            size: size.to_string(),
            qty,
            unit_cost: Decimal::from(cost),
            line_total: Decimal::from(qty) * Decimal::from(cost),
            order_ids: orders.to_vec(),
            order_qty: orders.iter().map(|o| (*o, qty)).collect(),
        }
    }

    #[test]
    fn prune_keeps_order_referenced_by_remaining_line() {
        // Cenário E: duas linhas do pedido 700; remover uma não reverte.
        let order = Uuid::new_v4();
        let items = [
            line("pc54", "black", "l", 5, 4, &[order]),
            line("pc54", "black", "xl", 3, 4, &[order]),
        ];

        let outcome = prune_lines(&items, &[LineKey::new("pc54", "black", "l")]);

        assert_eq!(outcome.kept.len(), 1);
        assert_eq!(outcome.order_usage.get(&order), Some(&3));
        assert_eq!(
            outcome.removed_by_order.get(&order),
            Some(&vec!["pc54|black|l".to_string()])
        );
    }

    #[test]
    fn prune_last_line_drops_order_from_usage() {
        // Removendo a última linha que referencia o pedido, ele some do
        // uso e o serviço o reverte ao estado de espera.
        let order = Uuid::new_v4();
        let items = [
            line("pc54", "black", "l", 5, 4, &[order]),
            line("pc54", "black", "xl", 3, 4, &[order]),
        ];

        let outcome = prune_lines(
            &items,
            &[
                LineKey::new("pc54", "black", "l"),
                LineKey::new("pc54", "black", "xl"),
            ],
        );

        assert!(outcome.kept.is_empty());
        assert!(outcome.order_usage.get(&order).is_none());
        assert_eq!(outcome.total_cost, Decimal::ZERO);
    }

    #[test]
    fn prune_recomputes_total_cost() {
        let order = Uuid::new_v4();
        let items = [
            line("pc54", "black", "l", 5, 4, &[order]),
            line("g500", "navy", "m", 2, 10, &[order]),
        ];

        let outcome = prune_lines(&items, &[LineKey::new("g500", "navy", "m")]);
        assert_eq!(outcome.total_cost, Decimal::from(20));
    }

    #[test]
    fn merge_sums_quantities_and_unions_orders() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let base = [line("pc54", "black", "l", 5, 4, &[a])];
        let incoming = [line("pc54", "BLACK", "L", 3, 4, &[b])];

        let merged = merge_lines(&base, &incoming);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].qty, 8);
        assert!(merged[0].order_ids.contains(&a));
        assert!(merged[0].order_ids.contains(&b));
        assert_eq!(merged[0].line_total, Decimal::from(32));
    }

    #[test]
    fn merge_skips_empty_and_nonpositive_incoming() {
        let a = Uuid::new_v4();
        let base = [line("pc54", "black", "l", 5, 4, &[a])];
        let incoming = [
            line("", "black", "l", 3, 4, &[a]),
            line("pc54", "black", "l", 0, 4, &[a]),
        ];

        let merged = merge_lines(&base, &incoming);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].qty, 5);
    }

    #[test]
    fn merge_appends_new_lines_in_grade_order() {
        let a = Uuid::new_v4();
        let base = [line("pc54", "black", "xl", 2, 4, &[a])];
        let incoming = [
            line("pc54", "black", "s", 1, 4, &[a]),
            line("g500", "navy", "m", 1, 10, &[a]),
        ];

        let merged = merge_lines(&base, &incoming);
        let keys: Vec<String> = merged.iter().map(|l| l.key().to_string()).collect();
        assert_eq!(keys, vec!["g500|navy|m", "pc54|black|s", "pc54|black|xl"]);
    }

    #[test]
    fn po_number_format_sanitizes_vendor() {
        let date = NaiveDate::from_ymd_opt(2025, 11, 6).unwrap();
        assert_eq!(
            format_po_number("BT", "San-Mar!", date, 1),
            "BT-SANMAR-11062025-001"
        );
        assert_eq!(format_po_number("BT", "@@", date, 12), "BT-VENDOR-11062025-012");
    }
}
