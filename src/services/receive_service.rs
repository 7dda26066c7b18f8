// src/services/receive_service.rs

use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{OrderRepository, PoRepository, ReceiptRepository},
    models::order::{OrderReadiness, OrderStatus},
};

// --- 1. Delta tipado na fronteira ---
// O transporte entrega linhas cruas; o motor só enxerga este tipo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveDelta {
    pub line_id: String,
    pub qty: u32,
}

impl ReceiveDelta {
    /// Converte uma linha crua do payload. Ids vazios e quantidades não
    /// positivas são descartados em silêncio (o lote segue com as demais).
    pub fn sanitize(line_id: &str, add_qty: i64) -> Option<Self> {
        let line_id = line_id.trim();
        if line_id.is_empty() || add_qty <= 0 || add_qty > i64::from(i32::MAX) {
            return None;
        }
        Some(Self {
            line_id: line_id.to_string(),
            qty: add_qty as u32,
        })
    }
}

// --- 2. Resultado do receive ---
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReceiveResult {
    pub ok: bool,
    pub po_id: Uuid,
    pub fully_received: bool,
    pub orders: BTreeMap<Uuid, OrderReadiness>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// --- 3. Snapshot de linha para classificação ---
// `received_qty` é a soma autoritativa do livro-razão, não só o lote atual.
#[derive(Debug, Clone)]
pub struct LineStatus {
    pub line_id: String,
    pub ordered_qty: i32,
    pub received_qty: i64,
    pub order_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderAccum {
    pub any_short: bool,
    pub any_received: bool,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub any_lines: bool,
    pub fully_received: bool,
    pub orders: BTreeMap<Uuid, OrderAccum>,
}

/// Classificação pura: função apenas do conteúdo do livro-razão + definição
/// das linhas. Rodar duas vezes sem escrita nova dá o mesmo resultado.
pub fn reconcile(lines: &[LineStatus]) -> Reconciliation {
    let mut any_lines = false;
    let mut any_short = false;
    let mut orders: BTreeMap<Uuid, OrderAccum> = BTreeMap::new();

    for line in lines {
        any_lines = true;

        let line_short = line.received_qty < i64::from(line.ordered_qty);
        let line_received = line.received_qty > 0;

        if line_short {
            any_short = true;
        }

        // Uma linha pode atender vários pedidos; os booleanos são reduzidos
        // por OR sobre todas as linhas que tocam cada pedido.
        for oid in &line.order_ids {
            let entry = orders.entry(*oid).or_default();
            if line_short {
                entry.any_short = true;
            }
            if line_received {
                entry.any_received = true;
            }
        }
    }

    Reconciliation {
        any_lines,
        fully_received: any_lines && !any_short,
        orders,
    }
}

// --- 4. O motor de reconciliação ---
#[derive(Clone)]
pub struct ReceiveService {
    po_repo: PoRepository,
    receipt_repo: ReceiptRepository,
    order_repo: OrderRepository,
    pool: PgPool,
}

impl ReceiveService {
    pub fn new(
        po_repo: PoRepository,
        receipt_repo: ReceiptRepository,
        order_repo: OrderRepository,
        pool: PgPool,
    ) -> Self {
        Self {
            po_repo,
            receipt_repo,
            order_repo,
            pool,
        }
    }

    /// Registra um lote de incrementos de recebimento e recalcula o estado
    /// do PO e de todos os pedidos que ele toca. Tudo roda numa transação
    /// única com a linha do PO travada: lotes concorrentes no mesmo PO
    /// serializam, e o lote inteiro aplica ou desfaz junto.
    pub async fn receive(
        &self,
        po_id: Uuid,
        po_number: Option<String>,
        deltas: Vec<ReceiveDelta>,
        actor_id: Uuid,
    ) -> Result<ReceiveResult, AppError> {
        // Lote sem nenhuma linha válida: rejeita antes de qualquer escrita.
        if deltas.is_empty() {
            return Err(AppError::InvalidPayload(
                "Nenhuma linha válida para receber.".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        // 1. Trava o PO
        let po = self
            .po_repo
            .find_by_id_for_update(&mut *tx, po_id)
            .await?
            .ok_or(AppError::PoNotFound)?;

        // 2. Resolve o número do livro-razão: valor do fio > número
        //    armazenado > id interno (nunca orfanamos um recebimento).
        let po_number = po_number
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| po.ledger_number());

        // 3. Persiste os incrementos no livro-razão
        for delta in &deltas {
            self.receipt_repo
                .append(&mut *tx, &po_number, &delta.line_id, delta.qty as i32, actor_id)
                .await?;
        }

        // 4. Recalcula as linhas com totais frescos. A soma inclui qualquer
        //    lote anterior, então o caller não precisa reler entre envios.
        let sums = self.receipt_repo.sums_for_po(&mut *tx, &po_number).await?;
        let lines: Vec<LineStatus> = po
            .items
            .0
            .iter()
            .map(|line| {
                let key = line.key().to_string();
                LineStatus {
                    received_qty: sums.get(&key).copied().unwrap_or(0),
                    line_id: key,
                    ordered_qty: line.qty,
                    order_ids: line.order_ids.clone(),
                }
            })
            .collect();

        let outcome = reconcile(&lines);

        // 5. PO sem linhas: nada a decidir (os recebimentos ficam gravados)
        if !outcome.any_lines {
            tx.commit().await?;
            return Ok(ReceiveResult {
                ok: true,
                po_id,
                fully_received: false,
                orders: BTreeMap::new(),
                note: Some(
                    "PO sem linhas após o recebimento; nenhum status alterado.".to_string(),
                ),
            });
        }

        // 6. Decisão no nível do PO: sem linha curta, o PO fecha e todos os
        //    pedidos referenciados vão para produção.
        if outcome.fully_received {
            for oid in outcome.orders.keys() {
                self.order_repo
                    .set_status(&mut *tx, *oid, OrderStatus::Processing)
                    .await?;
            }
            self.po_repo.mark_received(&mut *tx, po_id).await?;
        }

        // 7. Flags por pedido, independentes da decisão do PO.
        let mut orders = BTreeMap::new();
        for (oid, flags) in &outcome.orders {
            if !flags.any_received {
                // Nada recebido para este pedido ainda: não mexemos nele.
                orders.insert(
                    *oid,
                    OrderReadiness {
                        ready: false,
                        missing: false,
                    },
                );
                continue;
            }

            self.order_repo
                .set_workorder_flags(&mut *tx, *oid, flags.any_short)
                .await?;
            orders.insert(
                *oid,
                OrderReadiness {
                    ready: true,
                    missing: flags.any_short,
                },
            );
        }

        tx.commit().await?;

        tracing::info!(
            "📦 Recebimento aplicado no PO {}: fully_received={}, {} pedido(s) afetado(s)",
            po_number,
            outcome.fully_received,
            orders.len()
        );

        Ok(ReceiveResult {
            ok: true,
            po_id,
            fully_received: outcome.fully_received,
            orders,
            note: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(line_id: &str, ordered: i32, received: i64, orders: &[Uuid]) -> LineStatus {
        LineStatus {
            line_id: line_id.to_string(),
            ordered_qty: ordered,
            received_qty: received,
            order_ids: orders.to_vec(),
        }
    }

    #[test]
    fn full_receipt_closes_po_and_clears_missing() {
        // Cenário A: uma linha, 10 pedidos pelo pedido 500, recebe 10.
        let order = Uuid::new_v4();
        let outcome = reconcile(&[line("pc54|black|l", 10, 10, &[order])]);

        assert!(outcome.any_lines);
        assert!(outcome.fully_received);
        let flags = outcome.orders[&order];
        assert!(flags.any_received);
        assert!(!flags.any_short);
    }

    #[test]
    fn partial_receipt_flags_missing_goods() {
        // Cenário B: acumulado 7 de 10 -> pronto para imprimir, mas faltando.
        let order = Uuid::new_v4();
        let outcome = reconcile(&[line("pc54|black|l", 10, 7, &[order])]);

        assert!(!outcome.fully_received);
        let flags = outcome.orders[&order];
        assert!(flags.any_received);
        assert!(flags.any_short);
    }

    #[test]
    fn shared_line_marks_every_contributing_order() {
        // Cenário C: uma linha de 15 atende os pedidos 1 (10) e 2 (5); a
        // linha não distingue de quem é a parcela recebida.
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let outcome = reconcile(&[line("g500|navy|xl", 15, 15, &[a, b])]);

        assert!(outcome.fully_received);
        for oid in [a, b] {
            let flags = outcome.orders[&oid];
            assert!(flags.any_received);
            assert!(!flags.any_short);
        }
    }

    #[test]
    fn untouched_order_stays_out_of_the_ready_set() {
        // Linha sem nenhum recebimento: o pedido não é sinalizado.
        let order = Uuid::new_v4();
        let outcome = reconcile(&[line("pc54|black|l", 10, 0, &[order])]);

        assert!(!outcome.fully_received);
        let flags = outcome.orders[&order];
        assert!(!flags.any_received);
        assert!(flags.any_short);
    }

    #[test]
    fn order_flags_reduce_over_all_lines_touching_it() {
        // O mesmo pedido em duas linhas: uma completa, outra curta.
        let order = Uuid::new_v4();
        let other = Uuid::new_v4();
        let outcome = reconcile(&[
            line("pc54|black|l", 10, 10, &[order]),
            line("pc54|black|xl", 5, 2, &[order, other]),
        ]);

        assert!(!outcome.fully_received);
        let flags = outcome.orders[&order];
        assert!(flags.any_received);
        assert!(flags.any_short);
        // O outro pedido só aparece na linha curta parcialmente recebida.
        let flags = outcome.orders[&other];
        assert!(flags.any_received);
        assert!(flags.any_short);
    }

    #[test]
    fn over_receipt_still_counts_as_complete() {
        let order = Uuid::new_v4();
        let outcome = reconcile(&[line("pc54|black|l", 10, 12, &[order])]);
        assert!(outcome.fully_received);
        assert!(!outcome.orders[&order].any_short);
    }

    #[test]
    fn empty_po_short_circuits() {
        let outcome = reconcile(&[]);
        assert!(!outcome.any_lines);
        assert!(!outcome.fully_received);
        assert!(outcome.orders.is_empty());
    }

    #[test]
    fn status_derivation_is_idempotent() {
        // Mesmo livro-razão, duas avaliações -> mesmo resultado.
        let order = Uuid::new_v4();
        let lines = [
            line("pc54|black|l", 10, 4, &[order]),
            line("pc54|black|m", 3, 3, &[order]),
        ];
        let first = reconcile(&lines);
        let second = reconcile(&lines);
        assert_eq!(first.fully_received, second.fully_received);
        assert_eq!(first.orders, second.orders);
    }

    #[test]
    fn sanitize_drops_zero_negative_and_blank_lines() {
        // Cenário D: delta de 0 é descartado; o serviço rejeita lote vazio.
        assert_eq!(ReceiveDelta::sanitize("pc54|black|l", 0), None);
        assert_eq!(ReceiveDelta::sanitize("pc54|black|l", -3), None);
        assert_eq!(ReceiveDelta::sanitize("  ", 5), None);

        let delta = ReceiveDelta::sanitize(" pc54|black|l ", 4).unwrap();
        assert_eq!(delta.line_id, "pc54|black|l");
        assert_eq!(delta.qty, 4);
    }
}
