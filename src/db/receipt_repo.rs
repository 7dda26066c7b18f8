// src/db/receipt_repo.rs

use std::collections::HashMap;

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::receipt::ReceiptEvent};

// Receipt Ledger: log append-only dos eventos de recebimento.
// Nenhuma função aqui faz UPDATE ou DELETE; o total recebido é derivado.
#[derive(Clone)]
pub struct ReceiptRepository {
    pool: PgPool,
}

impl ReceiptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Registra um incremento de recebimento no livro-razão (auditoria).
    pub async fn append<'e, E>(
        &self,
        executor: E,
        po_number: &str,
        po_line_id: &str,
        received_qty: i32,
        user_id: Uuid,
    ) -> Result<ReceiptEvent, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let event = sqlx::query_as::<_, ReceiptEvent>(
            r#"
            INSERT INTO receipts (po_number, po_line_id, received_qty, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(po_number)
        .bind(po_line_id)
        .bind(received_qty)
        .bind(user_id)
        .fetch_one(executor)
        .await?;
        Ok(event)
    }

    /// Totais recebidos de todas as linhas de um PO, numa consulta só.
    /// Soma autoritativa: inclui recebimentos de qualquer lote anterior.
    pub async fn sums_for_po<'e, E>(
        &self,
        executor: E,
        po_number: &str,
    ) -> Result<HashMap<String, i64>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, (String, Option<i64>)>(
            r#"
            SELECT po_line_id, SUM(received_qty)
            FROM receipts
            WHERE po_number = $1
            GROUP BY po_line_id
            "#,
        )
        .bind(po_number)
        .fetch_all(executor)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(line_id, sum)| (line_id, sum.unwrap_or(0)))
            .collect())
    }
}
