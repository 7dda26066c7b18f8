// src/db/po_repo.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::po::{PoLine, PoStatus, PurchaseOrder},
};

// PO Line Store: persistência dos POs e do blob de linhas.
#[derive(Clone)]
pub struct PoRepository {
    pool: PgPool,
}

impl PoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Funções de "Leitura" (Getters)
    // ---

    pub async fn find_by_id<'e, E>(
        &self,
        executor: E,
        po_id: Uuid,
    ) -> Result<Option<PurchaseOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let po = sqlx::query_as::<_, PurchaseOrder>(
            "SELECT * FROM purchase_orders WHERE id = $1",
        )
        .bind(po_id)
        .fetch_optional(executor)
        .await?;
        Ok(po)
    }

    /// Trava a linha do PO pela duração da transação. Todo `receive()` e toda
    /// operação de ciclo de vida passam por aqui: dois lotes concorrentes no
    /// mesmo PO serializam; POs diferentes nunca disputam.
    pub async fn find_by_id_for_update<'e, E>(
        &self,
        executor: E,
        po_id: Uuid,
    ) -> Result<Option<PurchaseOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let po = sqlx::query_as::<_, PurchaseOrder>(
            "SELECT * FROM purchase_orders WHERE id = $1 FOR UPDATE",
        )
        .bind(po_id)
        .fetch_optional(executor)
        .await?;
        Ok(po)
    }

    pub async fn list_by_status<'e, E>(
        &self,
        executor: E,
        status: PoStatus,
    ) -> Result<Vec<PurchaseOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let pos = sqlx::query_as::<_, PurchaseOrder>(
            "SELECT * FROM purchase_orders WHERE status = $1 ORDER BY created_at DESC",
        )
        .bind(status)
        .fetch_all(executor)
        .await?;
        Ok(pos)
    }

    /// Todos os POs ainda vivos (OPEN ou ORDERED). O chamador filtra por
    /// pedido referenciado em memória, como o volume de POs ativos é pequeno.
    pub async fn list_active<'e, E>(&self, executor: E) -> Result<Vec<PurchaseOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let pos = sqlx::query_as::<_, PurchaseOrder>(
            "SELECT * FROM purchase_orders WHERE status <> $1 ORDER BY created_at ASC",
        )
        .bind(PoStatus::Received)
        .fetch_all(executor)
        .await?;
        Ok(pos)
    }

    pub async fn find_open_by_vendor_for_update<'e, E>(
        &self,
        executor: E,
        vendor_id: &str,
    ) -> Result<Option<PurchaseOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let po = sqlx::query_as::<_, PurchaseOrder>(
            "SELECT * FROM purchase_orders WHERE vendor_id = $1 AND status = $2 FOR UPDATE",
        )
        .bind(vendor_id)
        .bind(PoStatus::Open)
        .fetch_optional(executor)
        .await?;
        Ok(po)
    }

    /// Quantos POs já existem hoje para o fornecedor (sufixo do número do PO).
    pub async fn count_for_vendor_on_date<'e, E>(
        &self,
        executor: E,
        vendor_id: &str,
        date: NaiveDate,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM purchase_orders WHERE vendor_id = $1 AND po_date = $2",
        )
        .bind(vendor_id)
        .bind(date)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    // ---
    // Funções de "Escrita" (Transacionais)
    // ---

    /// Cria a run aberta do fornecedor. O índice único parcial garante no
    /// máximo uma por fornecedor; quem chegar segundo leva unique_violation.
    pub async fn create_open_run<'e, E>(
        &self,
        executor: E,
        vendor_id: &str,
    ) -> Result<PurchaseOrder, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let po = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            INSERT INTO purchase_orders (vendor_id, status)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(vendor_id)
        .bind(PoStatus::Open)
        .fetch_one(executor)
        .await?;
        Ok(po)
    }

    /// Regrava o blob de linhas e o custo total (após merge ou prune).
    pub async fn update_items<'e, E>(
        &self,
        executor: E,
        po_id: Uuid,
        items: &[PoLine],
        total_cost: Decimal,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE purchase_orders
            SET items = $2, total_cost = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(po_id)
        .bind(Json(items))
        .bind(total_cost)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Publica o PO: número, data, status ORDERED e carimbo de ordered_at.
    pub async fn mark_ordered<'e, E>(
        &self,
        executor: E,
        po_id: Uuid,
        po_number: &str,
        po_date: NaiveDate,
        has_unordered: bool,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE purchase_orders
            SET po_number = $2, po_date = $3, status = $4,
                has_unordered = $5, ordered_at = now(), updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(po_id)
        .bind(po_number)
        .bind(po_date)
        .bind(PoStatus::Ordered)
        .bind(has_unordered)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Fecha o PO (totalmente recebido): ele sai da lista de recebimento.
    pub async fn mark_received<'e, E>(&self, executor: E, po_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE purchase_orders SET status = $2, updated_at = now() WHERE id = $1",
        )
        .bind(po_id)
        .bind(PoStatus::Received)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Volta o registro a run aberta: some o número e a data.
    pub async fn revert_to_open<'e, E>(&self, executor: E, po_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE purchase_orders
            SET status = $2, po_number = NULL, po_date = NULL,
                has_unordered = FALSE, ordered_at = NULL, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(po_id)
        .bind(PoStatus::Open)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn delete<'e, E>(&self, executor: E, po_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM purchase_orders WHERE id = $1")
            .bind(po_id)
            .execute(executor)
            .await?;
        Ok(())
    }
}
