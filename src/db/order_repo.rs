// src/db/order_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::order::{Order, OrderItem, OrderStatus},
};

// Order Status Projector: toda mutação de status/flag dos pedidos da loja
// passa por aqui. O motor de reconciliação decide; este repositório aplica.
#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Funções de "Leitura" (Getters)
    // ---

    pub async fn find_by_id<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
    ) -> Result<Option<Order>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(executor)
            .await?;
        Ok(order)
    }

    /// Números de exibição dos pedidos referenciados por uma linha de PO.
    pub async fn display_numbers<'e, E>(
        &self,
        executor: E,
        order_ids: &[Uuid],
    ) -> Result<Vec<(Uuid, String)>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, display_number FROM orders WHERE id = ANY($1)",
        )
        .bind(order_ids)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Pedidos elegíveis para impressão, mais antigos primeiro.
    pub async fn list_ready_for_workorder<'e, E>(
        &self,
        executor: E,
    ) -> Result<Vec<Order>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE ready_for_workorder = TRUE AND status <> $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(OrderStatus::Completed)
        .fetch_all(executor)
        .await?;
        Ok(orders)
    }

    pub async fn list_items<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
    ) -> Result<Vec<OrderItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at ASC",
        )
        .bind(order_id)
        .fetch_all(executor)
        .await?;
        Ok(items)
    }

    // ---
    // Funções de "Escrita" (projeção de status e flags)
    // ---

    pub async fn set_status<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE orders SET status = $2, updated_at = now() WHERE id = $1")
            .bind(order_id)
            .bind(status)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Liga/atualiza as flags de work order. `ready` nunca regride aqui:
    /// quem já recebeu alguma coisa continua imprimível.
    pub async fn set_workorder_flags<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        missing_goods: bool,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE orders
            SET ready_for_workorder = TRUE, missing_goods = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(missing_goods)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Vincula o pedido ao PO do fornecedor e consome o marcador de linhas
    /// removidas (as linhas voltaram a estar cobertas).
    pub async fn link_vendor_po<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        vendor_id: &str,
        po_number: &str,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE orders
            SET vendor_po_links = jsonb_set(vendor_po_links, ARRAY[$2], to_jsonb($3::text)),
                removed_lines = removed_lines - $2,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(vendor_id)
        .bind(po_number)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Reverte o pedido ao estado pré-recebimento: limpa o vínculo e o
    /// marcador de removidos do fornecedor e volta para ON_HOLD.
    pub async fn revert_to_hold<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        vendor_id: &str,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $3,
                vendor_po_links = vendor_po_links - $2,
                removed_lines = removed_lines - $2,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(vendor_id)
        .bind(OrderStatus::OnHold)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Solta apenas o vínculo do fornecedor (sem mexer no status): usado
    /// quando o número publicado deixa de existir num revert.
    pub async fn clear_vendor_link<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        vendor_id: &str,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE orders
            SET vendor_po_links = vendor_po_links - $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(vendor_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Regrava as chaves de linha removidas para um fornecedor (já dedupadas
    /// pelo serviço) para o próximo scan reconsiderar essas linhas.
    pub async fn set_removed_lines<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        vendor_id: &str,
        line_keys: &[String],
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE orders
            SET removed_lines = jsonb_set(removed_lines, ARRAY[$2], to_jsonb($3::text[])),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(vendor_id)
        .bind(line_keys)
        .execute(executor)
        .await?;
        Ok(())
    }
}
