// src/config.rs

use std::{env, time::Duration};

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{OrderRepository, PoRepository, ReceiptRepository, UserRepository},
    services::{
        auth::AuthService, po_service::PoService, receive_service::ReceiveService,
        workorder_service::WorkOrderService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_secret: String,
    pub auth_service: AuthService,
    pub po_service: PoService,
    pub receive_service: ReceiveService,
    pub workorder_service: WorkOrderService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL deve ser definida");
        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET deve ser definido");
        // Prefixo dos números de PO e pasta das fontes do PDF são ajustáveis.
        let po_prefix = env::var("PO_PREFIX").unwrap_or_else(|_| "BT".to_string());
        let fonts_dir = env::var("FONTS_DIR").unwrap_or_else(|_| "./fonts".to_string());

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let user_repo = UserRepository::new(db_pool.clone());
        let po_repo = PoRepository::new(db_pool.clone());
        let receipt_repo = ReceiptRepository::new(db_pool.clone());
        let order_repo = OrderRepository::new(db_pool.clone());

        let auth_service = AuthService::new(user_repo, jwt_secret.clone(), db_pool.clone());
        let po_service = PoService::new(
            po_repo.clone(),
            receipt_repo.clone(),
            order_repo.clone(),
            db_pool.clone(),
            po_prefix,
        );
        let receive_service = ReceiveService::new(
            po_repo,
            receipt_repo,
            order_repo.clone(),
            db_pool.clone(),
        );
        let workorder_service = WorkOrderService::new(order_repo, db_pool.clone(), fonts_dir);

        Ok(Self {
            db_pool,
            jwt_secret,
            auth_service,
            po_service,
            receive_service,
            workorder_service,
        })
    }
}
