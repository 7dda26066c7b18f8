// src/docs.rs

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::OpenApi;

use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::get_me,

        // --- RECEIVING ---
        handlers::receiving::get_pos,
        handlers::receiving::get_po_lines,
        handlers::receiving::receive,

        // --- LIFECYCLE ---
        handlers::lifecycle::mark_ordered,
        handlers::lifecycle::prune_items,
        handlers::lifecycle::delete_or_revert,
        handlers::lifecycle::add_to_run,

        // --- WORK ORDERS ---
        handlers::workorders::get_workorders,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::User,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- PO / Receiving ---
            models::po::PoStatus,
            models::po::OpenPoSummary,
            models::po::OrderRef,
            models::po::PoLineView,
            models::po::PoLinesResponse,
            models::order::OrderStatus,
            models::order::OrderReadiness,
            models::receipt::ReceiptEvent,
            services::receive_service::ReceiveResult,
            services::po_service::MarkOrderedSummary,
            services::po_service::PruneSummary,
            services::po_service::DeleteOutcome,

            // --- Work Orders ---
            models::workorder::SizeQty,
            models::workorder::ColorGroup,
            models::workorder::ItemGroup,

            // --- Payloads ---
            handlers::receiving::ReceiveLinePayload,
            handlers::receiving::ReceivePayload,
            handlers::lifecycle::ItemKeyPayload,
            handlers::lifecycle::MarkOrderedPayload,
            handlers::lifecycle::PrunePayload,
            handlers::lifecycle::RunLinePayload,
            handlers::lifecycle::AddToRunPayload,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Users", description = "Dados do Usuário"),
        (name = "Receiving", description = "Recebimento de POs (livro-razão e reconciliação)"),
        (name = "Lifecycle", description = "Ciclo de vida dos POs (publicar, remover itens, reverter)"),
        (name = "WorkOrders", description = "Impressão de Work Orders (PDF)")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}
