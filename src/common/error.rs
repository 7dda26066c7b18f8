use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
// Variantes separadas para "não encontrado" vs "regra de negócio": o caller
// decide o que é retentável sem fazer string-matching na mensagem.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // Payload sem nenhuma linha válida, chunk fora do intervalo, etc.
    #[error("Payload inválido: {0}")]
    InvalidPayload(String),

    #[error("PO não encontrado")]
    PoNotFound,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Nenhum pedido elegível para work order")]
    NoWorkOrders,

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    // Rejeição de regra de negócio (ex: remover todos os itens no mark-ordered)
    #[error("Operação rejeitada: {0}")]
    BusinessRule(String),

    #[error("Fonte não encontrada: {0}")]
    FontNotFound(String),

    // Variante para erros de banco de dados (sqlx)
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retorna todos os detalhes da validação, campo a campo.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors.iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "ok": false,
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::InvalidPayload(msg) => {
                let body = Json(json!({ "ok": false, "error": msg }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::PoNotFound => (StatusCode::NOT_FOUND, "PO não encontrado.".to_string()),
            AppError::UserNotFound => (StatusCode::NOT_FOUND, "Usuário não encontrado.".to_string()),
            AppError::NoWorkOrders => {
                (StatusCode::NOT_FOUND, "Nenhum pedido elegível para impressão.".to_string())
            }
            AppError::EmailAlreadyExists => {
                (StatusCode::CONFLICT, "Este e-mail já está em uso.".to_string())
            }
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "E-mail ou senha inválidos.".to_string())
            }
            AppError::InvalidToken => {
                (StatusCode::UNAUTHORIZED, "Token de autenticação inválido ou ausente.".to_string())
            }
            AppError::BusinessRule(msg) => (StatusCode::CONFLICT, msg),

            // Todos os outros erros (DatabaseError, render, etc.) viram 500.
            // O `tracing` loga a mensagem detalhada que `thiserror` nos deu.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Ocorreu um erro inesperado.".to_string())
            }
        };

        // Resposta padrão para erros simples que só têm uma mensagem.
        let body = Json(json!({ "ok": false, "error": error_message }));
        (status, body).into_response()
    }
}
