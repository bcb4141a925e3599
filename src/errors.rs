//! errors.rs
//! Errores que los servicios devuelven a los handlers.

use actix_web::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Campo obligatorio ausente o vacío
    #[error("缺少必填字段: {0}")]
    Validation(&'static str),

    #[error("记录不存在: {0}")]
    NotFound(i64),

    /// Fallo de SQLite (conexión, escritura, lectura)
    #[error("{0:#}")]
    Persistence(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
