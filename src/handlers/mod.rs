//! handlers/mod.rs
//! Handlers HTTP: alta pública y API del panel.
pub mod admin_handler;
pub mod intake_handler;

use actix_web::HttpResponse;

use crate::{errors::ServiceError, models::consultation_model::ApiResponse};

/// Traduce un `ServiceError` a `{success:false, message}` con su código.
/// `action` antecede al mensaje en los fallos de base de datos ("提交失败: ...").
pub(crate) fn error_response(err: &ServiceError, action: &str) -> HttpResponse {
    let message = match err {
        ServiceError::Persistence(e) => {
            log::error!("{}: {:#}", action, e);
            format!("{}: {}", action, err)
        }
        other => other.to_string(),
    };
    HttpResponse::build(err.status_code()).json(ApiResponse::fail(message))
}
