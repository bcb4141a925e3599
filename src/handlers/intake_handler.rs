//! handlers/intake_handler.rs
//! Endpoint público del formulario.

use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::handlers::error_response;
use crate::models::consultation_model::{ClientInfo, ConsultationPayload};
use crate::services::intake_service::IntakeService;

/// POST /submit_consultation
pub async fn submit_consultation_endpoint(
    req: HttpRequest,
    intake_service: web::Data<IntakeService>,
    body: web::Json<ConsultationPayload>,
) -> HttpResponse {
    let client = client_info(&req);

    match intake_service.submit(body.into_inner(), client).await {
        Ok(submitted) => {
            // El aviso sigue en su propia tarea; no lo esperamos.
            drop(submitted.notification);
            HttpResponse::Ok().json(json!({
                "success": true,
                "id": submitted.id,
                "message": "咨询表单提交成功！"
            }))
        }
        Err(e) => error_response(&e, "提交失败"),
    }
}

fn client_info(req: &HttpRequest) -> ClientInfo {
    let ip_address = req
        .connection_info()
        .realip_remote_addr()
        .map(|s| s.to_string());
    let browser = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    ClientInfo {
        ip_address,
        browser,
    }
}
