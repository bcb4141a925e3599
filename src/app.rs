//! app.rs
use crate::handlers::{admin_handler, intake_handler};
use crate::models::consultation_model::ApiResponse;
use actix_web::{error, web, HttpResponse};

/// Límite del body JSON del formulario
const JSON_LIMIT_BYTES: usize = 64 * 1024;

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route(
            "/submit_consultation",
            web::post().to(intake_handler::submit_consultation_endpoint),
        )
        .service(
            web::scope("/api")
                .route("/health", web::get().to(admin_handler::health_endpoint))
                .route("/export", web::get().to(admin_handler::export_endpoint))
                .service(
                    web::scope("/consultations")
                        .route(
                            "",
                            web::get().to(admin_handler::list_consultations_endpoint),
                        )
                        .route(
                            "/{id}",
                            web::put().to(admin_handler::update_status_endpoint),
                        )
                        .route(
                            "/{id}",
                            web::delete().to(admin_handler::delete_consultation_endpoint),
                        ),
                ),
        );
}

/// JSON mal formado -> 400 con el mismo `{success, message}` que el resto.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT_BYTES)
        .error_handler(|err, _req| {
            let response =
                HttpResponse::BadRequest().json(ApiResponse::fail(format!("请求格式错误: {}", err)));
            error::InternalError::from_response(err, response).into()
        })
}
