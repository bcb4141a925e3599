//! handlers/admin_handler.rs
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::handlers::error_response;
use crate::models::consultation_model::{ApiResponse, UpdateStatusRequest};
use crate::services::admin_service::AdminService;

/// GET /api/consultations
pub async fn list_consultations_endpoint(admin_service: web::Data<AdminService>) -> HttpResponse {
    match admin_service.list().await {
        Ok(listing) => HttpResponse::Ok().json(json!({
            "success": true,
            "consultations": listing.consultations,
            "total": listing.total,
            "today": listing.today,
            "pending": listing.pending,
            "this_week": listing.this_week,
            "this_month": listing.this_month,
            "type_stats": listing.type_stats,
            "status_stats": listing.status_stats
        })),
        Err(e) => error_response(&e, "获取数据失败"),
    }
}

/// PUT /api/consultations/{id}
pub async fn update_status_endpoint(
    admin_service: web::Data<AdminService>,
    path: web::Path<i64>,
    body: web::Json<UpdateStatusRequest>,
) -> HttpResponse {
    let id = path.into_inner();
    let status = body.into_inner().status.unwrap_or_default();

    match admin_service.set_status(id, &status).await {
        Ok(()) => HttpResponse::Ok().json(ApiResponse::ok("状态更新成功")),
        Err(e) => error_response(&e, "更新失败"),
    }
}

/// DELETE /api/consultations/{id}
pub async fn delete_consultation_endpoint(
    admin_service: web::Data<AdminService>,
    path: web::Path<i64>,
) -> HttpResponse {
    match admin_service.delete(path.into_inner()).await {
        Ok(true) => HttpResponse::Ok().json(ApiResponse::ok("删除成功")),
        Ok(false) => HttpResponse::Ok().json(ApiResponse::ok("记录不存在，无需删除")),
        Err(e) => error_response(&e, "删除失败"),
    }
}

/// GET /api/export
pub async fn export_endpoint(admin_service: web::Data<AdminService>) -> HttpResponse {
    match admin_service.export().await {
        Ok(csv) => HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .append_header((
                "Content-Disposition",
                "attachment; filename=consultations.csv",
            ))
            .body(csv),
        Err(e) => error_response(&e, "导出失败"),
    }
}

/// GET /api/health
pub async fn health_endpoint() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "status": "ok" }))
}
