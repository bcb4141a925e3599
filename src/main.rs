use std::path::Path;

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use dotenv::dotenv;
use sqlx::{Pool, Sqlite};

use crate::config::app_config::AppConfig;
use crate::logger::init_logger;
use crate::services::admin_service::AdminService;
use crate::services::consultation_store::{self, ConsultationStore};
use crate::services::intake_service::IntakeService;
use crate::services::notification_service::build_notifier;

mod app;
mod config;
mod errors;
mod handlers;
mod logger;
mod models;
mod services;
#[cfg(test)]
mod tests;

async fn setup_database(config: &AppConfig) -> Result<Pool<Sqlite>> {
    let db_path = Path::new(&config.database_path);
    log::info!("Conectando a SQLite en {}", db_path.display());

    let db_pool = consultation_store::open_pool(db_path).await?;

    // Verificar la conexión
    let conn = db_pool.acquire().await.context("Falló la conexión")?;
    drop(conn);

    Ok(db_pool)
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    let config = AppConfig::from_env().context("Configuración inválida")?;
    init_logger(config.debug);

    let db_pool = setup_database(&config).await?;

    let store = ConsultationStore::new(db_pool.clone());
    store
        .reconcile_schema()
        .await
        .context("Fallo al preparar el esquema de 'consultations'")?;

    let notifier = build_notifier(&config.mail);
    let intake_service = IntakeService::new(store.clone(), notifier, config.timezone);
    let admin_service = AdminService::new(store.clone(), config.timezone);

    log::info!(
        "Levantando servidor en {}:{} (zona horaria {})",
        config.host,
        config.port,
        config.timezone
    );
    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(intake_service.clone()))
            .app_data(web::Data::new(admin_service.clone()))
            .configure(app::init_app)
    });
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    server
        .bind((config.host.as_str(), config.port))?
        .run()
        .await?;

    db_pool.close().await;
    Ok(())
}
