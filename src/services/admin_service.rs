//! services/admin_service.rs
//! Lado del panel: listado con estadísticas, cambio de estado, borrado y exportación.

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;

use crate::{
    errors::ServiceError,
    models::consultation_model::{
        is_known_status, ConsultationListing, ConsultationRecord, ReportingPeriod,
    },
    services::consultation_store::ConsultationStore,
};

/// Cabecera del CSV exportado.
pub const EXPORT_HEADER: &str = "ID,姓名,联系方式,邮箱,咨询类型,咨询内容,提交时间,状态";

#[derive(Clone, Debug)]
pub struct AdminService {
    store: ConsultationStore,
    timezone: Tz,
}

impl AdminService {
    pub fn new(store: ConsultationStore, timezone: Tz) -> Self {
        Self { store, timezone }
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    pub async fn list(&self) -> Result<ConsultationListing, ServiceError> {
        self.list_for(ReportingPeriod::containing(self.today()))
            .await
    }

    /// Listado con los conteos calculados respecto a `period`.
    pub async fn list_for(
        &self,
        period: ReportingPeriod,
    ) -> Result<ConsultationListing, ServiceError> {
        Ok(self.store.listing(&period).await?)
    }

    /// Cualquier texto no vacío vale como estado.
    pub async fn set_status(&self, id: i64, status: &str) -> Result<(), ServiceError> {
        let status = status.trim();
        if status.is_empty() {
            return Err(ServiceError::Validation("status"));
        }
        if !is_known_status(status) {
            log::debug!("Estado no estándar '{}' para consulta {}", status, id);
        }

        let affected = self.store.update_status(id, status).await?;
        if affected == 0 {
            return Err(ServiceError::NotFound(id));
        }

        log::info!("Consulta {} -> estado '{}'", id, status);
        Ok(())
    }

    /// Devuelve `false` si no había nada que borrar; no es un error.
    pub async fn delete(&self, id: i64) -> Result<bool, ServiceError> {
        let affected = self.store.delete(id).await?;
        if affected == 0 {
            log::info!("Borrado de consulta {} sin efecto: no existe", id);
            return Ok(false);
        }
        log::info!("Consulta {} eliminada", id);
        Ok(true)
    }

    /// CSV sin comillas ni escapes: una coma o un salto de línea dentro de
    /// un campo desplaza las columnas de esa fila.
    pub async fn export(&self) -> Result<String, ServiceError> {
        let records = self.store.list_all().await?;

        let mut csv = String::with_capacity(64 * (records.len() + 1));
        csv.push_str(EXPORT_HEADER);
        csv.push('\n');
        for record in &records {
            csv.push_str(&export_line(record));
            csv.push('\n');
        }
        Ok(csv)
    }
}

fn export_line(r: &ConsultationRecord) -> String {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    [
        r.id.to_string(),
        r.name.clone(),
        r.contact.clone(),
        text(&r.email),
        r.consultation_type.clone(),
        text(&r.message),
        r.submitted_at.clone(),
        r.status.clone(),
    ]
    .join(",")
}
