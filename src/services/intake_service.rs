//! services/intake_service.rs
//! Alta de consultas: validación, persistencia y aviso.

use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use tokio::task::JoinHandle;

use crate::{
    errors::ServiceError,
    models::consultation_model::{ClientInfo, ConsultationPayload, NewConsultation, STATUS_NEW},
    services::{consultation_store::ConsultationStore, notification_service::Notifier},
};

/// Formato de la columna `timestamp`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Resultado de un alta ya persistida.
pub struct Submitted {
    pub id: i64,
    /// Tarea del aviso; el handler la suelta, los tests la esperan.
    pub notification: JoinHandle<bool>,
}

#[derive(Clone)]
pub struct IntakeService {
    store: ConsultationStore,
    notifier: Arc<dyn Notifier>,
    timezone: Tz,
}

impl IntakeService {
    pub fn new(store: ConsultationStore, notifier: Arc<dyn Notifier>, timezone: Tz) -> Self {
        Self {
            store,
            notifier,
            timezone,
        }
    }

    /// Valida, guarda y lanza el aviso en segundo plano.
    ///
    /// El aviso se dispara sólo después de que la fila quedó escrita, y su
    /// resultado no afecta la respuesta.
    pub async fn submit(
        &self,
        payload: ConsultationPayload,
        client: ClientInfo,
    ) -> Result<Submitted, ServiceError> {
        let new_record = self.build_record(payload, client)?;

        // el handler registra el fallo al armar la respuesta
        let id = self.store.insert(&new_record).await?;

        log::info!(
            "Consulta {} registrada (tipo='{}', ip={:?})",
            id,
            new_record.consultation_type,
            new_record.ip_address
        );

        let record = new_record.into_record(id);
        let notifier = self.notifier.clone();
        let notification = tokio::spawn(async move { notifier.notify(&record).await });

        Ok(Submitted { id, notification })
    }

    fn build_record(
        &self,
        payload: ConsultationPayload,
        client: ClientInfo,
    ) -> Result<NewConsultation, ServiceError> {
        let name = required(payload.name, "name")?;
        let contact = required(payload.contact, "contact")?;
        let consultation_type = required(payload.consultation_type, "consultation_type")?;

        let submitted_at = Utc::now()
            .with_timezone(&self.timezone)
            .format(TIMESTAMP_FORMAT)
            .to_string();

        Ok(NewConsultation {
            name,
            contact,
            email: optional(payload.email),
            consultation_type,
            message: optional(payload.message),
            submitted_at,
            status: STATUS_NEW.to_string(),
            device_model: optional(payload.device_model),
            ip_address: optional(client.ip_address),
            location: optional(payload.location),
            browser: optional(client.browser),
            fill_duration: payload.fill_duration,
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ServiceError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ServiceError::Validation(field)),
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
