//! models/consultation_model.rs
//! Registro de consulta y las estructuras de request/response que lo rodean.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Estado inicial de toda consulta recién creada.
pub const STATUS_NEW: &str = "new";

/// Estados que usa el panel de administración. No se imponen: `status` es texto libre.
pub const KNOWN_STATUSES: [&str; 4] = [STATUS_NEW, "contacted", "processed", "closed"];

pub fn is_known_status(status: &str) -> bool {
    KNOWN_STATUSES.contains(&status)
}

/// Fila de la tabla `consultations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConsultationRecord {
    pub id: i64,
    pub name: String,
    pub contact: String,
    pub email: Option<String>,
    pub consultation_type: String,
    pub message: Option<String>,
    /// Hora local "YYYY-MM-DD HH:MM:SS" (columna `timestamp`)
    #[serde(rename = "timestamp")]
    pub submitted_at: String,
    pub status: String,
    pub device_model: Option<String>,
    pub ip_address: Option<String>,
    pub location: Option<String>,
    pub browser: Option<String>,
    pub fill_duration: Option<i64>,
}

/// Lo que se inserta: todo menos el `id`, que asigna SQLite.
#[derive(Debug, Clone)]
pub struct NewConsultation {
    pub name: String,
    pub contact: String,
    pub email: Option<String>,
    pub consultation_type: String,
    pub message: Option<String>,
    pub submitted_at: String,
    pub status: String,
    pub device_model: Option<String>,
    pub ip_address: Option<String>,
    pub location: Option<String>,
    pub browser: Option<String>,
    pub fill_duration: Option<i64>,
}

impl NewConsultation {
    pub fn into_record(self, id: i64) -> ConsultationRecord {
        ConsultationRecord {
            id,
            name: self.name,
            contact: self.contact,
            email: self.email,
            consultation_type: self.consultation_type,
            message: self.message,
            submitted_at: self.submitted_at,
            status: self.status,
            device_model: self.device_model,
            ip_address: self.ip_address,
            location: self.location,
            browser: self.browser,
            fill_duration: self.fill_duration,
        }
    }
}

/// Body de POST /submit_consultation.
///
/// Todos los campos son opcionales a nivel JSON para que la validación
/// pueda nombrar el campo que falta. Los alias aceptan las variantes de
/// nombres que usan los formularios ya desplegados.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsultationPayload {
    pub name: Option<String>,
    #[serde(alias = "text", alias = "phone")]
    pub contact: Option<String>,
    pub email: Option<String>,
    #[serde(alias = "consultationType")]
    pub consultation_type: Option<String>,
    #[serde(alias = "description")]
    pub message: Option<String>,
    #[serde(alias = "deviceModel")]
    pub device_model: Option<String>,
    pub location: Option<String>,
    #[serde(
        default,
        alias = "fillDuration",
        deserialize_with = "deserialize_fill_duration"
    )]
    pub fill_duration: Option<i64>,
}

/// Acepta `57`, `57.4` o `"57.4秒"` y redondea al segundo; lo que no se
/// pueda leer queda en `None`.
fn deserialize_fill_duration<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let seconds = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => {
            let number: String = s
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            number.parse::<f64>().ok()
        }
        _ => None,
    };
    Ok(seconds
        .filter(|f| f.is_finite())
        .map(|f| f.round() as i64))
}

/// Datos del cliente que no vienen en el body sino en la petición HTTP.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub browser: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

/// Día, semana ISO (lunes a domingo) y mes a los que se refieren los conteos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingPeriod {
    pub today: NaiveDate,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
}

impl ReportingPeriod {
    pub fn containing(today: NaiveDate) -> Self {
        let from_monday = i64::from(today.weekday().num_days_from_monday());
        let week_start = today - Duration::days(from_monday);
        ReportingPeriod {
            today,
            week_start,
            week_end: week_start + Duration::days(6),
        }
    }
}

/// Listado + estadísticas para el panel.
#[derive(Debug, Clone, Serialize)]
pub struct ConsultationListing {
    pub consultations: Vec<ConsultationRecord>,
    pub total: i64,
    pub today: i64,
    pub pending: i64,
    pub this_week: i64,
    pub this_month: i64,
    pub type_stats: BTreeMap<String, i64>,
    pub status_stats: BTreeMap<String, i64>,
}

/// Respuesta genérica `{success, message}`
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
