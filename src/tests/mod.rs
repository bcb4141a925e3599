//! tests/mod.rs
//! Utilidades compartidas por las pruebas: SQLite en memoria y un notificador de prueba.

mod store_tests;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono_tz::Tz;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

use crate::models::consultation_model::{
    ConsultationPayload, ConsultationRecord, NewConsultation, STATUS_NEW,
};
use crate::services::admin_service::AdminService;
use crate::services::consultation_store::ConsultationStore;
use crate::services::intake_service::IntakeService;
use crate::services::notification_service::Notifier;

pub const TEST_TZ: Tz = chrono_tz::Asia::Shanghai;

/// Una sola conexión: cada conexión a `sqlite::memory:` es una base distinta.
pub async fn memory_pool() -> Pool<Sqlite> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("pool en memoria")
}

pub async fn memory_store() -> ConsultationStore {
    let store = ConsultationStore::new(memory_pool().await);
    store.reconcile_schema().await.expect("esquema");
    store
}

/// Guarda cada registro recibido y responde siempre lo mismo.
pub struct RecordingNotifier {
    succeed: bool,
    calls: Mutex<Vec<ConsultationRecord>>,
}

impl RecordingNotifier {
    pub fn new(succeed: bool) -> Arc<Self> {
        Arc::new(Self {
            succeed,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<ConsultationRecord> {
        self.calls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, record: &ConsultationRecord) -> bool {
        self.calls.lock().expect("lock").push(record.clone());
        self.succeed
    }
}

pub struct Harness {
    /// El mismo pool que usa `store`, para romper la base a mano.
    pub pool: Pool<Sqlite>,
    pub store: ConsultationStore,
    pub intake: IntakeService,
    pub admin: AdminService,
    pub notifier: Arc<RecordingNotifier>,
}

pub async fn harness(notifier_succeeds: bool) -> Harness {
    let pool = memory_pool().await;
    let store = ConsultationStore::new(pool.clone());
    store.reconcile_schema().await.expect("esquema");
    let notifier = RecordingNotifier::new(notifier_succeeds);
    Harness {
        pool,
        intake: IntakeService::new(store.clone(), notifier.clone(), TEST_TZ),
        admin: AdminService::new(store.clone(), TEST_TZ),
        store,
        notifier,
    }
}

pub fn payload(name: &str, contact: &str, consultation_type: &str) -> ConsultationPayload {
    ConsultationPayload {
        name: Some(name.to_string()),
        contact: Some(contact.to_string()),
        consultation_type: Some(consultation_type.to_string()),
        ..Default::default()
    }
}

/// Registro con fecha fija, para probar los conteos por periodo.
pub fn dated(name: &str, consultation_type: &str, submitted_at: &str) -> NewConsultation {
    NewConsultation {
        name: name.to_string(),
        contact: "13800000000".to_string(),
        email: None,
        consultation_type: consultation_type.to_string(),
        message: None,
        submitted_at: submitted_at.to_string(),
        status: STATUS_NEW.to_string(),
        device_model: None,
        ip_address: None,
        location: None,
        browser: None,
        fill_duration: None,
    }
}
