//! services/consultation_store.rs
//! Acceso a la tabla `consultations`: esquema, escrituras y conteos.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};

use crate::models::consultation_model::{
    ConsultationListing, ConsultationRecord, NewConsultation, ReportingPeriod, STATUS_NEW,
};

/// Esquema actual sin `id`: (columna, definición)
const COLUMNS: [(&str, &str); 12] = [
    ("name", "TEXT NOT NULL"),
    ("contact", "TEXT NOT NULL"),
    ("email", "TEXT"),
    ("consultation_type", "TEXT NOT NULL"),
    ("message", "TEXT"),
    ("timestamp", "TEXT"),
    ("status", "TEXT DEFAULT 'new'"),
    ("device_model", "TEXT"),
    ("ip_address", "TEXT"),
    ("location", "TEXT"),
    ("browser", "TEXT"),
    ("fill_duration", "INTEGER"),
];

/// Obligatorias: ALTER TABLE no puede agregarlas a una tabla con filas.
const REQUIRED_COLUMNS: [&str; 3] = ["name", "contact", "consultation_type"];

/// Columnas de bases antiguas que alimentan a una actual: (actual, antigua)
const LEGACY_SOURCES: [(&str, &str); 3] = [
    ("contact", "phone"),
    ("message", "description"),
    ("timestamp", "submitted_at"),
];

/// Estados escritos por versiones anteriores: (antes, ahora)
const LEGACY_STATUSES: [(&str, &str); 1] = [("新提交", STATUS_NEW)];

const REBUILD_TABLE: &str = "consultations_rebuild";

const SELECT_COLUMNS: &str = r#"
    id, name, contact, email, consultation_type, message,
    COALESCE(timestamp, '') AS submitted_at,
    COALESCE(status, 'new') AS status,
    device_model, ip_address, location, browser, fill_duration
"#;

/// `extras` son columnas antiguas que se conservan, siempre nullable.
fn create_table_sql(table: &str, extras: &[&TableColumn]) -> String {
    let mut definitions = vec!["id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
    definitions.extend(COLUMNS.iter().map(|(name, def)| format!("{name} {def}")));
    definitions.extend(
        extras
            .iter()
            .map(|c| format!("\"{}\" {}", c.name, c.plain_type())),
    );
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n    {}\n)",
        definitions.join(",\n    ")
    )
}

/// Una fila de `PRAGMA table_info`.
#[derive(Debug)]
struct TableColumn {
    name: String,
    decl_type: String,
    not_null: bool,
    has_default: bool,
    primary_key: bool,
}

impl TableColumn {
    fn plain_type(&self) -> &str {
        if self.decl_type.is_empty() {
            "TEXT"
        } else {
            &self.decl_type
        }
    }

    /// NOT NULL sin default en una columna que el alta no llena.
    fn blocks_insert(&self) -> bool {
        self.not_null
            && !self.has_default
            && !self.primary_key
            && !REQUIRED_COLUMNS.contains(&self.name.as_str())
    }
}

fn has_column(columns: &[TableColumn], name: &str) -> bool {
    columns.iter().any(|c| c.name == name)
}

/// ALTER TABLE no alcanza: hay columnas con otro nombre o restricciones
/// que harían fallar cada insert.
fn needs_rebuild(columns: &[TableColumn]) -> bool {
    let renamed = LEGACY_SOURCES
        .iter()
        .any(|(current, legacy)| !has_column(columns, current) && has_column(columns, legacy));
    renamed || columns.iter().any(TableColumn::blocks_insert)
}

/// Abre (y crea si hace falta) el archivo SQLite.
pub async fn open_pool(db_path: &Path) -> Result<Pool<Sqlite>> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("No se pudo crear directorio {}", parent.display()))?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .with_context(|| format!("No se pudo abrir SQLite en {}", db_path.display()))
}

#[derive(Clone, Debug)]
pub struct ConsultationStore {
    db_pool: Pool<Sqlite>,
}

impl ConsultationStore {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        ConsultationStore { db_pool }
    }

    /// Crea la tabla si no existe y la lleva al esquema actual.
    /// Se puede llamar en cada arranque, sea cual sea la versión previa del esquema.
    pub async fn reconcile_schema(&self) -> Result<()> {
        sqlx::query(&create_table_sql("consultations", &[]))
            .execute(&self.db_pool)
            .await
            .context("Fallo al crear la tabla consultations")?;

        let columns = self.table_columns().await?;

        if needs_rebuild(&columns) {
            self.rebuild_table(&columns).await?;
        } else {
            for (name, definition) in COLUMNS {
                if has_column(&columns, name) {
                    continue;
                }
                if REQUIRED_COLUMNS.contains(&name) {
                    bail!("La tabla consultations no tiene la columna obligatoria {name}");
                }
                let sql = format!("ALTER TABLE consultations ADD COLUMN {name} {definition}");
                sqlx::query(&sql)
                    .execute(&self.db_pool)
                    .await
                    .with_context(|| format!("Fallo al agregar columna {name}"))?;
                log::info!("Columna '{}' agregada a consultations", name);
            }
        }

        for (legacy, current) in LEGACY_STATUSES {
            let result = sqlx::query("UPDATE consultations SET status = ?1 WHERE status = ?2")
                .bind(current)
                .bind(legacy)
                .execute(&self.db_pool)
                .await
                .context("Fallo al migrar estados antiguos")?;
            if result.rows_affected() > 0 {
                log::info!(
                    "{} consultas con estado '{}' pasan a '{}'",
                    result.rows_affected(),
                    legacy,
                    current
                );
            }
        }

        Ok(())
    }

    async fn table_columns(&self) -> Result<Vec<TableColumn>> {
        let rows = sqlx::query("PRAGMA table_info(consultations)")
            .fetch_all(&self.db_pool)
            .await
            .context("Fallo al leer columnas de consultations")?;

        rows.into_iter()
            .map(|r| -> Result<TableColumn, sqlx::Error> {
                Ok(TableColumn {
                    name: r.try_get("name")?,
                    decl_type: r.try_get("type")?,
                    not_null: r.try_get::<i64, _>("notnull")? != 0,
                    has_default: r.try_get::<Option<String>, _>("dflt_value")?.is_some(),
                    primary_key: r.try_get::<i64, _>("pk")? != 0,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .context("PRAGMA table_info con formato inesperado")
    }

    /// Copia las filas a una tabla con el esquema actual y la pone en lugar
    /// de la anterior, todo en una transacción. Los ids se conservan; las
    /// columnas antiguas sin equivalente se copian tal cual, sin NOT NULL.
    async fn rebuild_table(&self, columns: &[TableColumn]) -> Result<()> {
        let mut targets = vec!["id".to_string()];
        let mut sources = vec!["id".to_string()];
        let mut consumed: Vec<&str> = vec!["id"];

        for (name, _) in COLUMNS {
            let source = if has_column(columns, name) {
                Some(name)
            } else {
                LEGACY_SOURCES
                    .iter()
                    .find(|(current, legacy)| *current == name && has_column(columns, legacy))
                    .map(|(_, legacy)| *legacy)
            };
            match source {
                Some(source) => {
                    targets.push(name.to_string());
                    sources.push(format!("\"{source}\""));
                    consumed.push(source);
                }
                None if REQUIRED_COLUMNS.contains(&name) => {
                    bail!("La tabla consultations no tiene la columna obligatoria {name}")
                }
                None => {}
            }
        }

        let extras: Vec<&TableColumn> = columns
            .iter()
            .filter(|c| !consumed.contains(&c.name.as_str()))
            .collect();
        for extra in &extras {
            targets.push(format!("\"{}\"", extra.name));
            sources.push(format!("\"{}\"", extra.name));
        }

        let statements = [
            format!("DROP TABLE IF EXISTS {REBUILD_TABLE}"),
            create_table_sql(REBUILD_TABLE, &extras),
            format!(
                "INSERT INTO {REBUILD_TABLE} ({}) SELECT {} FROM consultations",
                targets.join(", "),
                sources.join(", ")
            ),
            "DROP TABLE consultations".to_string(),
            format!("ALTER TABLE {REBUILD_TABLE} RENAME TO consultations"),
        ];

        let mut tx = self
            .db_pool
            .begin()
            .await
            .context("No se pudo iniciar la reconstrucción de consultations")?;
        for sql in &statements {
            sqlx::query(sql)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Fallo al reconstruir consultations: {sql}"))?;
        }
        tx.commit()
            .await
            .context("Fallo al confirmar la reconstrucción de consultations")?;

        log::info!(
            "Tabla consultations reconstruida con el esquema actual ({} columnas antiguas conservadas)",
            extras.len()
        );
        Ok(())
    }

    /// Inserta la consulta y devuelve el id asignado.
    pub async fn insert(&self, record: &NewConsultation) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO consultations (
                name, contact, email, consultation_type, message, timestamp,
                status, device_model, ip_address, location, browser, fill_duration
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&record.name)
        .bind(&record.contact)
        .bind(&record.email)
        .bind(&record.consultation_type)
        .bind(&record.message)
        .bind(&record.submitted_at)
        .bind(&record.status)
        .bind(&record.device_model)
        .bind(&record.ip_address)
        .bind(&record.location)
        .bind(&record.browser)
        .bind(record.fill_duration)
        .execute(&self.db_pool)
        .await
        .context("Fallo al insertar consulta")?;

        Ok(result.last_insert_rowid())
    }

    /// Todas las consultas, la más reciente primero.
    pub async fn list_all(&self) -> Result<Vec<ConsultationRecord>> {
        let mut conn = self
            .db_pool
            .acquire()
            .await
            .context("No se pudo obtener conexión")?;
        fetch_records(&mut conn).await
    }

    /// Listado y conteos leídos dentro de una sola transacción, para que
    /// todos describan el mismo estado de la tabla.
    pub async fn listing(&self, period: &ReportingPeriod) -> Result<ConsultationListing> {
        let mut tx = self
            .db_pool
            .begin()
            .await
            .context("No se pudo iniciar la lectura del listado")?;

        let listing = ConsultationListing {
            consultations: fetch_records(&mut tx).await?,
            total: count_total(&mut tx).await?,
            today: count_on_day(&mut tx, period.today).await?,
            pending: count_with_status(&mut tx, STATUS_NEW).await?,
            this_week: count_between_days(&mut tx, period.week_start, period.week_end).await?,
            this_month: count_in_month(&mut tx, period.today).await?,
            type_stats: count_by_type(&mut tx).await?,
            status_stats: count_by_status(&mut tx).await?,
        };

        tx.commit().await.context("Fallo al cerrar la lectura del listado")?;
        Ok(listing)
    }

    /// Devuelve cuántas filas cambiaron (0 si el id no existe).
    pub async fn update_status(&self, id: i64, status: &str) -> Result<u64> {
        let result = sqlx::query("UPDATE consultations SET status = ?1 WHERE id = ?2")
            .bind(status)
            .bind(id)
            .execute(&self.db_pool)
            .await
            .context("Fallo al actualizar estado")?;
        Ok(result.rows_affected())
    }

    pub async fn delete(&self, id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM consultations WHERE id = ?1")
            .bind(id)
            .execute(&self.db_pool)
            .await
            .context("Fallo al eliminar consulta")?;
        Ok(result.rows_affected())
    }
}

// ----------------------------------------------------------------------
// Lecturas sobre una conexión ya abierta (pool o transacción)
// ----------------------------------------------------------------------

async fn fetch_records(conn: &mut SqliteConnection) -> Result<Vec<ConsultationRecord>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM consultations ORDER BY timestamp DESC, id DESC");
    sqlx::query_as::<_, ConsultationRecord>(&sql)
        .fetch_all(conn)
        .await
        .context("Fallo al listar consultas")
}

async fn count_total(conn: &mut SqliteConnection) -> Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM consultations")
        .fetch_one(conn)
        .await
        .context("Fallo al contar consultas")
}

async fn count_on_day(conn: &mut SqliteConnection, day: NaiveDate) -> Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM consultations WHERE DATE(timestamp) = ?1")
        .bind(day.format("%Y-%m-%d").to_string())
        .fetch_one(conn)
        .await
        .context("Fallo al contar consultas del día")
}

/// Días de calendario inclusivos en ambos extremos.
async fn count_between_days(
    conn: &mut SqliteConnection,
    first: NaiveDate,
    last: NaiveDate,
) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM consultations WHERE DATE(timestamp) BETWEEN ?1 AND ?2",
    )
    .bind(first.format("%Y-%m-%d").to_string())
    .bind(last.format("%Y-%m-%d").to_string())
    .fetch_one(conn)
    .await
    .context("Fallo al contar consultas de la semana")
}

/// Mes de calendario que contiene `day`.
async fn count_in_month(conn: &mut SqliteConnection, day: NaiveDate) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM consultations WHERE strftime('%Y-%m', timestamp) = ?1",
    )
    .bind(day.format("%Y-%m").to_string())
    .fetch_one(conn)
    .await
    .context("Fallo al contar consultas del mes")
}

async fn count_with_status(conn: &mut SqliteConnection, status: &str) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM consultations WHERE COALESCE(status, 'new') = ?1",
    )
    .bind(status)
    .fetch_one(conn)
    .await
    .context("Fallo al contar consultas por estado")
}

async fn count_by_type(conn: &mut SqliteConnection) -> Result<BTreeMap<String, i64>> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT consultation_type, COUNT(*) AS cnt
        FROM consultations
        GROUP BY consultation_type
        "#,
    )
    .fetch_all(conn)
    .await
    .context("Fallo al agrupar por tipo")?;
    Ok(rows.into_iter().collect())
}

async fn count_by_status(conn: &mut SqliteConnection) -> Result<BTreeMap<String, i64>> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT COALESCE(status, 'new') AS st, COUNT(*) AS cnt
        FROM consultations
        GROUP BY st
        "#,
    )
    .fetch_all(conn)
    .await
    .context("Fallo al agrupar por estado")?;
    Ok(rows.into_iter().collect())
}
