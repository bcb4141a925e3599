//! tests/store_tests.rs
//! Pruebas de `ConsultationStore`: esquema, escrituras y conteos.

#[cfg(test)]
mod tests {
    use actix_rt::test;
    use chrono::NaiveDate;
    use sqlx::Row;
    use tempfile::tempdir;

    use crate::models::consultation_model::{ClientInfo, ReportingPeriod};
    use crate::services::consultation_store::{open_pool, ConsultationStore};
    use crate::services::intake_service::IntakeService;
    use crate::tests::{dated, memory_pool, memory_store, payload, RecordingNotifier, TEST_TZ};

    async fn columns(store_pool: &sqlx::Pool<sqlx::Sqlite>) -> Vec<String> {
        sqlx::query("PRAGMA table_info(consultations)")
            .fetch_all(store_pool)
            .await
            .expect("pragma")
            .into_iter()
            .filter_map(|r| r.try_get::<String, _>("name").ok())
            .collect()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("fecha")
    }

    #[test]
    async fn test_reconcile_is_idempotent() {
        let store = memory_store().await;
        store.reconcile_schema().await.expect("segunda vez");
        store.reconcile_schema().await.expect("tercera vez");

        store
            .insert(&dated("张三", "学生咨询", "2024-05-15 09:00:00"))
            .await
            .expect("insert");
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[test]
    async fn test_reconcile_upgrades_legacy_table() {
        let dir = tempdir().expect("tempdir");
        let db_path = dir.path().join("data").join("consultations.db");
        let pool = open_pool(&db_path).await.expect("pool");

        sqlx::query(
            r#"
            CREATE TABLE consultations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                phone TEXT NOT NULL,
                email TEXT,
                consultation_type TEXT NOT NULL,
                message TEXT,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                status TEXT DEFAULT '新提交'
            )
            "#,
        )
        .execute(&pool)
        .await
        .expect("tabla antigua");
        sqlx::query(
            "INSERT INTO consultations (name, phone, consultation_type, timestamp, status)
             VALUES ('李四', '13900000000', '家长咨询', '2024-01-02 03:04:05', '新提交')",
        )
        .execute(&pool)
        .await
        .expect("fila antigua");

        let store = ConsultationStore::new(pool.clone());
        store.reconcile_schema().await.expect("reconcile");
        store.reconcile_schema().await.expect("reconcile otra vez");

        let cols = columns(&pool).await;
        assert!(!cols.iter().any(|c| c == "phone"), "phone debió renombrarse");
        for expected in [
            "contact",
            "device_model",
            "ip_address",
            "location",
            "browser",
            "fill_duration",
        ] {
            assert!(cols.iter().any(|c| c == expected), "falta `{expected}`");
        }

        let records = store.list_all().await.expect("list");
        assert_eq!(records.len(), 1);
        let legacy = &records[0];
        assert_eq!(legacy.contact, "13900000000");
        // el estado inicial antiguo cuenta como pendiente
        assert_eq!(legacy.status, "new");
        let listing = store
            .listing(&ReportingPeriod::containing(day("2024-01-02")))
            .await
            .expect("listing");
        assert_eq!(listing.pending, 1);
        assert_eq!(legacy.submitted_at, "2024-01-02 03:04:05");
        assert_eq!(legacy.device_model, None);
        assert_eq!(legacy.fill_duration, None);

        // las filas nuevas conviven con las antiguas
        let id = store
            .insert(&dated("王五", "学生咨询", "2024-01-03 00:00:00"))
            .await
            .expect("insert");
        assert!(id > legacy.id);
    }

    #[test]
    async fn test_list_newest_first_with_increasing_ids() {
        let store = memory_store().await;
        let a = store
            .insert(&dated("a", "t", "2024-05-01 10:00:00"))
            .await
            .unwrap();
        let b = store
            .insert(&dated("b", "t", "2024-05-03 10:00:00"))
            .await
            .unwrap();
        let c = store
            .insert(&dated("c", "t", "2024-05-02 10:00:00"))
            .await
            .unwrap();
        assert!(a < b && b < c);

        let names: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["b", "c", "a"]);
    }

    #[test]
    async fn test_update_and_delete_report_affected_rows() {
        let store = memory_store().await;
        let id = store
            .insert(&dated("a", "t", "2024-05-01 10:00:00"))
            .await
            .unwrap();

        assert_eq!(store.update_status(id, "contacted").await.unwrap(), 1);
        assert_eq!(store.update_status(id + 100, "contacted").await.unwrap(), 0);

        assert_eq!(store.delete(id + 100).await.unwrap(), 0);
        assert_eq!(store.delete(id).await.unwrap(), 1);
        assert_eq!(store.delete(id).await.unwrap(), 0);
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[test]
    async fn test_period_counts() {
        let store = memory_store().await;
        for ts in [
            "2024-05-15 00:00:00",
            "2024-05-15 23:59:59",
            "2024-05-13 08:00:00",
            "2024-05-20 08:00:00",
            "2024-04-30 12:00:00",
        ] {
            store.insert(&dated("x", "t", ts)).await.unwrap();
        }

        let may = store
            .listing(&ReportingPeriod::containing(day("2024-05-15")))
            .await
            .unwrap();
        assert_eq!(may.total, 5);
        assert_eq!(may.today, 2);
        assert_eq!(may.this_week, 3);
        assert_eq!(may.this_month, 4);

        let april = store
            .listing(&ReportingPeriod::containing(day("2024-04-30")))
            .await
            .unwrap();
        assert_eq!(april.today, 1);
        assert_eq!(april.this_month, 1);
    }

    #[test]
    async fn test_group_counts() {
        let store = memory_store().await;
        store.insert(&dated("a", "学生咨询", "2024-05-01 10:00:00")).await.unwrap();
        store.insert(&dated("b", "学生咨询", "2024-05-01 11:00:00")).await.unwrap();
        let c = store.insert(&dated("c", "家长咨询", "2024-05-01 12:00:00")).await.unwrap();
        store.update_status(c, "closed").await.unwrap();

        let listing = store
            .listing(&ReportingPeriod::containing(day("2024-05-01")))
            .await
            .unwrap();
        assert_eq!(listing.type_stats.get("学生咨询"), Some(&2));
        assert_eq!(listing.type_stats.get("家长咨询"), Some(&1));
        assert_eq!(listing.status_stats.get("new"), Some(&2));
        assert_eq!(listing.status_stats.get("closed"), Some(&1));
        assert_eq!(listing.pending, 2);
    }

    #[test]
    async fn test_reconcile_rebuilds_first_release_table() {
        let dir = tempdir().expect("tempdir");
        let pool = open_pool(&dir.path().join("consultations.db"))
            .await
            .expect("pool");

        sqlx::query(
            r#"
            CREATE TABLE consultations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                city TEXT NOT NULL,
                contact TEXT NOT NULL,
                consultation_type TEXT NOT NULL,
                age_group TEXT NOT NULL,
                description TEXT NOT NULL,
                submitted_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&pool)
        .await
        .expect("tabla antigua");
        sqlx::query(
            "INSERT INTO consultations
                (id, name, city, contact, consultation_type, age_group, description, submitted_at)
             VALUES (9, '赵六', '北京', '13700000000', '家长咨询', '初中', '孩子沉迷手机', '2023-09-01 08:00:00')",
        )
        .execute(&pool)
        .await
        .expect("fila antigua");

        let store = ConsultationStore::new(pool.clone());
        store.reconcile_schema().await.expect("reconcile");
        let after_first = columns(&pool).await;
        store.reconcile_schema().await.expect("reconcile otra vez");
        assert_eq!(columns(&pool).await, after_first);

        for gone in ["description", "submitted_at"] {
            assert!(!after_first.iter().any(|c| c == gone), "`{gone}` debió migrarse");
        }
        for kept in ["city", "age_group", "message", "timestamp", "status"] {
            assert!(after_first.iter().any(|c| c == kept), "falta `{kept}`");
        }

        let records = store.list_all().await.expect("list");
        assert_eq!(records.len(), 1);
        let legacy = &records[0];
        assert_eq!(legacy.id, 9);
        assert_eq!(legacy.contact, "13700000000");
        assert_eq!(legacy.message.as_deref(), Some("孩子沉迷手机"));
        assert_eq!(legacy.submitted_at, "2023-09-01 08:00:00");
        assert_eq!(legacy.status, "new");

        let city: String = sqlx::query_scalar("SELECT city FROM consultations WHERE id = 9")
            .fetch_one(&pool)
            .await
            .expect("city");
        assert_eq!(city, "北京");

        // el alta ya no choca con las columnas NOT NULL antiguas
        let intake = IntakeService::new(store.clone(), RecordingNotifier::new(true), TEST_TZ);
        let submitted = intake
            .submit(payload("张三", "13800000000", "学生咨询"), ClientInfo::default())
            .await
            .expect("submit tras la migración");
        assert!(submitted.id > 9);
        assert_eq!(store.list_all().await.unwrap().len(), 2);
    }

    #[test]
    async fn test_reconcile_rejects_table_without_contact() {
        let pool = memory_pool().await;
        sqlx::query(
            "CREATE TABLE consultations (id INTEGER PRIMARY KEY, name TEXT NOT NULL, consultation_type TEXT NOT NULL)",
        )
        .execute(&pool)
        .await
        .expect("tabla incompleta");

        let err = ConsultationStore::new(pool)
            .reconcile_schema()
            .await
            .expect_err("sin contact no hay migración posible");
        assert!(err.to_string().contains("contact"), "{err:#}");
    }

    #[test]
    async fn test_listing_is_one_consistent_read() {
        let dir = tempdir().expect("tempdir");
        let pool = open_pool(&dir.path().join("consultations.db"))
            .await
            .expect("pool");
        let store = ConsultationStore::new(pool);
        store.reconcile_schema().await.expect("esquema");

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..40 {
                    let kind = if i % 2 == 0 { "学生咨询" } else { "家长咨询" };
                    store
                        .insert(&dated("x", kind, "2024-05-15 09:00:00"))
                        .await
                        .expect("insert concurrente");
                }
            })
        };

        let period = ReportingPeriod::containing(day("2024-05-15"));
        while !writer.is_finished() {
            let listing = store.listing(&period).await.expect("listing");
            assert_eq!(listing.total as usize, listing.consultations.len());
            assert_eq!(listing.today, listing.total);
            assert_eq!(listing.type_stats.values().sum::<i64>(), listing.total);
            assert_eq!(listing.status_stats.values().sum::<i64>(), listing.total);
        }
        writer.await.expect("writer");

        let last = store.listing(&period).await.expect("listing final");
        assert_eq!(last.total, 40);
    }
}
