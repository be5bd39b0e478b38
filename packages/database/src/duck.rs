//! Local `DuckDB`-backed [`PotholeStore`].
//!
//! Mirrors the Postgres `potholes` schema in a single `DuckDB` file (or an
//! in-memory database for tests). `duckdb::Connection` is `Send` but not
//! `Sync`, so it lives behind a `Mutex`.
//!
//! Only the primary key is indexed: `DuckDB` rewrites updates to indexed
//! columns as delete plus insert, and `geocode_status` changes constantly.
//!
//! Timestamps are generated in Rust, bound as text and cast to `TIMESTAMP`,
//! and read back as text. IDs are v4 UUIDs stored as `TEXT`.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::Connection;
use road_watch_database_models::{BackfillCandidate, CandidateQuery, NewPothole, PotholeRow};
use road_watch_geocoder_models::{GeocodeResult, GeocodeStatus};

use crate::{DbError, PotholeStore, candidate_filter, limit_clause};

const SELECT_COLUMNS: &str = "id, user_id, lat, lng, address, normalized_address, parish,
    municipality, district, postal_code, geocode_status,
    CAST(geocoded_at AS VARCHAR), description, severity, status,
    CAST(created_at AS VARCHAR)";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Pothole store over a local `DuckDB` database.
pub struct DuckDbStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for DuckDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbStore").finish_non_exhaustive()
    }
}

impl DuckDbStore {
    /// Opens (or creates) a store at `path` and creates the schema.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the file cannot be opened or the schema
    /// cannot be created.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir(parent)?;
        }

        let conn = Connection::open(path)?;
        create_schema(&conn)?;
        log::debug!("Opened DuckDB store at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens the store at the default `data/road_watch.duckdb` path.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open_default() -> Result<Self, DbError> {
        Self::open(&crate::paths::potholes_db_path())
    }

    /// Opens a throwaway in-memory store.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        create_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn acquire(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    /// Inserts a report with an explicit creation time.
    ///
    /// Used when importing historical reports, where candidate ordering
    /// must follow the original submission time.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the insert fails.
    pub fn insert_pothole_at(
        &self,
        new: &NewPothole,
        created_at: DateTime<Utc>,
    ) -> Result<PotholeRow, DbError> {
        let id = uuid::Uuid::new_v4().to_string();
        let geocode = new.resolved_geocode();
        let status = new.geocode_status();
        let geocoded_at = geocode.map(|_| format_timestamp(Utc::now()));

        {
            let conn = self.acquire()?;
            conn.execute(
                "INSERT INTO potholes
                    (id, user_id, lat, lng, address, normalized_address, parish, municipality,
                     district, postal_code, geocode_status, geocoded_at, description, severity,
                     status, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CAST(? AS TIMESTAMP), ?, ?, ?,
                     CAST(? AS TIMESTAMP))",
                duckdb::params![
                    id,
                    new.user_id,
                    new.lat,
                    new.lng,
                    new.effective_address(),
                    geocode.map(|g| g.normalized_address.clone()),
                    geocode.and_then(|g| g.parish.clone()),
                    geocode.and_then(|g| g.municipality.clone()),
                    geocode.and_then(|g| g.district.clone()),
                    geocode.and_then(|g| g.postal_code.clone()),
                    status.as_ref(),
                    geocoded_at,
                    new.description,
                    new.severity.as_ref(),
                    road_watch_database_models::ReportStatus::default().as_ref(),
                    format_timestamp(created_at),
                ],
            )?;
        }

        self.fetch(&id)?.ok_or(DbError::NotFound { id })
    }

    fn fetch(&self, id: &str) -> Result<Option<PotholeRow>, DbError> {
        let conn = self.acquire()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM potholes WHERE id = ?"
        ))?;
        let result = stmt.query_row([id], row_to_pothole);
        match result {
            Ok(row) => Ok(Some(row)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DbError::DuckDb(e)),
        }
    }

    fn update(&self, id: &str, sql: &str, params: &[&dyn duckdb::ToSql]) -> Result<(), DbError> {
        let conn = self.acquire()?;
        let affected = conn.execute(sql, params)?;
        if affected == 0 {
            return Err(DbError::NotFound { id: id.to_string() });
        }
        Ok(())
    }
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS potholes (
            id TEXT PRIMARY KEY,
            user_id TEXT,
            lat DOUBLE NOT NULL,
            lng DOUBLE NOT NULL,
            address TEXT,
            normalized_address TEXT,
            parish TEXT,
            municipality TEXT,
            district TEXT,
            postal_code TEXT,
            geocode_status TEXT NOT NULL DEFAULT 'pending'
                CHECK (geocode_status IN ('pending', 'resolved', 'failed', 'manual')),
            geocoded_at TIMESTAMP,
            description TEXT,
            severity TEXT NOT NULL DEFAULT 'moderate'
                CHECK (severity IN ('low', 'moderate', 'high')),
            status TEXT NOT NULL DEFAULT 'reported'
                CHECK (status IN ('reported', 'repairing', 'repaired', 'archived')),
            created_at TIMESTAMP NOT NULL
        );",
    )?;
    Ok(())
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a `DuckDB` timestamp string into a UTC `DateTime`.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
    }

    log::warn!("Failed to parse timestamp: {s:?}");
    None
}

fn row_to_pothole(row: &duckdb::Row<'_>) -> duckdb::Result<PotholeRow> {
    let status: String = row.get(10)?;
    let geocoded_at: Option<String> = row.get(11)?;
    let severity: String = row.get(13)?;
    let report_status: String = row.get(14)?;
    let created_at: String = row.get(15)?;

    Ok(PotholeRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        lat: row.get(2)?,
        lng: row.get(3)?,
        address: row.get(4)?,
        normalized_address: row.get(5)?,
        parish: row.get(6)?,
        municipality: row.get(7)?,
        district: row.get(8)?,
        postal_code: row.get(9)?,
        geocode_status: status.parse().unwrap_or_default(),
        geocoded_at: geocoded_at.as_deref().and_then(parse_timestamp),
        description: row.get(12)?,
        severity: severity.parse().unwrap_or_default(),
        status: report_status.parse().unwrap_or_default(),
        created_at: parse_timestamp(&created_at).unwrap_or_default(),
    })
}

#[async_trait]
impl PotholeStore for DuckDbStore {
    async fn ensure_schema(&self) -> Result<(), DbError> {
        let conn = self.acquire()?;
        create_schema(&conn)
    }

    async fn insert_pothole(&self, new: &NewPothole) -> Result<PotholeRow, DbError> {
        self.insert_pothole_at(new, Utc::now())
    }

    async fn get_pothole(&self, id: &str) -> Result<Option<PotholeRow>, DbError> {
        self.fetch(id)
    }

    async fn list_potholes(&self, limit: Option<u32>) -> Result<Vec<PotholeRow>, DbError> {
        let conn = self.acquire()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM potholes
             ORDER BY created_at DESC{}",
            limit_clause(limit.map(u64::from)),
        ))?;
        let rows = stmt.query_map([], row_to_pothole)?;

        let mut potholes = Vec::new();
        for row in rows {
            potholes.push(row?);
        }
        Ok(potholes)
    }

    async fn backfill_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<BackfillCandidate>, DbError> {
        let conn = self.acquire()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, lat, lng, parish, geocode_status
             FROM potholes
             WHERE {}
             ORDER BY created_at ASC{}",
            candidate_filter(query),
            limit_clause(query.effective_limit()),
        ))?;

        let rows = stmt.query_map([], |row| {
            let status: String = row.get(4)?;
            Ok(BackfillCandidate {
                id: row.get(0)?,
                lat: row.get(1)?,
                lng: row.get(2)?,
                parish: row.get(3)?,
                geocode_status: status.parse().unwrap_or_default(),
            })
        })?;

        let mut candidates = Vec::new();
        for row in rows {
            candidates.push(row?);
        }
        Ok(candidates)
    }

    async fn mark_geocode_failed(&self, id: &str) -> Result<(), DbError> {
        let now = format_timestamp(Utc::now());
        self.update(
            id,
            "UPDATE potholes
             SET geocode_status = 'failed', geocoded_at = CAST(? AS TIMESTAMP)
             WHERE id = ?",
            duckdb::params![now, id],
        )
    }

    async fn apply_geocode(&self, id: &str, result: &GeocodeResult) -> Result<(), DbError> {
        let now = format_timestamp(Utc::now());
        self.update(
            id,
            "UPDATE potholes
             SET address = coalesce(nullif(trim(address), ''), ?),
                 normalized_address = ?,
                 parish = ?,
                 municipality = ?,
                 district = ?,
                 postal_code = ?,
                 geocode_status = 'resolved',
                 geocoded_at = CAST(? AS TIMESTAMP)
             WHERE id = ?",
            duckdb::params![
                result.display_address,
                result.normalized_address,
                result.parish,
                result.municipality,
                result.district,
                result.postal_code,
                now,
                id,
            ],
        )
    }

    async fn set_manual_geocode(&self, id: &str, result: &GeocodeResult) -> Result<(), DbError> {
        let now = format_timestamp(Utc::now());
        self.update(
            id,
            "UPDATE potholes
             SET address = ?,
                 normalized_address = ?,
                 parish = ?,
                 municipality = ?,
                 district = ?,
                 postal_code = ?,
                 geocode_status = ?,
                 geocoded_at = CAST(? AS TIMESTAMP)
             WHERE id = ?",
            duckdb::params![
                result.display_address,
                result.normalized_address,
                result.parish,
                result.municipality,
                result.district,
                result.postal_code,
                GeocodeStatus::Manual.as_ref(),
                now,
                id,
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use road_watch_database_models::{ReportStatus, Severity};

    use super::*;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, minute, 0).unwrap()
    }

    fn report(lat: f64, lng: f64) -> NewPothole {
        NewPothole {
            lat,
            lng,
            ..Default::default()
        }
    }

    fn lisbon() -> GeocodeResult {
        GeocodeResult {
            display_address: "Rua Augusta, Santa Maria Maior, Lisboa, Portugal".to_string(),
            normalized_address: "Rua Augusta, Santa Maria Maior, Lisboa, 1100-048, Lisboa"
                .to_string(),
            parish: Some("Santa Maria Maior".to_string()),
            municipality: Some("Lisboa".to_string()),
            district: Some("Lisboa".to_string()),
            postal_code: Some("1100-048".to_string()),
        }
    }

    fn set_state(store: &DuckDbStore, id: &str, status: &str, attempted: bool) {
        let conn = store.conn.lock().unwrap();
        let geocoded_at = attempted.then(|| "2025-03-02 00:00:00".to_string());
        conn.execute(
            "UPDATE potholes SET geocode_status = ?, geocoded_at = CAST(? AS TIMESTAMP)
             WHERE id = ?",
            duckdb::params![status, geocoded_at, id],
        )
        .unwrap();
    }

    fn ids(candidates: &[BackfillCandidate]) -> Vec<String> {
        candidates.iter().map(|c| c.id.clone()).collect()
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let store = DuckDbStore::open_in_memory().unwrap();
        let new = NewPothole {
            user_id: Some("user-1".to_string()),
            description: Some("Buraco fundo".to_string()),
            severity: Severity::High,
            ..report(38.7101, -9.1366)
        };

        let row = store.insert_pothole(&new).await.unwrap();
        assert_eq!(row.geocode_status, GeocodeStatus::Pending);
        assert_eq!(row.geocoded_at, None);
        assert_eq!(row.severity, Severity::High);

        let fetched = store.get_pothole(&row.id).await.unwrap().unwrap();
        assert_eq!(fetched, row);
        assert!(store.get_pothole("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resolved_submission_is_stamped() {
        let store = DuckDbStore::open_in_memory().unwrap();
        let new = NewPothole {
            geocode: Some(lisbon()),
            ..report(38.7101, -9.1366)
        };

        let row = store.insert_pothole(&new).await.unwrap();
        assert_eq!(row.geocode_status, GeocodeStatus::Resolved);
        assert!(row.geocoded_at.is_some());
        assert_eq!(row.parish.as_deref(), Some("Santa Maria Maior"));
        assert_eq!(
            row.address.as_deref(),
            Some("Rua Augusta, Santa Maria Maior, Lisboa, Portugal")
        );
    }

    #[tokio::test]
    async fn candidates_follow_selection_rules() {
        let store = DuckDbStore::open_in_memory().unwrap();

        let pending = store.insert_pothole_at(&report(38.7, -9.1), at(1)).unwrap();
        let resolved = store
            .insert_pothole_at(
                &NewPothole {
                    geocode: Some(lisbon()),
                    ..report(38.71, -9.13)
                },
                at(2),
            )
            .unwrap();
        let failed_attempted = store.insert_pothole_at(&report(40.4, -3.7), at(3)).unwrap();
        set_state(&store, &failed_attempted.id, "failed", true);
        let failed_never = store.insert_pothole_at(&report(41.1, -8.6), at(4)).unwrap();
        set_state(&store, &failed_never.id, "failed", false);
        let manual = store.insert_pothole_at(&report(41.2, -8.6), at(5)).unwrap();
        set_state(&store, &manual.id, "manual", true);

        let candidates = store
            .backfill_candidates(&CandidateQuery::default())
            .await
            .unwrap();
        assert_eq!(ids(&candidates), vec![pending.id.clone(), failed_never.id.clone()]);
        assert!(!ids(&candidates).contains(&resolved.id));

        let retry = store
            .backfill_candidates(&CandidateQuery {
                limit: None,
                retry_failed: true,
            })
            .await
            .unwrap();
        assert_eq!(
            ids(&retry),
            vec![pending.id, failed_attempted.id, failed_never.id]
        );
    }

    #[tokio::test]
    async fn resolved_without_parish_is_a_candidate() {
        let store = DuckDbStore::open_in_memory().unwrap();
        let mut geocode = lisbon();
        geocode.parish = Some("  ".to_string());
        let row = store
            .insert_pothole_at(
                &NewPothole {
                    geocode: Some(geocode),
                    ..report(38.71, -9.13)
                },
                at(1),
            )
            .unwrap();

        let candidates = store
            .backfill_candidates(&CandidateQuery::default())
            .await
            .unwrap();
        assert_eq!(ids(&candidates), vec![row.id]);
    }

    #[tokio::test]
    async fn candidates_are_oldest_first_and_limited() {
        let store = DuckDbStore::open_in_memory().unwrap();
        let newest = store.insert_pothole_at(&report(38.0, -9.0), at(30)).unwrap();
        let oldest = store.insert_pothole_at(&report(38.1, -9.0), at(10)).unwrap();
        let middle = store.insert_pothole_at(&report(38.2, -9.0), at(20)).unwrap();

        let all = store
            .backfill_candidates(&CandidateQuery {
                limit: Some(0),
                retry_failed: false,
            })
            .await
            .unwrap();
        assert_eq!(ids(&all), vec![oldest.id.clone(), middle.id.clone(), newest.id]);

        let two = store
            .backfill_candidates(&CandidateQuery {
                limit: Some(2),
                retry_failed: false,
            })
            .await
            .unwrap();
        assert_eq!(ids(&two), vec![oldest.id, middle.id]);
    }

    #[tokio::test]
    async fn apply_geocode_keeps_typed_address() {
        let store = DuckDbStore::open_in_memory().unwrap();
        let typed = store
            .insert_pothole(&NewPothole {
                address: Some("Em frente ao café".to_string()),
                ..report(38.71, -9.13)
            })
            .await
            .unwrap();
        let blank = store.insert_pothole(&report(38.72, -9.13)).await.unwrap();

        store.apply_geocode(&typed.id, &lisbon()).await.unwrap();
        store.apply_geocode(&blank.id, &lisbon()).await.unwrap();

        let typed = store.get_pothole(&typed.id).await.unwrap().unwrap();
        assert_eq!(typed.address.as_deref(), Some("Em frente ao café"));
        assert_eq!(typed.geocode_status, GeocodeStatus::Resolved);
        assert_eq!(typed.municipality.as_deref(), Some("Lisboa"));
        assert_eq!(typed.postal_code.as_deref(), Some("1100-048"));
        assert!(typed.geocoded_at.is_some());

        let blank = store.get_pothole(&blank.id).await.unwrap().unwrap();
        assert_eq!(
            blank.address.as_deref(),
            Some("Rua Augusta, Santa Maria Maior, Lisboa, Portugal")
        );
    }

    #[tokio::test]
    async fn mark_failed_stamps_attempt() {
        let store = DuckDbStore::open_in_memory().unwrap();
        let row = store.insert_pothole(&report(40.4168, -3.7038)).await.unwrap();

        store.mark_geocode_failed(&row.id).await.unwrap();

        let row = store.get_pothole(&row.id).await.unwrap().unwrap();
        assert_eq!(row.geocode_status, GeocodeStatus::Failed);
        assert!(row.geocoded_at.is_some());
        assert!(row.municipality.is_none());

        assert!(
            store
                .backfill_candidates(&CandidateQuery::default())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn manual_override_removes_candidate() {
        let store = DuckDbStore::open_in_memory().unwrap();
        let row = store.insert_pothole(&report(38.71, -9.13)).await.unwrap();

        store.set_manual_geocode(&row.id, &lisbon()).await.unwrap();

        let row = store.get_pothole(&row.id).await.unwrap().unwrap();
        assert_eq!(row.geocode_status, GeocodeStatus::Manual);
        assert!(
            store
                .backfill_candidates(&CandidateQuery {
                    limit: None,
                    retry_failed: true,
                })
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn updates_on_missing_rows_fail() {
        let store = DuckDbStore::open_in_memory().unwrap();
        assert!(matches!(
            store.mark_geocode_failed("nope").await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            store.apply_geocode("nope", &lisbon()).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = DuckDbStore::open_in_memory().unwrap();
        let old = store.insert_pothole_at(&report(38.0, -9.0), at(1)).unwrap();
        let new = store.insert_pothole_at(&report(38.1, -9.0), at(2)).unwrap();

        let rows = store.list_potholes(Some(10)).await.unwrap();
        assert_eq!(
            rows.iter().map(|r| r.id.clone()).collect::<Vec<_>>(),
            vec![new.id, old.id.clone()]
        );
        assert_eq!(rows[1].created_at, at(1));

        let one = store.list_potholes(Some(1)).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(store.list_potholes(None).await.unwrap().len(), 2);
        assert_eq!(store.list_potholes(Some(0)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn list_includes_archived_reports() {
        let store = DuckDbStore::open_in_memory().unwrap();
        let row = store.insert_pothole(&report(38.7, -9.1)).await.unwrap();
        store
            .conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE potholes SET status = 'archived' WHERE id = ?",
                duckdb::params![row.id],
            )
            .unwrap();

        let rows = store.list_potholes(Some(10)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, row.id);
        assert_eq!(rows[0].status, ReportStatus::Archived);
    }

    #[test]
    fn schema_rejects_unknown_report_status() {
        let store = DuckDbStore::open_in_memory().unwrap();
        let conn = store.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO potholes (id, lat, lng, status, created_at)
             VALUES ('x', 38.7, -9.1, 'deleted', CAST('2025-03-01 12:00:00' AS TIMESTAMP))",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn parses_duckdb_timestamps() {
        assert_eq!(parse_timestamp("2025-03-01 12:01:00"), Some(at(1)));
        assert_eq!(parse_timestamp("2025-03-01 12:01:00.000000"), Some(at(1)));
        assert_eq!(parse_timestamp("garbage"), None);
    }
}
