//! Postgres-backed [`PotholeStore`].
//!
//! All statements go through `query_raw_params()` with positional
//! parameters. UUIDs cross the driver boundary as text and are
//! cast in SQL; timestamps are read back as UTC `NaiveDateTime`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use moosicbox_json_utils::database::ToValue as _;
use road_watch_database_models::{
    BackfillCandidate, CandidateQuery, NewPothole, PotholeRow, ReportStatus, Severity,
};
use road_watch_geocoder_models::{GeocodeResult, GeocodeStatus};
use switchy_database::{Database, DatabaseValue};

use crate::{DbError, PotholeStore, candidate_filter, canonical_id, limit_clause};

const SELECT_COLUMNS: &str = "id::text AS id, user_id, lat, lng, address, normalized_address,
    parish, municipality, district, postal_code, geocode_status,
    (geocoded_at AT TIME ZONE 'UTC') AS geocoded_at, description, severity, status,
    (created_at AT TIME ZONE 'UTC') AS created_at";

const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE EXTENSION IF NOT EXISTS pgcrypto",
    "CREATE TABLE IF NOT EXISTS public.potholes (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        user_id TEXT,
        lat DOUBLE PRECISION NOT NULL,
        lng DOUBLE PRECISION NOT NULL,
        address TEXT,
        normalized_address TEXT,
        parish TEXT,
        municipality TEXT,
        district TEXT,
        postal_code TEXT,
        geocode_status TEXT NOT NULL DEFAULT 'pending'
            CHECK (geocode_status IN ('pending', 'resolved', 'failed', 'manual')),
        geocoded_at TIMESTAMPTZ,
        description TEXT,
        severity TEXT NOT NULL DEFAULT 'moderate'
            CHECK (severity IN ('low', 'moderate', 'high')),
        status TEXT NOT NULL DEFAULT 'reported'
            CHECK (status IN ('reported', 'repairing', 'repaired', 'archived')),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS idx_potholes_geocode_status ON public.potholes (geocode_status)",
    "CREATE INDEX IF NOT EXISTS idx_potholes_municipality ON public.potholes (municipality)",
    "CREATE INDEX IF NOT EXISTS idx_potholes_district ON public.potholes (district)",
];

/// Pothole store over a `switchy_database` Postgres connection.
pub struct PostgresStore {
    db: Box<dyn Database>,
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore").finish_non_exhaustive()
    }
}

impl PostgresStore {
    /// Wraps an open connection.
    #[must_use]
    pub fn new(db: Box<dyn Database>) -> Self {
        Self { db }
    }
}

fn opt_string(value: Option<&str>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, |v| DatabaseValue::String(v.to_string()))
}

fn to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc)
}

fn row_to_pothole(row: &switchy_database::Row) -> Result<PotholeRow, DbError> {
    let id: String = row.to_value("id").map_err(|e| DbError::Conversion {
        message: format!("Failed to read pothole id: {e}"),
    })?;

    let status_str: String = row.to_value("geocode_status").unwrap_or_default();
    let severity_str: String = row.to_value("severity").unwrap_or_default();
    let report_str: String = row.to_value("status").unwrap_or_default();
    let geocoded_at: Option<NaiveDateTime> = row.to_value("geocoded_at").unwrap_or(None);
    let created_at: NaiveDateTime = row.to_value("created_at").unwrap_or_default();

    Ok(PotholeRow {
        id,
        user_id: row.to_value("user_id").unwrap_or(None),
        lat: row.to_value("lat").unwrap_or(f64::NAN),
        lng: row.to_value("lng").unwrap_or(f64::NAN),
        address: row.to_value("address").unwrap_or(None),
        normalized_address: row.to_value("normalized_address").unwrap_or(None),
        parish: row.to_value("parish").unwrap_or(None),
        municipality: row.to_value("municipality").unwrap_or(None),
        district: row.to_value("district").unwrap_or(None),
        postal_code: row.to_value("postal_code").unwrap_or(None),
        geocode_status: status_str.parse().unwrap_or_default(),
        geocoded_at: geocoded_at.map(to_utc),
        description: row.to_value("description").unwrap_or(None),
        severity: severity_str.parse::<Severity>().unwrap_or_default(),
        status: report_str.parse::<ReportStatus>().unwrap_or_default(),
        created_at: to_utc(created_at),
    })
}

fn row_to_candidate(row: &switchy_database::Row) -> Result<BackfillCandidate, DbError> {
    let id: String = row.to_value("id").map_err(|e| DbError::Conversion {
        message: format!("Failed to read candidate id: {e}"),
    })?;
    let status_str: String = row.to_value("geocode_status").unwrap_or_default();

    Ok(BackfillCandidate {
        id,
        lat: row.to_value("lat").unwrap_or(f64::NAN),
        lng: row.to_value("lng").unwrap_or(f64::NAN),
        parish: row.to_value("parish").unwrap_or(None),
        geocode_status: status_str.parse().unwrap_or_default(),
    })
}

#[async_trait]
impl PotholeStore for PostgresStore {
    async fn ensure_schema(&self) -> Result<(), DbError> {
        for stmt in SCHEMA_STATEMENTS {
            self.db.exec_raw(stmt).await?;
        }
        log::info!("Postgres schema ready");
        Ok(())
    }

    async fn insert_pothole(&self, new: &NewPothole) -> Result<PotholeRow, DbError> {
        let geocode = new.resolved_geocode();
        let status = new.geocode_status();
        let address = new.effective_address();

        let sql = format!(
            "INSERT INTO public.potholes
                (user_id, lat, lng, address, normalized_address, parish, municipality,
                 district, postal_code, geocode_status, geocoded_at, description, severity)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                 CASE WHEN $10 = 'resolved' THEN now() END, $11, $12)
             RETURNING {SELECT_COLUMNS}"
        );

        let rows = self
            .db
            .query_raw_params(
                &sql,
                &[
                    opt_string(new.user_id.as_deref()),
                    DatabaseValue::Real64(new.lat),
                    DatabaseValue::Real64(new.lng),
                    opt_string(address.as_deref()),
                    opt_string(geocode.map(|g| g.normalized_address.as_str())),
                    opt_string(geocode.and_then(|g| g.parish.as_deref())),
                    opt_string(geocode.and_then(|g| g.municipality.as_deref())),
                    opt_string(geocode.and_then(|g| g.district.as_deref())),
                    opt_string(geocode.and_then(|g| g.postal_code.as_deref())),
                    DatabaseValue::String(status.to_string()),
                    opt_string(new.description.as_deref()),
                    DatabaseValue::String(new.severity.to_string()),
                ],
            )
            .await?;

        let row = rows.first().ok_or_else(|| DbError::Conversion {
            message: "INSERT ... RETURNING produced no row".to_string(),
        })?;

        row_to_pothole(row)
    }

    async fn get_pothole(&self, id: &str) -> Result<Option<PotholeRow>, DbError> {
        let Some(uuid) = canonical_id(id) else {
            return Ok(None);
        };
        let sql = format!("SELECT {SELECT_COLUMNS} FROM public.potholes WHERE id = $1::uuid");
        let rows = self
            .db
            .query_raw_params(&sql, &[DatabaseValue::String(uuid)])
            .await?;

        rows.first().map(row_to_pothole).transpose()
    }

    async fn list_potholes(&self, limit: Option<u32>) -> Result<Vec<PotholeRow>, DbError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM public.potholes
             ORDER BY created_at DESC{}",
            limit_clause(limit.map(u64::from)),
        );
        let rows = self.db.query_raw_params(&sql, &[]).await?;

        rows.iter().map(row_to_pothole).collect()
    }

    async fn backfill_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<BackfillCandidate>, DbError> {
        let sql = format!(
            "SELECT id::text AS id, lat, lng, parish, geocode_status
             FROM public.potholes
             WHERE {}
             ORDER BY created_at ASC{}",
            candidate_filter(query),
            limit_clause(query.effective_limit()),
        );
        let rows = self.db.query_raw_params(&sql, &[]).await?;

        rows.iter().map(row_to_candidate).collect()
    }

    async fn mark_geocode_failed(&self, id: &str) -> Result<(), DbError> {
        let uuid = canonical_id(id).ok_or_else(|| DbError::NotFound { id: id.to_string() })?;
        let rows = self
            .db
            .query_raw_params(
                "UPDATE public.potholes
                 SET geocode_status = 'failed', geocoded_at = now()
                 WHERE id = $1::uuid
                 RETURNING id::text AS id",
                &[DatabaseValue::String(uuid)],
            )
            .await?;

        if rows.is_empty() {
            return Err(DbError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    async fn apply_geocode(&self, id: &str, result: &GeocodeResult) -> Result<(), DbError> {
        let uuid = canonical_id(id).ok_or_else(|| DbError::NotFound { id: id.to_string() })?;
        let rows = self
            .db
            .query_raw_params(
                "UPDATE public.potholes
                 SET address = coalesce(nullif(trim(address), ''), $2),
                     normalized_address = $3,
                     parish = $4,
                     municipality = $5,
                     district = $6,
                     postal_code = $7,
                     geocode_status = 'resolved',
                     geocoded_at = now()
                 WHERE id = $1::uuid
                 RETURNING id::text AS id",
                &[
                    DatabaseValue::String(uuid),
                    DatabaseValue::String(result.display_address.clone()),
                    DatabaseValue::String(result.normalized_address.clone()),
                    opt_string(result.parish.as_deref()),
                    opt_string(result.municipality.as_deref()),
                    opt_string(result.district.as_deref()),
                    opt_string(result.postal_code.as_deref()),
                ],
            )
            .await?;

        if rows.is_empty() {
            return Err(DbError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    async fn set_manual_geocode(&self, id: &str, result: &GeocodeResult) -> Result<(), DbError> {
        let uuid = canonical_id(id).ok_or_else(|| DbError::NotFound { id: id.to_string() })?;
        let rows = self
            .db
            .query_raw_params(
                "UPDATE public.potholes
                 SET address = $2,
                     normalized_address = $3,
                     parish = $4,
                     municipality = $5,
                     district = $6,
                     postal_code = $7,
                     geocode_status = $8,
                     geocoded_at = now()
                 WHERE id = $1::uuid
                 RETURNING id::text AS id",
                &[
                    DatabaseValue::String(uuid),
                    DatabaseValue::String(result.display_address.clone()),
                    DatabaseValue::String(result.normalized_address.clone()),
                    opt_string(result.parish.as_deref()),
                    opt_string(result.municipality.as_deref()),
                    opt_string(result.district.as_deref()),
                    opt_string(result.postal_code.as_deref()),
                    DatabaseValue::String(GeocodeStatus::Manual.to_string()),
                ],
            )
            .await?;

        if rows.is_empty() {
            return Err(DbError::NotFound { id: id.to_string() });
        }
        Ok(())
    }
}
