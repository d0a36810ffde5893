use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::models::{
    ActivityPerformanceRecord, AssessmentScore, NewPerformanceRecord, PerformanceFilter,
    PerformanceFlag,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unreadable stored value: {0}")]
    Corrupt(String),
}

/// Persistence used by the scoring service.
#[async_trait]
pub trait TrainingStore: Send + Sync {
    /// Inserts or replaces the record for (trainee email, activity id).
    async fn upsert_performance(
        &self,
        record: NewPerformanceRecord,
    ) -> Result<ActivityPerformanceRecord, StoreError>;

    /// Newest first.
    async fn list_performance(
        &self,
        filter: &PerformanceFilter,
    ) -> Result<Vec<ActivityPerformanceRecord>, StoreError>;

    /// Rewrites the completion time; returns the number of rows touched.
    async fn correct_completion(
        &self,
        activity_id: &str,
        trainee_email: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    async fn assessment_attempts(&self, trainee_email: &str) -> Result<Vec<AssessmentScore>, StoreError>;
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to run migrations")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PgTrainingStore {
    pool: PgPool,
}

impl PgTrainingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PERFORMANCE_COLUMNS: &str = "id, trainee_email, trainee_name, role, activity_id, \
     activity_title, day, allocated_seconds, actual_seconds, percentage_used, \
     performance_flag, created_at";

fn performance_from_row(row: &PgRow) -> Result<ActivityPerformanceRecord, StoreError> {
    let flag: String = row.try_get("performance_flag")?;
    Ok(ActivityPerformanceRecord {
        id: row.try_get("id")?,
        trainee_email: row.try_get("trainee_email")?,
        trainee_name: row.try_get("trainee_name")?,
        role: row.try_get("role")?,
        activity_id: row.try_get("activity_id")?,
        activity_title: row.try_get("activity_title")?,
        day: row.try_get("day")?,
        allocated_seconds: row.try_get("allocated_seconds")?,
        actual_seconds: row.try_get("actual_seconds")?,
        percentage_used: row.try_get("percentage_used")?,
        performance_flag: flag.parse::<PerformanceFlag>().map_err(StoreError::Corrupt)?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl TrainingStore for PgTrainingStore {
    async fn upsert_performance(
        &self,
        record: NewPerformanceRecord,
    ) -> Result<ActivityPerformanceRecord, StoreError> {
        let query = format!(
            r#"
            INSERT INTO training_scoring.activity_performance
            (id, trainee_email, trainee_name, role, activity_id, activity_title, day,
             allocated_seconds, actual_seconds, percentage_used, performance_flag, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (trainee_email, activity_id) DO UPDATE
            SET trainee_name = EXCLUDED.trainee_name,
                role = EXCLUDED.role,
                activity_title = EXCLUDED.activity_title,
                day = EXCLUDED.day,
                allocated_seconds = EXCLUDED.allocated_seconds,
                actual_seconds = EXCLUDED.actual_seconds,
                percentage_used = EXCLUDED.percentage_used,
                performance_flag = EXCLUDED.performance_flag,
                created_at = EXCLUDED.created_at
            RETURNING {PERFORMANCE_COLUMNS}
            "#
        );

        let percentage_used = i32::try_from(record.outcome.percentage)
            .map_err(|_| StoreError::Corrupt(format!("percentage out of range: {}", record.outcome.percentage)))?;

        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(&record.trainee_email)
            .bind(&record.trainee_name)
            .bind(&record.role)
            .bind(&record.activity_id)
            .bind(&record.activity_title)
            .bind(record.day)
            .bind(record.allocated_seconds)
            .bind(record.actual_seconds)
            .bind(percentage_used)
            .bind(record.outcome.flag.as_str())
            .bind(record.completed_at)
            .fetch_one(&self.pool)
            .await?;

        performance_from_row(&row)
    }

    async fn list_performance(
        &self,
        filter: &PerformanceFilter,
    ) -> Result<Vec<ActivityPerformanceRecord>, StoreError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {PERFORMANCE_COLUMNS} FROM training_scoring.activity_performance WHERE TRUE"
        ));

        if let Some(email) = filter.email.as_deref() {
            builder.push(" AND lower(trainee_email) = lower(").push_bind(email).push(")");
        }
        if let Some(day) = filter.day {
            builder.push(" AND day = ").push_bind(day);
        }
        if let Some(flag) = filter.flag {
            builder.push(" AND performance_flag = ").push_bind(flag.as_str());
        }
        builder.push(" ORDER BY created_at DESC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(performance_from_row).collect()
    }

    async fn correct_completion(
        &self,
        activity_id: &str,
        trainee_email: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE training_scoring.activity_performance
            SET created_at = $1
            WHERE activity_id = $2 AND trainee_email = $3
            "#,
        )
        .bind(completed_at)
        .bind(activity_id)
        .bind(trainee_email)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn assessment_attempts(&self, trainee_email: &str) -> Result<Vec<AssessmentScore>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT trainee_email, assessment_name, score, passed, attempt_number, submitted_at
            FROM training_scoring.assessment_scores
            WHERE trainee_email = $1
            ORDER BY assessment_name, attempt_number
            "#,
        )
        .bind(trainee_email)
        .fetch_all(&self.pool)
        .await?;

        let mut attempts = Vec::new();
        for row in rows {
            attempts.push(AssessmentScore {
                trainee_email: row.try_get("trainee_email")?,
                assessment_name: row.try_get("assessment_name")?,
                score: row.try_get("score")?,
                passed: row.try_get("passed")?,
                attempt_number: row.try_get("attempt_number")?,
                submitted_at: row.try_get("submitted_at")?,
            });
        }
        Ok(attempts)
    }
}

/// Loads assessment attempts from a CSV export. Attempts already stored are
/// skipped. Returns the number of new rows.
pub async fn import_scores_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        trainee_email: String,
        assessment_name: String,
        score: f64,
        passed: bool,
        attempt_number: i32,
        submitted_at: Option<DateTime<Utc>>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid row {}", index + 1))?;
        if !(0.0..=100.0).contains(&row.score) {
            anyhow::bail!("row {}: score {} is outside 0..=100", index + 1, row.score);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO training_scoring.assessment_scores
            (id, trainee_email, assessment_name, score, passed, attempt_number, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, NOW()))
            ON CONFLICT (trainee_email, assessment_name, attempt_number) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.trainee_email.trim())
        .bind(row.assessment_name.trim())
        .bind(row.score)
        .bind(row.passed)
        .bind(row.attempt_number)
        .bind(row.submitted_at)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    tracing::info!(inserted, path = %csv_path.display(), "assessment scores imported");
    Ok(inserted)
}
