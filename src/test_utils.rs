//! Fixtures and an in-memory store for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::db::{StoreError, TrainingStore};
use crate::models::{
    ActivityPerformanceRecord, AssessmentScore, NewPerformanceRecord, PerformanceFilter,
    PerformanceFlag, Trainee,
};

pub fn sample_trainee(email: &str) -> Trainee {
    Trainee {
        email: email.to_string(),
        full_name: "Avery Lee".to_string(),
        role: "CSR".to_string(),
        country: "PH".to_string(),
        training_start_date: None,
        coach: "Jules Moreno".to_string(),
        days_since_start: 0,
        total_assessments_required: 0,
        assessments_completed: 0,
        assessments_incomplete: 0,
        performance_flag: None,
        delay_reason: None,
        extension_days: 0,
        adjusted_end_date: None,
        notes: None,
    }
}

pub fn fixed_time(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap()
}

pub fn performance_record(
    email: &str,
    activity_id: &str,
    percentage_used: i32,
    flag: PerformanceFlag,
) -> ActivityPerformanceRecord {
    ActivityPerformanceRecord {
        id: Uuid::new_v4(),
        trainee_email: email.to_string(),
        trainee_name: None,
        role: Some("CSR".to_string()),
        activity_id: activity_id.to_string(),
        activity_title: None,
        day: Some(1),
        allocated_seconds: 100,
        actual_seconds: i64::from(percentage_used),
        percentage_used,
        performance_flag: flag,
        created_at: fixed_time(1),
    }
}

pub fn attempt(name: &str, score: f64, attempt_number: i32) -> AssessmentScore {
    AssessmentScore {
        trainee_email: "avery@example.com".to_string(),
        assessment_name: name.to_string(),
        score,
        passed: score >= 80.0,
        attempt_number,
        submitted_at: Some(fixed_time(attempt_number as u32)),
    }
}

/// Keeps records in memory with the same conflict key as the Postgres table.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<ActivityPerformanceRecord>>,
    attempts: Mutex<Vec<AssessmentScore>>,
    failing: bool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn with_attempts(attempts: Vec<AssessmentScore>) -> Self {
        Self {
            attempts: Mutex::new(attempts),
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<ActivityPerformanceRecord> {
        self.records.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TrainingStore for MemoryStore {
    async fn upsert_performance(
        &self,
        record: NewPerformanceRecord,
    ) -> Result<ActivityPerformanceRecord, StoreError> {
        self.check()?;
        let percentage_used = i32::try_from(record.outcome.percentage)
            .map_err(|_| StoreError::Corrupt(format!("percentage out of range: {}", record.outcome.percentage)))?;
        let mut records = self.records.lock().unwrap();
        let existing = records.iter().position(|r| {
            r.trainee_email == record.trainee_email && r.activity_id == record.activity_id
        });

        let stored = ActivityPerformanceRecord {
            id: existing.map(|i| records[i].id).unwrap_or_else(Uuid::new_v4),
            trainee_email: record.trainee_email,
            trainee_name: record.trainee_name,
            role: record.role,
            activity_id: record.activity_id,
            activity_title: record.activity_title,
            day: record.day,
            allocated_seconds: record.allocated_seconds,
            actual_seconds: record.actual_seconds,
            percentage_used,
            performance_flag: record.outcome.flag,
            created_at: record.completed_at,
        };

        match existing {
            Some(i) => records[i] = stored.clone(),
            None => records.push(stored.clone()),
        }
        Ok(stored)
    }

    async fn list_performance(
        &self,
        filter: &PerformanceFilter,
    ) -> Result<Vec<ActivityPerformanceRecord>, StoreError> {
        self.check()?;
        let mut matching: Vec<ActivityPerformanceRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| filter.email.as_deref().map_or(true, |e| r.trainee_email.eq_ignore_ascii_case(e)))
            .filter(|r| filter.day.map_or(true, |d| r.day == Some(d)))
            .filter(|r| filter.flag.map_or(true, |f| r.performance_flag == f))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn correct_completion(
        &self,
        activity_id: &str,
        trainee_email: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.check()?;
        let mut updated = 0;
        for record in self.records.lock().unwrap().iter_mut() {
            if record.activity_id == activity_id && record.trainee_email == trainee_email {
                record.created_at = completed_at;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn assessment_attempts(&self, trainee_email: &str) -> Result<Vec<AssessmentScore>, StoreError> {
        self.check()?;
        Ok(self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.trainee_email == trainee_email)
            .cloned()
            .collect())
    }
}
