use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status reported by the upstream roster for a trainee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportedStatus {
    Critical,
    AtRisk,
    OnTrack,
    /// Free text that did not match an explicit tag.
    Legacy(String),
}

impl ReportedStatus {
    /// Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let tag = trimmed.to_ascii_lowercase().replace(['_', ' '], "-");
        let status = match tag.as_str() {
            "critical" => ReportedStatus::Critical,
            "at-risk" => ReportedStatus::AtRisk,
            "on-track" => ReportedStatus::OnTrack,
            _ => ReportedStatus::Legacy(trimmed.to_string()),
        };
        Some(status)
    }
}

impl Serialize for ReportedStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            ReportedStatus::Critical => serializer.serialize_str("critical"),
            ReportedStatus::AtRisk => serializer.serialize_str("at-risk"),
            ReportedStatus::OnTrack => serializer.serialize_str("on-track"),
            ReportedStatus::Legacy(text) => serializer.serialize_str(text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLevel {
    Critical,
    AtRisk,
    OnTrack,
    Unknown,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "critical",
            RiskLevel::AtRisk => "at-risk",
            RiskLevel::OnTrack => "on-track",
            RiskLevel::Unknown => "unknown",
        }
    }

    /// Lower ranks need attention first.
    pub fn attention_rank(&self) -> u8 {
        match self {
            RiskLevel::Critical => 0,
            RiskLevel::AtRisk => 1,
            RiskLevel::Unknown => 2,
            RiskLevel::OnTrack => 3,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceFlag {
    Fast,
    OnTime,
    Slow,
    Struggling,
}

impl PerformanceFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceFlag::Fast => "fast",
            PerformanceFlag::OnTime => "on_time",
            PerformanceFlag::Slow => "slow",
            PerformanceFlag::Struggling => "struggling",
        }
    }
}

impl fmt::Display for PerformanceFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PerformanceFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(PerformanceFlag::Fast),
            "on_time" => Ok(PerformanceFlag::OnTime),
            "slow" => Ok(PerformanceFlag::Slow),
            "struggling" => Ok(PerformanceFlag::Struggling),
            other => Err(format!("unknown performance flag: {other}")),
        }
    }
}

/// Read-only snapshot of a roster row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trainee {
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub country: String,
    pub training_start_date: Option<NaiveDate>,
    pub coach: String,
    pub days_since_start: i64,
    pub total_assessments_required: u32,
    pub assessments_completed: u32,
    pub assessments_incomplete: u32,
    pub performance_flag: Option<ReportedStatus>,
    pub delay_reason: Option<String>,
    pub extension_days: i64,
    pub adjusted_end_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceOutcome {
    pub percentage: i64,
    pub flag: PerformanceFlag,
}

#[derive(Debug, Clone)]
pub struct NewPerformanceRecord {
    pub trainee_email: String,
    pub trainee_name: Option<String>,
    pub role: Option<String>,
    pub activity_id: String,
    pub activity_title: Option<String>,
    pub day: Option<i32>,
    pub allocated_seconds: i64,
    pub actual_seconds: i64,
    pub outcome: PerformanceOutcome,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPerformanceRecord {
    pub id: Uuid,
    pub trainee_email: String,
    pub trainee_name: Option<String>,
    pub role: Option<String>,
    pub activity_id: String,
    pub activity_title: Option<String>,
    pub day: Option<i32>,
    pub allocated_seconds: i64,
    pub actual_seconds: i64,
    pub percentage_used: i32,
    pub performance_flag: PerformanceFlag,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct PerformanceFilter {
    pub email: Option<String>,
    pub day: Option<i32>,
    pub flag: Option<PerformanceFlag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub total: usize,
    pub fast: usize,
    pub on_time: usize,
    pub slow: usize,
    pub struggling: usize,
    pub average_percentage: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentScore {
    pub trainee_email: String,
    pub assessment_name: String,
    pub score: f64,
    pub passed: bool,
    pub attempt_number: i32,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightageEntry {
    pub role: String,
    pub assessment_name: String,
    pub weightage: f64,
    pub passing_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentBreakdown {
    pub assessment_name: String,
    pub weightage: f64,
    pub passing_rate: f64,
    pub score: Option<f64>,
    pub weighted_score: f64,
    pub passed: bool,
    pub attempted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningScore {
    pub role: String,
    pub learning_score: i64,
    pub breakdown: Vec<AssessmentBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalScore {
    pub learning_score: i64,
    pub participation_score: f64,
    pub learning_contribution: f64,
    pub participation_contribution: f64,
    pub final_score: i64,
    pub passed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtensionState {
    Expired,
    EndsToday,
    EndingSoon,
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionStatus {
    pub state: ExtensionState,
    pub days_remaining: i64,
    pub message: String,
}

/// A trainee with everything needed to rank them for attention.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraineeRisk {
    #[serde(flatten)]
    pub trainee: Trainee,
    pub risk_level: RiskLevel,
    pub progress_gap: Option<f64>,
    pub extension: Option<ExtensionStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskCounts {
    pub critical: usize,
    pub at_risk: usize,
    pub on_track: usize,
    pub unknown: usize,
}
