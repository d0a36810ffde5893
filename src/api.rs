use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ScoringConfig;
use crate::db::TrainingStore;
use crate::error::{ApiError, ScoringError};
use crate::models::{
    ActivityPerformanceRecord, AssessmentScore, FinalScore, LearningScore, NewPerformanceRecord,
    PerformanceFilter, PerformanceFlag, PerformanceSummary, RiskCounts, TraineeRisk,
};
use crate::roster::{RosterClient, RosterScope};
use crate::scoring::round_half_up;
use crate::weights::WeightTable;
use crate::{performance, risk, scoring};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub store: Arc<dyn TrainingStore>,
    pub roster: Option<RosterClient>,
    pub scoring: ScoringConfig,
    pub weights: WeightTable,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route(
            "/api/training/performance",
            post(record_performance)
                .get(list_performance)
                .patch(correct_completion),
        )
        .route("/api/training/trainees", get(list_trainees))
        .route("/api/training/learning-score", post(compute_learning_score))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn body_error(rejection: JsonRejection) -> ApiError {
    tracing::debug!(error = %rejection, "rejected request body");
    match rejection {
        JsonRejection::JsonDataError(_)
        | JsonRejection::JsonSyntaxError(_)
        | JsonRejection::MissingJsonContentType(_) => ApiError::BadRequest("Invalid request body"),
        _ => ApiError::Internal,
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Activity ids arrive as either strings or numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPerformanceRequest {
    trainee_email: Option<String>,
    trainee_name: Option<String>,
    role: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    activity_id: Option<String>,
    activity_title: Option<String>,
    day: Option<i32>,
    allocated_seconds: Option<f64>,
    actual_seconds: Option<f64>,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct RecordPerformanceResponse {
    success: bool,
    record: ActivityPerformanceRecord,
}

pub async fn record_performance(
    State(state): State<SharedState>,
    payload: Result<Json<RecordPerformanceRequest>, JsonRejection>,
) -> Result<Json<RecordPerformanceResponse>, ApiError> {
    let Json(req) = payload.map_err(body_error)?;

    let (Some(trainee_email), Some(activity_id)) = (
        blank_to_none(req.trainee_email),
        blank_to_none(req.activity_id),
    ) else {
        return Err(ApiError::BadRequest("traineeEmail and activityId are required"));
    };

    let allocated_seconds = req.allocated_seconds.unwrap_or(0.0);
    let actual_seconds = req.actual_seconds.unwrap_or(0.0);
    let outcome = performance::classify_performance(actual_seconds, allocated_seconds, &state.scoring)?;

    // Seconds are stored as whole numbers and the percentage as INTEGER.
    if round_half_up(allocated_seconds) < 1 {
        return Err(ScoringError::InvalidInput(format!(
            "allocated time must be at least one second, got {allocated_seconds}"
        ))
        .into());
    }
    if i32::try_from(outcome.percentage).is_err() {
        return Err(ScoringError::InvalidInput(format!(
            "actual time is {}% of the allocation, which is too large to record",
            outcome.percentage
        ))
        .into());
    }

    let record = NewPerformanceRecord {
        trainee_email,
        trainee_name: blank_to_none(req.trainee_name),
        role: blank_to_none(req.role),
        activity_id,
        activity_title: blank_to_none(req.activity_title),
        day: req.day,
        allocated_seconds: round_half_up(allocated_seconds),
        actual_seconds: round_half_up(actual_seconds),
        outcome,
        completed_at: req.completed_at.unwrap_or_else(Utc::now),
    };

    let record = state
        .store
        .upsert_performance(record)
        .await
        .map_err(ApiError::persistence("Failed to save performance record"))?;

    tracing::info!(
        trainee = %record.trainee_email,
        activity = %record.activity_id,
        flag = %record.performance_flag,
        percentage = record.percentage_used,
        "performance recorded"
    );

    Ok(Json(RecordPerformanceResponse {
        success: true,
        record,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PerformanceQuery {
    email: Option<String>,
    day: Option<i32>,
    flag: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PerformanceListResponse {
    records: Vec<ActivityPerformanceRecord>,
    summary: PerformanceSummary,
}

pub async fn list_performance(
    State(state): State<SharedState>,
    query: Result<Query<PerformanceQuery>, QueryRejection>,
) -> Result<Json<PerformanceListResponse>, ApiError> {
    let Query(query) = query.map_err(|_| ApiError::BadRequest("Invalid query parameters"))?;

    let flag = match blank_to_none(query.flag) {
        Some(raw) => Some(
            raw.parse::<PerformanceFlag>()
                .map_err(|_| ApiError::BadRequest("Unknown performance flag"))?,
        ),
        None => None,
    };
    let filter = PerformanceFilter {
        email: blank_to_none(query.email),
        day: query.day,
        flag,
    };

    let records = state
        .store
        .list_performance(&filter)
        .await
        .map_err(ApiError::persistence("Failed to fetch performance records"))?;
    let summary = performance::summarize(&records);

    Ok(Json(PerformanceListResponse { records, summary }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectCompletionRequest {
    #[serde(default, deserialize_with = "string_or_number")]
    activity_id: Option<String>,
    trainee_email: Option<String>,
    completed_at: Option<String>,
}

pub async fn correct_completion(
    State(state): State<SharedState>,
    payload: Result<Json<CorrectCompletionRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload.map_err(body_error)?;

    let (Some(activity_id), Some(trainee_email), Some(completed_at)) = (
        blank_to_none(req.activity_id),
        blank_to_none(req.trainee_email),
        blank_to_none(req.completed_at),
    ) else {
        return Err(ApiError::BadRequest(
            "activityId, traineeEmail and completedAt are required",
        ));
    };

    let completed_at = DateTime::parse_from_rfc3339(&completed_at)
        .map_err(|_| ApiError::BadRequest("completedAt must be an RFC 3339 timestamp"))?
        .with_timezone(&Utc);

    let updated = state
        .store
        .correct_completion(&activity_id, &trainee_email, completed_at)
        .await
        .map_err(ApiError::persistence("Failed to update completion time"))?;

    if updated == 0 {
        return Err(ApiError::NotFound("No performance record for this activity"));
    }

    tracing::info!(trainee = %trainee_email, activity = %activity_id, %completed_at, "completion corrected");
    Ok(Json(json!({ "success": true, "updated": updated })))
}

#[derive(Debug, Deserialize)]
pub struct TraineeQuery {
    coach: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TraineeListResponse {
    trainees: Vec<TraineeRisk>,
    counts: RiskCounts,
}

pub async fn list_trainees(
    State(state): State<SharedState>,
    query: Result<Query<TraineeQuery>, QueryRejection>,
) -> Result<Json<TraineeListResponse>, ApiError> {
    let Query(query) = query.map_err(|_| ApiError::BadRequest("Invalid query parameters"))?;
    let roster = state.roster.as_ref().ok_or(ApiError::RosterNotConfigured)?;

    let scope = RosterScope {
        coach: blank_to_none(query.coach),
        email: blank_to_none(query.email),
    };
    let trainees: Vec<_> = roster
        .fetch_trainees()
        .await?
        .into_iter()
        .filter(|t| scope.matches(t))
        .collect();

    let ranked = risk::prioritize(&trainees, Local::now().date_naive(), &state.scoring);
    let counts = risk::risk_counts(&ranked);
    Ok(Json(TraineeListResponse {
        trainees: ranked,
        counts,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptInput {
    assessment_name: String,
    score: f64,
    #[serde(default)]
    passed: bool,
    #[serde(default = "first_attempt")]
    attempt_number: i32,
}

fn first_attempt() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningScoreRequest {
    trainee_email: Option<String>,
    role: Option<String>,
    participation_score: Option<f64>,
    attempts: Option<Vec<AttemptInput>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningScoreResponse {
    learning: LearningScore,
    #[serde(rename = "final")]
    final_score: Option<FinalScore>,
}

pub async fn compute_learning_score(
    State(state): State<SharedState>,
    payload: Result<Json<LearningScoreRequest>, JsonRejection>,
) -> Result<Json<LearningScoreResponse>, ApiError> {
    let Json(req) = payload.map_err(body_error)?;

    let role = blank_to_none(req.role).ok_or(ApiError::BadRequest("role is required"))?;
    let trainee_email = blank_to_none(req.trainee_email);

    let attempts: Vec<AssessmentScore> = match (req.attempts, trainee_email) {
        (Some(inputs), email) => inputs
            .into_iter()
            .map(|input| AssessmentScore {
                trainee_email: email.clone().unwrap_or_default(),
                assessment_name: input.assessment_name,
                score: input.score,
                passed: input.passed,
                attempt_number: input.attempt_number,
                submitted_at: None,
            })
            .collect(),
        (None, Some(email)) => state
            .store
            .assessment_attempts(&email)
            .await
            .map_err(ApiError::persistence("Failed to fetch assessment scores"))?,
        (None, None) => {
            return Err(ApiError::BadRequest("traineeEmail or attempts is required"));
        }
    };

    let learning = scoring::learning_score(&role, &attempts, &state.weights)?;
    let final_score = req
        .participation_score
        .map(|participation| scoring::final_score(learning.learning_score, participation, &state.scoring))
        .transpose()?;

    Ok(Json(LearningScoreResponse {
        learning,
        final_score,
    }))
}
