use std::collections::HashMap;

use crate::config::ScoringConfig;
use crate::error::ScoringError;
use crate::models::{AssessmentBreakdown, AssessmentScore, FinalScore, LearningScore};
use crate::weights::WeightTable;

/// Rounds half toward positive infinity, the way the dashboard rounds.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Keeps the highest attempt per assessment name.
pub fn latest_attempts(attempts: &[AssessmentScore]) -> HashMap<&str, &AssessmentScore> {
    let mut latest: HashMap<&str, &AssessmentScore> = HashMap::new();
    for attempt in attempts {
        let entry = latest.entry(attempt.assessment_name.as_str()).or_insert(attempt);
        if attempt.attempt_number > entry.attempt_number {
            *entry = attempt;
        }
    }
    latest
}

pub fn learning_score(
    role: &str,
    attempts: &[AssessmentScore],
    weights: &WeightTable,
) -> Result<LearningScore, ScoringError> {
    if let Some(bad) = attempts
        .iter()
        .find(|a| !a.score.is_finite() || !(0.0..=100.0).contains(&a.score))
    {
        return Err(ScoringError::InvalidInput(format!(
            "score for {} must be between 0 and 100, got {}",
            bad.assessment_name, bad.score
        )));
    }

    let latest = latest_attempts(attempts);
    let mut total = 0.0;
    let mut breakdown = Vec::new();

    for entry in weights.for_role(role) {
        let row = match latest.get(entry.assessment_name.as_str()) {
            Some(attempt) => {
                let weighted_score = attempt.score / 100.0 * entry.weightage;
                total += weighted_score;
                AssessmentBreakdown {
                    assessment_name: entry.assessment_name.clone(),
                    weightage: entry.weightage,
                    passing_rate: entry.passing_rate,
                    score: Some(attempt.score),
                    weighted_score,
                    passed: attempt.score >= entry.passing_rate,
                    attempted: true,
                }
            }
            None => AssessmentBreakdown {
                assessment_name: entry.assessment_name.clone(),
                weightage: entry.weightage,
                passing_rate: entry.passing_rate,
                score: None,
                weighted_score: 0.0,
                passed: false,
                attempted: false,
            },
        };
        breakdown.push(row);
    }

    Ok(LearningScore {
        role: role.to_string(),
        learning_score: round_half_up(total),
        breakdown,
    })
}

/// Blends the learning score with the 0..=max participation score.
pub fn final_score(
    learning_score: i64,
    participation_score: f64,
    cfg: &ScoringConfig,
) -> Result<FinalScore, ScoringError> {
    if !participation_score.is_finite()
        || participation_score < 0.0
        || participation_score > cfg.participation_max
    {
        return Err(ScoringError::InvalidInput(format!(
            "participation score must be between 0 and {}, got {participation_score}",
            cfg.participation_max
        )));
    }

    let learning_contribution = learning_score as f64 * cfg.learning_weight;
    let participation_contribution =
        participation_score / cfg.participation_max * 100.0 * cfg.participation_weight;
    let final_score = round_half_up(learning_contribution + participation_contribution);

    Ok(FinalScore {
        learning_score,
        participation_score,
        learning_contribution,
        participation_contribution,
        final_score,
        passed: final_score >= cfg.pass_threshold,
    })
}
