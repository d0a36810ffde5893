use chrono::NaiveDate;

use crate::config::ScoringConfig;
use crate::extension;
use crate::models::{ReportedStatus, RiskCounts, RiskLevel, Trainee, TraineeRisk};

/// Risk for one trainee. A status reported by the roster wins over the
/// progress heuristic.
pub fn calculate_risk_level(trainee: &Trainee, cfg: &ScoringConfig) -> RiskLevel {
    if let Some(level) = trainee.performance_flag.as_ref().and_then(reported_risk) {
        return level;
    }

    match progress_gap(trainee, cfg) {
        Some(gap) => risk_for_gap(gap, cfg),
        None => RiskLevel::Unknown,
    }
}

fn reported_risk(status: &ReportedStatus) -> Option<RiskLevel> {
    match status {
        ReportedStatus::Critical => Some(RiskLevel::Critical),
        ReportedStatus::AtRisk => Some(RiskLevel::AtRisk),
        ReportedStatus::OnTrack => Some(RiskLevel::OnTrack),
        ReportedStatus::Legacy(text) => match_legacy_flag(text),
    }
}

/// Keyword matching for free-text flags from older sheets. Checked in order,
/// first hit wins.
pub fn match_legacy_flag(text: &str) -> Option<RiskLevel> {
    let lower = text.to_lowercase();
    if lower.contains("critical") || lower.contains("overdue") {
        Some(RiskLevel::Critical)
    } else if lower.contains("risk") || lower.contains("behind") {
        Some(RiskLevel::AtRisk)
    } else if lower.contains("track") || lower.contains("good") {
        Some(RiskLevel::OnTrack)
    } else {
        None
    }
}

/// Expected progress minus actual progress, or `None` when the trainee has
/// no required assessments.
pub fn progress_gap(trainee: &Trainee, cfg: &ScoringConfig) -> Option<f64> {
    if trainee.total_assessments_required == 0 {
        return None;
    }

    let expected = (trainee.days_since_start as f64 / cfg.program_days).min(1.0);
    let actual =
        f64::from(trainee.assessments_completed) / f64::from(trainee.total_assessments_required);
    Some(expected - actual)
}

pub fn risk_for_gap(gap: f64, cfg: &ScoringConfig) -> RiskLevel {
    if gap > cfg.critical_gap {
        RiskLevel::Critical
    } else if gap > cfg.at_risk_gap {
        RiskLevel::AtRisk
    } else {
        RiskLevel::OnTrack
    }
}

/// Orders trainees so the ones needing attention come first.
pub fn prioritize(trainees: &[Trainee], today: NaiveDate, cfg: &ScoringConfig) -> Vec<TraineeRisk> {
    let mut values: Vec<TraineeRisk> = trainees
        .iter()
        .map(|trainee| TraineeRisk {
            risk_level: calculate_risk_level(trainee, cfg),
            progress_gap: progress_gap(trainee, cfg),
            extension: trainee
                .adjusted_end_date
                .as_deref()
                .and_then(|date| extension::extension_status(date, today, cfg)),
            trainee: trainee.clone(),
        })
        .collect();

    values.sort_by(|a, b| {
        a.risk_level
            .attention_rank()
            .cmp(&b.risk_level.attention_rank())
            .then_with(|| {
                let a_gap = a.progress_gap.unwrap_or(f64::MIN);
                let b_gap = b.progress_gap.unwrap_or(f64::MIN);
                b_gap.partial_cmp(&a_gap).unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.trainee.email.cmp(&b.trainee.email))
    });
    values
}

pub fn risk_counts(ranked: &[TraineeRisk]) -> RiskCounts {
    let mut counts = RiskCounts::default();
    for entry in ranked {
        match entry.risk_level {
            RiskLevel::Critical => counts.critical += 1,
            RiskLevel::AtRisk => counts.at_risk += 1,
            RiskLevel::OnTrack => counts.on_track += 1,
            RiskLevel::Unknown => counts.unknown += 1,
        }
    }
    counts
}
