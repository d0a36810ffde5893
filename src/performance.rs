use crate::config::ScoringConfig;
use crate::error::ScoringError;
use crate::models::{ActivityPerformanceRecord, PerformanceFlag, PerformanceOutcome, PerformanceSummary};
use crate::scoring::round_half_up;

/// Classifies how long an activity took against its allocation.
pub fn classify_performance(
    actual_seconds: f64,
    allocated_seconds: f64,
    cfg: &ScoringConfig,
) -> Result<PerformanceOutcome, ScoringError> {
    if !allocated_seconds.is_finite() || allocated_seconds <= 0.0 {
        return Err(ScoringError::InvalidInput(format!(
            "allocated time must be positive, got {allocated_seconds}"
        )));
    }
    if !actual_seconds.is_finite() || actual_seconds < 0.0 {
        return Err(ScoringError::InvalidInput(format!(
            "actual time must be zero or more, got {actual_seconds}"
        )));
    }

    let percentage = actual_seconds / allocated_seconds * 100.0;
    Ok(PerformanceOutcome {
        percentage: round_half_up(percentage),
        flag: flag_for_percentage(percentage, cfg),
    })
}

pub fn flag_for_percentage(percentage: f64, cfg: &ScoringConfig) -> PerformanceFlag {
    if percentage <= cfg.fast_max {
        PerformanceFlag::Fast
    } else if percentage <= cfg.on_time_max {
        PerformanceFlag::OnTime
    } else if percentage <= cfg.slow_max {
        PerformanceFlag::Slow
    } else {
        PerformanceFlag::Struggling
    }
}

pub fn summarize(records: &[ActivityPerformanceRecord]) -> PerformanceSummary {
    let mut summary = PerformanceSummary {
        total: records.len(),
        ..PerformanceSummary::default()
    };

    let mut total_percentage = 0i64;
    for record in records {
        match record.performance_flag {
            PerformanceFlag::Fast => summary.fast += 1,
            PerformanceFlag::OnTime => summary.on_time += 1,
            PerformanceFlag::Slow => summary.slow += 1,
            PerformanceFlag::Struggling => summary.struggling += 1,
        }
        total_percentage += i64::from(record.percentage_used);
    }

    if !records.is_empty() {
        summary.average_percentage = round_half_up(total_percentage as f64 / records.len() as f64);
    }

    summary
}
