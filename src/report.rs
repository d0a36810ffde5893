use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{
    ActivityPerformanceRecord, ExtensionState, PerformanceFlag, RiskLevel, TraineeRisk,
};
use crate::{performance, risk};

/// Slow and struggling activities, worst first.
pub fn struggling_activities(records: &[ActivityPerformanceRecord]) -> Vec<&ActivityPerformanceRecord> {
    let mut slow: Vec<&ActivityPerformanceRecord> = records
        .iter()
        .filter(|r| matches!(r.performance_flag, PerformanceFlag::Slow | PerformanceFlag::Struggling))
        .collect();
    slow.sort_by(|a, b| b.percentage_used.cmp(&a.percentage_used));
    slow
}

pub fn build_report(
    scope: Option<&str>,
    generated_on: NaiveDate,
    ranked: &[TraineeRisk],
    records: &[ActivityPerformanceRecord],
) -> String {
    let counts = risk::risk_counts(ranked);
    let summary = performance::summarize(records);

    let mut output = String::new();
    let scope_label = scope.unwrap_or("all trainees");

    let _ = writeln!(output, "# Training Attention Report");
    let _ = writeln!(output, "Generated for {} on {}", scope_label, generated_on);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Mix");

    if ranked.is_empty() {
        let _ = writeln!(output, "No trainees on the roster for this scope.");
    } else {
        let _ = writeln!(output, "- critical: {}", counts.critical);
        let _ = writeln!(output, "- at-risk: {}", counts.at_risk);
        let _ = writeln!(output, "- on-track: {}", counts.on_track);
        let _ = writeln!(output, "- unknown: {}", counts.unknown);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trainees Needing Attention");

    let attention: Vec<&TraineeRisk> = ranked
        .iter()
        .filter(|r| matches!(r.risk_level, RiskLevel::Critical | RiskLevel::AtRisk))
        .collect();
    if attention.is_empty() {
        let _ = writeln!(output, "Nobody is behind schedule.");
    } else {
        for entry in attention.iter().take(10) {
            let trainee = &entry.trainee;
            let _ = writeln!(
                output,
                "- {} ({}, coach {}) {} on day {}: {}/{} assessments",
                trainee.full_name,
                trainee.email,
                if trainee.coach.is_empty() { "unassigned" } else { trainee.coach.as_str() },
                entry.risk_level,
                trainee.days_since_start,
                trainee.assessments_completed,
                trainee.total_assessments_required
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Extensions");

    let extensions: Vec<&TraineeRisk> = ranked
        .iter()
        .filter(|r| {
            r.extension
                .as_ref()
                .is_some_and(|ext| ext.state != ExtensionState::Active)
        })
        .collect();
    if extensions.is_empty() {
        let _ = writeln!(output, "No extensions expired or ending soon.");
    } else {
        for entry in extensions {
            if let Some(ext) = &entry.extension {
                let _ = writeln!(
                    output,
                    "- {} ({}): {}",
                    entry.trainee.full_name, entry.trainee.email, ext.message
                );
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Activity Pace");

    if summary.total == 0 {
        let _ = writeln!(output, "No completed activities recorded.");
    } else {
        let _ = writeln!(
            output,
            "{} activities: {} fast, {} on time, {} slow, {} struggling (avg {}% of allocated time)",
            summary.total,
            summary.fast,
            summary.on_time,
            summary.slow,
            summary.struggling,
            summary.average_percentage
        );
        for record in struggling_activities(records).iter().take(5) {
            let _ = writeln!(
                output,
                "- {} on {}: {}% ({})",
                record.trainee_email,
                record.activity_title.as_deref().unwrap_or(&record.activity_id),
                record.percentage_used,
                record.performance_flag
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::models::{ReportedStatus, Trainee};
    use crate::test_utils::{performance_record, sample_trainee};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    #[test]
    fn report_lists_attention_extensions_and_pace() {
        let trainees = vec![
            Trainee {
                full_name: "Avery Lee".to_string(),
                performance_flag: ReportedStatus::parse("critical"),
                adjusted_end_date: Some("2026-03-11".to_string()),
                ..sample_trainee("avery@example.com")
            },
            Trainee {
                full_name: "Kiara Patel".to_string(),
                days_since_start: 15,
                total_assessments_required: 10,
                assessments_completed: 5,
                adjusted_end_date: Some("2026-04-30".to_string()),
                ..sample_trainee("kiara@example.com")
            },
        ];
        let ranked = risk::prioritize(&trainees, today(), &ScoringConfig::default());
        let records = vec![
            performance_record("avery@example.com", "day2-quiz", 180, PerformanceFlag::Struggling),
            performance_record("kiara@example.com", "day2-quiz", 80, PerformanceFlag::OnTime),
        ];

        let report = build_report(Some("coach Jules Moreno"), today(), &ranked, &records);

        assert!(report.contains("Generated for coach Jules Moreno on 2026-03-10"));
        assert!(report.contains("- critical: 1"));
        assert!(report.contains("- on-track: 1"));
        assert!(report.contains("Avery Lee (avery@example.com, coach Jules Moreno) critical"));
        assert!(!report.contains("Kiara Patel (kiara@example.com, coach"));
        assert!(report.contains("Avery Lee (avery@example.com): Extension ends in 1 day"));
        assert!(report.contains("2 activities: 0 fast, 1 on time, 0 slow, 1 struggling (avg 130%"));
        assert!(report.contains("- avery@example.com on day2-quiz: 180% (struggling)"));
    }

    #[test]
    fn empty_report_has_placeholders() {
        let report = build_report(None, today(), &[], &[]);
        assert!(report.contains("Generated for all trainees"));
        assert!(report.contains("No trainees on the roster for this scope."));
        assert!(report.contains("Nobody is behind schedule."));
        assert!(report.contains("No extensions expired or ending soon."));
        assert!(report.contains("No completed activities recorded."));
    }
}
