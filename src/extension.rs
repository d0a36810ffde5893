use chrono::NaiveDate;

use crate::config::ScoringConfig;
use crate::models::{ExtensionState, ExtensionStatus};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d %b %Y"];

/// Parses the date formats seen in the roster sheet. Timestamps are cut to
/// their calendar date.
pub fn parse_end_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            trimmed
                .get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        })
}

/// Status of an extension ending on `adjusted_end_date`, counted in calendar
/// days from `today`. `None` when the date cannot be read.
pub fn extension_status(
    adjusted_end_date: &str,
    today: NaiveDate,
    cfg: &ScoringConfig,
) -> Option<ExtensionStatus> {
    let end = parse_end_date(adjusted_end_date)?;
    let days_remaining = (end - today).num_days();

    let (state, message) = if days_remaining < 0 {
        (
            ExtensionState::Expired,
            format!("Extension expired {} ago", days(-days_remaining)),
        )
    } else if days_remaining == 0 {
        (ExtensionState::EndsToday, "Extension ends today".to_string())
    } else if days_remaining <= cfg.ending_soon_days {
        (
            ExtensionState::EndingSoon,
            format!("Extension ends in {}", days(days_remaining)),
        )
    } else {
        (
            ExtensionState::Active,
            format!("Extension active, {} remaining", days(days_remaining)),
        )
    };

    Some(ExtensionStatus {
        state,
        days_remaining,
        message,
    })
}

fn days(count: i64) -> String {
    if count == 1 {
        "1 day".to_string()
    } else {
        format!("{count} days")
    }
}
