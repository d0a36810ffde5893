use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

/// Thresholds used by the classifiers and the score blend.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    /// Nominal program length used for expected progress.
    pub program_days: f64,
    /// Progress gap above which a trainee is critical.
    pub critical_gap: f64,
    /// Progress gap above which a trainee is at risk.
    pub at_risk_gap: f64,
    /// Upper bounds (inclusive, percent of allocated time) per performance flag.
    pub fast_max: f64,
    pub on_time_max: f64,
    pub slow_max: f64,
    pub learning_weight: f64,
    pub participation_weight: f64,
    pub participation_max: f64,
    pub pass_threshold: i64,
    /// An extension with this many days left or fewer is ending soon.
    pub ending_soon_days: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            program_days: 30.0,
            critical_gap: 0.2,
            at_risk_gap: 0.05,
            fast_max: 50.0,
            on_time_max: 100.0,
            slow_max: 150.0,
            learning_weight: 0.8,
            participation_weight: 0.2,
            participation_max: 20.0,
            pass_threshold: 80,
            ending_soon_days: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub roster_webhook_url: Option<String>,
    pub weightage_csv: Option<PathBuf>,
    pub scoring: ScoringConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = get("DATABASE_URL")?;
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let roster_webhook_url = std::env::var("ROSTER_WEBHOOK_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        if let Some(url) = roster_webhook_url.as_deref() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                bail!("ROSTER_WEBHOOK_URL must start with http:// or https://");
            }
        }

        let weightage_csv = std::env::var("WEIGHTAGE_CSV")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let defaults = ScoringConfig::default();
        let scoring = ScoringConfig {
            program_days: parse_or("PROGRAM_DAYS", defaults.program_days)?,
            critical_gap: parse_or("CRITICAL_GAP", defaults.critical_gap)?,
            at_risk_gap: parse_or("AT_RISK_GAP", defaults.at_risk_gap)?,
            pass_threshold: parse_or("PASS_THRESHOLD", defaults.pass_threshold)?,
            ..defaults
        };

        if !scoring.program_days.is_finite() || scoring.program_days <= 0.0 {
            bail!("PROGRAM_DAYS must be positive");
        }
        if scoring.at_risk_gap > scoring.critical_gap {
            bail!("AT_RISK_GAP must not exceed CRITICAL_GAP");
        }

        Ok(Self {
            database_url,
            bind_addr,
            roster_webhook_url,
            weightage_csv,
            scoring,
        })
    }
}

fn get(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Missing required env var: {key}"))
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid value for {key}: {raw}")),
        _ => Ok(default),
    }
}
