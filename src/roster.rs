use std::collections::{HashMap, HashSet};
use std::time::Duration;

use reqwest::Client;
use serde_json::{Map, Value};

use crate::extension::parse_end_date;
use crate::models::{ReportedStatus, Trainee};

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Roster webhook returned HTTP {0}")]
    Status(u16),

    #[error("Unexpected roster payload: {0}")]
    Payload(String),
}

/// Client for the spreadsheet-backed roster webhook.
#[derive(Debug, Clone)]
pub struct RosterClient {
    client: Client,
    url: String,
}

impl RosterClient {
    pub fn new(url: impl Into<String>) -> Result<Self, RosterError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub async fn fetch_trainees(&self) -> Result<Vec<Trainee>, RosterError> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(RosterError::Status(response.status().as_u16()));
        }

        let payload: Value = response.json().await?;
        let trainees = parse_roster(payload)?;
        tracing::debug!(count = trainees.len(), "roster fetched");
        Ok(trainees)
    }
}

/// Narrows a roster to one coach or one trainee.
#[derive(Debug, Clone, Default)]
pub struct RosterScope {
    pub coach: Option<String>,
    pub email: Option<String>,
}

impl RosterScope {
    pub fn matches(&self, trainee: &Trainee) -> bool {
        let coach_ok = self
            .coach
            .as_deref()
            .map_or(true, |coach| trainee.coach.eq_ignore_ascii_case(coach.trim()));
        let email_ok = self
            .email
            .as_deref()
            .map_or(true, |email| trainee.email.eq_ignore_ascii_case(email.trim()));
        coach_ok && email_ok
    }
}

/// Accepts either a bare array of rows or `{"data": [...]}`.
pub fn parse_roster(payload: Value) -> Result<Vec<Trainee>, RosterError> {
    let rows = match payload {
        Value::Array(rows) => rows,
        Value::Object(mut object) => match object.remove("data") {
            Some(Value::Array(rows)) => rows,
            _ => return Err(RosterError::Payload("expected an array of rows".to_string())),
        },
        _ => return Err(RosterError::Payload("expected an array of rows".to_string())),
    };

    let mut seen = HashSet::new();
    let mut trainees = Vec::new();
    for (index, row) in rows.into_iter().enumerate() {
        let Value::Object(object) = row else {
            tracing::warn!(row = index, "skipping roster row that is not an object");
            continue;
        };

        let Some(trainee) = parse_row(object) else {
            tracing::warn!(row = index, "skipping roster row without an email");
            continue;
        };

        if !seen.insert(trainee.email.to_lowercase()) {
            tracing::warn!(row = index, email = %trainee.email, "duplicate roster email");
            continue;
        }
        trainees.push(trainee);
    }

    Ok(trainees)
}

/// Builds a trainee from one sheet row. Returns `None` without an email.
pub fn parse_row(object: Map<String, Value>) -> Option<Trainee> {
    let row = RawRow::new(object);

    let email = row.text("Email")?;
    Some(Trainee {
        email,
        full_name: row.text("Full Name").unwrap_or_default(),
        role: row.text("Role").unwrap_or_default(),
        country: row.text("Country").unwrap_or_default(),
        training_start_date: row.text("Training Start Date").as_deref().and_then(parse_end_date),
        coach: row.text("Coach").unwrap_or_default(),
        days_since_start: row.number("Days Since Start").trunc() as i64,
        total_assessments_required: row.count("Total Assessments Required"),
        assessments_completed: row.count("Assessments Completed"),
        assessments_incomplete: row.count("Assessments Incomplete"),
        performance_flag: row.text("Performance Flag").as_deref().and_then(ReportedStatus::parse),
        delay_reason: row.text("Delay Reason"),
        extension_days: row.number("Extension Days").trunc() as i64,
        adjusted_end_date: row.text("Adjusted End Date"),
        notes: row.text("Notes"),
    })
}

/// Row with column names trimmed.
struct RawRow {
    cells: HashMap<String, Value>,
}

impl RawRow {
    fn new(object: Map<String, Value>) -> Self {
        let cells = object
            .into_iter()
            .map(|(key, value)| (key.trim().to_string(), value))
            .collect();
        Self { cells }
    }

    /// Non-blank text; numbers are rendered as text.
    fn text(&self, column: &str) -> Option<String> {
        match self.cells.get(column)? {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Missing or unreadable numbers count as 0.
    fn number(&self, column: &str) -> f64 {
        let value = match self.cells.get(column) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        value.filter(|v| v.is_finite()).unwrap_or(0.0)
    }

    fn count(&self, column: &str) -> u32 {
        let value = self.number(column);
        if value <= 0.0 {
            0
        } else {
            value.trunc().min(f64::from(u32::MAX)) as u32
        }
    }
}
