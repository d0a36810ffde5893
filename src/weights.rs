use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::Context;

use crate::error::ScoringError;
use crate::models::WeightageEntry;

const WEIGHT_TOTAL: f64 = 100.0;
const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Assessment weights per role. Every role's weights add up to 100.
#[derive(Debug, Clone)]
pub struct WeightTable {
    entries: Vec<WeightageEntry>,
}

impl WeightTable {
    pub fn new(entries: Vec<WeightageEntry>) -> Result<Self, ScoringError> {
        validate(&entries)?;
        Ok(Self { entries })
    }

    pub fn from_csv(path: &Path) -> anyhow::Result<Self> {
        #[derive(serde::Deserialize)]
        struct CsvRow {
            role: String,
            assessment_name: String,
            weightage: f64,
            passing_rate: f64,
        }

        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open weight table {}", path.display()))?;
        let mut entries = Vec::new();
        for result in reader.deserialize::<CsvRow>() {
            let row = result.context("invalid weight table row")?;
            entries.push(WeightageEntry {
                role: row.role,
                assessment_name: row.assessment_name,
                weightage: row.weightage,
                passing_rate: row.passing_rate,
            });
        }
        Ok(Self::new(entries)?)
    }

    pub fn for_role<'a>(&'a self, role: &'a str) -> impl Iterator<Item = &'a WeightageEntry> + 'a {
        let role = role.trim();
        self.entries
            .iter()
            .filter(move |entry| entry.role.eq_ignore_ascii_case(role))
    }

    /// Total weight per role, keyed by role.
    pub fn role_totals(&self) -> BTreeMap<String, f64> {
        role_totals(&self.entries)
    }

    /// The CSR and TECH table used when no CSV is configured.
    pub fn builtin() -> Result<Self, ScoringError> {
        let rows = [
            ("CSR", "Product Knowledge Quiz", 30.0, 80.0),
            ("CSR", "Systems Navigation", 20.0, 80.0),
            ("CSR", "Call Simulation", 30.0, 75.0),
            ("CSR", "Final Assessment", 20.0, 80.0),
            ("TECH", "Technical Troubleshooting", 40.0, 75.0),
            ("TECH", "Product Knowledge Quiz", 20.0, 80.0),
            ("TECH", "Ticket Handling", 20.0, 80.0),
            ("TECH", "Final Assessment", 20.0, 80.0),
        ];
        let entries = rows
            .into_iter()
            .map(|(role, name, weightage, passing_rate)| WeightageEntry {
                role: role.to_string(),
                assessment_name: name.to_string(),
                weightage,
                passing_rate,
            })
            .collect();
        Self::new(entries)
    }
}

fn role_totals(entries: &[WeightageEntry]) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for entry in entries {
        *totals.entry(entry.role.trim().to_ascii_uppercase()).or_insert(0.0) += entry.weightage;
    }
    totals
}

fn validate(entries: &[WeightageEntry]) -> Result<(), ScoringError> {
    let mut seen = HashSet::new();
    for entry in entries {
        if entry.role.trim().is_empty() || entry.assessment_name.trim().is_empty() {
            return Err(ScoringError::WeightTable(
                "role and assessment name must not be blank".to_string(),
            ));
        }
        if entry.weightage.is_nan() || entry.weightage < 0.0 {
            return Err(ScoringError::WeightTable(format!(
                "{} / {}: weightage must not be negative",
                entry.role, entry.assessment_name
            )));
        }
        if !(0.0..=100.0).contains(&entry.passing_rate) {
            return Err(ScoringError::WeightTable(format!(
                "{} / {}: passing rate must be between 0 and 100",
                entry.role, entry.assessment_name
            )));
        }
        let key = (
            entry.role.trim().to_ascii_uppercase(),
            entry.assessment_name.clone(),
        );
        if !seen.insert(key) {
            return Err(ScoringError::WeightTable(format!(
                "{} / {}: listed more than once",
                entry.role, entry.assessment_name
            )));
        }
    }

    for (role, total) in role_totals(entries) {
        if (total - WEIGHT_TOTAL).abs() > WEIGHT_TOLERANCE {
            return Err(ScoringError::WeightTable(format!(
                "weights for role {role} add up to {total}, expected {WEIGHT_TOTAL}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn entry(role: &str, name: &str, weightage: f64) -> WeightageEntry {
        WeightageEntry {
            role: role.to_string(),
            assessment_name: name.to_string(),
            weightage,
            passing_rate: 80.0,
        }
    }

    #[test]
    fn builtin_table_is_valid() {
        let table = WeightTable::builtin().unwrap();
        assert_eq!(table.role_totals().get("CSR"), Some(&100.0));
        assert_eq!(table.for_role("csr").count(), 4);
        assert_eq!(table.for_role(" TECH ").count(), 4);
    }

    #[test]
    fn rejects_weights_not_adding_to_100() {
        let err = WeightTable::new(vec![entry("CSR", "Quiz", 60.0), entry("CSR", "Sim", 30.0)])
            .unwrap_err();
        assert!(matches!(err, ScoringError::WeightTable(msg) if msg.contains("CSR")));
    }

    #[test]
    fn rejects_duplicates_and_negative_weights() {
        assert!(WeightTable::new(vec![entry("CSR", "Quiz", 50.0), entry("csr", "Quiz", 50.0)]).is_err());
        assert!(WeightTable::new(vec![entry("CSR", "Quiz", 110.0), entry("CSR", "Sim", -10.0)]).is_err());
    }

    #[test]
    fn loads_from_csv() {
        let path = std::env::temp_dir().join(format!("weights-{}.csv", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "role,assessment_name,weightage,passing_rate").unwrap();
        writeln!(file, "OPS,Safety Quiz,25,90").unwrap();
        writeln!(file, "OPS,Floor Walk,75,70").unwrap();
        drop(file);

        let table = WeightTable::from_csv(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let totals = table.role_totals();
        assert_eq!(totals.get("OPS"), Some(&100.0));
        let names: Vec<&str> = table.for_role("OPS").map(|e| e.assessment_name.as_str()).collect();
        assert_eq!(names, vec!["Safety Quiz", "Floor Walk"]);
    }
}
