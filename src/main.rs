use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod db;
mod error;
mod extension;
mod models;
mod performance;
mod report;
mod risk;
mod roster;
mod scoring;
mod weights;

#[cfg(test)]
mod test_utils;

use crate::config::AppConfig;
use crate::db::{PgTrainingStore, TrainingStore};
use crate::models::PerformanceFilter;
use crate::roster::{RosterClient, RosterScope};
use crate::weights::WeightTable;

#[derive(Parser)]
#[command(name = "trainee-scoring")]
#[command(about = "Risk levels, activity pace and learning scores for training cohorts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Run the HTTP API
    Serve,
    /// Import assessment attempts from a CSV file
    ImportScores {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Rank trainees by risk level
    #[command(group(
        ArgGroup::new("scope")
            .args(["coach", "email"])
            .multiple(false)
    ))]
    Risk {
        #[arg(long)]
        coach: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Compute the learning score and final score for one trainee
    Score {
        #[arg(long)]
        email: String,
        #[arg(long)]
        role: String,
        /// Participation score between 0 and 20
        #[arg(long)]
        participation: Option<f64>,
    },
    /// Generate a markdown attention report
    #[command(group(
        ArgGroup::new("scope")
            .args(["coach", "email"])
            .multiple(false)
    ))]
    Report {
        #[arg(long)]
        coach: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = AppConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Serve => {
            db::init_db(&pool).await?;
            let weights = load_weights(&cfg)?;
            let roster = match cfg.roster_webhook_url.as_deref() {
                Some(url) => Some(RosterClient::new(url)?),
                None => {
                    tracing::warn!("ROSTER_WEBHOOK_URL not set, trainee endpoint disabled");
                    None
                }
            };

            let state = Arc::new(api::AppState {
                store: Arc::new(PgTrainingStore::new(pool)),
                roster,
                scoring: cfg.scoring.clone(),
                weights,
            });
            let app = api::router(state);

            let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
                .await
                .with_context(|| format!("failed to bind {}", cfg.bind_addr))?;
            info!(addr = %cfg.bind_addr, "listening");
            axum::serve(listener, app).await.context("server error")?;
        }
        Commands::ImportScores { csv } => {
            let inserted = db::import_scores_csv(&pool, &csv).await?;
            println!("Inserted {inserted} assessment attempts from {}.", csv.display());
        }
        Commands::Risk {
            coach,
            email,
            limit,
        } => {
            let roster = roster_client(&cfg)?;
            let scope = RosterScope { coach, email };
            let trainees: Vec<_> = roster
                .fetch_trainees()
                .await
                .context("failed to fetch roster")?
                .into_iter()
                .filter(|t| scope.matches(t))
                .collect();
            let ranked = risk::prioritize(&trainees, Local::now().date_naive(), &cfg.scoring);

            if ranked.is_empty() {
                println!("No trainees found for this scope.");
                return Ok(());
            }

            println!("Trainees by attention priority:");
            for entry in ranked.iter().take(limit) {
                let gap = entry
                    .progress_gap
                    .map(|gap| format!("gap {gap:.2}"))
                    .unwrap_or_else(|| "no assessments".to_string());
                println!(
                    "- {} ({}, {}) {} ({})",
                    entry.trainee.full_name,
                    entry.trainee.email,
                    entry.trainee.role,
                    entry.risk_level,
                    gap
                );
                if let Some(ext) = &entry.extension {
                    println!("    {}", ext.message);
                }
            }
        }
        Commands::Score {
            email,
            role,
            participation,
        } => {
            let weights = load_weights(&cfg)?;
            let store = PgTrainingStore::new(pool);
            let attempts = store
                .assessment_attempts(&email)
                .await
                .context("failed to load assessment attempts")?;
            let learning = scoring::learning_score(&role, &attempts, &weights)?;

            if learning.breakdown.is_empty() {
                println!("No weighted assessments configured for role {role}.");
                return Ok(());
            }

            println!("Learning score for {email} ({role}):");
            for row in &learning.breakdown {
                match row.score {
                    Some(score) => println!(
                        "- {}: {score:.0}% x {}% = {:.2} ({})",
                        row.assessment_name,
                        row.weightage,
                        row.weighted_score,
                        if row.passed { "passed" } else { "not passed" }
                    ),
                    None => println!("- {}: not attempted ({}%)", row.assessment_name, row.weightage),
                }
            }
            println!("Learning score: {}", learning.learning_score);

            if let Some(participation) = participation {
                let result = scoring::final_score(learning.learning_score, participation, &cfg.scoring)?;
                println!(
                    "Final score: {} ({})",
                    result.final_score,
                    if result.passed { "PASS" } else { "FAIL" }
                );
            }
        }
        Commands::Report { coach, email, out } => {
            let roster = roster_client(&cfg)?;
            let label = coach
                .as_deref()
                .map(|c| format!("coach {c}"))
                .or_else(|| email.clone());
            let filter = PerformanceFilter {
                email: email.clone(),
                ..PerformanceFilter::default()
            };
            let scope = RosterScope { coach, email };

            let trainees: Vec<_> = roster
                .fetch_trainees()
                .await
                .context("failed to fetch roster")?
                .into_iter()
                .filter(|t| scope.matches(t))
                .collect();

            let store = PgTrainingStore::new(pool);
            let mut records = store
                .list_performance(&filter)
                .await
                .context("failed to load performance records")?;
            if scope.coach.is_some() {
                records.retain(|r| {
                    trainees
                        .iter()
                        .any(|t| t.email.eq_ignore_ascii_case(&r.trainee_email))
                });
            }

            let today = Local::now().date_naive();
            let ranked = risk::prioritize(&trainees, today, &cfg.scoring);
            let report = report::build_report(label.as_deref(), today, &ranked, &records);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn load_weights(cfg: &AppConfig) -> anyhow::Result<WeightTable> {
    let weights = match cfg.weightage_csv.as_deref() {
        Some(path) => WeightTable::from_csv(path)?,
        None => WeightTable::builtin()?,
    };
    for (role, total) in weights.role_totals() {
        info!(%role, total, "weight table loaded");
    }
    Ok(weights)
}

fn roster_client(cfg: &AppConfig) -> anyhow::Result<RosterClient> {
    let url = cfg
        .roster_webhook_url
        .as_deref()
        .context("ROSTER_WEBHOOK_URL must be set for roster commands")?;
    Ok(RosterClient::new(url)?)
}
