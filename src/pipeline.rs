//! Ingestion orchestration.
//!
//! The batch orchestrator ([`Pipeline::run`]) walks the subject list in
//! order: fetch, parse, accumulate. Once every subject has been visited
//! the accumulated records go to the merge engine in a single call. Each
//! subject moves through [`SubjectState`]:
//!
//! ```text
//! FETCHING ─► PARSING ─► MERGING ─► DONE
//!     │           │
//!     └──► SKIPPED ◄┘
//! ```
//!
//! A subject is skipped when the fetch returns nothing or the payload
//! parses to zero records. Nothing is retried and no failure escapes.
//!
//! The request-driven variant ([`Pipeline::enrich`]) runs the same steps
//! for one submitted startup and hands back the merged entities.

use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::error::MergeError;
use crate::fetch::{CompletionClient, Fetcher};
use crate::merge::MergeEngine;
use crate::migrate;
use crate::models::{Startup, StartupRecord};
use crate::parse::parse_records;
use crate::store::SqliteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectState {
    Fetching,
    Parsing,
    Merging,
    Done,
    Skipped,
}

impl fmt::Display for SubjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fetching => "FETCHING",
            Self::Parsing => "PARSING",
            Self::Merging => "MERGING",
            Self::Done => "DONE",
            Self::Skipped => "SKIPPED",
        };
        f.write_str(s)
    }
}

/// Outcome of one batch run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Final state of each subject, in subject-list order.
    pub subjects: Vec<(String, SubjectState)>,
    /// Records handed to the merge engine.
    pub candidates: usize,
    /// Records durably merged.
    pub merged: usize,
    /// Name of the record the merge halted on, if it failed.
    pub halted_at: Option<String>,
}

impl SyncReport {
    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.subjects
            .iter()
            .filter(|(_, state)| *state == SubjectState::Skipped)
            .map(|(subject, _)| subject.as_str())
    }
}

/// Result of an interactive submission: one entity, or every entity the
/// enrichment produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Enriched {
    One(Startup),
    Many(Vec<Startup>),
}

impl Enriched {
    fn from_merged(mut merged: Vec<Startup>) -> Self {
        if merged.len() == 1 {
            Self::One(merged.remove(0))
        } else {
            Self::Many(merged)
        }
    }
}

pub struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    engine: Arc<MergeEngine>,
}

impl Pipeline {
    pub fn new(fetcher: Arc<dyn Fetcher>, engine: Arc<MergeEngine>) -> Self {
        Self { fetcher, engine }
    }

    /// Runs the batch orchestrator and returns the number of records merged.
    pub async fn run(&self, subjects: &[String]) -> usize {
        self.run_report(subjects).await.merged
    }

    /// Like [`run`](Self::run), with per-subject detail.
    pub async fn run_report(&self, subjects: &[String]) -> SyncReport {
        let span = info_span!("sync", run_id = %Uuid::new_v4());
        async {
            let (records, mut states) = self.collect(subjects).await;
            let mut report = SyncReport {
                candidates: records.len(),
                ..Default::default()
            };

            for (subject, state) in &states {
                if *state == SubjectState::Merging {
                    debug!(subject = %subject, state = %state);
                }
            }

            match self.engine.merge(&records).await {
                Ok(merged) => report.merged = merged.len(),
                Err(MergeError {
                    committed,
                    name,
                    source,
                }) => {
                    error!(committed, name = %name, error = %source, "merge halted");
                    report.merged = committed;
                    report.halted_at = Some(name);
                }
            }

            for (subject, state) in states.iter_mut() {
                if *state == SubjectState::Merging {
                    *state = SubjectState::Done;
                    debug!(subject = %subject, state = %state);
                }
            }
            report.subjects = states;

            info!(
                subjects = subjects.len(),
                candidates = report.candidates,
                merged = report.merged,
                "sync finished"
            );
            report
        }
        .instrument(span)
        .await
    }

    /// Fetches and parses every subject without merging.
    ///
    /// Returns the accumulated records in subject order and the state each
    /// subject reached: [`SubjectState::Merging`] when it contributed
    /// records, [`SubjectState::Skipped`] otherwise. A record with no
    /// investor is attributed to the subject it was fetched for.
    pub async fn collect(
        &self,
        subjects: &[String],
    ) -> (Vec<StartupRecord>, Vec<(String, SubjectState)>) {
        let mut records = Vec::new();
        let mut states = Vec::with_capacity(subjects.len());

        for subject in subjects {
            debug!(subject = %subject, state = %SubjectState::Fetching);
            let raw = self.fetcher.fetch(subject).await;
            if raw.trim().is_empty() {
                warn!(subject = %subject, "no payload; skipping subject");
                states.push((subject.clone(), SubjectState::Skipped));
                continue;
            }

            debug!(subject = %subject, state = %SubjectState::Parsing);
            let parsed = parse_records(&raw);
            if parsed.is_empty() {
                warn!(subject = %subject, "payload held no records; skipping subject");
                states.push((subject.clone(), SubjectState::Skipped));
                continue;
            }

            info!(subject = %subject, records = parsed.len(), "parsed subject");
            records.extend(parsed.into_iter().map(|mut record| {
                if record.investor_name.is_none() {
                    record.investor_name = Some(subject.clone());
                }
                record
            }));
            states.push((subject.clone(), SubjectState::Merging));
        }

        (records, states)
    }

    /// Request-driven variant: enriches one submission.
    ///
    /// The submitted name is the fetch subject. When the fetch yields
    /// records, those are merged and returned; otherwise the submission
    /// itself is merged.
    pub async fn enrich(&self, submission: &StartupRecord) -> Result<Enriched, MergeError> {
        let raw = self.fetcher.fetch(&submission.name).await;
        let fetched = parse_records(&raw);

        if fetched.is_empty() {
            debug!(name = %submission.name, "no enrichment; storing submission");
            let merged =
                self.engine
                    .merge_one(submission)
                    .await
                    .map_err(|source| MergeError {
                        committed: 0,
                        name: submission.name.clone(),
                        source,
                    })?;
            return Ok(Enriched::One(merged));
        }

        info!(name = %submission.name, records = fetched.len(), "enriching submission");
        let merged = self.engine.merge(&fetched).await?;
        Ok(Enriched::from_merged(merged))
    }
}

/// `radar sync`: runs the batch orchestrator against the configured
/// database and prints a summary.
pub async fn run_sync(config: &Config, subjects: &[String], dry_run: bool) -> Result<()> {
    let fetcher: Arc<dyn Fetcher> = Arc::new(CompletionClient::new(&config.upstream)?);

    let pool = db::connect(config).await?;
    migrate::migrate_pool(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool.clone()));
    let engine = Arc::new(MergeEngine::new(store, config.merge.identity));
    let pipeline = Pipeline::new(fetcher, engine);

    if dry_run {
        let (records, states) = pipeline.collect(subjects).await;
        println!("sync (dry-run)");
        for (subject, state) in &states {
            println!("  {}: {}", subject, state);
        }
        for record in &records {
            println!("{}", serde_json::to_string(record)?);
        }
        println!("candidates: {}", records.len());
        pool.close().await;
        return Ok(());
    }

    let report = pipeline.run_report(subjects).await;
    pool.close().await;

    println!("sync");
    for (subject, state) in &report.subjects {
        println!("  {}: {}", subject, state);
    }
    if let Some(name) = &report.halted_at {
        println!("  halted at: {}", name);
    }
    println!("merged: {}", report.merged);
    Ok(())
}
