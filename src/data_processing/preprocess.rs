// Preprocessing driver: runs the selected source adapters one after another.
// A failing adapter is logged and recorded but never stops the others, so the
// caller gets a full picture of what was refreshed and what was not.

use std::fmt;

use clap::ValueEnum;
use tracing::{error, info, warn};

use super::normalizer::{run_adapter, WrittenArtifact};
use super::raw::RawSource;
use super::record::SourceKind;
use super::store::ProcessedStore;
use super::sync::{SyncEngine, SyncReport, USER_SOURCE};
use crate::errors::{FeedbackError, SyncError};
use crate::feedback::FeedbackStore;

/// Which adapters a `preprocess` run covers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Subset {
    #[default]
    All,
    Commonsense,
    Justice,
    Strategyqa,
    Boolq,
    User,
}

/// One unit of preprocessing work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Adapter {
    Source(SourceKind),
    User,
}

impl fmt::Display for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Adapter::Source(kind) => write!(f, "{kind}"),
            Adapter::User => f.write_str(USER_SOURCE),
        }
    }
}

impl Subset {
    pub fn adapters(&self) -> Vec<Adapter> {
        match self {
            Subset::All => SourceKind::ALL
                .into_iter()
                .map(Adapter::Source)
                .chain(std::iter::once(Adapter::User))
                .collect(),
            Subset::Commonsense => vec![Adapter::Source(SourceKind::Commonsense)],
            Subset::Justice => vec![Adapter::Source(SourceKind::Justice)],
            Subset::Strategyqa => vec![Adapter::Source(SourceKind::StrategyQa)],
            Subset::Boolq => vec![Adapter::Source(SourceKind::BoolQ)],
            Subset::User => vec![Adapter::User],
        }
    }
}

#[derive(Debug)]
pub enum AdapterOutcome {
    Written(Vec<WrittenArtifact>),
    Synced(SyncReport),
}

#[derive(Debug)]
pub struct AdapterFailure {
    pub adapter: Adapter,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct PreprocessReport {
    pub completed: Vec<(Adapter, AdapterOutcome)>,
    pub failed: Vec<AdapterFailure>,
    /// Adapters left out because what they need is not configured.
    pub skipped: Vec<Adapter>,
}

impl PreprocessReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Comma separated names of the adapters that failed.
    pub fn failed_names(&self) -> String {
        self.failed
            .iter()
            .map(|failure| failure.adapter.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub struct Preprocessor<'a, R: RawSource + ?Sized, F: FeedbackStore> {
    raw: &'a R,
    store: &'a ProcessedStore,
    engine: &'a SyncEngine,
    feedback: Option<&'a F>,
}

impl<'a, R: RawSource + ?Sized, F: FeedbackStore> Preprocessor<'a, R, F> {
    /// `feedback` is `None` when no database is configured; only the user
    /// adapter needs it.
    pub fn new(
        raw: &'a R,
        store: &'a ProcessedStore,
        engine: &'a SyncEngine,
        feedback: Option<&'a F>,
    ) -> Self {
        Self {
            raw,
            store,
            engine,
            feedback,
        }
    }

    pub async fn run(&self, subset: Subset) -> PreprocessReport {
        let mut report = PreprocessReport::default();
        for adapter in subset.adapters() {
            // A full run without a database refreshes the other sources; only an
            // explicit `--subset user` treats the missing store as a failure.
            if adapter == Adapter::User && subset == Subset::All && self.feedback.is_none() {
                warn!("No feedback store configured, skipping {adapter} data");
                report.skipped.push(adapter);
                continue;
            }
            match self.run_one(adapter).await {
                Ok(outcome) => report.completed.push((adapter, outcome)),
                Err(reason) => {
                    error!("Preprocessing {adapter} data failed: {reason}");
                    report.failed.push(AdapterFailure { adapter, reason });
                }
            }
        }
        if report.is_success() {
            info!("Preprocessing finished for {} adapter(s)", report.completed.len());
        }
        report
    }

    async fn run_one(&self, adapter: Adapter) -> Result<AdapterOutcome, String> {
        match adapter {
            Adapter::Source(kind) => run_adapter(kind, self.raw, self.store)
                .map(AdapterOutcome::Written)
                .map_err(|err| err.to_string()),
            Adapter::User => {
                info!("Preprocessing user data...");
                let feedback = self
                    .feedback
                    .ok_or_else(|| SyncError::from(FeedbackError::MissingUrl).to_string())?;
                self.engine
                    .sync(feedback)
                    .await
                    .map(AdapterOutcome::Synced)
                    .map_err(|err| err.to_string())
            }
        }
    }
}
