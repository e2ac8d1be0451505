// Incremental sync of the user feedback log into the processed store.
//
// A persisted watermark separates feedback already committed to the permanent
// train/test split (time <= watermark) from feedback that arrived afterwards.
// OLD rows are reshuffled and split 80/20 into `user_train`/`user_test`, NEW
// rows are staged verbatim in `new_user_train`, and the watermark advance is the
// commit point. The whole read-compute-write sequence runs under an advisory
// file lock so two syncs can never interleave.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, warn};

use super::record::{CanonicalRecord, Split};
use super::store::{artifact_name, ProcessedStore};
use crate::errors::SyncError;
use crate::feedback::{FeedbackRecord, FeedbackStore};

pub const USER_SOURCE: &str = "user";
pub const STAGING_ARTIFACT: &str = "new_user_train";

/// Sidecar file holding the RFC 3339 timestamp of the newest feedback row
/// already incorporated.
#[derive(Clone, Debug)]
pub struct Watermark {
    path: PathBuf,
}

impl Watermark {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no watermark was ever written. An unreadable or
    /// unparseable file is an error, never a silent reset.
    pub fn read(&self) -> Result<Option<DateTime<Utc>>, SyncError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        DateTime::parse_from_rfc3339(raw.trim())
            .map(|time| Some(time.with_timezone(&Utc)))
            .map_err(|err| SyncError::CorruptWatermark {
                path: self.path.clone(),
                reason: format!("{err} (content: {:?})", raw.trim()),
            })
    }

    pub fn read_or_min(&self) -> Result<DateTime<Utc>, SyncError> {
        Ok(self.read()?.unwrap_or(DateTime::<Utc>::MIN_UTC))
    }

    pub fn write(&self, time: DateTime<Utc>) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, time.to_rfc3339())?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Exclusive advisory lock held for the duration of one sync. The lock file
/// stays on disk; the lock itself belongs to the open handle, so the OS drops
/// it when the guard drops or the holding process dies.
#[derive(Debug)]
pub struct SyncLock {
    path: PathBuf,
    file: File,
}

impl SyncLock {
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, SyncError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        if let Err(err) = file.try_lock_exclusive() {
            if err.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                return Err(SyncError::Locked(path));
            }
            return Err(err.into());
        }
        // Holder pid, for whoever finds the file while a sync runs.
        file.set_len(0)?;
        writeln!(file, "pid={}", std::process::id())?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            warn!("failed to release sync lock {}: {err}", self.path.display());
        }
    }
}

#[derive(Clone, Debug)]
pub struct SyncOptions {
    /// Share of OLD rows that go to `user_train`.
    pub train_fraction: f64,
    /// Fixed shuffle seed; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            train_fraction: 0.8,
            seed: None,
        }
    }
}

/// What one sync did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub snapshot: usize,
    pub old: usize,
    pub new: usize,
    pub train: usize,
    pub test: usize,
    pub watermark: Option<DateTime<Utc>>,
}

/// `max(1, floor(fraction * n))` rows for training, the rest for test.
pub fn train_count(n: usize, fraction: f64) -> usize {
    if n == 0 {
        return 0;
    }
    let count = (fraction * n as f64).floor() as usize;
    count.clamp(1, n)
}

#[derive(Clone, Debug)]
pub struct SyncEngine {
    store: ProcessedStore,
    watermark: Watermark,
    lock_path: PathBuf,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(store: ProcessedStore, watermark_path: impl Into<PathBuf>, options: SyncOptions) -> Self {
        let watermark = Watermark::new(watermark_path);
        let lock_path = watermark.path().with_extension("lock");
        Self {
            store,
            watermark,
            lock_path,
            options,
        }
    }

    pub fn watermark(&self) -> &Watermark {
        &self.watermark
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Pulls a full feedback snapshot and folds it into the store.
    pub async fn sync<F: FeedbackStore>(&self, feedback: &F) -> Result<SyncReport, SyncError> {
        let _lock = SyncLock::acquire(&self.lock_path)?;
        let snapshot = feedback.fetch_all().await?;
        self.apply(snapshot)
    }

    fn apply(&self, snapshot: Vec<FeedbackRecord>) -> Result<SyncReport, SyncError> {
        if snapshot.is_empty() {
            info!("No user data found, nothing to sync");
            return Ok(SyncReport::default());
        }

        let previous = self.watermark.read()?;
        let boundary = previous.unwrap_or(DateTime::<Utc>::MIN_UTC);
        let latest = snapshot.iter().map(|row| row.time).max();
        let snapshot_len = snapshot.len();

        let (old, new): (Vec<_>, Vec<_>) = snapshot.into_iter().partition(|row| row.time <= boundary);
        let mut report = SyncReport {
            snapshot: snapshot_len,
            old: old.len(),
            new: new.len(),
            ..SyncReport::default()
        };

        if !old.is_empty() {
            let (train, test) = self.split_old(old);
            report.train = train.len();
            report.test = test.len();
            self.store.write(&artifact_name(USER_SOURCE, Split::Train), &train)?;
            self.store.write(&artifact_name(USER_SOURCE, Split::Test), &test)?;
        }

        if new.is_empty() {
            if self.store.remove(STAGING_ARTIFACT)? {
                info!("Cleared staged user data, every row is now in the permanent split");
            }
        } else {
            self.store.write(STAGING_ARTIFACT, &to_records(new))?;
        }

        let advanced = match (previous, latest) {
            (Some(previous), Some(latest)) => Some(previous.max(latest)),
            (None, latest) => latest,
            (previous, None) => previous,
        };
        if let Some(time) = advanced {
            self.watermark.write(time)?;
        }
        report.watermark = advanced;

        info!(
            snapshot = report.snapshot,
            old = report.old,
            new = report.new,
            train = report.train,
            test = report.test,
            "Synced user data, watermark now {}",
            advanced.map(|time| time.to_rfc3339()).unwrap_or_default()
        );
        Ok(report)
    }

    fn split_old(&self, old: Vec<FeedbackRecord>) -> (Vec<CanonicalRecord>, Vec<CanonicalRecord>) {
        let mut records = to_records(old);
        let mut rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        records.shuffle(&mut rng);
        let test = records.split_off(train_count(records.len(), self.options.train_fraction));
        (records, test)
    }
}

fn to_records(rows: Vec<FeedbackRecord>) -> Vec<CanonicalRecord> {
    let total = rows.len();
    let records: Vec<CanonicalRecord> = rows
        .into_iter()
        .filter_map(|row| CanonicalRecord::new(row.prompt, row.label))
        .collect();
    if records.len() < total {
        warn!("Dropped {} feedback rows with empty prompts", total - records.len());
    }
    records
}
