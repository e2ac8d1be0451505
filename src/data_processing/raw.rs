// Source adapters. Each upstream dataset is read into its own raw row shape:
// ETHICS ships as CSV files under the raw directory, StrategyQA and BoolQ are
// pulled from the dataset hub through burn's HuggingFace loader and cached as
// sqlite next to the CSV files.

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use burn::data::dataset::{source::huggingface::HuggingfaceDatasetLoader, Dataset, SqliteDataset};
use serde::de::DeserializeOwned;

use super::record::{CommonsenseRow, JusticeRow, QaRow, RawRow, SourceKind, Split};
use crate::errors::DataError;

/// Something that can hand out the raw rows of one `(source, split)` pair.
pub trait RawSource {
    fn load(&self, kind: SourceKind, split: Split) -> Result<Vec<RawRow>, DataError>;
}

/// Raw data rooted at a directory (`data/raw` by default).
#[derive(Clone, Debug)]
pub struct RawDir {
    root: PathBuf,
}

impl RawDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// CSV file backing an ETHICS split, `None` for hub-backed sources.
    pub fn csv_path(&self, kind: SourceKind, split: Split) -> Option<PathBuf> {
        match kind {
            SourceKind::Commonsense => Some(self.ethics_file("commonsense", "cm", split)),
            SourceKind::Justice => Some(self.ethics_file("justice", "justice", split)),
            SourceKind::StrategyQa | SourceKind::BoolQ => None,
        }
    }

    fn ethics_file(&self, subset: &str, stem: &str, split: Split) -> PathBuf {
        self.root
            .join("ethics")
            .join(subset)
            .join(format!("{stem}_{split}.csv"))
    }

    fn read_csv<T: DeserializeOwned>(&self, kind: SourceKind, path: &Path) -> Result<Vec<T>, DataError> {
        let mut reader = csv::Reader::from_path(path).map_err(|err| DataError::MissingRaw {
            kind,
            location: path.display().to_string(),
            reason: err.to_string(),
        })?;
        let mut rows = Vec::new();
        for row in reader.deserialize() {
            rows.push(row?);
        }
        Ok(rows)
    }

    fn read_hub<T>(&self, kind: SourceKind, name: &str, split: Split) -> Result<Vec<T>, DataError>
    where
        T: DeserializeOwned + Clone + Debug + Send + Sync,
    {
        let upstream = kind.upstream_split(split);
        let cache = self.root.join("hub");
        let dataset: SqliteDataset<T> = HuggingfaceDatasetLoader::new(name)
            .with_base_dir(&cache.to_string_lossy())
            .dataset(upstream)
            .map_err(|err| DataError::MissingRaw {
                kind,
                location: format!("{name}:{upstream}"),
                reason: format!("{err:?}"),
            })?;
        Ok(dataset.iter().collect())
    }
}

impl RawSource for RawDir {
    fn load(&self, kind: SourceKind, split: Split) -> Result<Vec<RawRow>, DataError> {
        match kind {
            SourceKind::Commonsense => {
                let path = self.ethics_file("commonsense", "cm", split);
                let rows: Vec<CommonsenseRow> = self.read_csv(kind, &path)?;
                Ok(rows.into_iter().map(RawRow::Commonsense).collect())
            }
            SourceKind::Justice => {
                let path = self.ethics_file("justice", "justice", split);
                let rows: Vec<JusticeRow> = self.read_csv(kind, &path)?;
                Ok(rows.into_iter().map(RawRow::Justice).collect())
            }
            SourceKind::StrategyQa => {
                let rows: Vec<QaRow> = self.read_hub(kind, "ChilleD/StrategyQA", split)?;
                Ok(rows.into_iter().map(RawRow::StrategyQa).collect())
            }
            SourceKind::BoolQ => {
                let rows: Vec<QaRow> = self.read_hub(kind, "google/boolq", split)?;
                Ok(rows.into_iter().map(RawRow::BoolQ).collect())
            }
        }
    }
}
