// Dataset view: every processed artifact whose name contains the split token,
// concatenated into one in-memory table. Each row remembers the artifact it came
// from so statistics can be broken down per subset; training only sees the
// `(text, label)` pair through burn's `Dataset` trait.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use burn::data::dataset::Dataset;
use derive_new::new;
use tracing::debug;

use super::record::{CanonicalRecord, Split};
use super::store::ProcessedStore;
use crate::errors::DataError;

// Item handed to the batcher
#[derive(new, Clone, Debug, PartialEq, Eq)]
pub struct QuestionItem {
    pub text: String,  // Question to classify
    pub label: bool,   // true = "yes"
}

/// A canonical row tagged with the artifact it was read from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaggedRecord {
    pub record: CanonicalRecord,
    pub subset: String,
}

#[derive(Debug)]
pub struct DatasetView {
    split: Split,
    dir: PathBuf,
    rows: Vec<TaggedRecord>,
}

impl DatasetView {
    /// Training part of the processed store
    pub fn train(dir: impl AsRef<Path>) -> Result<Self, DataError> {
        Self::load(dir, Split::Train)
    }

    /// Test part of the processed store
    pub fn test(dir: impl AsRef<Path>) -> Result<Self, DataError> {
        Self::load(dir, Split::Test)
    }

    /// Loads every artifact of `split` found in `dir`.
    pub fn load(dir: impl AsRef<Path>, split: Split) -> Result<Self, DataError> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(DataError::NotFound(dir));
        }
        let store = ProcessedStore::new(&dir);

        let names: Vec<String> = store
            .artifact_names()?
            .into_iter()
            .filter(|name| name.contains(split.as_str()))
            .collect();
        if names.is_empty() {
            return Err(DataError::EmptyDataset { split, dir });
        }

        let mut rows = Vec::new();
        for name in names {
            let records = store.read(&name)?;
            debug!(artifact = %name, rows = records.len(), "loaded artifact");
            rows.extend(records.into_iter().map(|record| TaggedRecord {
                record,
                subset: name.clone(),
            }));
        }
        Ok(Self { split, dir, rows })
    }

    pub fn split(&self) -> Split {
        self.split
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn rows(&self) -> &[TaggedRecord] {
        &self.rows
    }

    /// Distinct subset names, sorted.
    pub fn subsets(&self) -> Vec<&str> {
        let mut subsets: Vec<&str> = self.rows.iter().map(|row| row.subset.as_str()).collect();
        subsets.sort_unstable();
        subsets.dedup();
        subsets
    }

    pub fn stats(&self) -> DatasetStats {
        let mut per_subset = BTreeMap::new();
        let mut samples: BTreeMap<String, Vec<TaggedRecord>> = BTreeMap::new();
        let mut positives = 0;
        for row in &self.rows {
            *per_subset.entry(row.subset.clone()).or_insert(0usize) += 1;
            if row.record.label {
                positives += 1;
            }
            let bucket = samples.entry(row.subset.clone()).or_default();
            if bucket.len() < SAMPLES_PER_SUBSET {
                bucket.push(row.clone());
            }
        }
        DatasetStats {
            split: self.split,
            total: self.rows.len(),
            positives,
            per_subset,
            samples,
        }
    }
}

impl Dataset<QuestionItem> for DatasetView {
    /// Item at `index`
    fn get(&self, index: usize) -> Option<QuestionItem> {
        self.rows
            .get(index)
            .map(|row| QuestionItem::new(row.record.input.clone(), row.record.label))
    }

    /// Number of items
    fn len(&self) -> usize {
        self.rows.len()
    }
}

const SAMPLES_PER_SUBSET: usize = 3;
const SAMPLE_PREVIEW_CHARS: usize = 100;

/// Per-split summary printed by the `stats` command.
#[derive(Clone, Debug)]
pub struct DatasetStats {
    pub split: Split,
    pub total: usize,
    pub positives: usize,
    pub per_subset: BTreeMap<String, usize>,
    pub samples: BTreeMap<String, Vec<TaggedRecord>>,
}

impl DatasetStats {
    pub fn negatives(&self) -> usize {
        self.total - self.positives
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

impl fmt::Display for DatasetStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "### {} split", self.split)?;
        writeln!(f, "**Total questions:** {}", self.total)?;
        writeln!(f)?;
        writeln!(f, "| Subset | Count | Percentage |")?;
        writeln!(f, "|--------|-------|------------|")?;
        for (subset, count) in &self.per_subset {
            writeln!(f, "| {subset} | {count} | {:.1}% |", percent(*count, self.total))?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "**Label distribution:** True: {} ({:.1}%) | False: {} ({:.1}%)",
            self.positives,
            percent(self.positives, self.total),
            self.negatives(),
            percent(self.negatives(), self.total)
        )?;
        writeln!(f)?;
        writeln!(f, "**Sample questions:**")?;
        for (subset, rows) in &self.samples {
            writeln!(f)?;
            writeln!(f, "*{subset}:*")?;
            for row in rows {
                let mark = if row.record.label { "yes" } else { "no" };
                let text = &row.record.input;
                if text.chars().count() > SAMPLE_PREVIEW_CHARS {
                    let preview: String = text.chars().take(SAMPLE_PREVIEW_CHARS).collect();
                    writeln!(f, "- [{mark}] {preview}...")?;
                } else {
                    writeln!(f, "- [{mark}] {text}")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(store: &ProcessedStore, name: &str, n: usize, label: bool) {
        let records: Vec<CanonicalRecord> = (0..n)
            .map(|i| CanonicalRecord::new(format!("{name} question {i}"), label).unwrap())
            .collect();
        store.write(name, &records).unwrap();
    }

    #[test]
    fn stats_count_subsets_and_labels() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProcessedStore::new(dir.path());
        write(&store, "boolq_train", 4, true);
        write(&store, "justice_train", 2, false);

        let stats = DatasetView::train(dir.path()).unwrap().stats();
        assert_eq!(stats.total, 6);
        assert_eq!(stats.positives, 4);
        assert_eq!(stats.negatives(), 2);
        assert_eq!(stats.per_subset["boolq_train"], 4);
        assert_eq!(stats.samples["boolq_train"].len(), SAMPLES_PER_SUBSET);

        let rendered = stats.to_string();
        assert!(rendered.contains("| justice_train | 2 | 33.3% |"));
    }

    #[test]
    fn get_returns_text_and_label() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProcessedStore::new(dir.path());
        write(&store, "strategyqa_test", 1, true);

        let view = DatasetView::test(dir.path()).unwrap();
        assert_eq!(
            view.get(0),
            Some(QuestionItem::new("strategyqa_test question 0".to_string(), true))
        );
        assert_eq!(view.get(1), None);
    }
}
