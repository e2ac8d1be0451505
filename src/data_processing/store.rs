// Processed store: one parquet file per `{source}_{split}` artifact. Every write
// replaces the whole artifact through a temporary sibling and a rename, so a
// reader never observes a half-written table.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::{Array, ArrayRef, BooleanArray, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use super::record::{CanonicalRecord, Split};
use crate::errors::DataError;

pub const ARTIFACT_EXTENSION: &str = "parquet";

/// `{source}_{split}`, e.g. `boolq_train`.
pub fn artifact_name(source: &str, split: Split) -> String {
    format!("{source}_{split}")
}

/// Arrow schema of every artifact: exactly `input` and `label`.
pub fn canonical_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("input", DataType::Utf8, false),
        Field::new("label", DataType::Boolean, false),
    ]))
}

#[derive(Clone, Debug)]
pub struct ProcessedStore {
    dir: PathBuf,
}

impl ProcessedStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{ARTIFACT_EXTENSION}"))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.artifact_path(name).is_file()
    }

    /// Replaces artifact `name` with `records`.
    pub fn write(&self, name: &str, records: &[CanonicalRecord]) -> Result<PathBuf, DataError> {
        fs::create_dir_all(&self.dir)?;

        let inputs = StringArray::from(
            records
                .iter()
                .map(|record| record.input.as_str())
                .collect::<Vec<_>>(),
        );
        let labels = BooleanArray::from(records.iter().map(|record| record.label).collect::<Vec<_>>());
        let columns: Vec<ArrayRef> = vec![Arc::new(inputs), Arc::new(labels)];
        let batch = RecordBatch::try_new(canonical_schema(), columns)?;

        let path = self.artifact_path(name);
        let tmp = self.dir.join(format!(".{name}.{ARTIFACT_EXTENSION}.tmp"));
        let file = File::create(&tmp)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
        writer.write(&batch)?;
        writer.close()?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }

    /// Reads artifact `name` back into canonical records.
    pub fn read(&self, name: &str) -> Result<Vec<CanonicalRecord>, DataError> {
        let file = File::open(self.artifact_path(name))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut records = Vec::new();
        for batch in reader {
            let batch = batch?;
            let inputs = string_column(&batch, name, "input")?;
            let labels = bool_column(&batch, name, "label")?;
            for row in 0..batch.num_rows() {
                if inputs.is_null(row) || labels.is_null(row) {
                    return Err(malformed(name, format!("null value in row {row}")));
                }
                let record = CanonicalRecord::new(inputs.value(row), labels.value(row))
                    .ok_or_else(|| malformed(name, format!("empty input in row {row}")))?;
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Deletes artifact `name`; returns whether it existed.
    pub fn remove(&self, name: &str) -> Result<bool, DataError> {
        match fs::remove_file(self.artifact_path(name)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Sorted names of every artifact in the store.
    pub fn artifact_names(&self) -> Result<Vec<String>, DataError> {
        if !self.dir.is_dir() {
            return Err(DataError::NotFound(self.dir.clone()));
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ARTIFACT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn malformed(name: &str, reason: impl Into<String>) -> DataError {
    DataError::MalformedArtifact {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str, column: &str) -> Result<&'a StringArray, DataError> {
    batch
        .column_by_name(column)
        .ok_or_else(|| malformed(name, format!("missing column '{column}'")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| malformed(name, format!("column '{column}' is not utf8")))
}

fn bool_column<'a>(batch: &'a RecordBatch, name: &str, column: &str) -> Result<&'a BooleanArray, DataError> {
    batch
        .column_by_name(column)
        .ok_or_else(|| malformed(name, format!("missing column '{column}'")))?
        .as_any()
        .downcast_ref::<BooleanArray>()
        .ok_or_else(|| malformed(name, format!("column '{column}' is not boolean")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(n: usize) -> Vec<CanonicalRecord> {
        (0..n)
            .map(|i| CanonicalRecord::new(format!("question {i}?"), i % 2 == 0).unwrap())
            .collect()
    }

    #[test]
    fn write_then_read_keeps_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProcessedStore::new(dir.path().join("processed"));

        store.write("boolq_train", &records(4)).unwrap();
        assert_eq!(store.read("boolq_train").unwrap(), records(4));
    }

    #[test]
    fn write_overwrites_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProcessedStore::new(dir.path());

        store.write("user_train", &records(5)).unwrap();
        store.write("user_train", &records(2)).unwrap();
        assert_eq!(store.read("user_train").unwrap().len(), 2);
        assert_eq!(store.artifact_names().unwrap(), vec!["user_train".to_string()]);
    }

    #[test]
    fn artifact_names_ignore_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProcessedStore::new(dir.path());
        store.write("justice_test", &records(1)).unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        assert_eq!(store.artifact_names().unwrap(), vec!["justice_test".to_string()]);
    }

    #[test]
    fn empty_input_in_a_stored_table_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProcessedStore::new(dir.path());

        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(vec!["Is it?", "  "])),
            Arc::new(BooleanArray::from(vec![true, false])),
        ];
        let batch = RecordBatch::try_new(canonical_schema(), columns).unwrap();
        let file = File::create(store.artifact_path("boolq_test")).unwrap();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        assert!(matches!(
            store.read("boolq_test"),
            Err(DataError::MalformedArtifact { .. })
        ));
    }

    #[test]
    fn missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProcessedStore::new(dir.path().join("absent"));
        assert!(matches!(store.artifact_names(), Err(DataError::NotFound(_))));
    }

    #[test]
    fn remove_reports_whether_artifact_existed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProcessedStore::new(dir.path());
        store.write("new_user_train", &records(1)).unwrap();

        assert!(store.remove("new_user_train").unwrap());
        assert!(!store.remove("new_user_train").unwrap());
        assert!(!store.exists("new_user_train"));
    }
}
