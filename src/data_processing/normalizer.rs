// Schema normalizer: maps each source's raw rows onto the canonical `{input, label}`
// record and writes one artifact per split. Source-specific semantics (filtering,
// label inversion, column renames) live in the per-variant functions below.

use std::path::PathBuf;

use tracing::{debug, info};

use super::raw::RawSource;
use super::record::{CanonicalRecord, CommonsenseRow, JusticeRow, QaRow, RawRow, SourceKind, Split};
use super::store::{artifact_name, ProcessedStore};
use crate::errors::DataError;

/// ETHICS commonsense labels 0 = acceptable, 1 = unacceptable, which is the
/// opposite of our yes/no convention. Long scenarios are skipped.
fn normalize_commonsense(row: CommonsenseRow) -> Option<CanonicalRecord> {
    if !row.is_short {
        return None;
    }
    CanonicalRecord::new(row.input, !row.label)
}

fn normalize_justice(row: JusticeRow) -> Option<CanonicalRecord> {
    CanonicalRecord::new(row.scenario, row.label)
}

fn normalize_qa(row: QaRow) -> Option<CanonicalRecord> {
    CanonicalRecord::new(row.question, row.answer)
}

/// Converts one raw row; `None` means the row is filtered out.
pub fn normalize(row: RawRow) -> Option<CanonicalRecord> {
    match row {
        RawRow::Commonsense(row) => normalize_commonsense(row),
        RawRow::Justice(row) => normalize_justice(row),
        RawRow::StrategyQa(row) | RawRow::BoolQ(row) => normalize_qa(row),
    }
}

pub fn normalize_rows(rows: Vec<RawRow>) -> Vec<CanonicalRecord> {
    rows.into_iter().filter_map(normalize).collect()
}

/// One artifact written by an adapter run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrittenArtifact {
    pub name: String,
    pub path: PathBuf,
    pub rows: usize,
}

/// Runs the adapter for `kind`: loads both splits, normalizes them, then
/// overwrites `{kind}_train` and `{kind}_test`. Nothing is written unless both
/// splits load, so a failing source keeps its previous artifacts.
pub fn run_adapter<R: RawSource + ?Sized>(
    kind: SourceKind,
    raw: &R,
    store: &ProcessedStore,
) -> Result<Vec<WrittenArtifact>, DataError> {
    info!("Preprocessing {kind} data...");

    let mut loaded = Vec::with_capacity(Split::ALL.len());
    for split in Split::ALL {
        let rows = raw.load(kind, split)?;
        let raw_count = rows.len();
        let records = normalize_rows(rows);
        debug!(
            source = %kind,
            %split,
            raw = raw_count,
            kept = records.len(),
            "normalized raw rows"
        );
        loaded.push((split, records));
    }

    let mut written = Vec::with_capacity(loaded.len());
    for (split, records) in loaded {
        let name = artifact_name(kind.as_str(), split);
        let path = store.write(&name, &records)?;
        info!("Saved {} ({} rows)", path.display(), records.len());
        written.push(WrittenArtifact {
            name,
            path,
            rows: records.len(),
        });
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commonsense(label: bool, input: &str, is_short: bool) -> RawRow {
        RawRow::Commonsense(CommonsenseRow {
            label,
            input: input.to_string(),
            is_short,
        })
    }

    #[test]
    fn commonsense_inverts_labels_and_drops_long_rows() {
        let records = normalize_rows(vec![
            commonsense(false, "I helped my neighbour.", true),
            commonsense(true, "I kicked the dog.", true),
            commonsense(false, "A very long story ...", false),
        ]);

        assert_eq!(
            records,
            vec![
                CanonicalRecord::new("I helped my neighbour.", true).unwrap(),
                CanonicalRecord::new("I kicked the dog.", false).unwrap(),
            ]
        );
    }

    #[test]
    fn justice_keeps_label_and_renames_scenario() {
        let record = normalize(RawRow::Justice(JusticeRow {
            label: true,
            scenario: "I deserve a raise because I worked overtime.".to_string(),
        }))
        .unwrap();
        assert_eq!(record.input, "I deserve a raise because I worked overtime.");
        assert!(record.label);
    }

    #[test]
    fn qa_sources_map_question_and_answer() {
        let row = QaRow {
            question: "is the sky blue".to_string(),
            answer: false,
        };
        let strategy = normalize(RawRow::StrategyQa(row.clone())).unwrap();
        let boolq = normalize(RawRow::BoolQ(row)).unwrap();
        assert_eq!(strategy, boolq);
        assert!(!boolq.label);
    }

    #[test]
    fn empty_inputs_are_dropped() {
        let records = normalize_rows(vec![RawRow::BoolQ(QaRow {
            question: String::new(),
            answer: true,
        })]);
        assert!(records.is_empty());
    }
}
