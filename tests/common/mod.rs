#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use lucky_ai::data_processing::{
    CanonicalRecord, CommonsenseRow, JusticeRow, ProcessedStore, QaRow, RawRow, RawSource,
    SourceKind, Split, Tokenizer,
};
use lucky_ai::errors::DataError;

/// Whitespace tokenizer with ids folded from the word bytes. Id 0 is padding.
pub struct WordTokenizer;

pub const VOCAB_SIZE: usize = 512;

impl Tokenizer for WordTokenizer {
    fn encode(&self, value: &str) -> Vec<usize> {
        value
            .split_whitespace()
            .map(|word| {
                let folded = word
                    .bytes()
                    .fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
                folded % (VOCAB_SIZE - 1) + 1
            })
            .collect()
    }

    fn decode(&self, tokens: &[usize]) -> String {
        tokens
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn vocab_size(&self) -> usize {
        VOCAB_SIZE
    }

    fn pad_token(&self) -> usize {
        0
    }
}

/// In-memory raw source that records which upstream splits were asked for.
#[derive(Default)]
pub struct FakeRaw {
    rows: HashMap<(SourceKind, Split), Vec<RawRow>>,
    unavailable: HashSet<SourceKind>,
    pub requested: Mutex<Vec<(SourceKind, &'static str)>>,
}

impl FakeRaw {
    pub fn with(mut self, kind: SourceKind, split: Split, rows: Vec<RawRow>) -> Self {
        self.rows.insert((kind, split), rows);
        self
    }

    pub fn unavailable(mut self, kind: SourceKind) -> Self {
        self.unavailable.insert(kind);
        self
    }

    /// Every source with one train and one test row.
    pub fn complete() -> Self {
        let mut raw = Self::default();
        for kind in SourceKind::ALL {
            for split in Split::ALL {
                let text = format!("{kind} {split} example");
                raw = raw.with(kind, split, vec![row_for(kind, &text, true)]);
            }
        }
        raw
    }
}

impl RawSource for FakeRaw {
    fn load(&self, kind: SourceKind, split: Split) -> Result<Vec<RawRow>, DataError> {
        self.requested
            .lock()
            .unwrap()
            .push((kind, kind.upstream_split(split)));
        if self.unavailable.contains(&kind) {
            return Err(DataError::MissingRaw {
                kind,
                location: "fake".to_string(),
                reason: "source removed".to_string(),
            });
        }
        Ok(self.rows.get(&(kind, split)).cloned().unwrap_or_default())
    }
}

pub fn row_for(kind: SourceKind, text: &str, label: bool) -> RawRow {
    match kind {
        SourceKind::Commonsense => commonsense(text, label, true),
        SourceKind::Justice => RawRow::Justice(JusticeRow {
            label,
            scenario: text.to_string(),
        }),
        SourceKind::StrategyQa => RawRow::StrategyQa(qa(text, label)),
        SourceKind::BoolQ => RawRow::BoolQ(qa(text, label)),
    }
}

pub fn commonsense(text: &str, label: bool, is_short: bool) -> RawRow {
    RawRow::Commonsense(CommonsenseRow {
        label,
        input: text.to_string(),
        is_short,
    })
}

pub fn qa(question: &str, answer: bool) -> QaRow {
    QaRow {
        question: question.to_string(),
        answer,
    }
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn records(prefix: &str, n: usize, label: bool) -> Vec<CanonicalRecord> {
    (0..n)
        .map(|i| CanonicalRecord::new(format!("{prefix} {i}"), label).unwrap())
        .collect()
}

pub fn sorted_inputs(store: &ProcessedStore, name: &str) -> Vec<String> {
    let mut inputs: Vec<String> = store
        .read(name)
        .unwrap()
        .into_iter()
        .map(|record| record.input)
        .collect();
    inputs.sort();
    inputs
}
