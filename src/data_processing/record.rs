// Canonical record shared by every source, the split/source enumerations used to
// name artifacts, and the raw row shapes of each upstream dataset. Raw rows are a
// tagged variant so the normalizer can dispatch on the source without guessing
// column names at runtime.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

/// The normalized `{input, label}` row every artifact stores.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub input: String,
    pub label: bool,
}

impl CanonicalRecord {
    /// Returns `None` when the input text is empty after trimming.
    pub fn new(input: impl Into<String>, label: bool) -> Option<Self> {
        let input = input.into();
        if input.trim().is_empty() {
            return None;
        }
        Some(Self { input, label })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub const ALL: [Split; 2] = [Split::Train, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "train" => Ok(Split::Train),
            "test" => Ok(Split::Test),
            other => Err(format!("unknown split '{other}'")),
        }
    }
}

/// Static upstream datasets. User feedback is not listed here because it goes
/// through the sync engine instead of a plain normalizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Commonsense,
    Justice,
    StrategyQa,
    BoolQ,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Commonsense,
        SourceKind::Justice,
        SourceKind::StrategyQa,
        SourceKind::BoolQ,
    ];

    /// Prefix of the artifacts this source produces.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Commonsense => "commonsense",
            SourceKind::Justice => "justice",
            SourceKind::StrategyQa => "strategyqa",
            SourceKind::BoolQ => "boolq",
        }
    }

    /// Name of the upstream split that feeds our `split`. BoolQ ships no test
    /// split, its validation split plays that role.
    pub fn upstream_split(&self, split: Split) -> &'static str {
        match (self, split) {
            (SourceKind::BoolQ, Split::Test) => "validation",
            (_, split) => split.as_str(),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ETHICS commonsense row: `label` is 0 for acceptable, 1 for unacceptable.
#[derive(Clone, Debug, Deserialize)]
pub struct CommonsenseRow {
    #[serde(deserialize_with = "flexible_bool")]
    pub label: bool,
    pub input: String,
    #[serde(deserialize_with = "flexible_bool")]
    pub is_short: bool,
}

/// ETHICS justice row.
#[derive(Clone, Debug, Deserialize)]
pub struct JusticeRow {
    #[serde(deserialize_with = "flexible_bool")]
    pub label: bool,
    pub scenario: String,
}

/// Question/answer row shared by StrategyQA and BoolQ.
#[derive(Clone, Debug, Deserialize)]
pub struct QaRow {
    pub question: String,
    #[serde(deserialize_with = "flexible_bool")]
    pub answer: bool,
}

#[derive(Clone, Debug)]
pub enum RawRow {
    Commonsense(CommonsenseRow),
    Justice(JusticeRow),
    StrategyQa(QaRow),
    BoolQ(QaRow),
}

/// Accepts `true`/`false` in any case, `1`/`0`, and native booleans. CSV files
/// exported by pandas spell booleans `True`/`False`; sqlite stores integers.
pub fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlexibleBool;

    impl<'de> Visitor<'de> for FlexibleBool {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a boolean, 0/1, or true/false")
        }

        fn visit_bool<E: de::Error>(self, value: bool) -> Result<bool, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<bool, E> {
            match value {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(E::custom(format!("expected 0 or 1, got {other}"))),
            }
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<bool, E> {
            match value {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(E::custom(format!("expected 0 or 1, got {other}"))),
            }
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<bool, E> {
            if value == 0.0 {
                Ok(false)
            } else if value == 1.0 {
                Ok(true)
            } else {
                Err(E::custom(format!("expected 0 or 1, got {value}")))
            }
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<bool, E> {
            match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                other => Err(E::custom(format!("expected a boolean, got '{other}'"))),
            }
        }
    }

    deserializer.deserialize_any(FlexibleBool)
}
