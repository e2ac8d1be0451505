// Runtime configuration read from the process environment. Every value has a
// default except the database URL and the model registry, which only the
// commands that need them ask for.

use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use crate::data_processing::SyncOptions;
use crate::errors::ConfigError;

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub watermark_path: PathBuf,
    pub database_url: Option<String>,
    pub model_dir: PathBuf,
    pub registry_dir: Option<PathBuf>,
    pub model_artifact: String,
    pub bind_addr: String,
    pub train_fraction: f64,
    pub split_seed: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
            watermark_path: PathBuf::from("data/last_sync.txt"),
            database_url: None,
            model_dir: PathBuf::from("artifacts/model"),
            registry_dir: None,
            model_artifact: "lucky_bert".to_string(),
            bind_addr: "0.0.0.0:8000".to_string(),
            train_fraction: 0.8,
            split_seed: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, then validates it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let config = Self {
            raw_dir: var("LUCKY_RAW_DIR").map(PathBuf::from).unwrap_or(defaults.raw_dir),
            processed_dir: var("LUCKY_PROCESSED_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.processed_dir),
            watermark_path: var("LUCKY_WATERMARK_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.watermark_path),
            database_url: var("DATABASE_URL"),
            model_dir: var("LUCKY_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            registry_dir: var("LUCKY_REGISTRY_DIR").map(PathBuf::from),
            model_artifact: var("LUCKY_MODEL_ARTIFACT").unwrap_or(defaults.model_artifact),
            bind_addr: var("LUCKY_BIND_ADDR").unwrap_or(defaults.bind_addr),
            train_fraction: parse(
                "LUCKY_TRAIN_FRACTION",
                var("LUCKY_TRAIN_FRACTION"),
                defaults.train_fraction,
            )?,
            split_seed: var("LUCKY_SPLIT_SEED")
                .map(|value| parse_value("LUCKY_SPLIT_SEED", &value))
                .transpose()?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.train_fraction > 0.0 && self.train_fraction <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "LUCKY_TRAIN_FRACTION",
                reason: format!("{} is outside (0, 1]", self.train_fraction),
            });
        }
        // A watermark inside the processed directory would be picked up as data.
        if lexical(&self.watermark_path).starts_with(lexical(&self.processed_dir)) {
            return Err(ConfigError::Invalid {
                field: "LUCKY_WATERMARK_PATH",
                reason: format!(
                    "{} is inside the processed directory {}",
                    self.watermark_path.display(),
                    self.processed_dir.display()
                ),
            });
        }
        if self.model_artifact.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "LUCKY_MODEL_ARTIFACT",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            train_fraction: self.train_fraction,
            seed: self.split_seed,
        }
    }
}

fn parse<T: FromStr>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match value {
        Some(value) => parse_value(key, &value),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
        field: key,
        reason: format!("'{value}': {err}"),
    })
}

fn lexical(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.sync_options().train_fraction, 0.8);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn overrides_are_read() {
        let config = config_from(&[
            ("LUCKY_PROCESSED_DIR", "/srv/processed"),
            ("LUCKY_SPLIT_SEED", "7"),
            ("LUCKY_TRAIN_FRACTION", "0.5"),
            ("DATABASE_URL", "postgres://localhost/lucky"),
        ])
        .unwrap();
        assert_eq!(config.processed_dir, PathBuf::from("/srv/processed"));
        assert_eq!(config.split_seed, Some(7));
        assert_eq!(config.train_fraction, 0.5);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/lucky"));
    }

    #[test]
    fn bad_numbers_and_ranges_are_rejected() {
        assert!(matches!(
            config_from(&[("LUCKY_TRAIN_FRACTION", "most")]),
            Err(ConfigError::Invalid { field: "LUCKY_TRAIN_FRACTION", .. })
        ));
        assert!(matches!(
            config_from(&[("LUCKY_TRAIN_FRACTION", "0")]),
            Err(ConfigError::Invalid { field: "LUCKY_TRAIN_FRACTION", .. })
        ));
        assert!(matches!(
            config_from(&[("LUCKY_SPLIT_SEED", "-1")]),
            Err(ConfigError::Invalid { field: "LUCKY_SPLIT_SEED", .. })
        ));
    }

    #[test]
    fn watermark_must_live_outside_processed_dir() {
        let err = config_from(&[("LUCKY_WATERMARK_PATH", "./data/processed/last_sync.txt")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "LUCKY_WATERMARK_PATH", .. }));
    }
}
