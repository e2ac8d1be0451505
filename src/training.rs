// Fine-tunes the question scorer on the train/test dataset views. The tokenizer
// and batchers are built first, then the model, data loaders, optimizer and
// learning-rate schedule are handed to burn's learner. The trained weights and
// the configuration needed to rebuild the model are written to the artifact
// directory.

use crate::{
    data_processing::{DatasetView, QuestionBatcher, Tokenizer, MAX_SEQ_LENGTH},
    errors::{ConfigError, TrainError},
    model::{AnswerClass, QuestionClassifierConfig},
};
use burn::{
    config::Config,
    data::{dataloader::DataLoaderBuilder, dataset::Dataset},
    lr_scheduler::noam::NoamLrSchedulerConfig,
    module::Module,
    nn::transformer::TransformerEncoderConfig,
    optim::AdamConfig,
    record::{CompactRecorder, Recorder},
    tensor::backend::AutodiffBackend,
    train::{
        metric::{AccuracyMetric, LearningRateMetric, LossMetric},
        LearnerBuilder,
    },
};
use std::path::PathBuf;
use std::sync::Arc;
use strum::EnumCount;
use tracing::info;

#[derive(Config)]
pub struct TrainingConfig {
    pub transformer: TransformerEncoderConfig,
    pub optimizer: AdamConfig,
    /// Pretrained identifier or path of the tokenizer the model was trained with.
    pub tokenizer: String,
    #[config(default = 128)]
    pub max_seq_length: usize,
    #[config(default = 16)]
    pub batch_size: usize,
    #[config(default = 5)]
    pub num_epochs: usize,
    #[config(default = 1.0e-2)]
    pub learning_rate: f64,
    #[config(default = 1000)]
    pub warmup_steps: usize,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = 1)]
    pub num_workers: usize,
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_seq_length == 0 || self.max_seq_length > 512 {
            return Err(ConfigError::Invalid {
                field: "max_seq_length",
                reason: format!("{} is outside 1..=512", self.max_seq_length),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.num_epochs == 0 {
            return Err(ConfigError::Invalid {
                field: "num_epochs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.transformer.d_model % self.transformer.n_heads != 0 {
            return Err(ConfigError::Invalid {
                field: "transformer",
                reason: format!(
                    "d_model {} is not divisible by n_heads {}",
                    self.transformer.d_model, self.transformer.n_heads
                ),
            });
        }
        Ok(())
    }

    /// Reads `{artifact_dir}/config.json` and validates it.
    pub fn load_from_dir(artifact_dir: &str) -> Result<Self, ConfigError> {
        let path = format!("{artifact_dir}/config.json");
        let config = Self::load(path.as_str()).map_err(|err| ConfigError::Load {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn classifier(&self, vocab_size: usize) -> QuestionClassifierConfig {
        QuestionClassifierConfig::new(
            self.transformer.clone(),
            AnswerClass::COUNT,
            vocab_size,
            self.max_seq_length,
        )
    }
}

/// Default small encoder used when no configuration is given.
pub fn default_config(tokenizer: &str) -> TrainingConfig {
    TrainingConfig::new(
        TransformerEncoderConfig::new(256, 1024, 8, 4)
            .with_norm_first(true)
            .with_quiet_softmax(true),
        AdamConfig::new(),
        tokenizer.to_string(),
    )
    .with_max_seq_length(MAX_SEQ_LENGTH)
}

pub fn train<B: AutodiffBackend>(
    devices: Vec<B::Device>,
    dataset_train: DatasetView,
    dataset_test: DatasetView,
    tokenizer: Arc<dyn Tokenizer>,
    config: TrainingConfig,
    artifact_dir: &str,
) -> Result<PathBuf, TrainError> {
    config.validate()?;
    std::fs::create_dir_all(artifact_dir).map_err(|err| TrainError::Save {
        what: "artifact directory",
        path: artifact_dir.to_string(),
        reason: err.to_string(),
    })?;
    let device = devices[0].clone();

    let batcher_train =
        QuestionBatcher::<B>::new(tokenizer.clone(), device.clone(), config.max_seq_length);
    let batcher_test = QuestionBatcher::<B::InnerBackend>::new(
        tokenizer.clone(),
        device.clone(),
        config.max_seq_length,
    );

    let model = config.classifier(tokenizer.vocab_size()).init::<B>(&device);

    info!(
        train = dataset_train.len(),
        test = dataset_test.len(),
        "Training on {} subsets",
        dataset_train.subsets().len()
    );

    let dataloader_train = DataLoaderBuilder::new(batcher_train)
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .build(dataset_train);

    let dataloader_test = DataLoaderBuilder::new(batcher_test)
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .build(dataset_test);

    let optim = config.optimizer.init();

    let lr_scheduler = NoamLrSchedulerConfig::new(config.learning_rate)
        .with_warmup_steps(config.warmup_steps)
        .with_model_size(config.transformer.d_model)
        .init();

    let learner = LearnerBuilder::new(artifact_dir)
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .metric_train_numeric(LearningRateMetric::new())
        .with_file_checkpointer(CompactRecorder::new())
        .devices(devices)
        .num_epochs(config.num_epochs)
        .build(model, optim, lr_scheduler);

    let model_trained = learner.fit(dataloader_train, dataloader_test);

    let config_path = format!("{artifact_dir}/config.json");
    config.save(&config_path).map_err(|err| TrainError::Save {
        what: "config",
        path: config_path.clone(),
        reason: err.to_string(),
    })?;

    let model_path = PathBuf::from(format!("{artifact_dir}/model"));
    CompactRecorder::new()
        .record(model_trained.into_record(), model_path.clone())
        .map_err(|err| TrainError::Save {
            what: "model",
            path: model_path.display().to_string(),
            reason: format!("{err:?}"),
        })?;

    info!("Saved trained model to {}", model_path.display());
    Ok(model_path)
}
