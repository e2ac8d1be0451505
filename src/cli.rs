// Command line entry points. Each subcommand wires the configured paths into
// the library and reports what happened; the work itself lives in the library.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use burn::nn::transformer::TransformerEncoderConfig;
use burn::optim::AdamConfig;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::info;

use lucky_ai::{
    config::AppConfig,
    data_processing::{
        BertTokenizer, DatasetView, Preprocessor, ProcessedStore, RawDir, Subset, SyncEngine,
        DEFAULT_TOKENIZER, MAX_SEQ_LENGTH,
    },
    feedback::{FeedbackStore, PgFeedbackStore},
    inference::Oracle,
    registry::{ArtifactRegistry, DirectoryRegistry},
    server,
    training::{self, TrainingConfig},
};

use crate::{Backend, TrainBackend};

#[derive(Parser, Debug)]
#[command(
    name = "lucky-ai",
    version,
    about = "Yes/no question classifier: data preparation, training and serving."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Normalize raw sources (and user feedback) into processed artifacts
    Preprocess {
        /// `all` skips user feedback when DATABASE_URL is unset; `user` requires it
        #[arg(long, value_enum, default_value_t = Subset::All)]
        subset: Subset,
    },

    /// Record one user submission in the feedback store
    AddUserData {
        /// Question text
        input_text: String,
        /// Expected answer: true/false, yes/no, 1/0
        #[arg(action = ArgAction::Set, value_parser = BoolishValueParser::new())]
        label_bool: bool,
    },

    /// Print per-subset counts, label balance and samples of the processed data
    Stats,

    /// Train the classifier on the processed data
    Train(TrainArgs),

    /// Serve the HTTP inference API
    Serve {
        /// Overrides LUCKY_BIND_ADDR
        #[arg(long)]
        bind: Option<String>,
    },

    /// Copy the latest model artifact from the registry into the model directory
    FetchModel,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Pretrained tokenizer identifier or path to a tokenizer.json
    #[arg(long, default_value = DEFAULT_TOKENIZER)]
    pub tokenizer: String,

    #[arg(long, default_value_t = MAX_SEQ_LENGTH)]
    pub max_seq_length: usize,

    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 5)]
    pub epochs: usize,

    /// Peak learning rate of the Noam schedule
    #[arg(long, default_value_t = 1.0e-2)]
    pub lr: f64,

    #[arg(long, default_value_t = 256)]
    pub d_model: usize,

    /// d_model must be divisible by n_heads
    #[arg(long, default_value_t = 8)]
    pub n_heads: usize,

    #[arg(long, default_value_t = 4)]
    pub n_layers: usize,

    #[arg(long, default_value_t = 1024)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Overrides LUCKY_MODEL_DIR
    #[arg(long)]
    pub artifact_dir: Option<PathBuf>,
}

impl TrainArgs {
    fn to_config(&self) -> TrainingConfig {
        TrainingConfig::new(
            TransformerEncoderConfig::new(self.d_model, self.d_ff, self.n_heads, self.n_layers)
                .with_norm_first(true)
                .with_quiet_softmax(true),
            AdamConfig::new(),
            self.tokenizer.clone(),
        )
        .with_max_seq_length(self.max_seq_length)
        .with_batch_size(self.batch_size)
        .with_num_epochs(self.epochs)
        .with_learning_rate(self.lr)
        .with_seed(self.seed)
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = AppConfig::from_env().context("invalid configuration")?;
        match self.command {
            Commands::Preprocess { subset } => run_preprocess(&config, subset).await,
            Commands::AddUserData {
                input_text,
                label_bool,
            } => run_add_user_data(&config, &input_text, label_bool).await,
            Commands::Stats => run_stats(&config),
            Commands::Train(args) => run_train(&config, &args),
            Commands::Serve { bind } => run_serve(&config, bind).await,
            Commands::FetchModel => run_fetch_model(&config),
        }
    }
}

async fn run_preprocess(config: &AppConfig, subset: Subset) -> Result<()> {
    let raw = RawDir::new(&config.raw_dir);
    let store = ProcessedStore::new(&config.processed_dir);
    let engine = SyncEngine::new(
        store.clone(),
        &config.watermark_path,
        config.sync_options(),
    );
    let feedback = config.database_url.as_deref().map(PgFeedbackStore::new);

    let report = Preprocessor::new(&raw, &store, &engine, feedback.as_ref())
        .run(subset)
        .await;
    if !report.is_success() {
        bail!("preprocessing failed for: {}", report.failed_names());
    }
    Ok(())
}

async fn run_add_user_data(config: &AppConfig, input_text: &str, label: bool) -> Result<()> {
    let store = PgFeedbackStore::from_url(config.database_url.as_deref())?;
    store.insert(input_text, label).await?;
    info!("Added user data: {input_text:?} -> {label}");
    Ok(())
}

fn run_stats(config: &AppConfig) -> Result<()> {
    let train = DatasetView::train(&config.processed_dir)?;
    let test = DatasetView::test(&config.processed_dir)?;
    println!("## Dataset statistics\n");
    println!("{}", train.stats());
    println!("{}", test.stats());
    Ok(())
}

fn run_train(config: &AppConfig, args: &TrainArgs) -> Result<()> {
    let training_config = args.to_config();
    training_config.validate()?;

    let train = DatasetView::train(&config.processed_dir)?;
    let test = DatasetView::test(&config.processed_dir)?;
    let tokenizer = BertTokenizer::load(&training_config.tokenizer)?;

    let artifact_dir = args.artifact_dir.clone().unwrap_or_else(|| config.model_dir.clone());
    let artifact_dir = artifact_dir
        .to_str()
        .context("artifact directory must be valid UTF-8")?
        .to_string();

    let model_path = training::train::<TrainBackend>(
        vec![Default::default()],
        train,
        test,
        Arc::new(tokenizer),
        training_config,
        &artifact_dir,
    )?;
    println!("Training complete. Model saved to {}", model_path.display());
    Ok(())
}

async fn run_serve(config: &AppConfig, bind: Option<String>) -> Result<()> {
    if config.registry_dir.is_some() {
        run_fetch_model(config)?;
    }

    let oracle = Arc::new(Oracle::<Backend>::unloaded());
    oracle
        .load_checkpoint(&config.model_dir, Default::default())
        .with_context(|| format!("loading model from {}", config.model_dir.display()))?;

    let bind_addr = bind.unwrap_or_else(|| config.bind_addr.clone());
    server::serve(oracle, &bind_addr).await?;
    Ok(())
}

fn run_fetch_model(config: &AppConfig) -> Result<()> {
    let Some(registry_dir) = &config.registry_dir else {
        bail!("LUCKY_REGISTRY_DIR is not configured");
    };
    let registry = DirectoryRegistry::new(registry_dir);
    let dest = registry.fetch_latest(&config.model_artifact, &config.model_dir)?;
    println!("Model '{}' available in {}", config.model_artifact, dest.display());
    Ok(())
}
