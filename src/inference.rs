// Inference service. The scorer and its batcher are loaded once and shared by
// every request; questions are answered with the softmax of the two class scores.
// The service starts unloaded, and once unloaded again it refuses new requests
// until something loads it back.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use burn::{
    data::dataloader::batcher::Batcher,
    record::{CompactRecorder, Recorder},
    tensor::{activation::softmax, backend::Backend},
};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    data_processing::{BertTokenizer, QuestionBatcher, QuestionInferenceBatch, Tokenizer},
    errors::ServeError,
    model::{AnswerClass, Scorer},
    training::TrainingConfig,
};

/// Probability of each answer; the two sum to 1.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Answer {
    pub yes: f32,
    pub no: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceState {
    Unloaded,
    Ready,
}

struct Loaded<B: Backend> {
    scorer: Box<dyn Scorer<B>>,
    batcher: QuestionBatcher<B>,
}

pub struct Oracle<B: Backend> {
    loaded: RwLock<Option<Arc<Loaded<B>>>>,
}

impl<B: Backend> Default for Oracle<B> {
    fn default() -> Self {
        Self::unloaded()
    }
}

impl<B: Backend> Oracle<B> {
    pub fn unloaded() -> Self {
        Self {
            loaded: RwLock::new(None),
        }
    }

    /// Installs a scorer, replacing whatever was loaded before.
    pub fn load(
        &self,
        scorer: Box<dyn Scorer<B>>,
        tokenizer: Arc<dyn Tokenizer>,
        device: B::Device,
        max_seq_length: usize,
    ) {
        let batcher = QuestionBatcher::new(tokenizer, device, max_seq_length);
        let loaded = Arc::new(Loaded { scorer, batcher });
        *self.loaded.write().unwrap_or_else(PoisonError::into_inner) = Some(loaded);
        info!("Model loaded, service is ready");
    }

    /// Loads `config.json`, the tokenizer and the `model` record from `artifact_dir`.
    /// A `tokenizer.json` inside the directory wins over the configured source.
    pub fn load_checkpoint(&self, artifact_dir: &Path, device: B::Device) -> Result<(), ServeError> {
        let dir = artifact_dir.display().to_string();
        let config = TrainingConfig::load_from_dir(&dir)?;

        let local_tokenizer = artifact_dir.join("tokenizer.json");
        let tokenizer = if local_tokenizer.is_file() {
            BertTokenizer::from_file(&local_tokenizer)?
        } else {
            BertTokenizer::load(&config.tokenizer)?
        };
        info!("Loaded tokenizer from {}", tokenizer.origin());

        let model_path = artifact_dir.join("model");
        let record = CompactRecorder::new()
            .load(model_path.clone(), &device)
            .map_err(|err| ServeError::Checkpoint {
                path: model_path.display().to_string(),
                reason: format!("{err:?}"),
            })?;
        let model = config
            .classifier(tokenizer.vocab_size())
            .init_with::<B>(record, &device);

        self.load(
            Box::new(model),
            Arc::new(tokenizer),
            device,
            config.max_seq_length,
        );
        Ok(())
    }

    /// Drops the model. Requests already running keep their own handle.
    pub fn unload(&self) {
        if self
            .loaded
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            info!("Model unloaded");
        }
    }

    pub fn state(&self) -> ServiceState {
        match *self.loaded.read().unwrap_or_else(PoisonError::into_inner) {
            Some(_) => ServiceState::Ready,
            None => ServiceState::Unloaded,
        }
    }

    fn current(&self) -> Result<Arc<Loaded<B>>, ServeError> {
        self.loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ServeError::NotReady)
    }

    pub fn ask(&self, question: &str) -> Result<Answer, ServeError> {
        let answers = self.ask_batch(&[question.to_string()])?;
        // One answer per question.
        Ok(answers[0])
    }

    /// Scores every question in one batch, answers are in input order.
    /// Any text is scored; only a question the tokenizer maps to no tokens at
    /// all is refused.
    pub fn ask_batch(&self, questions: &[String]) -> Result<Vec<Answer>, ServeError> {
        let loaded = self.current()?;
        if questions.is_empty() {
            return Ok(Vec::new());
        }
        let tokenizer = loaded.batcher.tokenizer();
        if questions.iter().any(|question| tokenizer.encode(question).is_empty()) {
            return Err(ServeError::NoTokens);
        }

        let batch: QuestionInferenceBatch<B> = loaded.batcher.batch(questions.to_vec());
        let probs = softmax(loaded.scorer.scores(batch), 1);
        let values = probs.into_data().convert::<f32>().value;
        debug!(questions = questions.len(), "scored batch");

        Ok(values
            .chunks(2)
            .map(|row| Answer {
                yes: row[AnswerClass::Yes.index()],
                no: row[AnswerClass::No.index()],
            })
            .collect())
    }
}
