// Yes/no question scorer: a transformer encoder over token + position embeddings
// with a linear head read at the first position. Anything that maps an inference
// batch to two raw class scores per question can stand in through `Scorer`.

use crate::data_processing::{QuestionInferenceBatch, QuestionTrainingBatch};
use burn::{
    config::Config,
    module::Module,
    nn::{
        loss::CrossEntropyLossConfig,
        transformer::{TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput},
        Embedding, EmbeddingConfig, Linear, LinearConfig,
    },
    tensor::backend::{AutodiffBackend, Backend},
    tensor::{Bool, Device, Int, Tensor},
    train::{ClassificationOutput, TrainOutput, TrainStep, ValidStep},
};
use strum_macros::{EnumCount, EnumIter};

/// Output classes, in score-column order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumCount, EnumIter)]
pub enum AnswerClass {
    No,
    Yes,
}

impl AnswerClass {
    pub fn index(&self) -> usize {
        match self {
            AnswerClass::No => 0,
            AnswerClass::Yes => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnswerClass::No => "no",
            AnswerClass::Yes => "yes",
        }
    }
}

/// Produces `[batch, 2]` raw (pre-softmax) scores.
pub trait Scorer<B: Backend>: Send + Sync {
    fn scores(&self, batch: QuestionInferenceBatch<B>) -> Tensor<B, 2>;
}

#[derive(Module, Debug)]
pub struct QuestionClassifier<B: Backend> {
    transformer: TransformerEncoder<B>,
    embedding_token: Embedding<B>,
    embedding_pos: Embedding<B>,
    output: Linear<B>,
    n_classes: usize,
    max_seq_length: usize,
}

#[derive(Config)]
pub struct QuestionClassifierConfig {
    transformer: TransformerEncoderConfig,
    n_classes: usize,
    vocab_size: usize,
    max_seq_length: usize,
}

impl QuestionClassifierConfig {
    /// Model with freshly initialized weights
    pub fn init<B: Backend>(&self, device: &B::Device) -> QuestionClassifier<B> {
        let output = LinearConfig::new(self.transformer.d_model, self.n_classes).init(device);
        let transformer = self.transformer.init(device);
        let embedding_token =
            EmbeddingConfig::new(self.vocab_size, self.transformer.d_model).init(device);
        let embedding_pos =
            EmbeddingConfig::new(self.max_seq_length, self.transformer.d_model).init(device);

        QuestionClassifier {
            transformer,
            embedding_token,
            embedding_pos,
            output,
            n_classes: self.n_classes,
            max_seq_length: self.max_seq_length,
        }
    }

    /// Model with weights restored from a saved record
    pub fn init_with<B: Backend>(
        &self,
        record: QuestionClassifierRecord<B>,
        device: &B::Device,
    ) -> QuestionClassifier<B> {
        self.init(device).load_record(record)
    }
}

impl<B: Backend> QuestionClassifier<B> {
    /// Forward pass for training and validation
    pub fn forward(&self, item: QuestionTrainingBatch<B>) -> ClassificationOutput<B> {
        let [batch_size, seq_length] = item.tokens.dims();
        let device = &self.embedding_token.devices()[0];

        let tokens = item.tokens.to_device(device);
        let labels = item.labels.to_device(device);
        let mask_pad = item.mask_pad.to_device(device);

        let output = self.classify(tokens, mask_pad, seq_length, batch_size, device);

        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), labels.clone());

        ClassificationOutput {
            loss,
            output,
            targets: labels,
        }
    }

    /// Raw class scores, one row per question
    pub fn infer(&self, item: QuestionInferenceBatch<B>) -> Tensor<B, 2> {
        let [batch_size, seq_length] = item.tokens.dims();
        let device = &self.embedding_token.devices()[0];

        let tokens = item.tokens.to_device(device);
        let mask_pad = item.mask_pad.to_device(device);

        self.classify(tokens, mask_pad, seq_length, batch_size, device)
    }

    fn classify(
        &self,
        tokens: Tensor<B, 2, Int>,
        mask_pad: Tensor<B, 2, Bool>,
        seq_length: usize,
        batch_size: usize,
        device: &Device<B>,
    ) -> Tensor<B, 2> {
        // Token and position embeddings are averaged
        let index_positions = Tensor::arange(0..seq_length, device)
            .reshape([1, seq_length])
            .repeat(0, batch_size);
        let embedding_positions = self.embedding_pos.forward(index_positions);
        let embedding_tokens = self.embedding_token.forward(tokens);
        let embedding = (embedding_positions + embedding_tokens) / 2;

        let encoded = self
            .transformer
            .forward(TransformerEncoderInput::new(embedding).mask_pad(mask_pad));
        let output = self.output.forward(encoded);

        // The first position carries the classification
        output
            .slice([0..batch_size, 0..1])
            .reshape([batch_size, self.n_classes])
    }
}

impl<B: Backend> Scorer<B> for QuestionClassifier<B> {
    fn scores(&self, batch: QuestionInferenceBatch<B>) -> Tensor<B, 2> {
        self.infer(batch)
    }
}

impl<B: AutodiffBackend> TrainStep<QuestionTrainingBatch<B>, ClassificationOutput<B>>
    for QuestionClassifier<B>
{
    fn step(&self, item: QuestionTrainingBatch<B>) -> TrainOutput<ClassificationOutput<B>> {
        let item = self.forward(item);
        let grads = item.loss.backward();

        TrainOutput::new(self, grads, item)
    }
}

impl<B: Backend> ValidStep<QuestionTrainingBatch<B>, ClassificationOutput<B>>
    for QuestionClassifier<B>
{
    fn step(&self, item: QuestionTrainingBatch<B>) -> ClassificationOutput<B> {
        self.forward(item)
    }
}
