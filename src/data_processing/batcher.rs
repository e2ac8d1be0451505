// Batching bridge: turns `(text, label)` items into fixed-shape tensors. Every
// sequence is truncated to `max_seq_length` tokens and padded to the longest
// sequence of its own batch. Training batches carry labels (false -> 0,
// true -> 1); inference batches carry only tokens and the padding mask.

use super::{dataset::QuestionItem, tokenizer::Tokenizer};
use burn::{
    data::dataloader::batcher::Batcher,
    nn::attention::generate_padding_mask,
    tensor::{backend::Backend, Bool, Data, ElementConversion, Int, Tensor},
};
use derive_new::new;
use std::sync::Arc;

/// Maximum number of subword tokens kept per question.
pub const MAX_SEQ_LENGTH: usize = 128;

/// Packs question items into batches
#[derive(Clone, new)]
pub struct QuestionBatcher<B: Backend> {
    tokenizer: Arc<dyn Tokenizer>, // Converts text to token ids
    device: B::Device,             // Device the tensors are created on
    max_seq_length: usize,         // Longest tokenized text kept
}

impl<B: Backend> QuestionBatcher<B> {
    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    pub fn max_seq_length(&self) -> usize {
        self.max_seq_length
    }
}

/// Training batch
#[derive(Debug, Clone, new)]
pub struct QuestionTrainingBatch<B: Backend> {
    pub tokens: Tensor<B, 2, Int>,    // Tokenized text
    pub labels: Tensor<B, 1, Int>,    // Class indices
    pub mask_pad: Tensor<B, 2, Bool>, // true where the token is padding
}

/// Inference batch
#[derive(Debug, Clone, new)]
pub struct QuestionInferenceBatch<B: Backend> {
    pub tokens: Tensor<B, 2, Int>,    // Tokenized text
    pub mask_pad: Tensor<B, 2, Bool>, // true where the token is padding
}

/// 1 for real tokens, 0 for padding.
fn attention_mask<B: Backend>(mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 2, Int> {
    mask_pad.int().neg().add_scalar(1)
}

impl<B: Backend> QuestionTrainingBatch<B> {
    pub fn attention_mask(&self) -> Tensor<B, 2, Int> {
        attention_mask(self.mask_pad.clone())
    }
}

impl<B: Backend> QuestionInferenceBatch<B> {
    pub fn attention_mask(&self) -> Tensor<B, 2, Int> {
        attention_mask(self.mask_pad.clone())
    }
}

impl<B: Backend> Batcher<QuestionItem, QuestionTrainingBatch<B>> for QuestionBatcher<B> {
    fn batch(&self, items: Vec<QuestionItem>) -> QuestionTrainingBatch<B> {
        let mut tokens_list = Vec::with_capacity(items.len());
        let mut labels_list = Vec::with_capacity(items.len());

        items.iter().for_each(|item| {
            tokens_list.push(self.tokenizer.encode(&item.text));
            labels_list.push(Tensor::from_data(
                Data::from([(item.label as i64).elem()]),
                &self.device,
            ));
        });

        let mask = generate_padding_mask(
            self.tokenizer.pad_token(),
            tokens_list,
            Some(self.max_seq_length),
            &self.device,
        );

        QuestionTrainingBatch {
            tokens: mask.tensor,
            labels: Tensor::cat(labels_list, 0),
            mask_pad: mask.mask,
        }
    }
}

impl<B: Backend> Batcher<String, QuestionInferenceBatch<B>> for QuestionBatcher<B> {
    fn batch(&self, items: Vec<String>) -> QuestionInferenceBatch<B> {
        let tokens_list = items
            .iter()
            .map(|item| self.tokenizer.encode(item))
            .collect::<Vec<_>>();

        let mask = generate_padding_mask(
            self.tokenizer.pad_token(),
            tokens_list,
            Some(self.max_seq_length),
            &self.device,
        );

        QuestionInferenceBatch {
            tokens: mask.tensor,
            mask_pad: mask.mask,
        }
    }
}
