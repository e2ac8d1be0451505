// The `Tokenizer` trait is the seam between text and token ids used by the
// batcher. `BertTokenizer` wraps a HuggingFace `tokenizers` tokenizer loaded
// either from a local `tokenizer.json` or from a pretrained identifier.

use std::path::Path;

use tracing::warn;

use crate::errors::TokenizerError;

pub const DEFAULT_TOKENIZER: &str = "bert-base-uncased";
const PAD_TOKEN: &str = "[PAD]";

pub trait Tokenizer: Send + Sync {
    /// Converts a text string into a sequence of token ids.
    fn encode(&self, value: &str) -> Vec<usize>;

    /// Converts a sequence of token ids back into text.
    fn decode(&self, tokens: &[usize]) -> String;

    /// Size of the tokenizer vocabulary.
    fn vocab_size(&self) -> usize;

    /// Token used to pad sequences to the same length.
    fn pad_token(&self) -> usize;

    /// String form of the padding token.
    fn pad_token_value(&self) -> String {
        self.decode(&[self.pad_token()])
    }
}

/// BERT-style subword tokenizer.
pub struct BertTokenizer {
    tokenizer: tokenizers::Tokenizer,
    pad_token: usize,
    origin: String,
}

impl BertTokenizer {
    /// Downloads (or reads from the local HuggingFace cache) a pretrained tokenizer.
    pub fn from_pretrained(identifier: &str) -> Result<Self, TokenizerError> {
        let tokenizer =
            tokenizers::Tokenizer::from_pretrained(identifier, None).map_err(|err| TokenizerError::Load {
                origin: identifier.to_string(),
                reason: err.to_string(),
            })?;
        Self::from_tokenizer(tokenizer, identifier)
    }

    /// Loads a serialized `tokenizer.json`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TokenizerError> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let tokenizer = tokenizers::Tokenizer::from_file(path).map_err(|err| TokenizerError::Load {
            origin: origin.clone(),
            reason: err.to_string(),
        })?;
        Self::from_tokenizer(tokenizer, &origin)
    }

    /// A path to a `tokenizer.json` (or a directory holding one) is loaded from
    /// disk, anything else is treated as a pretrained identifier.
    pub fn load(source: &str) -> Result<Self, TokenizerError> {
        let path = Path::new(source);
        if path.is_dir() {
            Self::from_file(path.join("tokenizer.json"))
        } else if path.is_file() {
            Self::from_file(path)
        } else {
            Self::from_pretrained(source)
        }
    }

    fn from_tokenizer(tokenizer: tokenizers::Tokenizer, origin: &str) -> Result<Self, TokenizerError> {
        let pad_token = tokenizer
            .token_to_id(PAD_TOKEN)
            .ok_or_else(|| TokenizerError::MissingPad(origin.to_string()))? as usize;
        Ok(Self {
            tokenizer,
            pad_token,
            origin: origin.to_string(),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl Tokenizer for BertTokenizer {
    fn encode(&self, value: &str) -> Vec<usize> {
        match self.tokenizer.encode(value, true) {
            Ok(encoding) => encoding.get_ids().iter().map(|t| *t as usize).collect(),
            Err(err) => {
                warn!("tokenizer '{}' failed to encode input: {err}", self.origin);
                Vec::new()
            }
        }
    }

    fn decode(&self, tokens: &[usize]) -> String {
        let tokens = tokens.iter().map(|t| *t as u32).collect::<Vec<u32>>();
        self.tokenizer.decode(&tokens, false).unwrap_or_default()
    }

    fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    fn pad_token(&self) -> usize {
        self.pad_token
    }
}
