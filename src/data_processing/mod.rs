mod batcher;
mod dataset;
mod normalizer;
mod preprocess;
mod raw;
mod record;
mod store;
mod sync;
mod tokenizer;

pub use batcher::*;
pub use dataset::*;
pub use normalizer::*;
pub use preprocess::*;
pub use raw::*;
pub use record::*;
pub use store::*;
pub use sync::*;
pub use tokenizer::*;
