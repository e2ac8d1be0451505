pub mod config;
pub mod data_processing;
pub mod errors;
pub mod feedback;
pub mod inference;
pub mod model;
pub mod registry;
pub mod server;
pub mod training;
