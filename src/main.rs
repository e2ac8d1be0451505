mod cli;

use anyhow::Result;
use burn::backend::Autodiff;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;

#[cfg(not(feature = "wgpu"))]
pub type Backend = burn::backend::NdArray<f32>;

#[cfg(feature = "wgpu")]
pub type Backend = burn::backend::Wgpu<burn::backend::wgpu::AutoGraphicsApi, f32, i32>;

pub type TrainBackend = Autodiff<Backend>;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lucky_ai=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    Cli::parse().run().await
}
