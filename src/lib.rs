pub mod api;
pub mod config;
pub mod inference_service;
pub mod models;
pub mod pipeline;
pub mod pipeline_config;

use tracing_subscriber::EnvFilter;

pub use api::{ApiError, BtradsService};
pub use models::{BtradsScore, Decision, ExtractedFacts, ExtractionResult, VolumeInputs};
pub use pipeline::decision::decide;
pub use pipeline_config::PipelineConfig;

/// Install the fmt subscriber. `RUST_LOG` wins over the crate default.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} v{} starting", config::APP_NAME, config::APP_VERSION);
    }
}
