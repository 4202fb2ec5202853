use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "BT-RADS Assist";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Local Ollama instance used when nothing else is configured.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Extraction model used when nothing else is configured.
pub const DEFAULT_MODEL: &str = "phi4:14b";

/// Cross-encoder used for relevance reranking.
pub const RERANKER_MODEL: &str = "BAAI/bge-reranker-v2-m3";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "btrads_lib=info"
}

/// Get the application data directory
/// ~/.btrads/ when a home directory exists, the working directory otherwise
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".btrads")
}

/// Get the models directory (ONNX embedder and reranker)
pub fn models_dir() -> PathBuf {
    app_data_dir().join("models")
}

/// Get the embedding model directory (all-MiniLM-L6-v2)
pub fn embedding_model_dir() -> PathBuf {
    models_dir().join("all-MiniLM-L6-v2")
}

/// Get the reranker model directory (bge-reranker-v2-m3)
pub fn reranker_model_dir() -> PathBuf {
    models_dir().join("bge-reranker-v2-m3")
}
