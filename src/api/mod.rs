//! Transport-neutral service surface.
//!
//! Exposes `extract`, `decide` and end-to-end processing with errors mapped
//! to status codes. Framing (REST, IPC, CLI) belongs to the caller.

pub mod error;
pub mod service;

pub use error::{ApiError, ErrorBody, ErrorDetail};
pub use service::BtradsService;
