//! GenRelay Core Engine
//!
//! Provider routing, request/response normalization and video job
//! orchestration.

pub mod ai;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod factory;
pub mod generative;
pub mod http;
pub mod routing;
pub mod store;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
