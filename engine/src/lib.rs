//! GenRelay Core Library
//!
//! Vendor-neutral generation engine: text completion, image generation and
//! lip-synced video, routed across whichever AI providers have credentials
//! configured.
//!
//! The library holds no process-wide state. Callers build a
//! [`core::engine::GenerationEngine`] from an [`core::config::EngineConfig`],
//! a secret source and a keyed store, then drive one request per task.

pub mod core;
