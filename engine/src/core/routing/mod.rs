//! Provider Routing
//!
//! Credential availability and deterministic fallback selection.

mod fallback;
mod registry;

pub use fallback::{FallbackDecision, FallbackResolver, ProviderAttempt};
pub use registry::{AvailabilitySnapshot, ProviderCredential, ProviderRegistry};
