//! Generative Provider Implementations
//!
//! Concrete image, speech and video backends.

mod elevenlabs;
mod hedra;
mod openai_images;
mod runway;
mod runway_legacy;

pub use elevenlabs::ElevenLabsProvider;
pub use hedra::HedraProvider;
pub use openai_images::{ChatImageProvider, ImagenProvider, ImagesApiProvider};
pub use runway::RunwayProvider;
pub use runway_legacy::RunwayLegacyProvider;

/// Vendor-reported failure detail: a string as-is, an object's `message`, or
/// the raw JSON otherwise
pub(crate) fn error_detail(error: &serde_json::Value) -> String {
    if let Some(text) = error.as_str() {
        return text.to_string();
    }
    if let Some(message) = error.get("message").and_then(serde_json::Value::as_str) {
        return message.to_string();
    }
    error.to_string()
}
