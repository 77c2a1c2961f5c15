//! Generative Media Module
//!
//! Image, speech and video generation, result normalization and artifact
//! persistence.

pub mod audio;
pub mod image;
pub mod normalize;
pub mod orchestrator;
pub mod provider_impls;
pub mod sink;
pub mod video;

pub use audio::SpeechProvider;
pub use image::{ImageGeneration, ImageGenerationAdapter, ImageProvider, ImageRequest};
pub use normalize::{
    decode_data_uri, encode_data_uri, guess_mime, Artifact, ArtifactData, ArtifactSource,
    ContentFetcher, HttpFetcher, ResultNormalizer,
};
pub use orchestrator::{VideoJobOrchestrator, VideoJobOutcome};
pub use sink::{ArtifactSink, LocalArtifactSink};
pub use video::{
    CharacterVideoProvider, CharacterVideoRequest, GenerationJob, JobState, PollPolicy,
    VideoJobInput, VideoJobProvider, VideoJobStatus,
};
