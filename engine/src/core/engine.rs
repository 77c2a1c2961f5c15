//! Generation Engine
//!
//! Top-level entry point. One call handles one `GenerationRequest`:
//!
//! 1. claim the request id in the active-jobs store
//! 2. snapshot credentials and resolve a provider
//! 3. dispatch to the capability's adapter (or the video orchestrator)
//! 4. release the request id, whatever the outcome (cancellation included)
//!
//! The engine holds no mutable state of its own; every request may run on
//! its own tokio task.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::ai::{
    ChatCompletionAdapter, ChatMessage, ChatProvider, CompletionRequest, ConversationReply,
    ConversationService, HypeRemover, HypeReport, HypeStrength,
};
use super::config::EngineConfig;
use super::credentials::SecretSource;
use super::factory::{HttpProviderFactory, ProviderFactory};
use super::generative::{
    Artifact, ArtifactSink, ArtifactSource, CharacterVideoRequest, ImageGenerationAdapter,
    LocalArtifactSink, PollPolicy, ResultNormalizer, VideoJobInput, VideoJobOrchestrator,
    VideoJobOutcome, VideoJobProvider,
};
use super::routing::{FallbackDecision, FallbackResolver, ProviderCredential, ProviderRegistry};
use super::store::{InMemoryStore, KeyedStore};
use super::{ArtifactKind, Capability, CoreError, CoreResult, JobId, ProviderId, RequestId};

// =============================================================================
// Requests
// =============================================================================

/// Video request variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum VideoPayload {
    /// Lip-sync a face image to an audio track (asynchronous job)
    #[serde(rename_all = "camelCase")]
    LipSync {
        /// Audio reference: data URI, URL or local path
        audio: String,
        /// Face image reference; the configured default face when absent
        #[serde(default)]
        face_image: Option<String>,
    },
    /// Render a text-driven character video (single call)
    #[serde(rename_all = "camelCase")]
    Character {
        text: String,
        #[serde(default)]
        character_id: Option<String>,
        #[serde(default)]
        voice_id: Option<String>,
    },
}

/// Capability-specific request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GenerationPayload {
    #[serde(rename_all = "camelCase")]
    Chat {
        messages: Vec<ChatMessage>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
        #[serde(default)]
        json_mode: bool,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        prompt: String,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        inline: bool,
    },
    Video(VideoPayload),
    #[serde(rename_all = "camelCase")]
    Speech {
        text: String,
        #[serde(default)]
        voice_id: Option<String>,
    },
}

impl GenerationPayload {
    pub fn capability(&self) -> Capability {
        match self {
            GenerationPayload::Chat { .. } => Capability::Chat,
            GenerationPayload::Image { .. } => Capability::Image,
            GenerationPayload::Video(_) => Capability::Video,
            GenerationPayload::Speech { .. } => Capability::Audio,
        }
    }
}

/// A single generation request. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub id: RequestId,
    pub capability: Capability,
    pub payload: GenerationPayload,
    #[serde(default)]
    pub preferred_provider: Option<ProviderId>,
    /// Replaces the tail of the default cascade
    #[serde(default)]
    pub custom_fallback: Vec<ProviderId>,
}

impl GenerationRequest {
    /// Creates a request with a fresh id and the payload's capability
    pub fn new(payload: GenerationPayload) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            capability: payload.capability(),
            payload,
            preferred_provider: None,
            custom_fallback: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_preferred(mut self, provider: ProviderId) -> Self {
        self.preferred_provider = Some(provider);
        self
    }

    pub fn with_fallback(mut self, providers: Vec<ProviderId>) -> Self {
        self.custom_fallback = providers;
        self
    }

    fn validate(&self) -> CoreResult<()> {
        if self.id.trim().is_empty() {
            return Err(CoreError::ValidationError("Request id is empty".to_string()));
        }
        if self.payload.capability() != self.capability {
            return Err(CoreError::ValidationError(format!(
                "Payload is a {} request but capability is {}",
                self.payload.capability(),
                self.capability
            )));
        }
        Ok(())
    }

    /// Preferred provider, defaulting character videos to Hedra
    fn effective_preferred(&self) -> Option<ProviderId> {
        match (&self.payload, self.preferred_provider) {
            (GenerationPayload::Video(VideoPayload::Character { .. }), None) => {
                Some(ProviderId::Hedra)
            }
            (_, preferred) => preferred,
        }
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// What a request produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum GenerationOutput {
    Text(String),
    Artifact(Artifact),
}

impl GenerationOutput {
    pub fn text(&self) -> Option<&str> {
        match self {
            GenerationOutput::Text(text) => Some(text),
            GenerationOutput::Artifact(_) => None,
        }
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            GenerationOutput::Artifact(artifact) => Some(artifact),
            GenerationOutput::Text(_) => None,
        }
    }
}

/// Result of a handled request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub request_id: RequestId,
    pub decision: FallbackDecision,
    /// Provider that produced the output. Differs from `decision.chosen` when
    /// an image request degraded to the default image.
    pub provider: ProviderId,
    pub output: GenerationOutput,
    /// Vendor job id for asynchronous video jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_count: Option<u32>,
}

impl GenerationOutcome {
    fn new(request_id: &str, decision: FallbackDecision, output: GenerationOutput) -> Self {
        Self {
            request_id: request_id.to_string(),
            provider: decision.chosen,
            decision,
            output,
            job_id: None,
            poll_count: None,
        }
    }
}

/// Claim on a request id in the active-jobs store.
///
/// `release` frees it in line; a claim dropped without release (the handling
/// future was cancelled) frees it on a spawned task.
struct ActiveJob {
    store: Arc<dyn KeyedStore<String>>,
    id: Option<RequestId>,
}

impl ActiveJob {
    async fn claim(
        store: &Arc<dyn KeyedStore<String>>,
        id: &str,
        capability: Capability,
    ) -> CoreResult<Self> {
        if !store.put_if_absent(id, capability.to_string()).await {
            return Err(CoreError::JobAlreadyActive(id.to_string()));
        }
        Ok(Self {
            store: Arc::clone(store),
            id: Some(id.to_string()),
        })
    }

    async fn release(mut self) {
        if let Some(id) = self.id.take() {
            self.store.delete(&id).await;
        }
    }
}

impl Drop for ActiveJob {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!("Releasing abandoned request {}", id);
                let store = Arc::clone(&self.store);
                runtime.spawn(async move {
                    store.delete(&id).await;
                });
            }
            Err(_) => warn!("Request {} left active: no runtime to release it", id),
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Routes requests to providers and drives them to completion
pub struct GenerationEngine {
    config: EngineConfig,
    registry: ProviderRegistry,
    resolver: FallbackResolver,
    factory: Arc<dyn ProviderFactory>,
    normalizer: ResultNormalizer,
    chat: Arc<ChatCompletionAdapter>,
    images: ImageGenerationAdapter,
    videos: VideoJobOrchestrator,
    conversations: ConversationService,
    hype: HypeRemover,
    active_jobs: Arc<dyn KeyedStore<String>>,
    sink: Arc<dyn ArtifactSink>,
}

impl GenerationEngine {
    /// Builds an engine with in-memory stores and the local artifact sink
    pub fn new(
        config: EngineConfig,
        secrets: Arc<dyn SecretSource>,
        factory: Arc<dyn ProviderFactory>,
    ) -> Self {
        Self::with_stores(
            config,
            secrets,
            factory,
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryStore::new()),
        )
    }

    /// Builds an engine talking to the real vendor APIs
    pub fn from_config(config: EngineConfig, secrets: Arc<dyn SecretSource>) -> CoreResult<Self> {
        let factory = HttpProviderFactory::new(config.clone(), Arc::clone(&secrets))?;
        Ok(Self::new(config, secrets, Arc::new(factory)))
    }

    /// Builds an engine on caller-supplied keyed stores
    pub fn with_stores(
        config: EngineConfig,
        secrets: Arc<dyn SecretSource>,
        factory: Arc<dyn ProviderFactory>,
        active_jobs: Arc<dyn KeyedStore<String>>,
        conversations: Arc<dyn KeyedStore<Vec<ChatMessage>>>,
    ) -> Self {
        let normalizer = ResultNormalizer::new(factory.fetcher());
        let chat = Arc::new(ChatCompletionAdapter::new(
            Arc::clone(&factory),
            config.chat.clone(),
        ));
        let images = ImageGenerationAdapter::new(
            Arc::clone(&factory),
            normalizer.clone(),
            config.assets.default_image_url.clone(),
        );
        let videos =
            VideoJobOrchestrator::new(normalizer.clone(), PollPolicy::from(&config.video));
        let conversations =
            ConversationService::new(Arc::clone(&chat), conversations, &config.chat);
        let hype = HypeRemover::new(Arc::clone(&chat));
        let sink = Arc::new(LocalArtifactSink::from_settings(&config.assets));

        Self {
            registry: ProviderRegistry::new(secrets),
            resolver: FallbackResolver::new(),
            factory,
            normalizer,
            chat,
            images,
            videos,
            conversations,
            hype,
            active_jobs,
            sink,
            config,
        }
    }

    /// Replaces the artifact sink
    pub fn with_sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn chat(&self) -> &ChatCompletionAdapter {
        &self.chat
    }

    pub fn images(&self) -> &ImageGenerationAdapter {
        &self.images
    }

    pub fn videos(&self) -> &VideoJobOrchestrator {
        &self.videos
    }

    pub fn conversations(&self) -> &ConversationService {
        &self.conversations
    }

    /// Per-provider credential status
    pub fn status(&self) -> Vec<ProviderCredential> {
        self.registry.status()
    }

    /// Handles one request end to end.
    ///
    /// Fails with `JobAlreadyActive` if a request with the same id is still
    /// running. The id is released even if the returned future is dropped.
    pub async fn handle(&self, request: GenerationRequest) -> CoreResult<GenerationOutcome> {
        request.validate()?;
        let claim = ActiveJob::claim(&self.active_jobs, &request.id, request.capability).await?;

        let result = self.dispatch(&request).await;
        claim.release().await;

        match &result {
            Ok(outcome) => info!(
                "Request {} completed by {}",
                outcome.request_id, outcome.provider
            ),
            Err(e) => warn!("Request {} failed: {}", request.id, e),
        }
        result
    }

    /// Runs `handle` on its own task
    pub fn spawn(
        self: &Arc<Self>,
        request: GenerationRequest,
    ) -> JoinHandle<CoreResult<GenerationOutcome>> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.handle(request).await })
    }

    async fn dispatch(&self, request: &GenerationRequest) -> CoreResult<GenerationOutcome> {
        let capability = request.capability;
        let preferred = request.effective_preferred();
        let fallback = request.custom_fallback.as_slice();

        match &request.payload {
            GenerationPayload::Chat {
                messages,
                model,
                temperature,
                max_tokens,
                json_mode,
            } => {
                let (decision, backend) =
                    self.resolve_with(capability, preferred, fallback, |p| self.factory.chat(p))?;
                let completion = CompletionRequest {
                    messages: messages.clone(),
                    model: model.clone(),
                    temperature: *temperature,
                    max_tokens: *max_tokens,
                    json_mode: *json_mode,
                };
                let response = self.chat.send_to(backend.as_ref(), completion).await?;
                Ok(GenerationOutcome::new(
                    &request.id,
                    decision,
                    GenerationOutput::Text(response.text),
                ))
            }
            GenerationPayload::Image {
                prompt,
                model,
                inline,
            } => {
                let (decision, generator) =
                    self.resolve_with(capability, preferred, fallback, |p| match p {
                        ProviderId::DefaultImage => Ok(None),
                        p => self.factory.image(p).map(Some),
                    })?;
                let generation = self
                    .images
                    .generate_with(prompt, generator.as_deref(), model.clone(), *inline)
                    .await?;
                let mut outcome = GenerationOutcome::new(
                    &request.id,
                    decision,
                    GenerationOutput::Artifact(generation.artifact),
                );
                outcome.provider = generation.provider;
                Ok(outcome)
            }
            GenerationPayload::Video(VideoPayload::LipSync { audio, face_image }) => {
                let (decision, backend) =
                    self.resolve_with(capability, preferred, fallback, |p| self.factory.video(p))?;
                let audio = self
                    .normalizer
                    .normalize(ArtifactSource::parse(audio), ArtifactKind::Audio)
                    .await?;
                let job = self
                    .run_lip_sync(backend.as_ref(), &request.id, audio, face_image.as_deref())
                    .await?;
                let mut outcome = GenerationOutcome::new(
                    &request.id,
                    decision,
                    GenerationOutput::Artifact(job.artifact),
                );
                outcome.job_id = Some(job.job_id);
                outcome.poll_count = Some(job.poll_count);
                Ok(outcome)
            }
            GenerationPayload::Video(VideoPayload::Character {
                text,
                character_id,
                voice_id,
            }) => {
                let (decision, backend) = self.resolve_with(capability, preferred, fallback, |p| {
                    self.factory.character_video(p)
                })?;
                let artifact = backend
                    .generate(&CharacterVideoRequest {
                        text: text.clone(),
                        character_id: character_id.clone(),
                        voice_id: voice_id.clone(),
                    })
                    .await?;
                Ok(GenerationOutcome::new(
                    &request.id,
                    decision,
                    GenerationOutput::Artifact(artifact),
                ))
            }
            GenerationPayload::Speech { text, voice_id } => {
                let (decision, backend) =
                    self.resolve_with(capability, preferred, fallback, |p| self.factory.speech(p))?;
                let artifact = backend.synthesize(text, voice_id.as_deref()).await?;
                Ok(GenerationOutcome::new(
                    &request.id,
                    decision,
                    GenerationOutput::Artifact(artifact),
                ))
            }
        }
    }

    /// Resolves a provider and builds its backend before any call is made.
    ///
    /// Credentials are read again at build time. A provider whose key has
    /// vanished or is malformed by then is marked unavailable and the cascade
    /// continues from a fresh resolution.
    fn resolve_with<B>(
        &self,
        capability: Capability,
        preferred: Option<ProviderId>,
        fallback: &[ProviderId],
        build: impl Fn(ProviderId) -> CoreResult<B>,
    ) -> CoreResult<(FallbackDecision, B)> {
        let mut snapshot = self.registry.snapshot();
        loop {
            let decision = self
                .resolver
                .resolve(capability, preferred, fallback, &snapshot)?;
            match build(decision.chosen) {
                Ok(backend) => return Ok((decision, backend)),
                Err(e) if e.is_recoverable() => {
                    warn!(
                        "{} unusable after resolution ({}), trying the next provider",
                        decision.chosen, e
                    );
                    snapshot.mark_unavailable(decision.chosen);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn run_lip_sync(
        &self,
        backend: &dyn VideoJobProvider,
        request_id: &str,
        audio: Artifact,
        face_image: Option<&str>,
    ) -> CoreResult<VideoJobOutcome> {
        let face_reference = face_image.unwrap_or(&self.config.assets.default_face_image_url);
        let face_image = self.videos.prepare_face_image(face_reference).await?;
        self.videos
            .run(backend, request_id, &VideoJobInput { audio, face_image })
            .await
    }

    // =========================================================================
    // Pipelines
    // =========================================================================

    /// Text to speech to lip-synced video on Runway
    pub async fn talking_head(
        &self,
        text: &str,
        voice_id: Option<&str>,
        face_image: Option<&str>,
    ) -> CoreResult<VideoJobOutcome> {
        if text.trim().is_empty() {
            return Err(CoreError::ValidationError("Text is empty".to_string()));
        }

        let snapshot = self.registry.snapshot();
        for provider in [ProviderId::ElevenLabs, ProviderId::Runway] {
            if !snapshot.is_available(provider) {
                return Err(CoreError::CredentialMissing { provider });
            }
        }
        // Both backends exist before any paid call goes out
        let speech = self.factory.speech(ProviderId::ElevenLabs)?;
        let video = self.factory.video(ProviderId::Runway)?;

        let request_id = ulid::Ulid::new().to_string();
        let claim = ActiveJob::claim(&self.active_jobs, &request_id, Capability::Video).await?;

        let result = async {
            let audio = speech.synthesize(text, voice_id).await?;
            info!("Synthesized {} bytes of speech", audio.bytes().map_or(0, |b| b.len()));
            self.run_lip_sync(video.as_ref(), &request_id, audio, face_image)
                .await
        }
        .await;

        claim.release().await;
        result
    }

    /// Sends a conversation turn to the resolved chat provider
    pub async fn converse(
        &self,
        conversation_id: Option<&str>,
        preferred: Option<ProviderId>,
        message: &str,
    ) -> CoreResult<ConversationReply> {
        let (_, backend) = self.resolve_chat(preferred)?;
        self.conversations
            .send(conversation_id, backend.as_ref(), message)
            .await
    }

    /// Rewrites `text` without marketing hype on the resolved chat provider
    pub async fn remove_hype(
        &self,
        text: &str,
        strength: HypeStrength,
        custom_terms: &[String],
        context: Option<&str>,
        preferred: Option<ProviderId>,
    ) -> CoreResult<HypeReport> {
        let (_, backend) = self.resolve_chat(preferred)?;
        self.hype
            .remove(text, strength, custom_terms, context, backend.as_ref())
            .await
    }

    pub fn hype(&self) -> &HypeRemover {
        &self.hype
    }

    fn resolve_chat(
        &self,
        preferred: Option<ProviderId>,
    ) -> CoreResult<(FallbackDecision, Arc<dyn ChatProvider>)> {
        self.resolve_with(Capability::Chat, preferred, &[], |p| self.factory.chat(p))
    }

    /// Characters offered by the character video backend
    pub async fn list_characters(&self) -> CoreResult<serde_json::Value> {
        self.factory
            .character_video(ProviderId::Hedra)?
            .list_characters()
            .await
    }

    /// Voices offered by the character video backend
    pub async fn list_voices(&self) -> CoreResult<serde_json::Value> {
        self.factory
            .character_video(ProviderId::Hedra)?
            .list_voices()
            .await
    }

    /// Stores an artifact through the sink and records where it went
    pub async fn persist(&self, mut artifact: Artifact, file_name: &str) -> CoreResult<Artifact> {
        let public_path = self.sink.persist(&artifact, file_name).await?;
        artifact.persisted_path = Some(public_path);
        Ok(artifact)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::credentials::{CredentialType, StaticSecretSource};
    use crate::core::factory::testing::{
        MockCharacterProvider, MockChatProvider, MockFactory, MockFetcher, MockSpeechProvider,
        MockVideoProvider,
    };
    use crate::core::generative::{encode_data_uri, VideoJobStatus};
    use crate::core::routing::ProviderAttempt;
    use std::time::Duration;

    fn secrets(credentials: &[CredentialType]) -> Arc<dyn SecretSource> {
        let source = credentials
            .iter()
            .fold(StaticSecretSource::new(), |source, c| {
                source.with_credential(*c, "test-key-0000000000")
            });
        Arc::new(source)
    }

    fn engine(credentials: &[CredentialType], factory: MockFactory) -> GenerationEngine {
        GenerationEngine::new(
            EngineConfig::default(),
            secrets(credentials),
            Arc::new(factory),
        )
    }

    fn chat_request(text: &str) -> GenerationRequest {
        GenerationRequest::new(GenerationPayload::Chat {
            messages: vec![ChatMessage::user(text)],
            model: None,
            temperature: None,
            max_tokens: None,
            json_mode: false,
        })
    }

    fn lip_sync_request() -> GenerationRequest {
        GenerationRequest::new(GenerationPayload::Video(VideoPayload::LipSync {
            audio: encode_data_uri("audio/mpeg", b"mp3"),
            face_image: Some(encode_data_uri("image/jpeg", b"jpg")),
        }))
    }

    // =========================================================================
    // Routing
    // =========================================================================

    #[tokio::test]
    async fn test_chat_prefers_openai_routes_to_gemini_when_only_gemini_configured() {
        let gemini = Arc::new(MockChatProvider::replying(ProviderId::Gemini, "from gemini"));
        let openai = Arc::new(MockChatProvider::replying(ProviderId::OpenAI, "from openai"));
        let engine = engine(
            &[CredentialType::GeminiApiKey],
            MockFactory::new()
                .with_chat(gemini.clone())
                .with_chat(openai.clone()),
        );

        let outcome = engine
            .handle(chat_request("hello").with_preferred(ProviderId::OpenAI))
            .await
            .unwrap();

        assert_eq!(outcome.provider, ProviderId::Gemini);
        assert_eq!(outcome.output.text(), Some("from gemini"));
        assert_eq!(
            outcome.decision.attempted_providers(),
            vec![ProviderId::OpenAI, ProviderId::Gemini]
        );
        assert!(outcome.decision.is_fallback());
        assert_eq!(gemini.requests().len(), 1);
        assert!(openai.requests().is_empty());
    }

    #[tokio::test]
    async fn test_chat_without_credentials_fails() {
        let engine = engine(&[], MockFactory::new());
        let err = engine.handle(chat_request("hello")).await.unwrap_err();
        assert!(matches!(err, CoreError::NoProviderAvailable { .. }));
    }

    #[tokio::test]
    async fn test_provider_error_propagates_without_retry() {
        let xai = Arc::new(MockChatProvider::failing(ProviderId::Xai, 503));
        let gemini = Arc::new(MockChatProvider::replying(ProviderId::Gemini, "unused"));
        let engine = engine(
            &[CredentialType::XaiApiKey, CredentialType::GeminiApiKey],
            MockFactory::new().with_chat(xai.clone()).with_chat(gemini.clone()),
        );

        let err = engine.handle(chat_request("hello")).await.unwrap_err();

        assert_eq!(err.status_code(), Some(503));
        assert_eq!(xai.requests().len(), 1);
        assert!(gemini.requests().is_empty());
    }

    #[tokio::test]
    async fn test_image_degrades_to_default_without_credentials() {
        let engine = engine(&[], MockFactory::new());
        let request = GenerationRequest::new(GenerationPayload::Image {
            prompt: "a lighthouse".to_string(),
            model: None,
            inline: false,
        })
        .with_preferred(ProviderId::DallE);

        let outcome = engine.handle(request).await.unwrap();

        assert_eq!(outcome.decision.chosen, ProviderId::DefaultImage);
        assert_eq!(outcome.provider, ProviderId::DefaultImage);
        let artifact = outcome.output.artifact().unwrap();
        assert_eq!(
            artifact.uri(),
            Some(engine.config().assets.default_image_url.as_str())
        );
    }

    #[tokio::test]
    async fn test_character_video_defaults_to_hedra() {
        let engine = engine(
            &[CredentialType::HedraApiKey],
            MockFactory::new().with_character(Arc::new(MockCharacterProvider)),
        );
        let request = GenerationRequest::new(GenerationPayload::Video(VideoPayload::Character {
            text: "hi there".to_string(),
            character_id: None,
            voice_id: None,
        }));

        let outcome = engine.handle(request).await.unwrap();

        assert_eq!(outcome.provider, ProviderId::Hedra);
        assert_eq!(
            outcome.output.artifact().unwrap().bytes(),
            Some(&b"hi there"[..])
        );
        assert_eq!(
            engine.list_characters().await.unwrap(),
            serde_json::json!([{"id": "c1"}])
        );
    }

    #[tokio::test]
    async fn test_backend_lost_after_snapshot_falls_through_to_next_provider() {
        // xAI looks configured to the registry but the factory cannot build it
        let gemini = Arc::new(MockChatProvider::replying(ProviderId::Gemini, "from gemini"));
        let engine = engine(
            &[CredentialType::XaiApiKey, CredentialType::GeminiApiKey],
            MockFactory::new().with_chat(gemini.clone()),
        );

        let outcome = engine.handle(chat_request("hello")).await.unwrap();

        assert_eq!(outcome.provider, ProviderId::Gemini);
        assert_eq!(
            outcome.decision.attempts,
            vec![
                ProviderAttempt {
                    provider: ProviderId::Xai,
                    available: false
                },
                ProviderAttempt {
                    provider: ProviderId::Gemini,
                    available: true
                },
            ]
        );
        assert_eq!(gemini.requests().len(), 1);

        let reply = engine.converse(None, None, "hi").await.unwrap();
        assert_eq!(reply.provider, ProviderId::Gemini);
    }

    /// Serves the xAI key for one full registry snapshot, then drops it
    struct RevokingSource {
        xai_reads_left: std::sync::atomic::AtomicUsize,
    }

    impl RevokingSource {
        fn new() -> Self {
            let per_snapshot = ProviderId::all()
                .into_iter()
                .filter(|p| p.credential() == Some(CredentialType::XaiApiKey))
                .count();
            Self {
                xai_reads_left: std::sync::atomic::AtomicUsize::new(per_snapshot),
            }
        }
    }

    impl SecretSource for RevokingSource {
        fn get_secret(&self, name: &str) -> Option<String> {
            use std::sync::atomic::Ordering;
            match name {
                "GEMINI_API_KEY" => Some("AIza-test".to_string()),
                "XAI_API_KEY" => self
                    .xai_reads_left
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .ok()
                    .map(|_| "xai-rotating-key".to_string()),
                _ => None,
            }
        }
    }

    #[tokio::test]
    async fn test_rotated_out_key_cascades_to_gemini() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-1.5-flash:generateContent")
            .with_status(200)
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"from gemini"}]}}]}"#)
            .create_async()
            .await;

        let mut config = EngineConfig::default();
        config.endpoints.gemini = server.url();
        let engine =
            GenerationEngine::from_config(config, Arc::new(RevokingSource::new())).unwrap();

        let outcome = engine.handle(chat_request("hello")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(outcome.provider, ProviderId::Gemini);
        assert_eq!(outcome.output.text(), Some("from gemini"));
        assert_eq!(
            outcome.decision.attempted_providers(),
            vec![ProviderId::Xai, ProviderId::Gemini]
        );
    }

    #[tokio::test]
    async fn test_malformed_key_cascades_to_gemini() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-1.5-flash:generateContent")
            .with_status(200)
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]}}]}"#)
            .create_async()
            .await;

        let mut config = EngineConfig::default();
        config.endpoints.gemini = server.url();
        let secrets = StaticSecretSource::new()
            .with_credential(CredentialType::XaiApiKey, "x".repeat(2000))
            .with_credential(CredentialType::GeminiApiKey, "AIza-test");
        let engine = GenerationEngine::from_config(config, Arc::new(secrets)).unwrap();

        let outcome = engine.handle(chat_request("hello")).await.unwrap();
        assert_eq!(outcome.provider, ProviderId::Gemini);
    }

    // =========================================================================
    // Request Guard
    // =========================================================================

    #[tokio::test]
    async fn test_capability_mismatch_rejected() {
        let engine = engine(&[], MockFactory::new());
        let mut request = chat_request("hello");
        request.capability = Capability::Video;

        let err = engine.handle(request).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_active_request_id_is_rejected_then_released() {
        let active: Arc<InMemoryStore<String>> = Arc::new(InMemoryStore::new());
        let chat = Arc::new(MockChatProvider::replying(ProviderId::Xai, "ok"));
        let engine = GenerationEngine::with_stores(
            EngineConfig::default(),
            secrets(&[CredentialType::XaiApiKey]),
            Arc::new(MockFactory::new().with_chat(chat)),
            active.clone(),
            Arc::new(InMemoryStore::new()),
        );

        active.put("req-1", "chat".to_string()).await;
        let err = engine
            .handle(chat_request("hello").with_id("req-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::JobAlreadyActive(id) if id == "req-1"));

        active.delete("req-1").await;
        engine
            .handle(chat_request("hello").with_id("req-1"))
            .await
            .unwrap();
        engine
            .handle(chat_request("again").with_id("req-1"))
            .await
            .unwrap();
        assert!(active.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_request_releases_its_id() {
        let active: Arc<InMemoryStore<String>> = Arc::new(InMemoryStore::new());
        // Never reaches a terminal status
        let runway = Arc::new(MockVideoProvider::scripted(ProviderId::Runway, vec![]));
        let chat = Arc::new(MockChatProvider::replying(ProviderId::Xai, "ok"));
        let engine = GenerationEngine::with_stores(
            EngineConfig::default(),
            secrets(&[CredentialType::RunwayApiKey, CredentialType::XaiApiKey]),
            Arc::new(MockFactory::new().with_video(runway.clone()).with_chat(chat)),
            active.clone(),
            Arc::new(InMemoryStore::new()),
        );

        let cancelled = tokio::time::timeout(
            Duration::from_secs(12),
            engine.handle(lip_sync_request().with_id("req-x")),
        )
        .await;
        assert!(cancelled.is_err());
        assert!(runway.poll_calls() >= 1);

        while active.get("req-x").await.is_some() {
            tokio::task::yield_now().await;
        }
        engine
            .handle(chat_request("retry").with_id("req-x"))
            .await
            .unwrap();
        assert!(active.is_empty().await);
    }

    // =========================================================================
    // Video
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_two_video_jobs_run_concurrently() {
        let runway = Arc::new(MockVideoProvider::scripted(
            ProviderId::Runway,
            vec![
                VideoJobStatus::Running,
                VideoJobStatus::Succeeded {
                    result_url: "https://cdn.example/a.mp4".to_string(),
                },
            ],
        ));
        let legacy = Arc::new(MockVideoProvider::scripted(
            ProviderId::RunwayLegacy,
            vec![
                VideoJobStatus::Pending,
                VideoJobStatus::Succeeded {
                    result_url: "https://cdn.example/b.mp4".to_string(),
                },
            ],
        ));
        let fetcher = MockFetcher::new()
            .with("https://cdn.example/a.mp4", b"video-a")
            .with("https://cdn.example/b.mp4", b"video-b");
        let engine = Arc::new(engine(
            &[CredentialType::RunwayApiKey],
            MockFactory::new()
                .with_video(runway.clone())
                .with_video(legacy.clone())
                .with_fetcher(fetcher),
        ));

        let started = tokio::time::Instant::now();
        let first = engine.spawn(lip_sync_request().with_preferred(ProviderId::Runway));
        let second = engine.spawn(lip_sync_request().with_preferred(ProviderId::RunwayLegacy));
        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        assert_eq!(first.provider, ProviderId::Runway);
        assert_eq!(first.poll_count, Some(1));
        assert_eq!(first.job_id.as_deref(), Some("mock-job"));
        assert_eq!(
            first.output.artifact().unwrap().bytes(),
            Some(&b"video-a"[..])
        );
        assert_eq!(
            second.output.artifact().unwrap().bytes(),
            Some(&b"video-b"[..])
        );
        // Two polls each at 5s intervals; run back to back this would take 20s
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(15));
        assert_eq!(runway.poll_calls(), 2);
        assert_eq!(legacy.poll_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_talking_head_pipeline() {
        let speech = Arc::new(MockSpeechProvider::new(b"speech"));
        let runway = Arc::new(MockVideoProvider::scripted(
            ProviderId::Runway,
            vec![VideoJobStatus::Succeeded {
                result_url: "https://cdn.example/head.mp4".to_string(),
            }],
        ));
        let engine = engine(
            &[CredentialType::ElevenLabsApiKey, CredentialType::RunwayApiKey],
            MockFactory::new()
                .with_speech(speech.clone())
                .with_video(runway.clone())
                .with_fetcher(MockFetcher::new().with("https://cdn.example/head.mp4", b"head")),
        );

        let face = encode_data_uri("image/png", b"face");
        let outcome = engine
            .talking_head("Hello world", Some("voice-1"), Some(&face))
            .await
            .unwrap();

        assert_eq!(outcome.artifact.bytes(), Some(&b"head"[..]));
        assert_eq!(outcome.poll_count, 0);
        assert_eq!(
            speech.calls(),
            vec![("Hello world".to_string(), Some("voice-1".to_string()))]
        );
        let submitted = runway.submissions();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].audio.bytes(), Some(&b"speech"[..]));
        assert_eq!(submitted[0].face_image.bytes(), Some(&b"face"[..]));
        assert_eq!(submitted[0].face_image.mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_talking_head_requires_both_credentials() {
        let engine = engine(&[CredentialType::ElevenLabsApiKey], MockFactory::new());
        let err = engine.talking_head("Hello", None, None).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::CredentialMissing {
                provider: ProviderId::Runway
            }
        ));

        let engine = engine_without_speech();
        let err = engine.talking_head("Hello", None, None).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::CredentialMissing {
                provider: ProviderId::ElevenLabs
            }
        ));
    }

    fn engine_without_speech() -> GenerationEngine {
        engine(&[CredentialType::RunwayApiKey], MockFactory::new())
    }

    // =========================================================================
    // Sessions and Persistence
    // =========================================================================

    #[tokio::test]
    async fn test_converse_routes_through_resolver() {
        let gemini = Arc::new(MockChatProvider::replying(ProviderId::Gemini, "hey"));
        let engine = engine(
            &[CredentialType::GeminiApiKey],
            MockFactory::new().with_chat(gemini),
        );

        let reply = engine.converse(None, None, "hi").await.unwrap();

        assert_eq!(reply.provider, ProviderId::Gemini);
        assert_eq!(reply.text, "hey");
        let history = engine.conversations().history(&reply.conversation_id).await;
        assert_eq!(history.last(), Some(&ChatMessage::assistant("hey")));
    }

    #[tokio::test]
    async fn test_persist_records_public_path() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&[], MockFactory::new())
            .with_sink(Arc::new(LocalArtifactSink::new(dir.path(), "/static")));
        let artifact = Artifact::from_bytes(ArtifactKind::Audio, b"mp3".to_vec(), "audio/mpeg");

        let stored = engine.persist(artifact, "speech.mp3").await.unwrap();

        assert_eq!(stored.persisted_path.as_deref(), Some("/static/audio/speech.mp3"));
        assert!(dir.path().join("audio/speech.mp3").exists());
    }
}
