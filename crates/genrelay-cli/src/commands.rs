//! Subcommand handlers.

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;

use genrelay_lib::core::ai::{ChatMessage, HypeStrength};
use genrelay_lib::core::engine::{
    GenerationEngine, GenerationOutput, GenerationPayload, GenerationRequest, VideoPayload,
};
use genrelay_lib::core::generative::Artifact;
use genrelay_lib::core::{Capability, ProviderId};

#[derive(Args)]
pub struct ChatArgs {
    /// Message to send
    pub message: String,

    /// Preferred provider (openai, xai, gemini)
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Fallback providers tried after the preferred one, in order
    #[arg(long = "fallback", value_delimiter = ',')]
    pub fallback: Vec<String>,

    /// Model override
    #[arg(short, long)]
    pub model: Option<String>,

    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// System prompt for a one-shot completion
    #[arg(long)]
    pub system: Option<String>,

    /// Ask the provider for a JSON object
    #[arg(long)]
    pub json: bool,

    /// Continue (or start, with "new") a conversation
    #[arg(long, value_name = "ID")]
    pub conversation: Option<String>,
}

#[derive(Args)]
pub struct ImageArgs {
    pub prompt: String,

    /// Generator (dalle, gpt4o, xai, imagen, default)
    #[arg(short, long)]
    pub provider: Option<String>,

    #[arg(short, long)]
    pub model: Option<String>,

    /// Download the image and return it as a data URI
    #[arg(long)]
    pub inline: bool,

    /// Store the image under the static directory with this file name
    #[arg(long, value_name = "FILE", requires = "inline")]
    pub save: Option<String>,
}

#[derive(Args)]
pub struct TalkingHeadArgs {
    /// Text to speak
    pub text: String,

    /// ElevenLabs voice id
    #[arg(long)]
    pub voice: Option<String>,

    /// Face image: URL, data URI or local path
    #[arg(long)]
    pub face: Option<String>,

    /// Output file name under the static directory
    #[arg(long, value_name = "FILE")]
    pub out: Option<String>,
}

#[derive(Args)]
pub struct CharacterVideoArgs {
    /// Text to speak; required unless listing
    pub text: Option<String>,

    #[arg(long)]
    pub character: Option<String>,

    #[arg(long)]
    pub voice: Option<String>,

    #[arg(long, value_name = "FILE")]
    pub out: Option<String>,

    /// Print the available characters and exit
    #[arg(long, conflicts_with = "list_voices")]
    pub list_characters: bool,

    /// Print the available voices and exit
    #[arg(long)]
    pub list_voices: bool,
}

#[derive(Args)]
pub struct HypeArgs {
    /// Text to clean up; read from --file when omitted
    pub text: Option<String>,

    #[arg(long, value_name = "FILE", conflicts_with = "text")]
    pub file: Option<std::path::PathBuf>,

    /// mild, moderate or strong
    #[arg(long, default_value = "moderate")]
    pub strength: String,

    /// Extra term to treat as hype (repeatable)
    #[arg(long = "term")]
    pub terms: Vec<String>,

    /// What the text is, to guide the rewrite
    #[arg(long)]
    pub context: Option<String>,

    #[arg(short, long)]
    pub provider: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

pub fn status(engine: &GenerationEngine) -> Result<()> {
    print_json(&engine.status())
}

pub async fn chat(engine: &GenerationEngine, args: ChatArgs) -> Result<()> {
    let preferred = parse_provider(Capability::Chat, args.provider.as_deref())?;

    if let Some(conversation) = args.conversation.as_deref() {
        let id = (conversation != "new").then_some(conversation);
        let reply = engine.converse(id, preferred, &args.message).await?;
        eprintln!("conversation: {} (via {})", reply.conversation_id, reply.provider);
        println!("{}", reply.text);
        return Ok(());
    }

    let mut messages = Vec::new();
    if let Some(system) = args.system {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(args.message));

    let fallback = args
        .fallback
        .iter()
        .map(|name| parse_provider(Capability::Chat, Some(name)))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect();

    let mut request = GenerationRequest::new(GenerationPayload::Chat {
        messages,
        model: args.model,
        temperature: args.temperature,
        max_tokens: args.max_tokens,
        json_mode: args.json,
    })
    .with_fallback(fallback);
    request.preferred_provider = preferred;

    let outcome = engine.handle(request).await?;
    eprintln!("provider: {} ({})", outcome.provider, outcome.decision.reason);
    if let GenerationOutput::Text(text) = outcome.output {
        println!("{}", text);
    }
    Ok(())
}

pub async fn image(engine: &GenerationEngine, args: ImageArgs) -> Result<()> {
    let mut request = GenerationRequest::new(GenerationPayload::Image {
        prompt: args.prompt,
        model: args.model,
        inline: args.inline,
    });
    request.preferred_provider = parse_provider(Capability::Image, args.provider.as_deref())?;

    let outcome = engine.handle(request).await?;
    let GenerationOutput::Artifact(artifact) = outcome.output else {
        bail!("Image request returned no artifact");
    };

    let artifact = match args.save {
        Some(file_name) => engine.persist(artifact, &file_name).await?,
        None => artifact,
    };
    print_json(&ArtifactSummary::new(outcome.provider, &artifact))
}

pub async fn talking_head(engine: &GenerationEngine, args: TalkingHeadArgs) -> Result<()> {
    let outcome = engine
        .talking_head(&args.text, args.voice.as_deref(), args.face.as_deref())
        .await?;
    eprintln!(
        "{} job {} finished after {} polls",
        outcome.provider, outcome.job_id, outcome.poll_count
    );

    let file_name = args
        .out
        .unwrap_or_else(|| format!("talking_head_{}.mp4", outcome.job_id));
    let artifact = engine.persist(outcome.artifact, &file_name).await?;
    print_json(&ArtifactSummary::new(outcome.provider, &artifact))
}

pub async fn character_video(engine: &GenerationEngine, args: CharacterVideoArgs) -> Result<()> {
    if args.list_characters {
        return print_json(&engine.list_characters().await?);
    }
    if args.list_voices {
        return print_json(&engine.list_voices().await?);
    }

    let text = args
        .text
        .context("Text is required unless --list-characters or --list-voices is given")?;
    let request = GenerationRequest::new(GenerationPayload::Video(VideoPayload::Character {
        text,
        character_id: args.character,
        voice_id: args.voice,
    }));
    let request_id = request.id.clone();

    let outcome = engine.handle(request).await?;
    let GenerationOutput::Artifact(artifact) = outcome.output else {
        bail!("Character video request returned no artifact");
    };

    let file_name = args
        .out
        .unwrap_or_else(|| format!("character_{}.mp4", request_id));
    let artifact = engine.persist(artifact, &file_name).await?;
    print_json(&ArtifactSummary::new(outcome.provider, &artifact))
}

pub async fn hype(engine: &GenerationEngine, args: HypeArgs) -> Result<()> {
    let text = match (args.text, args.file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => bail!("Provide text or --file"),
    };
    let strength: HypeStrength = args.strength.parse().map_err(anyhow::Error::msg)?;
    let preferred = parse_provider(Capability::Chat, args.provider.as_deref())?;

    let report = engine
        .remove_hype(
            &text,
            strength,
            &args.terms,
            args.context.as_deref(),
            preferred,
        )
        .await?;
    print_json(&report)
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_provider(capability: Capability, name: Option<&str>) -> Result<Option<ProviderId>> {
    name.map(|n| ProviderId::parse_for(capability, n).map_err(anyhow::Error::msg))
        .transpose()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{}", rendered);
    Ok(())
}

/// Artifact description without inline bytes
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactSummary {
    provider: ProviderId,
    kind: String,
    mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    persisted_path: Option<String>,
}

impl ArtifactSummary {
    fn new(provider: ProviderId, artifact: &Artifact) -> Self {
        Self {
            provider,
            kind: artifact.kind.to_string(),
            mime_type: artifact.mime_type.clone(),
            uri: artifact.uri().map(truncate_data_uri),
            size_bytes: artifact.bytes().map(<[u8]>::len),
            persisted_path: artifact.persisted_path.clone(),
        }
    }
}

fn truncate_data_uri(uri: &str) -> String {
    if uri.starts_with("data:") && uri.len() > 80 {
        let cut = uri
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|i| *i <= 80)
            .last()
            .unwrap_or(0);
        format!("{}... ({} chars)", &uri[..cut], uri.len())
    } else {
        uri.to_string()
    }
}
