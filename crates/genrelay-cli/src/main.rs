//! # GenRelay CLI
//!
//! Headless front end for the generation engine. Configuration comes from an
//! optional JSON file, credentials from the environment (with an optional
//! secrets file consulted after it when a GCP project is configured).
//!
//! ## Commands
//!
//! - `genrelay-cli status` - Which providers have credentials
//! - `genrelay-cli chat` - Text completion or a conversation turn
//! - `genrelay-cli image` - Image generation
//! - `genrelay-cli talking-head` - Speech plus lip-synced video
//! - `genrelay-cli character-video` - Character video and its catalogs
//! - `genrelay-cli hype` - Marketing hype removal

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, warn};

use genrelay_lib::core::config::EngineConfig;
use genrelay_lib::core::credentials::{
    EnvSecretSource, LayeredSecretSource, SecretSource, StaticSecretSource,
};
use genrelay_lib::core::engine::GenerationEngine;

mod commands;

use commands::{CharacterVideoArgs, ChatArgs, HypeArgs, ImageArgs, TalkingHeadArgs};

/// GenRelay - route AI generation requests across providers
#[derive(Parser)]
#[command(name = "genrelay-cli")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the engine configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "GENRELAY_CONFIG",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// JSON file of secrets, consulted after the environment when a GCP
    /// project is configured
    #[arg(long, global = true, env = "GENRELAY_SECRETS", value_name = "FILE")]
    secrets: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Also write daily-rolling log files to this directory
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which providers are configured
    Status,

    /// Complete a prompt or continue a conversation
    Chat(ChatArgs),

    /// Generate an image
    Image(ImageArgs),

    /// Synthesize speech and lip-sync it onto a face
    #[command(name = "talking-head")]
    TalkingHead(TalkingHeadArgs),

    /// Render a character video
    #[command(name = "character-video")]
    CharacterVideo(CharacterVideoArgs),

    /// Remove marketing hype from text
    Hype(HypeArgs),
}

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_dir.as_deref())?;

    let engine = build_engine(cli.config.as_deref(), cli.secrets.as_deref())?;

    match cli.command {
        Commands::Status => commands::status(&engine),
        Commands::Chat(args) => commands::chat(&engine, args).await,
        Commands::Image(args) => commands::image(&engine, args).await,
        Commands::TalkingHead(args) => commands::talking_head(&engine, args).await,
        Commands::CharacterVideo(args) => commands::character_video(&engine, args).await,
        Commands::Hype(args) => commands::hype(&engine, args).await,
    }
}

/// Installs the tracing subscriber. Logs go to stderr so command output on
/// stdout stays machine-readable.
fn init_logging(level: &str, log_dir: Option<&Path>) -> Result<()> {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(dir, "genrelay.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = LOG_GUARD.set(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(())
}

fn build_engine(config_path: Option<&Path>, secrets_path: Option<&Path>) -> Result<GenerationEngine> {
    let mut config = match config_path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let mut secrets = LayeredSecretSource::new(Arc::new(EnvSecretSource));
    if let Some(path) = secrets_path {
        let file = StaticSecretSource::from_json_file(path)
            .with_context(|| format!("Failed to read secrets {}", path.display()))?;
        let project = managed_project(&config, &EnvSecretSource);
        if project.is_none() {
            warn!("Secrets file {} ignored: no GCP project configured", path.display());
        }
        secrets = secrets.with_managed_store(project, Arc::new(file));
    }
    let secrets: Arc<dyn SecretSource> = Arc::new(secrets);

    config.apply_secret_overrides(secrets.as_ref());
    config.normalize();
    debug!("Engine config: {:?}", config);

    GenerationEngine::from_config(config, secrets).context("Failed to build generation engine")
}

/// Project that unlocks the secrets file: the configured one, else `GCP_PROJECT_ID`
fn managed_project(config: &EngineConfig, env: &dyn SecretSource) -> Option<String> {
    config
        .gcp_project_id
        .clone()
        .or_else(|| env.get_secret("GCP_PROJECT_ID"))
        .filter(|p| !p.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_managed_project_has_no_implicit_default() {
        let config = EngineConfig::default();
        assert_eq!(managed_project(&config, &StaticSecretSource::new()), None);

        let env = StaticSecretSource::new().with("GCP_PROJECT_ID", "from-env");
        assert_eq!(managed_project(&config, &env).as_deref(), Some("from-env"));

        let config = EngineConfig {
            gcp_project_id: Some("configured".to_string()),
            ..EngineConfig::default()
        };
        assert_eq!(managed_project(&config, &env).as_deref(), Some("configured"));
    }

    #[test]
    fn test_secrets_file_ignored_without_project() {
        let dir = std::env::temp_dir().join(format!("genrelay-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("secrets.json");
        std::fs::write(&path, r#"{"XAI_API_KEY": "xai-file-key-0000000000"}"#).unwrap();

        let file = StaticSecretSource::from_json_file(&path).unwrap();
        let project = managed_project(&EngineConfig::default(), &StaticSecretSource::new());
        let layered = LayeredSecretSource::new(Arc::new(StaticSecretSource::new()))
            .with_managed_store(project, Arc::new(file));

        assert_eq!(layered.get_secret("XAI_API_KEY"), None);
        std::fs::remove_dir_all(&dir).ok();
    }
}
