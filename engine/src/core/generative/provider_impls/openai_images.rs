//! Image Generator Implementations
//!
//! - `/images/generations` (DALL-E and xAI share the request shape)
//! - chat-embedded images, where the reply content is the image reference
//! - Imagen, which is disabled and never touches the network

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::generative::image::{ImageProvider, ImageRequest};
use crate::core::http;
use crate::core::{CoreError, CoreResult, ProviderId};

// =============================================================================
// Images API
// =============================================================================

/// `POST {base}/images/generations` generator
pub struct ImagesApiProvider {
    id: ProviderId,
    api_key: String,
    base_url: String,
    default_model: String,
    client: reqwest::Client,
}

impl ImagesApiProvider {
    pub fn new(
        id: ProviderId,
        api_key: String,
        base_url: &str,
        default_model: &str,
        client: reqwest::Client,
    ) -> Self {
        Self {
            id,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_model: default_model.to_string(),
            client,
        }
    }
}

#[derive(Serialize)]
struct ImagesRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    quality: &'a str,
    n: u32,
}

#[derive(Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
}

#[async_trait]
impl ImageProvider for ImagesApiProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn generate(&self, request: &ImageRequest) -> CoreResult<Option<String>> {
        let provider = self.id.to_string();
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let body = ImagesRequest {
            model,
            prompt: &request.prompt,
            size: &request.size,
            quality: &request.quality,
            n: request.count,
        };

        debug!("{} image generation: model={}", provider, model);
        let response: ImagesResponse = http::send_for_json(
            &provider,
            self.client
                .post(format!("{}/images/generations", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;

        Ok(response.data.into_iter().find_map(|d| d.url))
    }
}

// =============================================================================
// Chat-embedded Images
// =============================================================================

const CHAT_IMAGE_SYSTEM_PROMPT: &str = "You are an AI assistant that generates images based on \
    text prompts. Generate a detailed, high-quality image that matches the user's description.";

/// Image generator driven through `/chat/completions`
pub struct ChatImageProvider {
    api_key: String,
    base_url: String,
    default_model: String,
    client: reqwest::Client,
}

impl ChatImageProvider {
    pub fn new(api_key: String, base_url: &str, default_model: &str, client: reqwest::Client) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_model: default_model.to_string(),
            client,
        }
    }
}

#[derive(Deserialize)]
struct ChatImageResponse {
    #[serde(default)]
    choices: Vec<ChatImageChoice>,
}

#[derive(Deserialize)]
struct ChatImageChoice {
    message: ChatImageMessage,
}

#[derive(Deserialize)]
struct ChatImageMessage {
    content: Option<String>,
}

#[async_trait]
impl ImageProvider for ChatImageProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAIChatImage
    }

    async fn generate(&self, request: &ImageRequest) -> CoreResult<Option<String>> {
        let provider = ProviderId::OpenAIChatImage.to_string();
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let body = serde_json::json!({
            "model": model,
            "messages": [
                {"role": "system", "content": CHAT_IMAGE_SYSTEM_PROMPT},
                {"role": "user", "content": format!("Generate an image of: {}", request.prompt)}
            ],
            "response_format": {"type": "image_url"}
        });

        let response: ChatImageResponse = http::send_for_json(
            &provider,
            self.client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;

        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()))
    }
}

// =============================================================================
// Imagen
// =============================================================================

/// Disabled Imagen path. Always reports unavailable without a network call.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImagenProvider;

#[async_trait]
impl ImageProvider for ImagenProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Imagen
    }

    async fn generate(&self, _request: &ImageRequest) -> CoreResult<Option<String>> {
        Err(CoreError::CredentialMissing {
            provider: ProviderId::Imagen,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client() -> reqwest::Client {
        http::build_client(10).unwrap()
    }

    #[tokio::test]
    async fn test_dalle_wire_contract() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/images/generations")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::Json(json!({
                "model": "dall-e-3",
                "prompt": "a lighthouse",
                "size": "1024x1024",
                "quality": "standard",
                "n": 1
            })))
            .with_status(200)
            .with_body(r#"{"data":[{"url":"https://img.example/1.png"}]}"#)
            .create_async()
            .await;

        let provider = ImagesApiProvider::new(
            ProviderId::DallE,
            "sk-test".to_string(),
            &server.url(),
            "dall-e-3",
            client(),
        );
        let url = provider
            .generate(&ImageRequest::new("a lighthouse"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(url.as_deref(), Some("https://img.example/1.png"));
    }

    #[tokio::test]
    async fn test_images_api_empty_data_is_no_result() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/images/generations")
            .with_status(200)
            .with_body(r#"{"data":[]}"#)
            .create_async()
            .await;

        let provider = ImagesApiProvider::new(
            ProviderId::XaiImage,
            "xai-test".to_string(),
            &server.url(),
            "grok-image-1",
            client(),
        );
        assert_eq!(provider.generate(&ImageRequest::new("x")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_chat_embedded_image_reads_message_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o-mini",
                "response_format": {"type": "image_url"}
            })))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":" https://img.example/2.jpg "}}]}"#)
            .create_async()
            .await;

        let provider =
            ChatImageProvider::new("sk-test".to_string(), &server.url(), "gpt-4o-mini", client());
        let url = provider.generate(&ImageRequest::new("a fox")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(url.as_deref(), Some("https://img.example/2.jpg"));
    }

    #[tokio::test]
    async fn test_imagen_is_always_unavailable() {
        let err = ImagenProvider
            .generate(&ImageRequest::new("x"))
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
    }
}
