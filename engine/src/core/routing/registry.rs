//! Provider Registry
//!
//! Answers "which providers are configured right now". A snapshot is taken
//! once per request from the secret source and handed to the resolver; it is
//! never cached across requests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::credentials::SecretSource;
use crate::core::{Capability, ProviderId};

/// Configuration state of one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredential {
    pub provider: ProviderId,
    pub capability: Capability,
    pub present: bool,
}

/// Point-in-time credential availability for every provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailabilitySnapshot {
    present: BTreeMap<ProviderId, bool>,
}

impl AvailabilitySnapshot {
    /// Builds a snapshot from explicit flags.
    ///
    /// Providers not listed are absent, except the default image which never
    /// needs a credential.
    pub fn from_flags(flags: impl IntoIterator<Item = (ProviderId, bool)>) -> Self {
        let mut present: BTreeMap<ProviderId, bool> =
            ProviderId::all().into_iter().map(|p| (p, false)).collect();
        for (provider, flag) in flags {
            present.insert(provider, flag);
        }
        Self::pin_fixed(&mut present);
        Self { present }
    }

    fn pin_fixed(present: &mut BTreeMap<ProviderId, bool>) {
        present.insert(ProviderId::DefaultImage, true);
        // Imagen generation is disabled regardless of the Gemini key
        present.insert(ProviderId::Imagen, false);
    }

    /// Whether the provider can be called
    pub fn is_available(&self, provider: ProviderId) -> bool {
        self.present.get(&provider).copied().unwrap_or(false)
    }

    /// Records that a provider turned out to be unusable after the snapshot
    /// was taken
    pub fn mark_unavailable(&mut self, provider: ProviderId) {
        self.present.insert(provider, false);
    }

    /// Available providers for a capability, in declaration order
    pub fn available_for(&self, capability: Capability) -> Vec<ProviderId> {
        ProviderId::for_capability(capability)
            .into_iter()
            .filter(|p| self.is_available(*p))
            .collect()
    }

    /// Flattened per-provider view
    pub fn credentials(&self) -> Vec<ProviderCredential> {
        self.present
            .iter()
            .map(|(provider, present)| ProviderCredential {
                provider: *provider,
                capability: provider.capability(),
                present: *present,
            })
            .collect()
    }
}

/// Derives availability snapshots from a secret source
#[derive(Clone)]
pub struct ProviderRegistry {
    secrets: Arc<dyn SecretSource>,
}

impl ProviderRegistry {
    pub fn new(secrets: Arc<dyn SecretSource>) -> Self {
        Self { secrets }
    }

    /// Reads every credential and records which providers are usable
    pub fn snapshot(&self) -> AvailabilitySnapshot {
        let mut present = BTreeMap::new();
        for provider in ProviderId::all() {
            let configured = match provider.credential() {
                Some(credential) => self.secrets.credential(credential).is_some(),
                None => true,
            };
            present.insert(provider, configured);
        }
        AvailabilitySnapshot::pin_fixed(&mut present);
        AvailabilitySnapshot { present }
    }

    /// Configured providers for a capability, in preference order
    pub fn preference_list(&self, capability: Capability) -> Vec<ProviderId> {
        self.snapshot().available_for(capability)
    }

    /// Per-provider configured flags
    pub fn status(&self) -> Vec<ProviderCredential> {
        self.snapshot().credentials()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry").finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::credentials::{CredentialType, StaticSecretSource};

    fn registry(source: StaticSecretSource) -> ProviderRegistry {
        ProviderRegistry::new(Arc::new(source))
    }

    #[test]
    fn test_snapshot_reflects_credentials() {
        let registry = registry(
            StaticSecretSource::new()
                .with_credential(CredentialType::XaiApiKey, "xai-key")
                .with_credential(CredentialType::RunwayApiKey, "rw-key"),
        );
        let snapshot = registry.snapshot();

        assert!(snapshot.is_available(ProviderId::Xai));
        assert!(snapshot.is_available(ProviderId::XaiImage));
        assert!(snapshot.is_available(ProviderId::Runway));
        assert!(snapshot.is_available(ProviderId::RunwayLegacy));
        assert!(!snapshot.is_available(ProviderId::OpenAI));
        assert!(!snapshot.is_available(ProviderId::Hedra));
    }

    #[test]
    fn test_default_image_always_and_imagen_never_available() {
        let empty = registry(StaticSecretSource::new()).snapshot();
        assert!(empty.is_available(ProviderId::DefaultImage));

        let with_gemini = registry(
            StaticSecretSource::new().with_credential(CredentialType::GeminiApiKey, "AIza-key"),
        )
        .snapshot();
        assert!(with_gemini.is_available(ProviderId::Gemini));
        assert!(!with_gemini.is_available(ProviderId::Imagen));
    }

    struct RotatingSource(std::sync::Mutex<Option<String>>);

    impl SecretSource for RotatingSource {
        fn get_secret(&self, name: &str) -> Option<String> {
            if name == "OPENAI_API_KEY" {
                self.0.lock().unwrap().clone()
            } else {
                None
            }
        }
    }

    #[test]
    fn test_snapshot_is_reread_per_call() {
        let source = Arc::new(RotatingSource(std::sync::Mutex::new(None)));
        let registry = ProviderRegistry::new(source.clone());
        assert!(!registry.snapshot().is_available(ProviderId::OpenAI));

        *source.0.lock().unwrap() = Some("sk-new".to_string());
        assert!(registry.snapshot().is_available(ProviderId::OpenAI));
    }

    #[test]
    fn test_preference_list_filters_unconfigured() {
        let registry = registry(
            StaticSecretSource::new()
                .with_credential(CredentialType::GeminiApiKey, "AIza-key")
                .with_credential(CredentialType::OpenaiApiKey, "sk-key"),
        );
        assert_eq!(
            registry.preference_list(Capability::Chat),
            vec![ProviderId::OpenAI, ProviderId::Gemini]
        );
        assert_eq!(
            registry.preference_list(Capability::Image),
            vec![
                ProviderId::DallE,
                ProviderId::OpenAIChatImage,
                ProviderId::DefaultImage
            ]
        );
    }

    #[test]
    fn test_status_lists_every_provider() {
        let status = registry(StaticSecretSource::new()).status();
        assert_eq!(status.len(), ProviderId::all().len());
        let hedra = status
            .iter()
            .find(|c| c.provider == ProviderId::Hedra)
            .unwrap();
        assert!(!hedra.present);
        assert_eq!(hedra.capability, Capability::Video);
    }

    #[test]
    fn test_from_flags_defaults_to_absent() {
        let snapshot = AvailabilitySnapshot::from_flags([(ProviderId::Gemini, true)]);
        assert!(snapshot.is_available(ProviderId::Gemini));
        assert!(!snapshot.is_available(ProviderId::Xai));
        assert!(snapshot.is_available(ProviderId::DefaultImage));
    }

    #[test]
    fn test_mark_unavailable_only_affects_one_provider() {
        let mut snapshot = AvailabilitySnapshot::from_flags([
            (ProviderId::Runway, true),
            (ProviderId::RunwayLegacy, true),
        ]);
        snapshot.mark_unavailable(ProviderId::Runway);
        assert!(!snapshot.is_available(ProviderId::Runway));
        assert_eq!(
            snapshot.available_for(Capability::Video),
            vec![ProviderId::RunwayLegacy]
        );
    }
}
