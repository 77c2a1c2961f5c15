//! Fallback Resolution
//!
//! Pure provider selection. Given a capability, the caller's preference and an
//! availability snapshot, picks exactly one provider and records every
//! candidate that was considered.
//!
//! Cascades per capability:
//!
//! - Chat: fixed, asymmetric order keyed on the preferred provider
//!   (gemini → xai → openai, xai → gemini → openai, openai → gemini → xai).
//!   A caller-supplied list replaces everything after the preferred provider.
//! - Image: the requested generator, else the default static image. Never fails.
//! - Video / audio: the requested provider, then any caller-supplied list.
//!   No implicit cascade.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::registry::AvailabilitySnapshot;
use crate::core::{Capability, CoreError, CoreResult, ProviderId};

/// One candidate considered during resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAttempt {
    pub provider: ProviderId,
    pub available: bool,
}

/// Outcome of a resolution, with its audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackDecision {
    pub capability: Capability,
    pub chosen: ProviderId,
    /// Every candidate checked, in order, up to and including `chosen`
    pub attempts: Vec<ProviderAttempt>,
    pub reason: String,
}

impl FallbackDecision {
    /// Providers checked, in order
    pub fn attempted_providers(&self) -> Vec<ProviderId> {
        self.attempts.iter().map(|a| a.provider).collect()
    }

    /// Whether the chosen provider differs from the first candidate
    pub fn is_fallback(&self) -> bool {
        self.attempts
            .first()
            .map(|first| first.provider != self.chosen)
            .unwrap_or(false)
    }
}

/// Deterministic provider selector
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackResolver;

impl FallbackResolver {
    pub fn new() -> Self {
        Self
    }

    /// Provider used when the caller does not name one
    pub fn default_preferred(capability: Capability) -> ProviderId {
        match capability {
            Capability::Chat => ProviderId::Xai,
            Capability::Image => ProviderId::DefaultImage,
            Capability::Video => ProviderId::Runway,
            Capability::Audio => ProviderId::ElevenLabs,
        }
    }

    /// The built-in chat cascade starting from `preferred`
    pub fn chat_cascade(preferred: ProviderId) -> Vec<ProviderId> {
        match preferred {
            ProviderId::Gemini => vec![ProviderId::Gemini, ProviderId::Xai, ProviderId::OpenAI],
            ProviderId::Xai => vec![ProviderId::Xai, ProviderId::Gemini, ProviderId::OpenAI],
            ProviderId::OpenAI => vec![ProviderId::OpenAI, ProviderId::Gemini, ProviderId::Xai],
            other => vec![other],
        }
    }

    /// Ordered candidate list for a request, before availability is applied
    pub fn candidates(
        &self,
        capability: Capability,
        preferred: ProviderId,
        custom_fallback: &[ProviderId],
    ) -> Vec<ProviderId> {
        let mut candidates = match capability {
            Capability::Chat if custom_fallback.is_empty() => Self::chat_cascade(preferred),
            Capability::Image => vec![preferred, ProviderId::DefaultImage],
            _ => {
                let mut list = vec![preferred];
                list.extend_from_slice(custom_fallback);
                list
            }
        };

        // Keep first occurrence only; providers from another capability are dropped
        let mut seen = Vec::with_capacity(candidates.len());
        candidates.retain(|p| {
            if p.capability() != capability || seen.contains(p) {
                false
            } else {
                seen.push(*p);
                true
            }
        });
        candidates
    }

    /// Picks the provider for a request.
    ///
    /// Fails with `NoProviderAvailable` when no candidate is configured. For
    /// images that cannot happen because the default image is always present.
    pub fn resolve(
        &self,
        capability: Capability,
        preferred: Option<ProviderId>,
        custom_fallback: &[ProviderId],
        availability: &AvailabilitySnapshot,
    ) -> CoreResult<FallbackDecision> {
        let preferred = preferred.unwrap_or_else(|| Self::default_preferred(capability));
        if preferred.capability() != capability {
            return Err(CoreError::ValidationError(format!(
                "Provider {} does not serve {}",
                preferred, capability
            )));
        }

        let candidates = self.candidates(capability, preferred, custom_fallback);
        let mut attempts = Vec::with_capacity(candidates.len());

        for provider in candidates {
            let available = availability.is_available(provider);
            attempts.push(ProviderAttempt {
                provider,
                available,
            });
            if !available {
                continue;
            }

            let reason = if provider == preferred {
                "preferred provider configured".to_string()
            } else {
                let skipped: Vec<String> = attempts
                    .iter()
                    .filter(|a| !a.available)
                    .map(|a| a.provider.to_string())
                    .collect();
                format!("fallback after missing credentials: {}", skipped.join(", "))
            };

            let decision = FallbackDecision {
                capability,
                chosen: provider,
                attempts,
                reason,
            };
            if decision.is_fallback() {
                warn!(
                    "{} request routed to {} instead of {} ({})",
                    capability, provider, preferred, decision.reason
                );
            } else {
                info!("{} request routed to {}", capability, provider);
            }
            return Ok(decision);
        }

        warn!("No configured provider for {} request", capability);
        Err(CoreError::NoProviderAvailable {
            capability,
            attempted: attempts.into_iter().map(|a| a.provider).collect(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(pairs: &[(ProviderId, bool)]) -> AvailabilitySnapshot {
        AvailabilitySnapshot::from_flags(pairs.iter().copied())
    }

    // -------------------------------------------------------------------------
    // Chat
    // -------------------------------------------------------------------------

    #[test]
    fn test_chat_xai_falls_back_to_gemini() {
        let snapshot = flags(&[
            (ProviderId::Xai, false),
            (ProviderId::Gemini, true),
            (ProviderId::OpenAI, true),
        ]);
        let decision = FallbackResolver::new()
            .resolve(Capability::Chat, Some(ProviderId::Xai), &[], &snapshot)
            .unwrap();

        assert_eq!(decision.chosen, ProviderId::Gemini);
        assert_eq!(
            decision.attempted_providers(),
            vec![ProviderId::Xai, ProviderId::Gemini]
        );
        assert!(decision.is_fallback());
        assert!(decision.reason.contains("xai"));
    }

    #[test]
    fn test_chat_cascade_is_asymmetric() {
        assert_eq!(
            FallbackResolver::chat_cascade(ProviderId::OpenAI),
            vec![ProviderId::OpenAI, ProviderId::Gemini, ProviderId::Xai]
        );
        assert_eq!(
            FallbackResolver::chat_cascade(ProviderId::Gemini),
            vec![ProviderId::Gemini, ProviderId::Xai, ProviderId::OpenAI]
        );

        let only_xai = flags(&[(ProviderId::Xai, true)]);
        let decision = FallbackResolver::new()
            .resolve(Capability::Chat, Some(ProviderId::OpenAI), &[], &only_xai)
            .unwrap();
        assert_eq!(decision.chosen, ProviderId::Xai);
        assert_eq!(
            decision.attempted_providers(),
            vec![ProviderId::OpenAI, ProviderId::Gemini, ProviderId::Xai]
        );
    }

    #[test]
    fn test_chat_all_absent_fails() {
        let err = FallbackResolver::new()
            .resolve(
                Capability::Chat,
                Some(ProviderId::Gemini),
                &[],
                &flags(&[]),
            )
            .unwrap_err();

        match err {
            CoreError::NoProviderAvailable {
                capability,
                attempted,
            } => {
                assert_eq!(capability, Capability::Chat);
                assert_eq!(
                    attempted,
                    vec![ProviderId::Gemini, ProviderId::Xai, ProviderId::OpenAI]
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_chat_custom_fallback_replaces_tail() {
        let snapshot = flags(&[(ProviderId::Gemini, true), (ProviderId::OpenAI, true)]);
        let decision = FallbackResolver::new()
            .resolve(
                Capability::Chat,
                Some(ProviderId::Xai),
                &[ProviderId::OpenAI, ProviderId::Gemini],
                &snapshot,
            )
            .unwrap();
        assert_eq!(decision.chosen, ProviderId::OpenAI);

        let err = FallbackResolver::new()
            .resolve(
                Capability::Chat,
                Some(ProviderId::Xai),
                &[ProviderId::Xai],
                &snapshot,
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::NoProviderAvailable { .. }));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let snapshot = flags(&[(ProviderId::OpenAI, true), (ProviderId::Gemini, true)]);
        let resolver = FallbackResolver::new();
        let first = resolver
            .resolve(Capability::Chat, Some(ProviderId::Xai), &[], &snapshot)
            .unwrap();
        for _ in 0..10 {
            let again = resolver
                .resolve(Capability::Chat, Some(ProviderId::Xai), &[], &snapshot)
                .unwrap();
            assert_eq!(again, first);
        }
    }

    #[test]
    fn test_default_preferred_chat_is_xai() {
        let snapshot = flags(&[(ProviderId::Xai, true)]);
        let decision = FallbackResolver::new()
            .resolve(Capability::Chat, None, &[], &snapshot)
            .unwrap();
        assert_eq!(decision.chosen, ProviderId::Xai);
        assert!(!decision.is_fallback());
    }

    #[test]
    fn test_preferred_from_wrong_capability_rejected() {
        let err = FallbackResolver::new()
            .resolve(Capability::Chat, Some(ProviderId::Hedra), &[], &flags(&[]))
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    // -------------------------------------------------------------------------
    // Image
    // -------------------------------------------------------------------------

    #[test]
    fn test_image_unavailable_falls_back_to_default() {
        let decision = FallbackResolver::new()
            .resolve(Capability::Image, Some(ProviderId::DallE), &[], &flags(&[]))
            .unwrap();
        assert_eq!(decision.chosen, ProviderId::DefaultImage);
        assert_eq!(
            decision.attempted_providers(),
            vec![ProviderId::DallE, ProviderId::DefaultImage]
        );
    }

    #[test]
    fn test_imagen_never_chosen() {
        let snapshot = flags(&[(ProviderId::Gemini, true), (ProviderId::Imagen, true)]);
        let decision = FallbackResolver::new()
            .resolve(Capability::Image, Some(ProviderId::Imagen), &[], &snapshot)
            .unwrap();
        assert_eq!(decision.chosen, ProviderId::DefaultImage);
    }

    #[test]
    fn test_image_ignores_custom_fallback() {
        let snapshot = flags(&[(ProviderId::XaiImage, true)]);
        let decision = FallbackResolver::new()
            .resolve(
                Capability::Image,
                Some(ProviderId::DallE),
                &[ProviderId::XaiImage],
                &snapshot,
            )
            .unwrap();
        assert_eq!(decision.chosen, ProviderId::DefaultImage);
    }

    // -------------------------------------------------------------------------
    // Video
    // -------------------------------------------------------------------------

    #[test]
    fn test_video_has_no_implicit_cascade() {
        let snapshot = flags(&[(ProviderId::Hedra, true)]);
        let err = FallbackResolver::new()
            .resolve(Capability::Video, Some(ProviderId::Runway), &[], &snapshot)
            .unwrap_err();
        match err {
            CoreError::NoProviderAvailable { attempted, .. } => {
                assert_eq!(attempted, vec![ProviderId::Runway]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_video_custom_fallback_is_honored() {
        let snapshot = flags(&[(ProviderId::RunwayLegacy, true)]);
        let decision = FallbackResolver::new()
            .resolve(
                Capability::Video,
                Some(ProviderId::Hedra),
                &[ProviderId::RunwayLegacy, ProviderId::DallE],
                &snapshot,
            )
            .unwrap();
        assert_eq!(decision.chosen, ProviderId::RunwayLegacy);
        assert_eq!(
            decision.attempted_providers(),
            vec![ProviderId::Hedra, ProviderId::RunwayLegacy]
        );
    }
}
