//! LLM configuration and provider selection.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::synthesizer::DEFAULT_TEMPERATURE;
use crate::types::{LLMConfigResponse, LLMProvider};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

/// LLM configuration: provider preference, API keys, models and sampling
/// temperature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    #[serde(default = "default_preferred")]
    pub preferred_provider: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_preferred() -> String {
    "auto".into()
}
fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.into()
}
fn default_anthropic_model() -> String {
    DEFAULT_ANTHROPIC_MODEL.into()
}
fn default_groq_model() -> String {
    DEFAULT_GROQ_MODEL.into()
}
fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            preferred_provider: default_preferred(),
            openai_api_key: None,
            anthropic_api_key: None,
            groq_api_key: None,
            openai_model: default_openai_model(),
            anthropic_model: default_anthropic_model(),
            groq_model: default_groq_model(),
            temperature: default_temperature(),
        }
    }
}

impl LLMConfig {
    /// Defaults plus environment variables.
    pub fn from_env() -> Self {
        LLMConfig::default().with_env_fallback()
    }

    fn with_env_fallback(mut self) -> Self {
        if let Ok(p) = std::env::var("KEYPLAN_LLM_PROVIDER") {
            self.preferred_provider = p.to_lowercase();
        }
        if self.openai_api_key.is_none() {
            self.openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        }
        if self.anthropic_api_key.is_none() {
            self.anthropic_api_key = std::env::var("ANTHROPIC_API_KEY").ok();
        }
        if self.groq_api_key.is_none() {
            self.groq_api_key = std::env::var("GROQ_API_KEY").ok();
        }
        if let Ok(raw) = std::env::var("KEYPLAN_LLM_TEMPERATURE") {
            match parse_temperature(&raw) {
                Some(t) => self.temperature = t,
                None => warn!("Ignoring KEYPLAN_LLM_TEMPERATURE={:?}: expected a number in [0, 2]", raw),
            }
        }
        self
    }

    /// Resolve which provider, model and key to use.
    pub fn resolve_provider(&self) -> Option<(LLMProvider, String, String)> {
        // Explicit preference
        if self.preferred_provider != "auto" {
            return match self.preferred_provider.as_str() {
                "openai" => self
                    .openai_api_key
                    .as_ref()
                    .map(|k| (LLMProvider::OpenAI, self.openai_model.clone(), k.clone())),
                "anthropic" => self
                    .anthropic_api_key
                    .as_ref()
                    .map(|k| (LLMProvider::Anthropic, self.anthropic_model.clone(), k.clone())),
                "groq" => self
                    .groq_api_key
                    .as_ref()
                    .map(|k| (LLMProvider::Groq, self.groq_model.clone(), k.clone())),
                _ => None,
            };
        }

        // Auto mode: Groq > Anthropic > OpenAI
        if let Some(k) = &self.groq_api_key {
            return Some((LLMProvider::Groq, self.groq_model.clone(), k.clone()));
        }
        if let Some(k) = &self.anthropic_api_key {
            return Some((LLMProvider::Anthropic, self.anthropic_model.clone(), k.clone()));
        }
        if let Some(k) = &self.openai_api_key {
            return Some((LLMProvider::OpenAI, self.openai_model.clone(), k.clone()));
        }

        None
    }

    /// Build the public config response (no API keys exposed).
    pub fn to_response(&self) -> LLMConfigResponse {
        let resolved = self.resolve_provider();
        LLMConfigResponse {
            preferred_provider: self.preferred_provider.clone(),
            openai_configured: self.openai_api_key.is_some(),
            anthropic_configured: self.anthropic_api_key.is_some(),
            groq_configured: self.groq_api_key.is_some(),
            active_provider: resolved.as_ref().map(|(p, _, _)| p.to_string()),
            active_model: resolved.map(|(_, m, _)| m),
        }
    }
}

fn parse_temperature(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite() && (0.0..=2.0).contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed() -> LLMConfig {
        LLMConfig {
            openai_api_key: Some("sk-openai".into()),
            anthropic_api_key: Some("sk-ant".into()),
            groq_api_key: Some("gsk".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_auto_prefers_groq() {
        let (provider, model, key) = keyed().resolve_provider().unwrap();
        assert_eq!(provider, LLMProvider::Groq);
        assert_eq!(model, DEFAULT_GROQ_MODEL);
        assert_eq!(key, "gsk");
    }

    #[test]
    fn test_explicit_preference() {
        let config = LLMConfig {
            preferred_provider: "anthropic".into(),
            ..keyed()
        };
        let (provider, _, _) = config.resolve_provider().unwrap();
        assert_eq!(provider, LLMProvider::Anthropic);
    }

    #[test]
    fn test_explicit_preference_without_key() {
        let config = LLMConfig {
            preferred_provider: "openai".into(),
            ..Default::default()
        };
        assert!(config.resolve_provider().is_none());
    }

    #[test]
    fn test_response_masks_keys() {
        let json = serde_json::to_string(&keyed().to_response()).unwrap();
        assert!(!json.contains("sk-openai"));
        assert!(json.contains("\"activeProvider\":\"groq\""));
    }

    #[test]
    fn test_parse_temperature() {
        assert_eq!(parse_temperature(" 0.7 "), Some(0.7));
        assert_eq!(parse_temperature("0"), Some(0.0));
        assert_eq!(parse_temperature("2.5"), None);
        assert_eq!(parse_temperature("-0.1"), None);
        assert_eq!(parse_temperature("NaN"), None);
        assert_eq!(parse_temperature("warm"), None);
        assert_eq!(LLMConfig::default().temperature, DEFAULT_TEMPERATURE);
    }
}
