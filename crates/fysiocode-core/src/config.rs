//! YAML configuration for the resolution pipeline.

use std::path::Path;

use anyhow::{Context, Result};
use fysiocode_provider::ProviderConfig;
use serde::{Deserialize, Serialize};

/// Tuning knobs for the resolution pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Generative attempts before falling back to pattern matching.
    pub max_attempts: u32,
    /// Wait between attempts is `attempt * backoff_base_ms`.
    pub backoff_base_ms: u64,
    /// Confidence multiplier applied to pattern-matched suggestions.
    pub fallback_penalty: f64,
    /// Confidence multiplier for validated generative suggestions, capped at 1.0.
    pub validation_boost: f64,
    pub min_query_chars: usize,
    pub max_query_chars: usize,
    /// Per-attempt deadline; `None` leaves the provider's own timeout in charge.
    pub attempt_deadline_ms: Option<u64>,
    pub max_tokens: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff_base_ms: 1000,
            fallback_penalty: 0.8,
            validation_boost: 1.1,
            min_query_chars: 3,
            max_query_chars: 1000,
            attempt_deadline_ms: None,
            max_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8520".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub resolver: ResolverConfig,
    pub provider: ProviderConfig,
    pub server: ServerConfig,
}

pub fn load_config(path: &Path) -> Result<AppConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: AppConfig = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fysiocode_provider::ProviderType;

    #[test]
    fn defaults_match_the_documented_pipeline() {
        let config = AppConfig::default();
        assert_eq!(config.resolver.max_attempts, 2);
        assert_eq!(config.resolver.backoff_base_ms, 1000);
        assert!((config.resolver.fallback_penalty - 0.8).abs() < 1e-9);
        assert!((config.resolver.validation_boost - 1.1).abs() < 1e-9);
        assert_eq!(config.resolver.min_query_chars, 3);
        assert_eq!(config.resolver.max_query_chars, 1000);
        assert_eq!(config.provider.provider_type, ProviderType::Stub);
        assert_eq!(config.server.bind, "127.0.0.1:8520");
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config: AppConfig = serde_yaml::from_str(
            "provider:\n  type: anthropic\n  api_key: sk-test\nresolver:\n  max_attempts: 3\n",
        )
        .unwrap();
        assert_eq!(config.provider.provider_type, ProviderType::Anthropic);
        assert_eq!(config.resolver.max_attempts, 3);
        assert_eq!(config.resolver.backoff_base_ms, 1000);
        assert_eq!(config.server.bind, "127.0.0.1:8520");
    }

    #[test]
    fn empty_mapping_yields_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.resolver.max_attempts, 2);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_config(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
