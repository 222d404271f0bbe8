//! LLM backend trait.
//!
//! Every provider (hosted or self-hosted) sits behind the same contract:
//! a prompt goes in, one response string comes out, or the call fails.
//! Providers differ only in endpoint, auth and request shape, and those
//! details stay inside the implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ClassifyError, Result};

/// Per-call options shared by every backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    /// Sampling temperature. Default: 0.1 (classification wants stable output).
    pub temperature: f32,

    /// Upper bound on a single network call. Default: 60s.
    pub timeout: Duration,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Supported backend providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OpenAI hosted API
    OpenAi,
    /// DeepSeek hosted API (OpenAI-compatible)
    DeepSeek,
    /// Self-hosted OpenAI-compatible HTTP endpoint
    Local,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "openai",
            BackendKind::DeepSeek => "deepseek",
            BackendKind::Local => "local",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ClassifyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(BackendKind::OpenAi),
            "deepseek" => Ok(BackendKind::DeepSeek),
            "local" => Ok(BackendKind::Local),
            other => Err(ClassifyError::Config(format!(
                "unsupported LLM backend '{}' (expected openai, deepseek or local)",
                other
            ))),
        }
    }
}

/// A provider that can complete a prompt.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Which provider this is.
    fn kind(&self) -> BackendKind;

    /// Maximum requests this provider accepts in flight at once (>= 1).
    fn max_concurrency(&self) -> usize;

    /// Send a single prompt and return the raw response text.
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("openai".parse::<BackendKind>().unwrap(), BackendKind::OpenAi);
        assert_eq!("DEEPSEEK".parse::<BackendKind>().unwrap(), BackendKind::DeepSeek);
        assert_eq!(" Local ".parse::<BackendKind>().unwrap(), BackendKind::Local);
    }

    #[test]
    fn test_unsupported_backend_is_config_error() {
        let err = "anthropic".parse::<BackendKind>().unwrap_err();
        assert!(matches!(err, ClassifyError::Config(_)));
        assert!(err.is_fatal());
    }
}
