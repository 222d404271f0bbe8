use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use field_classifier::{
    types::config::{DEFAULT_COMPANY_CATEGORIES, DEFAULT_COMPANY_KEYWORDS, DEFAULT_SENTINELS},
    BackendKind, ClassifierConfig, CompletionOptions, FieldConfig, FilterConfig, GatewayConfig,
    ProviderConfig, RetryPolicy, VerifyConfig,
};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub classifier: ClassifierConfig,
    pub raw_files_path: PathBuf,
    pub batch_save_path: PathBuf,
    pub classify_save_path: PathBuf,
    pub problem_save_path: PathBuf,
    pub prompt_template_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = Vars(&get);

        let batch_size: usize = vars.parse_or("BATCH_SIZE", 100)?;
        if batch_size == 0 {
            bail!("BATCH_SIZE must be at least 1");
        }
        let min_length: usize = vars.parse_or("MIN_FIELD_LENGTH", 2)?;

        let temperature: f32 = vars.parse_or("LLM_TEMPERATURE", 0.1)?;
        if !temperature.is_finite() || temperature < 0.0 {
            bail!("LLM_TEMPERATURE must be a non-negative number");
        }

        let threshold: u8 = vars.parse_or("LOW_CONFIDENCE_THRESHOLD", 80)?;
        if threshold > 100 {
            bail!("LOW_CONFIDENCE_THRESHOLD must be between 0 and 100");
        }

        let gateway = GatewayConfig {
            backend: vars.parse_or("LLM_BACKEND", BackendKind::DeepSeek)?,
            openai: vars.provider(
                "OPENAI",
                "OPENAI_BASE_URL",
                "https://api.openai.com/v1",
                "gpt-4o-mini",
                None,
                8,
            )?,
            deepseek: vars.provider(
                "DEEPSEEK",
                "DEEPSEEK_BASE_URL",
                "https://api.deepseek.com",
                "deepseek-chat",
                None,
                8,
            )?,
            local: vars.provider(
                "LOCAL_LLM",
                "LOCAL_LLM_URL",
                "http://localhost:8000/v1/chat/completions",
                "Qwen2.5-72B-Instruct",
                Some(u32::try_from(batch_size.saturating_mul(8)).unwrap_or(u32::MAX)),
                2,
            )?,
        };

        let retry = RetryPolicy::new(
            vars.parse_or("MAX_RETRY_COUNT", 5)?,
            vars.duration_or("INITIAL_RETRY_INTERVAL_SECS", 1.0)?,
            vars.parse_or("RETRY_INTERVAL_MULTIPLIER", 2.0)?,
        )
        .with_jitter(vars.duration_or("RETRY_JITTER_SECS", 1.0)?);
        if !retry.multiplier.is_finite() || retry.multiplier < 1.0 {
            bail!("RETRY_INTERVAL_MULTIPLIER must be at least 1");
        }

        let timeout = vars.duration_or("API_TIMEOUT_SECS", 60.0)?;
        if timeout.is_zero() {
            bail!("API_TIMEOUT_SECS must be greater than 0");
        }

        let classifier = ClassifierConfig::new()
            .with_fields(
                FieldConfig::default()
                    .with_batch_size(batch_size)
                    .with_min_length(min_length),
            )
            .with_retry(retry)
            .with_filter(
                FilterConfig::default()
                    .with_sentinels(vars.list_or("SENTINEL_CATEGORIES", DEFAULT_SENTINELS)),
            )
            .with_verify(
                VerifyConfig::default()
                    .with_threshold(threshold)
                    .with_company_keywords(vars.list_or("COMPANY_KEYWORDS", DEFAULT_COMPANY_KEYWORDS))
                    .with_company_categories(
                        vars.list_or("COMPANY_CATEGORIES", DEFAULT_COMPANY_CATEGORIES),
                    ),
            )
            .with_completion(CompletionOptions {
                temperature,
                timeout,
            });

        Ok(Self {
            gateway,
            classifier,
            raw_files_path: vars.path_or("RAW_FILES_PATH", "data/input_raw"),
            batch_save_path: vars.path_or("BATCH_SAVE_PATH", "data/preprocessed_batches"),
            classify_save_path: vars.path_or("CLASSIFY_SAVE_PATH", "data/classify_results"),
            problem_save_path: vars.path_or("PROBLEM_SAVE_PATH", "data/verify_problems"),
            prompt_template_path: vars
                .path_or("PROMPT_TEMPLATE_PATH", "config/prompt_template.txt"),
        })
    }
}

/// Typed access to configuration variables. Blank values count as unset.
struct Vars<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.get(key) {
            Some(value) => value
                .parse()
                .with_context(|| format!("{} has an invalid value: {}", key, value)),
            None => Ok(default),
        }
    }

    fn duration_or(&self, key: &str, default_secs: f64) -> Result<Duration> {
        let secs: f64 = self.parse_or(key, default_secs)?;
        Duration::try_from_secs_f64(secs)
            .with_context(|| format!("{} must be a non-negative number of seconds", key))
    }

    fn list_or(&self, key: &str, default: &[&str]) -> Vec<String> {
        match self.get(key) {
            Some(value) => value
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => default.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn path_or(&self, key: &str, default: &str) -> PathBuf {
        PathBuf::from(self.get(key).unwrap_or_else(|| default.to_string()))
    }

    fn provider(
        &self,
        prefix: &str,
        url_key: &str,
        default_url: &str,
        default_model: &str,
        default_max_tokens: Option<u32>,
        default_concurrency: usize,
    ) -> Result<ProviderConfig> {
        let max_tokens_key = format!("{}_MAX_TOKENS", prefix);
        let max_tokens = match self.get(&max_tokens_key) {
            Some(_) => Some(self.parse_or::<u32>(&max_tokens_key, 0)?),
            None => default_max_tokens,
        };

        let concurrency_key = format!("{}_MAX_CONCURRENCY", prefix);
        let max_concurrency: usize = self.parse_or(&concurrency_key, default_concurrency)?;
        if max_concurrency == 0 {
            bail!("{} must be at least 1", concurrency_key);
        }

        let mut provider = ProviderConfig::new(
            self.get(url_key).unwrap_or_else(|| default_url.to_string()),
            self.get(&format!("{}_MODEL", prefix))
                .unwrap_or_else(|| default_model.to_string()),
        )
        .with_max_tokens(max_tokens)
        .with_max_concurrency(max_concurrency);

        if let Some(key) = self.get(&format!("{}_API_KEY", prefix)) {
            provider = provider.with_api_key(key);
        }
        Ok(provider)
    }
}
