use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::campaign::ScanPolicy;
use crate::driver::BrowserKind;
use crate::generation::GenerationStrategy;

const DEFAULT_TARGET_URL: &str =
    "https://www.zhipin.com/web/geek/job-recommend?ka=header-job-recommend";
const DEFAULT_FILTER_LABEL: &str = "iOS（深圳）";
const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
const DEFAULT_RESUME_DIR: &str = "./resume";
const DEFAULT_CHARACTER_LIMIT: usize = 300;

/// Run configuration loaded from environment variables (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    /// Alternate endpoint. Its presence selects the retrieval-augmented strategy
    /// unless `GENERATION_STRATEGY` says otherwise.
    pub openai_base_url: Option<String>,
    pub generation_strategy: GenerationStrategy,
    pub assistant_id: Option<String>,
    /// Existing conversation thread to continue (direct strategy).
    pub thread_id: Option<String>,
    /// Sign-off removed from assistant replies (direct strategy).
    pub signature_phrase: Option<String>,
    pub target_url: String,
    pub browser_kind: BrowserKind,
    pub filter_label: String,
    pub webdriver_url: String,
    pub resume_dir: PathBuf,
    pub character_limit: usize,
    pub scan_policy: ScanPolicy,
    pub max_iterations: Option<usize>,
    /// Leave the browser open when the run ends.
    pub detach: bool,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let openai_base_url = get("OPENAI_BASE_URL");
        let generation_strategy =
            select_strategy(get("GENERATION_STRATEGY").as_deref(), openai_base_url.as_deref())?;

        let browser_kind = get("BROWSER_KIND")
            .as_deref()
            .unwrap_or("chrome")
            .parse::<BrowserKind>()?;

        let character_limit = match get("CHARACTER_LIMIT") {
            Some(v) => v
                .parse::<usize>()
                .context("CHARACTER_LIMIT must be a positive integer")?,
            None => DEFAULT_CHARACTER_LIMIT,
        };
        if character_limit == 0 {
            anyhow::bail!("CHARACTER_LIMIT must be greater than zero");
        }

        let scan_policy = match get("SCAN_POLICY") {
            Some(v) => v.parse::<ScanPolicy>()?,
            None => ScanPolicy::Stay,
        };

        let max_iterations = get("MAX_ITERATIONS")
            .map(|v| {
                v.parse::<usize>()
                    .context("MAX_ITERATIONS must be a non-negative integer")
            })
            .transpose()?;

        let detach = match get("DETACH") {
            Some(v) => parse_bool(&v).context("DETACH must be true or false")?,
            None => true,
        };

        Ok(Config {
            openai_api_key: require(&get, "OPENAI_API_KEY")?,
            openai_base_url,
            generation_strategy,
            assistant_id: get("OPENAI_ASSISTANT_ID"),
            thread_id: get("OPENAI_THREAD_ID"),
            signature_phrase: get("SIGNATURE_PHRASE"),
            target_url: get("TARGET_URL").unwrap_or_else(|| DEFAULT_TARGET_URL.to_string()),
            browser_kind,
            filter_label: get("FILTER_LABEL").unwrap_or_else(|| DEFAULT_FILTER_LABEL.to_string()),
            webdriver_url: get("WEBDRIVER_URL")
                .unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string()),
            resume_dir: PathBuf::from(
                get("RESUME_DIR").unwrap_or_else(|| DEFAULT_RESUME_DIR.to_string()),
            ),
            character_limit,
            scan_policy,
            max_iterations,
            detach,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

/// An explicit override wins; otherwise a configured alternate endpoint selects
/// the retrieval-augmented strategy.
fn select_strategy(
    explicit: Option<&str>,
    base_url: Option<&str>,
) -> Result<GenerationStrategy> {
    match explicit {
        Some(v) => v.parse::<GenerationStrategy>(),
        None if base_url.is_some() => Ok(GenerationStrategy::RetrievalAugmented),
        None => Ok(GenerationStrategy::Direct),
    }
}

fn require<F>(get: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    get(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("not a boolean: '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_with_only_api_key() {
        let config = config_from(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.generation_strategy, GenerationStrategy::Direct);
        assert_eq!(config.browser_kind, BrowserKind::Primary);
        assert_eq!(config.character_limit, 300);
        assert_eq!(config.scan_policy, ScanPolicy::Stay);
        assert!(config.detach);
        assert!(config.max_iterations.is_none());
        assert!(config.thread_id.is_none());
        assert_eq!(config.webdriver_url, "http://localhost:9515");
    }

    #[test]
    fn test_missing_api_key_is_an_error() {
        let err = config_from(&[]).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_base_url_selects_retrieval_strategy() {
        let config = config_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "https://proxy.example.com/v1"),
        ])
        .unwrap();
        assert_eq!(
            config.generation_strategy,
            GenerationStrategy::RetrievalAugmented
        );
    }

    #[test]
    fn test_explicit_strategy_overrides_base_url() {
        let config = config_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "https://proxy.example.com/v1"),
            ("GENERATION_STRATEGY", "direct"),
        ])
        .unwrap();
        assert_eq!(config.generation_strategy, GenerationStrategy::Direct);
    }

    #[test]
    fn test_empty_base_url_counts_as_unset() {
        let config =
            config_from(&[("OPENAI_API_KEY", "sk-test"), ("OPENAI_BASE_URL", "")]).unwrap();
        assert_eq!(config.generation_strategy, GenerationStrategy::Direct);
        assert!(config.openai_base_url.is_none());
    }

    #[test]
    fn test_unsupported_browser_kind_is_rejected() {
        let err = config_from(&[("OPENAI_API_KEY", "sk-test"), ("BROWSER_KIND", "netscape")])
            .unwrap_err();
        assert!(err.to_string().contains("netscape"));
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = config_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("BROWSER_KIND", "tertiary"),
            ("FILTER_LABEL", "iOS (City X)"),
            ("CHARACTER_LIMIT", "280"),
            ("SCAN_POLICY", "advance"),
            ("MAX_ITERATIONS", "25"),
            ("DETACH", "false"),
            ("OPENAI_THREAD_ID", "thread_abc"),
        ])
        .unwrap();
        assert_eq!(config.browser_kind, BrowserKind::Tertiary);
        assert_eq!(config.filter_label, "iOS (City X)");
        assert_eq!(config.character_limit, 280);
        assert_eq!(config.scan_policy, ScanPolicy::Advance);
        assert_eq!(config.max_iterations, Some(25));
        assert!(!config.detach);
        assert_eq!(config.thread_id.as_deref(), Some("thread_abc"));
    }

    #[test]
    fn test_zero_character_limit_is_rejected() {
        assert!(config_from(&[("OPENAI_API_KEY", "sk-test"), ("CHARACTER_LIMIT", "0")]).is_err());
    }
}
