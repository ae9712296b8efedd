use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Browser-like identification sent to public endpoints.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Provider names accepted in `providers.order`.
pub const KNOWN_PROVIDERS: &[&str] = &["apify", "direct", "sample"];

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProvidersConfig {
    #[serde(default = "default_order")]
    pub order: Vec<String>,
    #[serde(default)]
    pub apify: ApifyConfig,
    #[serde(default)]
    pub direct: DirectConfig,
    #[serde(default)]
    pub sample: SampleConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            order: default_order(),
            apify: ApifyConfig::default(),
            direct: DirectConfig::default(),
            sample: SampleConfig::default(),
        }
    }
}

fn default_order() -> Vec<String> {
    KNOWN_PROVIDERS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApifyConfig {
    /// Environment variable holding the bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_apify_base_url")]
    pub base_url: String,
    #[serde(default = "default_profile_actor")]
    pub profile_actor: String,
    #[serde(default = "default_posts_actor")]
    pub posts_actor: String,
    #[serde(default = "default_results_limit")]
    pub results_limit: usize,
    #[serde(default = "default_posts_limit")]
    pub posts_limit: usize,
    #[serde(default = "default_true")]
    pub scrape_reels: bool,
    #[serde(default = "default_apify_timeout")]
    pub timeout_secs: u64,
    /// Log the whole dataset at debug level.
    #[serde(default)]
    pub debug_dump: bool,
}

impl Default for ApifyConfig {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
            base_url: default_apify_base_url(),
            profile_actor: default_profile_actor(),
            posts_actor: default_posts_actor(),
            results_limit: default_results_limit(),
            posts_limit: default_posts_limit(),
            scrape_reels: true,
            timeout_secs: default_apify_timeout(),
            debug_dump: false,
        }
    }
}

fn default_token_env() -> String {
    "APIFY_API_TOKEN".to_string()
}
fn default_apify_base_url() -> String {
    "https://api.apify.com/v2".to_string()
}
fn default_profile_actor() -> String {
    "apify~instagram-profile-scraper".to_string()
}
fn default_posts_actor() -> String {
    "apify~instagram-post-scraper".to_string()
}
fn default_results_limit() -> usize {
    50
}
fn default_posts_limit() -> usize {
    20
}
fn default_apify_timeout() -> u64 {
    120
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct DirectConfig {
    #[serde(default = "default_direct_base_url")]
    pub base_url: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Value of the `X-IG-App-ID` header sent with the JSON endpoints.
    #[serde(default = "default_app_id")]
    pub app_id: String,
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self {
            base_url: default_direct_base_url(),
            timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
            app_id: default_app_id(),
        }
    }
}

fn default_direct_base_url() -> String {
    "https://www.instagram.com".to_string()
}
fn default_http_timeout() -> u64 {
    10
}
fn default_user_agent() -> String {
    BROWSER_USER_AGENT.to_string()
}
fn default_app_id() -> String {
    "936619743392459".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SampleConfig {
    /// JSON file to serve instead of the bundled dataset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    /// Number of leading photos the aggregate statistics are computed from.
    #[serde(default = "default_stats_window")]
    pub stats_window: usize,
    #[serde(default = "default_show_photos")]
    pub show_photos: usize,
    #[serde(default = "default_show_videos")]
    pub show_videos: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            stats_window: default_stats_window(),
            show_photos: default_show_photos(),
            show_videos: default_show_videos(),
        }
    }
}

fn default_stats_window() -> usize {
    10
}
fn default_show_photos() -> usize {
    10
}
fn default_show_videos() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_http_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Image bodies larger than this are rejected, for analysis and the proxy.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

fn default_max_image_bytes() -> u64 {
    20 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

const LOCAL_DEV_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://127.0.0.1:5173",
    "http://localhost:5174",
];

impl ServerConfig {
    /// Configured origins, plus the local development origins when any
    /// configured origin points at localhost.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins = self.cors_origins.clone();
        let local = origins
            .iter()
            .any(|o| o.contains("localhost") || o.contains("127.0.0.1"));
        if local {
            for o in LOCAL_DEV_ORIGINS {
                if !origins.iter().any(|existing| existing == o) {
                    origins.push(o.to_string());
                }
            }
        }
        origins
    }
}

impl Config {
    /// All-defaults configuration with the database under `./data`.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/phx.sqlite"),
            },
            providers: ProvidersConfig::default(),
            refresh: RefreshConfig::default(),
            analysis: AnalysisConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.providers.order.is_empty() {
        anyhow::bail!("providers.order must name at least one provider");
    }
    for name in &config.providers.order {
        if !KNOWN_PROVIDERS.contains(&name.as_str()) {
            anyhow::bail!(
                "Unknown provider: '{}'. Must be one of: {}",
                name,
                KNOWN_PROVIDERS.join(", ")
            );
        }
    }

    if config.refresh.stats_window == 0 {
        anyhow::bail!("refresh.stats_window must be > 0");
    }

    if config.providers.direct.timeout_secs == 0 || config.analysis.fetch_timeout_secs == 0 {
        anyhow::bail!("HTTP timeouts must be > 0");
    }

    if config.analysis.max_image_bytes == 0 {
        anyhow::bail!("analysis.max_image_bytes must be > 0");
    }

    for (key, agent) in [
        ("providers.direct.user_agent", &config.providers.direct.user_agent),
        ("analysis.user_agent", &config.analysis.user_agent),
    ] {
        if reqwest::header::HeaderValue::from_str(agent).is_err() {
            anyhow::bail!("{} is not a valid header value", key);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_file_gets_defaults() {
        let config = parse("[db]\npath = \"/tmp/x.sqlite\"\n").unwrap();
        assert_eq!(config.providers.order, vec!["apify", "direct", "sample"]);
        assert_eq!(config.providers.apify.token_env, "APIFY_API_TOKEN");
        assert_eq!(config.providers.direct.timeout_secs, 10);
        assert_eq!(config.refresh.stats_window, 10);
        assert_eq!(config.refresh.show_videos, 5);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = parse("[db]\npath = \"x\"\n[providers]\norder = [\"apify\", \"carrier-pigeon\"]\n")
            .unwrap_err();
        assert!(err.to_string().contains("carrier-pigeon"));
    }

    #[test]
    fn test_zero_stats_window_rejected() {
        assert!(parse("[db]\npath = \"x\"\n[refresh]\nstats_window = 0\n").is_err());
    }

    #[test]
    fn test_user_agent_with_newline_rejected() {
        let err = parse("[db]\npath = \"x\"\n[analysis]\nuser_agent = \"bot\\nX-Evil: 1\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("analysis.user_agent"));
    }

    #[test]
    fn test_localhost_origin_adds_dev_origins() {
        let server = ServerConfig::default();
        let origins = server.allowed_origins();
        assert_eq!(origins.len(), 3);
        assert!(origins.contains(&"http://127.0.0.1:5173".to_string()));
    }

    #[test]
    fn test_remote_origin_kept_alone() {
        let server = ServerConfig {
            bind: default_bind(),
            cors_origins: vec!["https://dash.example.com".to_string()],
        };
        assert_eq!(server.allowed_origins(), vec!["https://dash.example.com"]);
    }
}
