use serde::Deserialize;

/// Main configuration structure for wiki-bot
///
/// Every section is optional in the TOML file; missing keys fall back to the
/// values used against the Hyperloop UPV wiki.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub wiki: WikiConfig,
    pub crawler: CrawlerConfig,
    pub index: IndexConfig,
    pub llm: LlmConfig,
    pub agents: AgentsConfig,
}

/// Target wiki and credential locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct WikiConfig {
    /// Base URL of the wiki, without a trailing slash
    pub base_url: String,

    /// Path to the JSON cookie file
    pub cookie_file: String,

    /// Text that identifies the SSO login page in scraped content
    pub sign_in_marker: String,

    /// User agent presented to the wiki
    pub user_agent: String,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://wiki.hyperloopupv.com".to_string(),
            cookie_file: "cookies.json".to_string(),
            sign_in_marker: "Sign in to your account".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

/// Scraper behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum number of pages open at once
    pub max_concurrent_pages_open: u32,

    /// Navigation timeout per page (milliseconds)
    pub navigation_timeout_ms: u64,

    /// How long to wait for network quiescence (milliseconds)
    pub quiescence_timeout_ms: u64,

    /// Extra pause after a quiescence timeout (milliseconds)
    pub quiescence_grace_ms: u64,

    /// Number of credential refreshes the loader may perform
    pub max_auth_retries: u32,

    /// Content region selectors, tried in order
    pub content_selectors: Vec<String>,

    /// Comment region selectors, tried in order
    pub comment_selectors: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_pages_open: 10,
            navigation_timeout_ms: 30_000,
            quiescence_timeout_ms: 5_000,
            quiescence_grace_ms: 2_000,
            max_auth_retries: 1,
            content_selectors: vec![
                ".contents".to_string(),
                ".v-main__wrap".to_string(),
                "article".to_string(),
                "#app".to_string(),
            ],
            comment_selectors: vec![
                ".comments-main".to_string(),
                ".comments".to_string(),
                ".page-comments".to_string(),
            ],
        }
    }
}

/// Document index configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IndexConfig {
    /// Path to the SQLite index database
    pub database_path: String,

    /// Maximum characters per chunk
    pub chunk_size: usize,

    /// Characters shared between neighbouring chunks
    pub chunk_overlap: usize,

    /// Number of chunks retrieved per question
    pub top_k: usize,

    /// Number of chunks sent per embedding request
    pub embedding_batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            database_path: "./wiki_index.db".to_string(),
            chunk_size: 1000,
            chunk_overlap: 100,
            top_k: 5,
            embedding_batch_size: 64,
        }
    }
}

/// Model endpoints and names
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LlmConfig {
    pub openai_base_url: String,
    pub anthropic_base_url: String,

    /// Model used by the question answering graph
    pub chat_model: String,

    /// Model used by the feeler and resolver graphs
    pub agent_model: String,

    pub embedding_model: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_base_url: "https://api.openai.com/v1".to_string(),
            anthropic_base_url: "https://api.anthropic.com/v1".to_string(),
            chat_model: "gpt-5-nano".to_string(),
            agent_model: "claude-3-5-haiku-20241022".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            temperature: 0.0,
            max_tokens: 1024,
        }
    }
}

/// Loop limits for the agent graphs
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AgentsConfig {
    /// Both judge scores must exceed this for the feeler to finish early
    pub score_threshold: f64,

    /// The feeler finalizes once its iteration count exceeds this
    pub max_feeler_iterations: u32,

    /// The resolver stops after this many coding attempts
    pub max_resolver_iterations: u32,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.9,
            max_feeler_iterations: 2,
            max_resolver_iterations: 3,
        }
    }
}
