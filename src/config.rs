use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub segmenter: SegmenterConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub keyword_store: KeywordStoreConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SegmenterConfig {
    #[serde(default = "default_window_words")]
    pub window_words: usize,
    #[serde(default = "default_overlap_words")]
    pub overlap_words: usize,
    /// Pages with 0-based index below this are skipped entirely during
    /// paged ingestion (front-matter skip policy).
    #[serde(default = "default_skip_pages")]
    pub skip_pages: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            window_words: default_window_words(),
            overlap_words: default_overlap_words(),
            skip_pages: default_skip_pages(),
        }
    }
}

fn default_window_words() -> usize {
    crate::segment::DEFAULT_WINDOW_WORDS
}
fn default_overlap_words() -> usize {
    crate::segment::DEFAULT_OVERLAP_WORDS
}
fn default_skip_pages() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Semantic-vs-lexical weight: `fused = α*vector + (1-α)*keyword`.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_candidate_k_vector")]
    pub candidate_k_vector: usize,
    #[serde(default = "default_candidate_k_keyword")]
    pub candidate_k_keyword: usize,
    #[serde(default = "default_final_k")]
    pub final_k: usize,
    /// Raw-score bonus for a vector hit containing a structural citation term.
    #[serde(default = "default_citation_boost")]
    pub citation_boost: f64,
    /// Smaller bonus for a generic content-word match.
    #[serde(default = "default_content_word_boost")]
    pub content_word_boost: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            candidate_k_vector: default_candidate_k_vector(),
            candidate_k_keyword: default_candidate_k_keyword(),
            final_k: default_final_k(),
            citation_boost: default_citation_boost(),
            content_word_boost: default_content_word_boost(),
        }
    }
}

fn default_alpha() -> f64 {
    0.6
}
fn default_candidate_k_vector() -> usize {
    12
}
fn default_candidate_k_keyword() -> usize {
    10
}
fn default_final_k() -> usize {
    5
}
fn default_citation_boost() -> f64 {
    0.25
}
fn default_content_word_boost() -> f64 {
    0.05
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: default_dims(),
            batch_size: default_embed_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_dims() -> usize {
    768
}
fn default_embed_batch_size() -> usize {
    40
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    #[serde(default = "default_vector_index")]
    pub index: String,
    /// Data-plane host of the index (e.g. `https://legal-chunks-xxxx.svc.pinecone.io`).
    /// Required when the Pinecone backend is used.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_pinecone_region")]
    pub region: String,
    /// Upserts are chunked into batches of this size to respect backend
    /// payload limits.
    #[serde(default = "default_store_batch_size")]
    pub batch_size: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            index: default_vector_index(),
            host: None,
            region: default_pinecone_region(),
            batch_size: default_store_batch_size(),
        }
    }
}

fn default_pinecone_region() -> String {
    "us-east-1".to_string()
}

fn default_vector_index() -> String {
    "legal-chunks".to_string()
}
fn default_store_batch_size() -> usize {
    40
}

#[derive(Debug, Deserialize, Clone)]
pub struct KeywordStoreConfig {
    #[serde(default = "default_keyword_index")]
    pub index: String,
    #[serde(default = "default_keyword_url")]
    pub url: String,
    #[serde(default = "default_store_batch_size")]
    pub batch_size: usize,
}

impl Default for KeywordStoreConfig {
    fn default() -> Self {
        Self {
            index: default_keyword_index(),
            url: default_keyword_url(),
            batch_size: default_store_batch_size(),
        }
    }
}

fn default_keyword_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_keyword_index() -> String {
    "legal_chunks".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate segmenter: a non-positive stride would never terminate.
    if config.segmenter.window_words == 0 {
        anyhow::bail!("segmenter.window_words must be > 0");
    }
    if config.segmenter.overlap_words >= config.segmenter.window_words {
        anyhow::bail!(
            "segmenter.overlap_words ({}) must be less than segmenter.window_words ({})",
            config.segmenter.overlap_words,
            config.segmenter.window_words
        );
    }

    // Validate retrieval
    if config.retrieval.final_k < 1 {
        anyhow::bail!("retrieval.final_k must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.alpha) {
        anyhow::bail!("retrieval.alpha must be in [0.0, 1.0]");
    }
    if config.retrieval.candidate_k_vector < config.retrieval.final_k {
        anyhow::bail!("retrieval.candidate_k_vector must be >= retrieval.final_k");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims == 0 {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    match config.generation.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if config.vector_store.batch_size == 0 || config.keyword_store.batch_size == 0 {
        anyhow::bail!("store batch_size must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_defaults() {
        let f = write_config("");
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.segmenter.window_words, 300);
        assert_eq!(cfg.segmenter.overlap_words, 50);
        assert_eq!(cfg.segmenter.skip_pages, 5);
        assert!((cfg.retrieval.alpha - 0.6).abs() < 1e-12);
        assert_eq!(cfg.retrieval.final_k, 5);
        assert_eq!(cfg.vector_store.batch_size, 40);
        assert!(!cfg.embedding.is_enabled());
    }

    #[test]
    fn test_overlap_ge_window_rejected() {
        let f = write_config("[segmenter]\nwindow_words = 100\noverlap_words = 100\n");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_alpha_out_of_range_rejected() {
        let f = write_config("[retrieval]\nalpha = 1.5\n");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_enabled_embedding_requires_model() {
        let f = write_config("[embedding]\nprovider = \"openai\"\ndims = 768\n");
        assert!(load_config(f.path()).is_err());
    }
}
