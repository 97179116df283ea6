//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` +
//! `config.<env>.toml` + `APP_*` env vars (nested keys separated by `__`,
//! e.g. `APP_SYMPTOMS__TOP_N_DISEASES=3`). Provides helpers to expand `~`
//! and `${VAR}` and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::aggregate::DEFAULT_TOP_K_SCORES_FOR_MEAN;
use crate::chunker::ChunkingConfig;
use crate::context::DEFAULT_TOP_M_CHUNKS;
use crate::error::{Error, Result};

/// How token states are reduced to one sentence vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    /// Attention-masked mean (sentence-transformers models).
    Mean,
    /// First token (BGE models).
    Cls,
}

/// Tokens the encoder adds around every chunk window.
pub const SPECIAL_TOKENS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub uri: String,
    pub dim: usize,
    pub chunks_collection: String,
    pub treatments_collection: String,
    /// Rows needed before an ANN index is built; smaller tables are scanned.
    pub ann_min_rows: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            uri: "data/lancedb".to_string(),
            dim: 384,
            chunks_collection: "disease_kb_chunks".to_string(),
            treatments_collection: "disease_treatments".to_string(),
            ann_min_rows: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    pub batch_size: usize,
    pub max_chunk_chars: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        let window = ChunkingConfig::default();
        Self { max_tokens: window.max_tokens, overlap_tokens: window.overlap_tokens, batch_size: 256, max_chunk_chars: 65535 }
    }
}

impl ChunkingSettings {
    pub fn window(&self) -> ChunkingConfig {
        ChunkingConfig { max_tokens: self.max_tokens, overlap_tokens: self.overlap_tokens }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymptomSettings {
    pub model_dir: String,
    pub pooling: Pooling,
    pub max_len: usize,
    pub top_k_chunks: usize,
    pub top_n_diseases: usize,
    pub top_m_chunks: usize,
    pub top_k_scores_for_mean: usize,
}

impl Default for SymptomSettings {
    fn default() -> Self {
        Self {
            model_dir: "models/all-MiniLM-L6-v2".to_string(),
            pooling: Pooling::Mean,
            max_len: 512,
            top_k_chunks: 40,
            top_n_diseases: 2,
            top_m_chunks: DEFAULT_TOP_M_CHUNKS,
            top_k_scores_for_mean: DEFAULT_TOP_K_SCORES_FOR_MEAN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreatmentSettings {
    pub model_dir: String,
    pub pooling: Pooling,
    pub max_len: usize,
    pub top_k: usize,
}

impl Default for TreatmentSettings {
    fn default() -> Self {
        Self { model_dir: "models/bge-small-en-v1.5".to_string(), pooling: Pooling::Cls, max_len: 256, top_k: 1 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub index: IndexSettings,
    pub chunking: ChunkingSettings,
    pub symptoms: SymptomSettings,
    pub treatments: TreatmentSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.window().validate()?;
        let positive = [
            ("index.dim", self.index.dim),
            ("chunking.batch_size", self.chunking.batch_size),
            ("chunking.max_chunk_chars", self.chunking.max_chunk_chars),
            ("symptoms.max_len", self.symptoms.max_len),
            ("symptoms.top_k_chunks", self.symptoms.top_k_chunks),
            ("symptoms.top_n_diseases", self.symptoms.top_n_diseases),
            ("symptoms.top_m_chunks", self.symptoms.top_m_chunks),
            ("symptoms.top_k_scores_for_mean", self.symptoms.top_k_scores_for_mean),
            ("treatments.max_len", self.treatments.max_len),
            ("treatments.top_k", self.treatments.top_k),
        ];
        if let Some((key, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(Error::InvalidConfig(format!("{key} must be greater than zero")));
        }
        // A full window plus [CLS]/[SEP] must reach the encoder untruncated.
        if self.chunking.max_tokens + SPECIAL_TOKENS > self.symptoms.max_len {
            return Err(Error::InvalidConfig(format!(
                "symptoms.max_len ({}) must be at least chunking.max_tokens + {SPECIAL_TOKENS} ({})",
                self.symptoms.max_len,
                self.chunking.max_tokens + SPECIAL_TOKENS
            )));
        }
        if self.index.chunks_collection == self.index.treatments_collection {
            return Err(Error::InvalidConfig("chunk and treatment collections must differ".to_string()));
        }
        Ok(())
    }
}

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            other => tracing::warn!(env = other, "unknown RUST_ENV, using config.toml only"),
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let base_dir = env::current_dir()?;
        tracing::debug!(env = %env_name, base = %base_dir.display(), "configuration loaded");
        Ok(Self { figment, base_dir })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed, validated settings.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn resolve(&self, p: &str) -> PathBuf {
        resolve_with_base(&self.base_dir, p)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_match_reference_values() {
        let s = Settings::default();
        assert_eq!(s.chunking.max_tokens, 256);
        assert_eq!(s.chunking.overlap_tokens, 48);
        assert_eq!(s.symptoms.top_k_chunks, 40);
        assert_eq!(s.symptoms.top_n_diseases, 2);
        assert_eq!(s.symptoms.top_m_chunks, 4);
        assert_eq!(s.symptoms.top_k_scores_for_mean, 5);
        assert_eq!(s.treatments.top_k, 1);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn files_and_env_layer_over_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("RUST_ENV", "test");
            jail.create_file(
                "config.toml",
                r#"
                [index]
                uri = "/srv/medrag/lancedb"

                [symptoms]
                top_k_chunks = 80
                pooling = "cls"
                "#,
            )?;
            jail.create_file("config.test.toml", "[symptoms]\ntop_k_chunks = 10\n")?;
            jail.set_env("APP_TREATMENTS__TOP_K", "3");

            let config = Config::load().map_err(|e| e.to_string())?;
            let s = config.settings().map_err(|e| e.to_string())?;
            assert_eq!(s.index.uri, "/srv/medrag/lancedb");
            assert_eq!(s.index.dim, 384);
            assert_eq!(s.symptoms.top_k_chunks, 10);
            assert_eq!(s.symptoms.pooling, Pooling::Cls);
            assert_eq!(s.treatments.top_k, 3);
            assert_eq!(config.get::<usize>("chunking.max_tokens").map_err(|e| e.to_string())?, 256);
            Ok(())
        });
    }

    #[test]
    fn invalid_overlap_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("RUST_ENV", "test");
            jail.create_file("config.toml", "[chunking]\nmax_tokens = 32\noverlap_tokens = 32\n")?;
            let config = Config::load().map_err(|e| e.to_string())?;
            assert!(matches!(config.settings(), Err(Error::InvalidConfig(_))));
            Ok(())
        });
    }

    #[test]
    fn zero_limit_is_rejected() {
        let mut s = Settings::default();
        s.symptoms.top_n_diseases = 0;
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("symptoms.top_n_diseases"));
    }

    #[test]
    fn window_must_fit_encoder_length() {
        let mut s = Settings::default();
        s.symptoms.max_len = 256;
        let err = s.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(err.to_string().contains("symptoms.max_len"));
        s.symptoms.max_len = 258;
        assert!(s.validate().is_ok());
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let base = Path::new("/opt/medrag");
        assert_eq!(resolve_with_base(base, "models/x"), PathBuf::from("/opt/medrag/models/x"));
        assert_eq!(resolve_with_base(base, "/abs/y"), PathBuf::from("/abs/y"));
    }
}
