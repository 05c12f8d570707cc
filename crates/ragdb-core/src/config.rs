//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Nested keys are addressed in the environment with `__`, for example
//! `APP_RETRIEVAL__CACHE_SIZE=200`.
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.retrieval()?.validate()?;
        tracing::debug!(env = %env_name, "configuration loaded");
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    /// Typed section; a missing table yields the defaults and a partial one
    /// keeps the defaults of the fields it omits.
    fn section<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if !self.figment.contains(key) {
            return Ok(T::default());
        }
        self.get(key)
    }

    pub fn retrieval(&self) -> Result<RetrievalSettings> {
        self.section("retrieval")
    }

    pub fn storage(&self) -> Result<StorageSettings> {
        self.section("storage")
    }

    pub fn embedding(&self) -> Result<EmbeddingSettings> {
        self.section("embedding")
    }
}

/// Query-time knobs. Every value has a default so the engine runs unconfigured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Words per chunk at ingestion time.
    pub chunk_size: usize,
    /// Words of trailing sentences repeated at the start of the next chunk.
    pub chunk_overlap: usize,
    pub default_k: usize,
    pub max_k: usize,
    pub query_timeout_ms: u64,
    pub max_context_chars: usize,
    pub cache_enabled: bool,
    pub cache_size: usize,
    /// Relevance floor for search callers.
    pub min_score: f32,
    /// Relevance floor for the interactive chat caller.
    pub chat_min_score: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 100,
            default_k: 5,
            max_k: 20,
            query_timeout_ms: 5_000,
            max_context_chars: 2_000,
            cache_enabled: true,
            cache_size: 100,
            min_score: 0.3,
            chat_min_score: 0.5,
        }
    }
}

impl RetrievalSettings {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::InvalidConfig(msg));
        if self.chunk_size == 0 {
            return fail("retrieval.chunk_size must be > 0".into());
        }
        if self.chunk_overlap >= self.chunk_size {
            return fail(format!(
                "retrieval.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            ));
        }
        if self.max_k == 0 {
            return fail("retrieval.max_k must be > 0".into());
        }
        if self.default_k == 0 || self.default_k > self.max_k {
            return fail(format!("retrieval.default_k must be within 1..={}", self.max_k));
        }
        for (key, v) in [("min_score", self.min_score), ("chat_min_score", self.chat_min_score)] {
            if !(0.0..=1.0).contains(&v) {
                return fail(format!("retrieval.{key} must be within [0, 1], got {v}"));
            }
        }
        if self.query_timeout_ms == 0 {
            return fail("retrieval.query_timeout_ms must be > 0".into());
        }
        if self.max_context_chars == 0 {
            return fail("retrieval.max_context_chars must be > 0".into());
        }
        if self.cache_enabled && self.cache_size == 0 {
            return fail("retrieval.cache_size must be > 0 when the cache is enabled".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { dir: "./rag_storage".to_string() }
    }
}

impl StorageSettings {
    pub fn resolved_dir(&self) -> PathBuf {
        expand_path(&self.dir)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: String,
    pub dim: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { provider: "hashing".to_string(), dim: 384 }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
