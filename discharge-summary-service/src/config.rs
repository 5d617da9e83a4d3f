use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::vocabulary::{Vocabulary, VocabularyError};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MISTRAL_API_URL: &str = "https://api.mistral.ai/v1/chat/completions";
pub const DEFAULT_MISTRAL_MODEL: &str = "mistral-small-latest";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid PORT value '{value}': {source}")]
    InvalidPort {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error(transparent)]
    Vocabulary(#[from] VocabularyError),
}

/// Service settings read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Absent key means every summary request falls back.
    pub mistral_api_key: Option<String>,
    pub mistral_api_url: String,
    pub mistral_model: String,
    pub vocabulary_path: Option<PathBuf>,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port = match var("PORT") {
            Some(value) => value
                .parse::<u16>()
                .map_err(|source| ConfigError::InvalidPort { value, source })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            port,
            mistral_api_key: var("MISTRAL_API_KEY"),
            mistral_api_url: var("MISTRAL_API_URL")
                .unwrap_or_else(|| DEFAULT_MISTRAL_API_URL.to_string()),
            mistral_model: var("MISTRAL_MODEL").unwrap_or_else(|| DEFAULT_MISTRAL_MODEL.to_string()),
            vocabulary_path: var("VOCABULARY_PATH").map(PathBuf::from),
        })
    }

    /// Built-in vocabularies unless `VOCABULARY_PATH` points at a YAML override.
    pub fn load_vocabulary(&self) -> Result<Vocabulary, ConfigError> {
        match &self.vocabulary_path {
            Some(path) => {
                info!(path = %path.display(), "Loading vocabulary override");
                Ok(Vocabulary::from_yaml_file(path)?)
            }
            None => Ok(Vocabulary::default()),
        }
    }
}
