use std::env;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::clients::flexible::ClientType;
use crate::core::DEFAULT_MAX_ATTEMPTS;
use crate::error::GenerationError;

pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Trait for clients that read their credential from the environment.
pub trait KeyFromEnv {
    /// The environment variable name for this client's API key
    const KEY_NAME: &'static str;

    /// Find the API key by loading `.env` (if any) and then reading the environment.
    /// Blank values count as absent.
    fn find_key() -> Option<String> {
        let _ = dotenvy::dotenv();
        env::var(Self::KEY_NAME)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Process-level settings, read once at startup.
#[derive(Debug, Clone)]
pub struct ForgeConfig {
    pub provider: ClientType,
    pub model: Option<String>,
    pub store_dir: Option<PathBuf>,
    pub blueprints_path: Option<PathBuf>,
    pub batch_size: usize,
    pub max_attempts: usize,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            provider: ClientType::default(),
            model: None,
            store_dir: None,
            blueprints_path: None,
            batch_size: DEFAULT_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ForgeConfig {
    /// Read `EXAM_FORGE_*` variables (after loading `.env`) and validate them.
    pub fn from_env() -> Result<Self, GenerationError> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Some(provider) = non_empty_var("EXAM_FORGE_PROVIDER") {
            config.provider = provider.parse().map_err(GenerationError::Configuration)?;
        }
        config.model = non_empty_var("EXAM_FORGE_MODEL");
        config.store_dir = non_empty_var("EXAM_FORGE_STORE_DIR").map(PathBuf::from);
        config.blueprints_path = non_empty_var("EXAM_FORGE_BLUEPRINTS").map(PathBuf::from);
        if let Some(size) = non_empty_var("EXAM_FORGE_BATCH_SIZE") {
            config.batch_size = parse_usize("EXAM_FORGE_BATCH_SIZE", &size)?;
        }
        if let Some(attempts) = non_empty_var("EXAM_FORGE_MAX_ATTEMPTS") {
            config.max_attempts = parse_usize("EXAM_FORGE_MAX_ATTEMPTS", &attempts)?;
        }

        config.validate()?;
        info!(provider = %config.provider, batch_size = config.batch_size,
              max_attempts = config.max_attempts, persistent_store = config.store_dir.is_some(),
              "Loaded exam-forge configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.batch_size == 0 {
            return Err(GenerationError::Configuration("batch size must be at least 1".into()));
        }
        if self.max_attempts == 0 {
            return Err(GenerationError::Configuration("max attempts must be at least 1".into()));
        }
        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    let value = env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    if let Some(v) = &value {
        debug!(variable = name, value = %v, "Read configuration variable");
    }
    value
}

fn parse_usize(name: &str, raw: &str) -> Result<usize, GenerationError> {
    raw.parse::<usize>()
        .map_err(|_| GenerationError::Configuration(format!("{} must be a positive integer, got '{}'", name, raw)))
}
