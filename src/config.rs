use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Where a pipeline's chain executes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    /// Stages run on pump threads wired directly in the caller's context.
    Local,
    /// Stages run inside a background worker that owns the whole chain.
    Threaded,
}

/// Pipeline construction configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub mode: ExecMode,
    pub stage_buffer: usize,
    pub sink_buffer: usize,
    pub fallback_to_local: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: ExecMode::Threaded,
            stage_buffer: 16,
            sink_buffer: 16,
            fallback_to_local: false,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Self::default()
                } else {
                    // Re-panic on invalid TOML or other errors
                    panic!("Failed to load config from {}: {}", path.display(), e);
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - DATAPIPE_MODE → mode ("local" or "threaded")
    /// - DATAPIPE_STAGE_BUFFER → stage_buffer
    /// - DATAPIPE_FALLBACK_TO_LOCAL → fallback_to_local
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(mode) = std::env::var("DATAPIPE_MODE")
            && !mode.is_empty()
        {
            match mode.to_lowercase().as_str() {
                "local" => self.mode = ExecMode::Local,
                "threaded" => self.mode = ExecMode::Threaded,
                other => tracing::warn!(value = other, "ignoring unknown DATAPIPE_MODE"),
            }
        }

        if let Ok(buffer) = std::env::var("DATAPIPE_STAGE_BUFFER")
            && !buffer.is_empty()
        {
            match buffer.parse::<usize>() {
                Ok(capacity) => self.stage_buffer = capacity,
                Err(_) => {
                    tracing::warn!(value = %buffer, "ignoring unparseable DATAPIPE_STAGE_BUFFER");
                }
            }
        }

        if let Ok(flag) = std::env::var("DATAPIPE_FALLBACK_TO_LOCAL")
            && !flag.is_empty()
        {
            self.fallback_to_local = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        self
    }
}
