use gauge_core::AssessmentConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawGaugeConfig {
    #[serde(default)]
    pub data: RawDataConfig,

    #[serde(default)]
    pub pool: RawPoolConfig,

    /// Kept as a raw table so nested keys merge one by one
    #[serde(default)]
    pub assessment: toml::Table,
}

/// Data config as stored in TOML (optional fields for proper merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawDataConfig {
    /// Directory holding stored profiles
    pub dir: Option<PathBuf>,
}

/// Pool config as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPoolConfig {
    /// Question pool used when no file is passed on the command line
    pub path: Option<PathBuf>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GaugeConfig {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub assessment: AssessmentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding stored profiles
    pub dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: gauge_paths::data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PoolConfig {
    /// Default question pool file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}
