use super::types::{DataConfig, GaugeConfig, PoolConfig, RawDataConfig, RawGaugeConfig, RawPoolConfig};
use anyhow::{Context, Result};
use gauge_core::AssessmentConfig;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<GaugeConfig> {
        let mut raw = RawGaugeConfig::default();

        // Layer 1: User config
        let user_path = Self::user_config_path();
        if user_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(&user_path)?);
        }

        // Layer 2: Project config
        let project_path = Self::project_config_path();
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(&project_path)?);
        }

        Self::finalize(raw)
    }

    /// Get user config path (`$XDG_CONFIG_HOME/gauge/config.toml`)
    pub fn user_config_path() -> PathBuf {
        gauge_paths::config_dir().join("config.toml")
    }

    /// Get project config path
    /// Can be overridden with GAUGE_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("GAUGE_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".gauge/config.toml")
        }
    }

    fn read_raw(path: &Path) -> Result<RawGaugeConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawGaugeConfig, overlay: RawGaugeConfig) -> RawGaugeConfig {
        RawGaugeConfig {
            data: RawDataConfig {
                dir: overlay.data.dir.or(base.data.dir),
            },
            pool: RawPoolConfig {
                path: overlay.pool.path.or(base.pool.path),
            },
            assessment: merge_tables(base.assessment, overlay.assessment),
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawGaugeConfig) -> Result<GaugeConfig> {
        let assessment: AssessmentConfig = toml::Value::Table(raw.assessment)
            .try_into()
            .context("Invalid [assessment] section")?;
        assessment.validate()?;

        Ok(GaugeConfig {
            data: DataConfig {
                dir: raw.data.dir.unwrap_or_else(gauge_paths::data_dir),
            },
            pool: PoolConfig {
                path: raw.pool.path,
            },
            assessment,
        })
    }

    /// Load config from a specific path (for testing)
    #[cfg(test)]
    pub fn load_from_path(path: &Path) -> Result<GaugeConfig> {
        if path.exists() {
            Self::finalize(Self::read_raw(path)?)
        } else {
            Ok(GaugeConfig::default())
        }
    }
}

/// Deep-merge TOML tables: nested tables merge key by key, anything else in
/// `overlay` replaces the value in `base`.
fn merge_tables(mut base: toml::Table, overlay: toml::Table) -> toml::Table {
    for (key, value) in overlay {
        let merged = match (base.remove(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                toml::Value::Table(merge_tables(existing, incoming))
            }
            (_, value) => value,
        };
        base.insert(key, merged);
    }
    base
}
